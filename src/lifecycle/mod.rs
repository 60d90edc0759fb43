//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Load settings → Validate → Seed from snapshot → Bootstrap → Ready
//!
//! Shutdown (shutdown.rs):
//!     Signal received → Interrupt bootstrap wait / close coordinator → Exit
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Trigger graceful shutdown
//! ```
//!
//! # Design Decisions
//! - Ordered startup: settings first, then logging, then the coordinator
//! - Shutdown is a broadcast every long-running task subscribes to

pub mod shutdown;
pub mod signals;
pub mod startup;

pub use shutdown::Shutdown;
