//! Configuration data model.
//!
//! # Data Flow
//! ```text
//! PartialConfig (desired scope, administrator-authored)
//!     → validate (range checks, all errors reported)
//!     → EffectiveConfig::fill_default (unset fields take defaults)
//!     → OperationalEntry (operational scope, written by the owner)
//!     → installed into each node's shared cell
//! ```
//!
//! # Design Decisions
//! - `EffectiveConfig` is immutable; a change produces a new snapshot
//! - Equality covers exactly the eight configuration fields
//! - `diff` exists for logs only and never drives control flow

pub mod effective;
pub mod mac;
pub mod partial;

pub use effective::{EffectiveConfig, OperationalEntry};
pub use mac::{MacAddress, ParseMacError};
pub use partial::{FieldError, FieldRange, PartialConfig, PartialConfigError};
