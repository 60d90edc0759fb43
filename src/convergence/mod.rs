//! Cluster-wide configuration convergence.
//!
//! # Data Flow
//! ```text
//! Administrator writes desired scope
//!     → desired.rs (DesiredConfigWatcher: skip no-ops, enqueue merge)
//!     → queue.rs (single worker, FIFO, one transaction in flight)
//!     → tasks.rs (owner writes operational scope; everyone caches locally)
//!
//! Operational scope changes (every node)
//!     → operational.rs (OperationalConfigWatcher)
//!     → cell.rs (atomic swap of Arc<EffectiveConfig>)
//!     → signal.rs (first install releases the bootstrap barrier)
//!     → coordinator.rs accessors (lock-free reads)
//! ```
//!
//! # Design Decisions
//! - Only the owner of `CONFIG` writes the operational scope
//! - Followers block on the bootstrap barrier for at most `init-timeout`
//! - Snapshots are replaced, never edited
//! - Post-bootstrap write failures are logged and counted, not retried

pub mod cell;
pub mod coordinator;
pub mod desired;
pub mod operational;
pub mod queue;
pub mod signal;
pub mod tasks;
pub mod types;

pub use cell::ConfigCell;
pub use coordinator::{ConfigCoordinator, CoordinatorDeps};
pub use desired::DesiredConfigWatcher;
pub use operational::OperationalConfigWatcher;
pub use queue::{TaskReply, WriteQueue};
pub use signal::CompletionSignal;
pub use tasks::{SnapshotTarget, TaskExecutor};
pub use types::{CoordinatorError, CoordinatorState, TaskOutcome, WriteTask};
