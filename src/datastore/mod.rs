//! Datastore seam.
//!
//! # Data Flow
//! ```text
//! Administrator
//!     → desired scope (PartialConfig)
//!     → DataChangeListener<PartialConfig> callbacks
//!
//! Owner's write queue
//!     → ConfigTransaction (read both scopes, write operational, commit)
//!     → operational scope (OperationalEntry)
//!     → DataChangeListener<OperationalEntry> callbacks on every node
//! ```
//!
//! # Design Decisions
//! - Each scope holds at most one entry (a global singleton)
//! - Listener callbacks are synchronous and delivered in order per
//!   registration; registrations are independent of each other
//! - Registering a listener delivers the current entry as `Created`
//! - Transactions are async so remote backends fit behind the same trait

pub mod memory;

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use crate::model::{OperationalEntry, PartialConfig, PartialConfigError};

pub use memory::InMemoryDatastore;

/// The two logical storage locations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Scope {
    /// Where administrators write intended configuration.
    Desired,
    /// Where the converged configuration lives.
    Operational,
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scope::Desired => write!(f, "desired"),
            Scope::Operational => write!(f, "operational"),
        }
    }
}

/// Errors reported by a datastore backend.
#[derive(Debug, Error)]
pub enum DatastoreError {
    #[error("read from {scope} scope failed: {reason}")]
    Read { scope: Scope, reason: String },

    #[error("transaction commit failed: {0}")]
    Commit(String),

    /// The transaction was already committed.
    #[error("transaction already committed")]
    AlreadyCommitted,

    #[error("listener registration failed: {0}")]
    Registration(String),

    /// Rejected desired-scope input.
    #[error(transparent)]
    Invalid(#[from] PartialConfigError),
}

/// A single change to a scope's entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChangeEvent<T> {
    Created { after: T },
    Updated { before: T, after: T },
    Removed { before: T },
}

/// Receives change notifications for one scope.
pub trait DataChangeListener<T>: Send + Sync {
    fn on_created(&self, after: &T);

    fn on_updated(&self, before: &T, after: &T);

    fn on_removed(&self, before: &T);

    fn dispatch(&self, event: &ChangeEvent<T>) {
        match event {
            ChangeEvent::Created { after } => self.on_created(after),
            ChangeEvent::Updated { before, after } => self.on_updated(before, after),
            ChangeEvent::Removed { before } => self.on_removed(before),
        }
    }
}

/// Handle to a listener registration.
pub trait ListenerRegistration: Send + Sync {
    /// Stop delivering events to the listener.
    fn close(&self);
}

/// A read/write transaction spanning both scopes.
///
/// Reads observe committed state overlaid with this transaction's own
/// pending writes. Writes become visible atomically on `commit`.
#[async_trait]
pub trait ConfigTransaction: Send {
    async fn read_desired(&mut self) -> Result<Option<PartialConfig>, DatastoreError>;

    async fn read_operational(&mut self) -> Result<Option<OperationalEntry>, DatastoreError>;

    fn put_desired(&mut self, entry: PartialConfig);

    fn delete_desired(&mut self);

    fn put_operational(&mut self, entry: OperationalEntry);

    async fn commit(&mut self) -> Result<(), DatastoreError>;
}

/// The distributed datastore holding both scopes.
pub trait ConfigDatastore: Send + Sync {
    fn begin(&self) -> Box<dyn ConfigTransaction>;

    fn register_desired_listener(
        &self,
        listener: Arc<dyn DataChangeListener<PartialConfig>>,
    ) -> Result<Box<dyn ListenerRegistration>, DatastoreError>;

    fn register_operational_listener(
        &self,
        listener: Arc<dyn DataChangeListener<OperationalEntry>>,
    ) -> Result<Box<dyn ListenerRegistration>, DatastoreError>;
}
