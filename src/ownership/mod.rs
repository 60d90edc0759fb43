//! Ownership seam.
//!
//! # Responsibilities
//! - Answer "is this node the owner of resource X"
//! - Publish ownership changes to interested subsystems
//!
//! # Design Decisions
//! - The election itself is external; any lease, lock, or Raft-backed
//!   service can sit behind [`OwnershipService`]
//! - Queries are cheap and synchronous; they are repeated per write task

pub mod local;

use thiserror::Error;
use tokio::sync::broadcast;

pub use local::StaticOwnership;

/// Resource identifier guarding the cluster configuration.
pub const CONFIG_RESOURCE: &str = "CONFIG";

/// Ownership state change of one resource as seen by this node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OwnershipChange {
    pub resource: String,
    pub was_owner: bool,
    pub is_owner: bool,
}

impl OwnershipChange {
    pub fn gained(&self) -> bool {
        !self.was_owner && self.is_owner
    }

    pub fn lost(&self) -> bool {
        self.was_owner && !self.is_owner
    }
}

/// Errors raised when querying ownership.
#[derive(Debug, Error)]
pub enum OwnershipError {
    #[error("ownership state of {resource} is unavailable: {reason}")]
    Unavailable { resource: String, reason: String },
}

/// External ownership (leader election) service.
pub trait OwnershipService: Send + Sync {
    fn is_owner(&self, resource: &str) -> Result<bool, OwnershipError>;

    /// Subscribe to ownership changes of every resource.
    fn subscribe(&self) -> broadcast::Receiver<OwnershipChange>;
}
