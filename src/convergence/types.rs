//! Coordinator states, write tasks, and error definitions.

use std::fmt;

use thiserror::Error;

use crate::datastore::DatastoreError;
use crate::model::{EffectiveConfig, PartialConfig};
use crate::ownership::OwnershipError;

/// Lifecycle of a [`ConfigCoordinator`](crate::convergence::ConfigCoordinator).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoordinatorState {
    Uninitialized,
    DeterminingOwnership,
    BootstrapAsOwner,
    WaitAsFollower,
    Ready,
    Closed,
}

impl fmt::Display for CoordinatorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CoordinatorState::Uninitialized => "uninitialized",
            CoordinatorState::DeterminingOwnership => "determining-ownership",
            CoordinatorState::BootstrapAsOwner => "bootstrap-as-owner",
            CoordinatorState::WaitAsFollower => "wait-as-follower",
            CoordinatorState::Ready => "ready",
            CoordinatorState::Closed => "closed",
        };
        f.write_str(name)
    }
}

/// Work executed by the write queue, one at a time, in submission order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteTask {
    /// Owner bootstrap: resolve the desired entry and publish it with the
    /// initialization marker set.
    Bootstrap,
    /// Merge a desired entry over defaults into the operational scope.
    Merge(PartialConfig),
    /// The desired entry was removed: go back to pure defaults.
    Reset,
    /// Set the initialization marker on the operational entry.
    InitDone,
    /// Re-apply whatever the desired scope currently holds.
    Reconcile,
}

impl WriteTask {
    pub fn name(&self) -> &'static str {
        match self {
            WriteTask::Bootstrap => "bootstrap",
            WriteTask::Merge(_) => "merge",
            WriteTask::Reset => "reset",
            WriteTask::InitDone => "init-done",
            WriteTask::Reconcile => "reconcile",
        }
    }
}

/// Result of a write task that did not fail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskOutcome {
    /// A transaction was committed with this configuration.
    Committed(EffectiveConfig),
    /// The operational scope already held this configuration.
    Unchanged(EffectiveConfig),
    /// Not the owner: only the local snapshot was updated.
    CachedOnly(EffectiveConfig),
    /// Not the owner and nothing to cache.
    Skipped,
}

impl TaskOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            TaskOutcome::Committed(_) => "committed",
            TaskOutcome::Unchanged(_) => "unchanged",
            TaskOutcome::CachedOnly(_) => "cached-only",
            TaskOutcome::Skipped => "skipped",
        }
    }

    pub fn config(&self) -> Option<&EffectiveConfig> {
        match self {
            TaskOutcome::Committed(c) | TaskOutcome::Unchanged(c) | TaskOutcome::CachedOnly(c) => {
                Some(c)
            }
            TaskOutcome::Skipped => None,
        }
    }
}

/// Errors raised by the configuration coordinator.
#[derive(Debug, Error)]
pub enum CoordinatorError {
    /// Ownership state could not be obtained.
    #[error("failed to determine ownership of {resource}: {source}")]
    OwnershipQuery {
        resource: &'static str,
        #[source]
        source: OwnershipError,
    },

    /// A write transaction failed to commit.
    #[error("{task} transaction failed: {source}")]
    Transaction {
        task: &'static str,
        #[source]
        source: DatastoreError,
    },

    /// The bootstrap wait ended before any configuration was observed.
    #[error("interrupted while waiting for cluster configuration")]
    SynchronizationInterrupted,

    /// No owner published a configuration in time.
    #[error("cluster configuration not synchronized within {millis} ms")]
    Timeout { millis: u64 },

    /// Listener registration or a plain read failed.
    #[error("datastore error: {0}")]
    Datastore(#[from] DatastoreError),

    /// The coordinator or its write queue has been closed.
    #[error("configuration coordinator is closed")]
    Closed,
}

impl CoordinatorError {
    /// True if nobody initialized the configuration in time.
    pub fn is_timeout(&self) -> bool {
        matches!(self, CoordinatorError::Timeout { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = CoordinatorError::Timeout { millis: 100 };
        assert_eq!(
            err.to_string(),
            "cluster configuration not synchronized within 100 ms"
        );
        assert!(err.is_timeout());

        let err = CoordinatorError::Transaction {
            task: WriteTask::Bootstrap.name(),
            source: DatastoreError::Commit("disk full".into()),
        };
        assert_eq!(
            err.to_string(),
            "bootstrap transaction failed: transaction commit failed: disk full"
        );
        assert!(!err.is_timeout());
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn test_outcome_config() {
        let config = EffectiveConfig::default();
        assert_eq!(
            TaskOutcome::CachedOnly(config.clone()).config(),
            Some(&config)
        );
        assert_eq!(TaskOutcome::Skipped.config(), None);
    }
}
