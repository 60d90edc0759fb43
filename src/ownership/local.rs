//! Locally assigned ownership.

use std::sync::atomic::{AtomicBool, Ordering};

use dashmap::DashMap;
use tokio::sync::broadcast;

use crate::ownership::{OwnershipChange, OwnershipError, OwnershipService};

/// Ownership decided by whoever holds the handle.
///
/// Used by the standalone daemon (which owns everything it is told to) and
/// by tests that hand ownership between simulated nodes.
pub struct StaticOwnership {
    owned: DashMap<String, bool>,
    available: AtomicBool,
    tx: broadcast::Sender<OwnershipChange>,
}

impl StaticOwnership {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(16);
        Self {
            owned: DashMap::new(),
            available: AtomicBool::new(true),
            tx,
        }
    }

    /// A service that reports ownership of `resource`.
    pub fn owning(resource: &str) -> Self {
        let service = Self::new();
        service.owned.insert(resource.to_string(), true);
        service
    }

    /// Change ownership of `resource`, notifying subscribers if it changed.
    pub fn set_owner(&self, resource: &str, is_owner: bool) {
        let was_owner = self
            .owned
            .insert(resource.to_string(), is_owner)
            .unwrap_or(false);
        if was_owner == is_owner {
            return;
        }

        tracing::info!(resource, is_owner, "Ownership changed");
        let _ = self.tx.send(OwnershipChange {
            resource: resource.to_string(),
            was_owner,
            is_owner,
        });
    }

    /// Make queries fail, as if the election service were unreachable.
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }
}

impl Default for StaticOwnership {
    fn default() -> Self {
        Self::new()
    }
}

impl OwnershipService for StaticOwnership {
    fn is_owner(&self, resource: &str) -> Result<bool, OwnershipError> {
        if !self.available.load(Ordering::SeqCst) {
            return Err(OwnershipError::Unavailable {
                resource: resource.to_string(),
                reason: "ownership service not reachable".to_string(),
            });
        }
        Ok(self.owned.get(resource).map(|r| *r.value()).unwrap_or(false))
    }

    fn subscribe(&self) -> broadcast::Receiver<OwnershipChange> {
        self.tx.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ownership::CONFIG_RESOURCE;

    #[test]
    fn test_default_is_not_owner() {
        let service = StaticOwnership::new();
        assert!(!service.is_owner(CONFIG_RESOURCE).unwrap());
        assert!(StaticOwnership::owning(CONFIG_RESOURCE)
            .is_owner(CONFIG_RESOURCE)
            .unwrap());
    }

    #[test]
    fn test_set_owner_publishes_changes_only() {
        let service = StaticOwnership::new();
        let mut rx = service.subscribe();

        service.set_owner(CONFIG_RESOURCE, false);
        assert!(rx.try_recv().is_err());

        service.set_owner(CONFIG_RESOURCE, true);
        let change = rx.try_recv().unwrap();
        assert!(change.gained());
        assert_eq!(change.resource, CONFIG_RESOURCE);

        service.set_owner(CONFIG_RESOURCE, false);
        assert!(rx.try_recv().unwrap().lost());
    }

    #[test]
    fn test_unavailable_service_errors() {
        let service = StaticOwnership::owning(CONFIG_RESOURCE);
        service.set_available(false);
        assert!(service.is_owner(CONFIG_RESOURCE).is_err());
    }
}
