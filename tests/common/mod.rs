//! Shared utilities for cluster integration tests.
//!
//! Every simulated node shares one in-memory datastore and owns its own
//! ownership handle and snapshot directory.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tempfile::TempDir;

use cluster_config::convergence::{ConfigCoordinator, CoordinatorDeps, CoordinatorError, SnapshotTarget};
use cluster_config::datastore::{ConfigDatastore, InMemoryDatastore};
use cluster_config::lifecycle::Shutdown;
use cluster_config::model::{EffectiveConfig, PartialConfig};
use cluster_config::ownership::{StaticOwnership, CONFIG_RESOURCE};
use cluster_config::snapshot::LocalSnapshotStore;

pub const CATEGORY: &str = "cluster";
pub const KEY: &str = "config";

/// One simulated cluster member.
pub struct TestNode {
    pub ownership: Arc<StaticOwnership>,
    pub shutdown: Shutdown,
    pub dir: TempDir,
}

impl TestNode {
    pub fn new(owner: bool) -> Self {
        let ownership = Arc::new(StaticOwnership::new());
        ownership.set_owner(CONFIG_RESOURCE, owner);
        Self {
            ownership,
            shutdown: Shutdown::new(),
            dir: tempfile::tempdir().unwrap(),
        }
    }

    pub fn snapshot(&self) -> SnapshotTarget {
        SnapshotTarget::new(LocalSnapshotStore::new(self.dir.path()), CATEGORY, KEY)
    }

    /// Cached configuration on disk, if any.
    pub fn cached(&self) -> Option<EffectiveConfig> {
        self.snapshot().load().unwrap()
    }

    /// Leave a snapshot behind as if from a previous run.
    pub fn seed_snapshot(&self, partial: &PartialConfig) {
        self.snapshot()
            .save(&EffectiveConfig::fill_default(partial))
            .unwrap();
    }

    pub async fn start(
        &self,
        datastore: &InMemoryDatastore,
    ) -> Result<ConfigCoordinator, CoordinatorError> {
        self.start_with(Arc::new(datastore.clone())).await
    }

    /// Start against any datastore implementation.
    pub async fn start_with(
        &self,
        datastore: Arc<dyn ConfigDatastore>,
    ) -> Result<ConfigCoordinator, CoordinatorError> {
        ConfigCoordinator::start(CoordinatorDeps {
            datastore,
            ownership: self.ownership.clone(),
            snapshot: self.snapshot(),
            shutdown: self.shutdown.clone(),
        })
        .await
    }

    /// Start a node expected to come up.
    pub async fn start_ok(&self, datastore: &InMemoryDatastore) -> ConfigCoordinator {
        match self.start(datastore).await {
            Ok(coordinator) => coordinator,
            Err(e) => panic!("node failed to start: {e}"),
        }
    }
}

/// Poll `check` until it holds or `timeout` elapses.
pub async fn eventually(timeout: Duration, mut check: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    loop {
        if check() {
            return true;
        }
        if Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

#[allow(dead_code)]
pub fn flow_mod_timeout(value: u32) -> PartialConfig {
    PartialConfig {
        flow_mod_timeout: Some(value),
        ..Default::default()
    }
}
