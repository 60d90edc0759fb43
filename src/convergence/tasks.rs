//! Execution of write tasks against the datastore.

use std::sync::Arc;

use crate::convergence::types::{CoordinatorError, TaskOutcome, WriteTask};
use crate::datastore::{ConfigDatastore, DatastoreError};
use crate::model::{EffectiveConfig, OperationalEntry, PartialConfig};
use crate::observability::metrics;
use crate::ownership::{OwnershipService, CONFIG_RESOURCE};
use crate::snapshot::{LocalSnapshotStore, SnapshotError};

/// Where a node caches its configuration on local disk.
#[derive(Debug, Clone)]
pub struct SnapshotTarget {
    pub store: LocalSnapshotStore,
    pub category: String,
    pub key: String,
}

impl SnapshotTarget {
    pub fn new(store: LocalSnapshotStore, category: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            store,
            category: category.into(),
            key: key.into(),
        }
    }

    pub fn load(&self) -> Result<Option<EffectiveConfig>, SnapshotError> {
        self.store.load(&self.category, &self.key)
    }

    pub fn save(&self, config: &EffectiveConfig) -> Result<(), SnapshotError> {
        self.store.save(&self.category, &self.key, config)
    }
}

/// Runs one [`WriteTask`] at a time on behalf of the write queue.
pub struct TaskExecutor {
    datastore: Arc<dyn ConfigDatastore>,
    ownership: Arc<dyn OwnershipService>,
    snapshot: SnapshotTarget,
}

fn tx_failed(task: &'static str) -> impl FnOnce(DatastoreError) -> CoordinatorError {
    move |source| CoordinatorError::Transaction { task, source }
}

impl TaskExecutor {
    pub fn new(
        datastore: Arc<dyn ConfigDatastore>,
        ownership: Arc<dyn OwnershipService>,
        snapshot: SnapshotTarget,
    ) -> Self {
        Self {
            datastore,
            ownership,
            snapshot,
        }
    }

    pub async fn execute(&self, task: &WriteTask) -> Result<TaskOutcome, CoordinatorError> {
        match task {
            WriteTask::Bootstrap => self.bootstrap().await,
            WriteTask::Merge(partial) => self.merge(task.name(), partial).await,
            WriteTask::Reset => self.merge(task.name(), &PartialConfig::default()).await,
            WriteTask::InitDone => self.mark_init_done().await,
            WriteTask::Reconcile => self.reconcile().await,
        }
    }

    fn owns_config(&self) -> Result<bool, CoordinatorError> {
        self.ownership
            .is_owner(CONFIG_RESOURCE)
            .map_err(|source| CoordinatorError::OwnershipQuery {
                resource: CONFIG_RESOURCE,
                source,
            })
    }

    /// Publish the resolved desired entry with the initialization marker.
    ///
    /// Ownership was settled by the caller; this does not ask again.
    async fn bootstrap(&self) -> Result<TaskOutcome, CoordinatorError> {
        let name = WriteTask::Bootstrap.name();
        let mut tx = self.datastore.begin();
        let desired = tx.read_desired().await.map_err(tx_failed(name))?;
        if desired.is_none() {
            tx.put_desired(PartialConfig::default());
        }
        let config = EffectiveConfig::fill_default(&desired.unwrap_or_default());

        tx.put_operational(OperationalEntry::new(config.clone()).with_init_done(true));
        tx.commit().await.map_err(tx_failed(name))?;

        tracing::info!("Published bootstrap configuration");
        self.persist(&config);
        Ok(TaskOutcome::Committed(config))
    }

    async fn merge(
        &self,
        name: &'static str,
        partial: &PartialConfig,
    ) -> Result<TaskOutcome, CoordinatorError> {
        let config = EffectiveConfig::fill_default(partial);
        if !self.owns_config()? {
            // Followers still keep a best-effort local cache.
            self.persist(&config);
            return Ok(TaskOutcome::CachedOnly(config));
        }

        let mut tx = self.datastore.begin();
        let existing = tx.read_operational().await.map_err(tx_failed(name))?;
        let init_done = match &existing {
            Some(entry) if !entry.config.is_updated(&config) => {
                return Ok(TaskOutcome::Unchanged(config));
            }
            Some(entry) => entry.init_done,
            None => false,
        };

        tx.put_operational(OperationalEntry::new(config.clone()).with_init_done(init_done));
        tx.commit().await.map_err(tx_failed(name))?;

        self.persist(&config);
        Ok(TaskOutcome::Committed(config))
    }

    async fn mark_init_done(&self) -> Result<TaskOutcome, CoordinatorError> {
        if !self.owns_config()? {
            return Ok(TaskOutcome::Skipped);
        }

        let name = WriteTask::InitDone.name();
        let mut tx = self.datastore.begin();
        let entry = match tx.read_operational().await.map_err(tx_failed(name))? {
            Some(entry) if entry.init_done => return Ok(TaskOutcome::Unchanged(entry.config)),
            Some(entry) => entry.with_init_done(true),
            None => {
                let desired = tx.read_desired().await.map_err(tx_failed(name))?;
                let config = EffectiveConfig::fill_default(&desired.unwrap_or_default());
                OperationalEntry::new(config).with_init_done(true)
            }
        };

        let config = entry.config.clone();
        tx.put_operational(entry);
        tx.commit().await.map_err(tx_failed(name))?;

        tracing::info!("Marked cluster configuration as initialized");
        self.persist(&config);
        Ok(TaskOutcome::Committed(config))
    }

    async fn reconcile(&self) -> Result<TaskOutcome, CoordinatorError> {
        if !self.owns_config()? {
            return Ok(TaskOutcome::Skipped);
        }
        let name = WriteTask::Reconcile.name();
        let desired = self
            .datastore
            .begin()
            .read_desired()
            .await
            .map_err(tx_failed(name))?;
        self.merge(name, &desired.unwrap_or_default()).await
    }

    /// Cache after a successful commit. A failed save keeps the old file.
    fn persist(&self, config: &EffectiveConfig) {
        if let Err(e) = self.snapshot.save(config) {
            tracing::error!(error = %e, "Failed to save configuration snapshot");
            metrics::record_snapshot_failure();
        }
    }
}
