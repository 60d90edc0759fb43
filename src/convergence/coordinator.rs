//! Cluster configuration coordinator.
//!
//! # States
//! ```text
//! Uninitialized → DeterminingOwnership → BootstrapAsOwner ─┐
//!                                      → WaitAsFollower  ──┴→ Ready → Closed
//! ```
//!
//! Any failure before `Ready` is fatal: the coordinator tears itself down
//! and `start` returns the error.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::sync::broadcast::{self, error::RecvError};

use crate::convergence::cell::ConfigCell;
use crate::convergence::desired::DesiredConfigWatcher;
use crate::convergence::operational::OperationalConfigWatcher;
use crate::convergence::queue::WriteQueue;
use crate::convergence::tasks::{SnapshotTarget, TaskExecutor};
use crate::convergence::types::{CoordinatorError, CoordinatorState, TaskOutcome, WriteTask};
use crate::datastore::{ConfigDatastore, ListenerRegistration};
use crate::lifecycle::Shutdown;
use crate::model::{EffectiveConfig, MacAddress};
use crate::observability::metrics;
use crate::ownership::{OwnershipChange, OwnershipService, CONFIG_RESOURCE};

/// External collaborators of a coordinator.
pub struct CoordinatorDeps {
    pub datastore: Arc<dyn ConfigDatastore>,
    pub ownership: Arc<dyn OwnershipService>,
    pub snapshot: SnapshotTarget,
    /// Process shutdown; interrupts a pending bootstrap wait.
    pub shutdown: Shutdown,
}

/// Converges this node onto the cluster-wide configuration and serves it.
pub struct ConfigCoordinator {
    cell: ConfigCell,
    queue: Arc<WriteQueue>,
    operational: Arc<OperationalConfigWatcher>,
    desired: Arc<DesiredConfigWatcher>,
    ownership: Arc<dyn OwnershipService>,
    registrations: Mutex<Vec<Box<dyn ListenerRegistration>>>,
    state: Mutex<CoordinatorState>,
    closed: AtomicBool,
    /// Stops the ownership monitor.
    monitor: Shutdown,
}

impl ConfigCoordinator {
    /// Bootstrap and return a ready coordinator.
    ///
    /// The owner publishes the resolved desired entry; followers wait up
    /// to `init-timeout` for an owner to do so.
    pub async fn start(deps: CoordinatorDeps) -> Result<Self, CoordinatorError> {
        let CoordinatorDeps {
            datastore,
            ownership,
            snapshot,
            shutdown,
        } = deps;

        let seed = match snapshot.load() {
            Ok(Some(config)) => {
                tracing::info!("Seeded configuration from local snapshot");
                config
            }
            Ok(None) => EffectiveConfig::default(),
            Err(e) => {
                tracing::warn!(error = %e, "Ignoring unreadable local snapshot");
                EffectiveConfig::default()
            }
        };
        let init_timeout = Duration::from_millis(u64::from(seed.init_timeout()));
        let cell = ConfigCell::new(seed);

        let queue = Arc::new(WriteQueue::start(TaskExecutor::new(
            datastore.clone(),
            ownership.clone(),
            snapshot,
        )));
        let operational = Arc::new(OperationalConfigWatcher::new(cell.clone(), shutdown));
        let desired = Arc::new(DesiredConfigWatcher::new(queue.clone(), None));

        let coordinator = Self {
            cell,
            queue,
            operational,
            desired,
            ownership,
            registrations: Mutex::new(Vec::new()),
            state: Mutex::new(CoordinatorState::Uninitialized),
            closed: AtomicBool::new(false),
            monitor: Shutdown::new(),
        };

        // On error, dropping the coordinator closes whatever was set up.
        match coordinator.bootstrap(datastore.as_ref(), init_timeout).await {
            Ok(()) => Ok(coordinator),
            Err(e) => {
                tracing::error!(
                    state = %coordinator.state(),
                    error = %e,
                    "Cluster configuration bootstrap failed"
                );
                Err(e)
            }
        }
    }

    async fn bootstrap(
        &self,
        datastore: &dyn ConfigDatastore,
        init_timeout: Duration,
    ) -> Result<(), CoordinatorError> {
        let registration = datastore.register_operational_listener(self.operational.clone())?;
        self.push_registration(registration);

        // Subscribe before asking so no change slips between the two.
        let changes = self.ownership.subscribe();

        self.transition(CoordinatorState::DeterminingOwnership);
        let owner = self
            .ownership
            .is_owner(CONFIG_RESOURCE)
            .map_err(|source| CoordinatorError::OwnershipQuery {
                resource: CONFIG_RESOURCE,
                source,
            })?;
        let role = if owner { "owner" } else { "follower" };

        let result = if owner {
            self.bootstrap_as_owner(init_timeout).await
        } else {
            self.transition(CoordinatorState::WaitAsFollower);
            self.operational.await_config(false, init_timeout).await
        };
        metrics::record_bootstrap(role, result.is_ok());
        result?;

        // Any desired entry that differs from what is installed now, including
        // one written since bootstrap, arrives as a change and gets merged.
        self.desired.prime(Some(EffectiveConfig::clone(&self.cell.load())));
        let registration = datastore.register_desired_listener(self.desired.clone())?;
        self.push_registration(registration);

        tokio::spawn(watch_ownership(
            changes,
            self.queue.clone(),
            self.monitor.clone(),
        ));

        self.transition(CoordinatorState::Ready);
        tracing::info!(role, "Cluster configuration ready");
        Ok(())
    }

    async fn bootstrap_as_owner(&self, init_timeout: Duration) -> Result<(), CoordinatorError> {
        self.transition(CoordinatorState::BootstrapAsOwner);
        let reply = self.queue.submit(WriteTask::Bootstrap)?;
        let outcome = reply.await.map_err(|_| CoordinatorError::Closed)??;
        let Some(committed) = outcome.config() else {
            return Ok(());
        };

        // The commit reaches this node through its own operational watcher.
        // An entry replayed at registration may have been installed first.
        self.operational.await_installed(committed, init_timeout).await
    }

    fn push_registration(&self, registration: Box<dyn ListenerRegistration>) {
        self.registrations
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(registration);
    }

    fn transition(&self, next: CoordinatorState) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        tracing::debug!(from = %*state, to = %next, "Coordinator state changed");
        *state = next;
    }

    pub fn state(&self) -> CoordinatorState {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// True once an operational configuration has been installed.
    pub fn is_synchronized(&self) -> bool {
        self.operational.is_synchronized()
    }

    /// Mark cluster initialization complete. Only the owner writes anything.
    pub async fn init_done(&self) -> Result<TaskOutcome, CoordinatorError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(CoordinatorError::Closed);
        }
        let owner = self
            .ownership
            .is_owner(CONFIG_RESOURCE)
            .map_err(|source| CoordinatorError::OwnershipQuery {
                resource: CONFIG_RESOURCE,
                source,
            })?;
        if !owner {
            return Ok(TaskOutcome::Skipped);
        }
        let reply = self.queue.submit(WriteTask::InitDone)?;
        reply.await.map_err(|_| CoordinatorError::Closed)?
    }

    /// Release both listener registrations and stop the write queue.
    ///
    /// Idempotent; only the first call has any effect.
    pub fn close(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        let registrations =
            std::mem::take(&mut *self.registrations.lock().unwrap_or_else(PoisonError::into_inner));
        for registration in registrations {
            registration.close();
        }
        self.queue.close();
        self.monitor.trigger();
        self.transition(CoordinatorState::Closed);
        tracing::info!("Configuration coordinator closed");
    }

    /// The current configuration snapshot.
    pub fn current(&self) -> Arc<EffectiveConfig> {
        self.cell.load()
    }

    pub fn topology_wait(&self) -> u32 {
        self.cell.read(EffectiveConfig::topology_wait)
    }

    pub fn l2_flow_priority(&self) -> u32 {
        self.cell.read(EffectiveConfig::l2_flow_priority)
    }

    pub fn flow_mod_timeout(&self) -> u32 {
        self.cell.read(EffectiveConfig::flow_mod_timeout)
    }

    pub fn bulk_flow_mod_timeout(&self) -> u32 {
        self.cell.read(EffectiveConfig::bulk_flow_mod_timeout)
    }

    pub fn init_timeout(&self) -> u32 {
        self.cell.read(EffectiveConfig::init_timeout)
    }

    pub fn max_redirections(&self) -> u32 {
        self.cell.read(EffectiveConfig::max_redirections)
    }

    pub fn controller_mac_address(&self) -> MacAddress {
        self.cell.read(EffectiveConfig::controller_mac_address)
    }

    pub fn is_host_tracking(&self) -> bool {
        self.cell.read(EffectiveConfig::host_tracking)
    }
}

impl Drop for ConfigCoordinator {
    fn drop(&mut self) {
        self.close();
    }
}

/// Re-apply the desired entry whenever this node gains ownership.
async fn watch_ownership(
    mut changes: broadcast::Receiver<OwnershipChange>,
    queue: Arc<WriteQueue>,
    stop: Shutdown,
) {
    loop {
        let change = tokio::select! {
            _ = stop.triggered() => break,
            change = changes.recv() => change,
        };
        match change {
            Ok(change) if change.resource == CONFIG_RESOURCE => {
                if change.gained() {
                    tracing::info!("Gained configuration ownership, reconciling");
                    if let Err(e) = queue.submit(WriteTask::Reconcile) {
                        tracing::warn!(error = %e, "Could not schedule reconcile");
                    }
                } else if change.lost() {
                    tracing::info!("Lost configuration ownership");
                }
            }
            Ok(_) => {}
            Err(RecvError::Lagged(skipped)) => {
                // Missed events: reconcile, the task itself checks ownership.
                tracing::warn!(skipped, "Ownership events lagged");
                if let Err(e) = queue.submit(WriteTask::Reconcile) {
                    tracing::warn!(error = %e, "Could not schedule reconcile");
                }
            }
            Err(RecvError::Closed) => break,
        }
    }
    tracing::debug!("Ownership monitor stopped");
}
