//! Operational-scope watcher: installs converged configuration locally.

use std::time::Duration;

use tokio::sync::watch;

use crate::convergence::cell::ConfigCell;
use crate::convergence::signal::{CompletionSignal, WaitError};
use crate::convergence::types::CoordinatorError;
use crate::datastore::{DataChangeListener, Scope};
use crate::lifecycle::Shutdown;
use crate::model::{EffectiveConfig, OperationalEntry};
use crate::observability::metrics;

pub struct OperationalConfigWatcher {
    cell: ConfigCell,
    synced: CompletionSignal,
    /// Bumped after every install.
    installs: watch::Sender<u64>,
    /// Interrupts a pending [`await_config`](Self::await_config).
    shutdown: Shutdown,
}

impl OperationalConfigWatcher {
    pub fn new(cell: ConfigCell, shutdown: Shutdown) -> Self {
        Self {
            cell,
            synced: CompletionSignal::new(),
            installs: watch::channel(0).0,
            shutdown,
        }
    }

    /// True once any operational entry has been installed.
    pub fn is_synchronized(&self) -> bool {
        self.synced.is_fulfilled()
    }

    /// Block until the first operational entry is installed.
    ///
    /// Returns at once if `already_done` or if the entry was already seen.
    /// Fails with [`CoordinatorError::Timeout`] after `timeout`, or
    /// [`CoordinatorError::SynchronizationInterrupted`] on shutdown.
    pub async fn await_config(
        &self,
        already_done: bool,
        timeout: Duration,
    ) -> Result<(), CoordinatorError> {
        if already_done || self.synced.is_fulfilled() {
            return Ok(());
        }

        tracing::info!(timeout_ms = timeout.as_millis() as u64, "Waiting for cluster configuration");
        tokio::select! {
            result = self.synced.wait(timeout) => match result {
                Ok(()) => Ok(()),
                Err(WaitError::TimedOut) => Err(CoordinatorError::Timeout {
                    millis: timeout.as_millis() as u64,
                }),
                Err(WaitError::Abandoned) => Err(CoordinatorError::SynchronizationInterrupted),
            },
            _ = self.shutdown.triggered() => Err(CoordinatorError::SynchronizationInterrupted),
        }
    }

    /// Block until the cell holds a configuration equal to `target`.
    ///
    /// An earlier install (such as the entry replayed on registration)
    /// does not satisfy the wait unless it already matches.
    pub async fn await_installed(
        &self,
        target: &EffectiveConfig,
        timeout: Duration,
    ) -> Result<(), CoordinatorError> {
        let mut rx = self.installs.subscribe();
        let cell = &self.cell;
        let matched = async {
            rx.wait_for(|_| !cell.load().is_updated(target))
                .await
                .is_ok()
        };
        let installed = tokio::time::timeout(timeout, matched);

        let outcome = tokio::select! {
            result = installed => Some(result),
            _ = self.shutdown.triggered() => None,
        };
        match outcome {
            Some(Ok(true)) => Ok(()),
            Some(Err(_)) => Err(CoordinatorError::Timeout {
                millis: timeout.as_millis() as u64,
            }),
            Some(Ok(false)) | None => Err(CoordinatorError::SynchronizationInterrupted),
        }
    }

    fn install(&self, entry: &OperationalEntry) {
        let previous = self.cell.replace(entry.config.clone());
        self.installs.send_modify(|count| *count += 1);
        match previous.diff(&entry.config) {
            Some(diff) => {
                tracing::info!(%diff, "Cluster configuration changed");
                metrics::record_config_installed(true);
            }
            None => {
                tracing::debug!("Cluster configuration unchanged");
                metrics::record_config_installed(false);
            }
        }

        if self.synced.fulfill() {
            tracing::info!(init_done = entry.init_done, "Cluster configuration synchronized");
        }
    }
}

impl DataChangeListener<OperationalEntry> for OperationalConfigWatcher {
    fn on_created(&self, after: &OperationalEntry) {
        metrics::record_notification(Scope::Operational, "created");
        self.install(after);
    }

    fn on_updated(&self, _before: &OperationalEntry, after: &OperationalEntry) {
        metrics::record_notification(Scope::Operational, "updated");
        self.install(after);
    }

    fn on_removed(&self, _before: &OperationalEntry) {
        // Absence means "not yet initialized", not "reset".
        metrics::record_notification(Scope::Operational, "removed");
        tracing::debug!("Operational configuration removed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{EffectiveConfig, PartialConfig};
    use std::time::Instant;

    fn entry(flow_mod_timeout: u32) -> OperationalEntry {
        OperationalEntry::new(EffectiveConfig::fill_default(&PartialConfig {
            flow_mod_timeout: Some(flow_mod_timeout),
            ..Default::default()
        }))
    }

    fn watcher() -> (OperationalConfigWatcher, ConfigCell, Shutdown) {
        let cell = ConfigCell::new(EffectiveConfig::default());
        let shutdown = Shutdown::new();
        (
            OperationalConfigWatcher::new(cell.clone(), shutdown.clone()),
            cell,
            shutdown,
        )
    }

    #[tokio::test]
    async fn test_install_swaps_cell_and_fulfills() {
        let (w, cell, _shutdown) = watcher();
        assert!(!w.is_synchronized());

        w.on_created(&entry(4000));
        assert_eq!(cell.load().flow_mod_timeout(), 4000);
        assert!(w.is_synchronized());

        w.on_updated(&entry(4000), &entry(5000));
        assert_eq!(cell.load().flow_mod_timeout(), 5000);
        w.await_config(false, Duration::from_millis(1)).await.unwrap();
    }

    #[tokio::test]
    async fn test_removal_keeps_current_value() {
        let (w, cell, _shutdown) = watcher();
        w.on_created(&entry(4000));
        w.on_removed(&entry(4000));
        assert_eq!(cell.load().flow_mod_timeout(), 4000);
    }

    #[tokio::test]
    async fn test_already_done_returns_immediately() {
        let (w, _cell, _shutdown) = watcher();
        w.await_config(true, Duration::from_millis(1)).await.unwrap();
        assert!(!w.is_synchronized());
    }

    #[tokio::test]
    async fn test_await_times_out() {
        let (w, _cell, _shutdown) = watcher();
        let start = Instant::now();
        let err = w.await_config(false, Duration::from_millis(50)).await.unwrap_err();
        assert!(err.is_timeout());
        assert!(start.elapsed() >= Duration::from_millis(50));
    }

    #[tokio::test]
    async fn test_await_installed_ignores_earlier_entry() {
        let (w, cell, _shutdown) = watcher();
        let w = std::sync::Arc::new(w);
        w.on_created(&entry(3000));
        assert!(w.is_synchronized());

        let target = entry(4000).config;
        let installer = w.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            installer.on_updated(&entry(3000), &entry(4000));
        });

        w.await_installed(&target, Duration::from_secs(5)).await.unwrap();
        assert_eq!(cell.load().flow_mod_timeout(), 4000);
    }

    #[tokio::test]
    async fn test_await_installed_times_out_on_other_value() {
        let (w, _cell, _shutdown) = watcher();
        w.on_created(&entry(3000));
        let err = w
            .await_installed(&entry(4000).config, Duration::from_millis(30))
            .await
            .unwrap_err();
        assert!(err.is_timeout());
    }

    #[tokio::test]
    async fn test_shutdown_interrupts_wait() {
        let (w, _cell, shutdown) = watcher();
        shutdown.trigger();
        let err = w.await_config(false, Duration::from_secs(5)).await.unwrap_err();
        assert!(matches!(err, CoordinatorError::SynchronizationInterrupted));
    }
}
