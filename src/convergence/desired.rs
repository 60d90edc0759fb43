//! Desired-scope watcher: turns administrator edits into write tasks.

use std::sync::{Arc, Mutex, PoisonError};

use crate::convergence::queue::WriteQueue;
use crate::convergence::types::WriteTask;
use crate::datastore::{DataChangeListener, Scope};
use crate::model::{EffectiveConfig, PartialConfig};
use crate::observability::metrics;

pub struct DesiredConfigWatcher {
    queue: Arc<WriteQueue>,
    /// Resolved form of the last accepted desired entry.
    last_seen: Mutex<Option<EffectiveConfig>>,
}

impl DesiredConfigWatcher {
    pub fn new(queue: Arc<WriteQueue>, last_seen: Option<EffectiveConfig>) -> Self {
        Self {
            queue,
            last_seen: Mutex::new(last_seen),
        }
    }

    /// Replace the baseline used to detect no-op notifications.
    pub fn prime(&self, last_seen: Option<EffectiveConfig>) {
        *self.last_seen.lock().unwrap_or_else(PoisonError::into_inner) = last_seen;
    }

    pub fn last_seen(&self) -> Option<EffectiveConfig> {
        self.last_seen
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn accept(&self, partial: &PartialConfig) {
        let resolved = EffectiveConfig::fill_default(partial);
        {
            let mut last = self.last_seen.lock().unwrap_or_else(PoisonError::into_inner);
            if let Some(previous) = last.as_ref() {
                if !previous.is_updated(&resolved) {
                    tracing::debug!("Desired configuration unchanged, ignoring notification");
                    return;
                }
            }
            *last = Some(resolved);
        }
        self.submit(WriteTask::Merge(partial.clone()));
    }

    fn submit(&self, task: WriteTask) {
        let name = task.name();
        match self.queue.submit(task) {
            Ok(_reply) => tracing::debug!(task = name, "Submitted write task"),
            Err(e) => tracing::warn!(task = name, error = %e, "Dropped desired configuration change"),
        }
    }
}

impl DataChangeListener<PartialConfig> for DesiredConfigWatcher {
    fn on_created(&self, after: &PartialConfig) {
        metrics::record_notification(Scope::Desired, "created");
        self.accept(after);
    }

    fn on_updated(&self, _before: &PartialConfig, after: &PartialConfig) {
        metrics::record_notification(Scope::Desired, "updated");
        self.accept(after);
    }

    fn on_removed(&self, _before: &PartialConfig) {
        metrics::record_notification(Scope::Desired, "removed");
        tracing::info!("Desired configuration removed, resetting to defaults");
        *self.last_seen.lock().unwrap_or_else(PoisonError::into_inner) =
            Some(EffectiveConfig::default());
        self.submit(WriteTask::Reset);
    }
}
