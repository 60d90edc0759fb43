//! Serialized write-task queue.
//!
//! A single worker drains tasks in submission order, so at most one write
//! transaction is in flight at any time.

use tokio::sync::{mpsc, oneshot};

use crate::convergence::tasks::TaskExecutor;
use crate::convergence::types::{CoordinatorError, TaskOutcome, WriteTask};
use crate::lifecycle::Shutdown;
use crate::observability::metrics;

/// Receives the result of one submitted task.
pub type TaskReply = oneshot::Receiver<Result<TaskOutcome, CoordinatorError>>;

struct Job {
    task: WriteTask,
    reply: oneshot::Sender<Result<TaskOutcome, CoordinatorError>>,
}

pub struct WriteQueue {
    tx: mpsc::UnboundedSender<Job>,
    shutdown: Shutdown,
}

impl WriteQueue {
    /// Spawn the worker on the current Tokio runtime.
    pub fn start(executor: TaskExecutor) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let shutdown = Shutdown::new();
        tokio::spawn(run_worker(executor, rx, shutdown.clone()));
        Self { tx, shutdown }
    }

    /// Enqueue a task. Dropping the returned reply makes it fire-and-forget.
    pub fn submit(&self, task: WriteTask) -> Result<TaskReply, CoordinatorError> {
        if self.shutdown.is_triggered() {
            return Err(CoordinatorError::Closed);
        }
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(Job { task, reply })
            .map_err(|_| CoordinatorError::Closed)?;
        Ok(rx)
    }

    /// Stop the worker. A task already running finishes; queued ones are dropped.
    pub fn close(&self) {
        self.shutdown.trigger();
    }

    pub fn is_closed(&self) -> bool {
        self.shutdown.is_triggered()
    }
}

impl Drop for WriteQueue {
    fn drop(&mut self) {
        self.shutdown.trigger();
    }
}

async fn run_worker(
    executor: TaskExecutor,
    mut rx: mpsc::UnboundedReceiver<Job>,
    shutdown: Shutdown,
) {
    tracing::debug!("Write queue started");
    loop {
        let job = tokio::select! {
            biased;
            _ = shutdown.triggered() => break,
            job = rx.recv() => match job {
                Some(job) => job,
                None => break,
            },
        };

        let name = job.task.name();
        let result = executor.execute(&job.task).await;
        match &result {
            Ok(outcome) => {
                tracing::debug!(task = name, outcome = outcome.label(), "Write task finished");
                metrics::record_write_task(name, outcome.label());
            }
            Err(e) => {
                // No retry: the change stays unapplied until the next one.
                tracing::error!(task = name, error = %e, "Write task failed");
                metrics::record_write_task(name, "failed");
            }
        }
        let _ = job.reply.send(result);
    }
    tracing::debug!("Write queue stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::convergence::tasks::SnapshotTarget;
    use crate::datastore::InMemoryDatastore;
    use crate::model::{EffectiveConfig, PartialConfig};
    use crate::ownership::{StaticOwnership, CONFIG_RESOURCE};
    use crate::snapshot::LocalSnapshotStore;
    use std::sync::Arc;

    struct Fixture {
        store: InMemoryDatastore,
        ownership: Arc<StaticOwnership>,
        snapshot: SnapshotTarget,
        _dir: tempfile::TempDir,
    }

    fn fixture(owner: bool) -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let ownership = Arc::new(StaticOwnership::new());
        ownership.set_owner(CONFIG_RESOURCE, owner);
        Fixture {
            store: InMemoryDatastore::new(),
            ownership,
            snapshot: SnapshotTarget::new(LocalSnapshotStore::new(dir.path()), "cluster", "config"),
            _dir: dir,
        }
    }

    fn queue(f: &Fixture) -> WriteQueue {
        WriteQueue::start(TaskExecutor::new(
            Arc::new(f.store.clone()),
            f.ownership.clone(),
            f.snapshot.clone(),
        ))
    }

    fn timeout(ms: u32) -> PartialConfig {
        PartialConfig {
            flow_mod_timeout: Some(ms),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_tasks_run_in_submission_order() {
        let f = fixture(true);
        let q = queue(&f);

        let replies: Vec<_> = [1000, 2000, 3000, 4000]
            .into_iter()
            .map(|ms| q.submit(WriteTask::Merge(timeout(ms))).unwrap())
            .collect();
        for reply in replies {
            assert!(matches!(reply.await.unwrap(), Ok(TaskOutcome::Committed(_))));
        }

        let entry = f.store.operational().unwrap();
        assert_eq!(entry.config.flow_mod_timeout(), 4000);
        assert_eq!(f.snapshot.load().unwrap().unwrap().flow_mod_timeout(), 4000);
    }

    #[tokio::test]
    async fn test_merge_of_same_value_is_unchanged() {
        let f = fixture(true);
        let q = queue(&f);

        let first = q.submit(WriteTask::Merge(timeout(2000))).unwrap().await.unwrap();
        assert!(matches!(first, Ok(TaskOutcome::Committed(_))));
        let commits = f.store.commit_count();

        let second = q.submit(WriteTask::Merge(timeout(2000))).unwrap().await.unwrap();
        assert!(matches!(second, Ok(TaskOutcome::Unchanged(_))));
        assert_eq!(f.store.commit_count(), commits);
    }

    #[tokio::test]
    async fn test_non_owner_only_caches() {
        let f = fixture(false);
        let q = queue(&f);

        let outcome = q.submit(WriteTask::Merge(timeout(2000))).unwrap().await.unwrap();
        assert!(matches!(outcome, Ok(TaskOutcome::CachedOnly(_))));
        assert!(f.store.operational().is_none());
        assert_eq!(f.store.commit_count(), 0);
        assert_eq!(f.snapshot.load().unwrap().unwrap().flow_mod_timeout(), 2000);

        let outcome = q.submit(WriteTask::InitDone).unwrap().await.unwrap();
        assert!(matches!(outcome, Ok(TaskOutcome::Skipped)));
        assert_eq!(f.store.commit_count(), 0);
    }

    #[tokio::test]
    async fn test_failed_commit_keeps_snapshot() {
        let f = fixture(true);
        let q = queue(&f);

        q.submit(WriteTask::Merge(timeout(2000))).unwrap().await.unwrap().unwrap();
        f.store.fail_next_commits(1);

        let outcome = q.submit(WriteTask::Merge(timeout(5000))).unwrap().await.unwrap();
        assert!(matches!(
            outcome,
            Err(CoordinatorError::Transaction { task: "merge", .. })
        ));
        assert_eq!(f.snapshot.load().unwrap().unwrap().flow_mod_timeout(), 2000);
        assert_eq!(f.store.operational().unwrap().config.flow_mod_timeout(), 2000);
    }

    #[tokio::test]
    async fn test_reset_and_init_done_preserve_marker() {
        let f = fixture(true);
        let q = queue(&f);

        q.submit(WriteTask::Merge(timeout(2000))).unwrap().await.unwrap().unwrap();
        let outcome = q.submit(WriteTask::InitDone).unwrap().await.unwrap().unwrap();
        assert!(matches!(outcome, TaskOutcome::Committed(_)));
        assert!(f.store.operational().unwrap().init_done);

        q.submit(WriteTask::Reset).unwrap().await.unwrap().unwrap();
        let entry = f.store.operational().unwrap();
        assert_eq!(entry.config, EffectiveConfig::default());
        assert!(entry.init_done);

        let again = q.submit(WriteTask::InitDone).unwrap().await.unwrap().unwrap();
        assert!(matches!(again, TaskOutcome::Unchanged(_)));
    }

    #[tokio::test]
    async fn test_ownership_failure_fails_task() {
        let f = fixture(true);
        let q = queue(&f);
        f.ownership.set_available(false);

        let outcome = q.submit(WriteTask::Merge(timeout(2000))).unwrap().await.unwrap();
        assert!(matches!(outcome, Err(CoordinatorError::OwnershipQuery { .. })));
        assert!(f.snapshot.load().unwrap().is_none());
    }

    #[tokio::test]
    async fn test_submit_after_close_fails() {
        let f = fixture(true);
        let q = queue(&f);
        q.close();
        assert!(q.is_closed());
        assert!(matches!(
            q.submit(WriteTask::Reset),
            Err(CoordinatorError::Closed)
        ));
    }
}
