//! In-process datastore shared by every node of a local cluster.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use dashmap::DashMap;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::datastore::{
    ChangeEvent, ConfigDatastore, ConfigTransaction, DataChangeListener, DatastoreError,
    ListenerRegistration, Scope,
};
use crate::model::{OperationalEntry, PartialConfig};

type Senders<T> = DashMap<Uuid, mpsc::UnboundedSender<ChangeEvent<T>>>;

#[derive(Debug, Default)]
struct State {
    desired: Option<PartialConfig>,
    operational: Option<OperationalEntry>,
}

#[derive(Default)]
struct Inner {
    state: Mutex<State>,
    desired_listeners: Senders<PartialConfig>,
    operational_listeners: Senders<OperationalEntry>,
    /// Number of upcoming commits that will fail.
    failing_commits: AtomicUsize,
    commits: AtomicUsize,
    close_calls: AtomicUsize,
}

impl Inner {
    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// A datastore living in process memory.
///
/// Cloning yields another handle to the same store, so several
/// coordinators can share it as if they were cluster members.
#[derive(Clone, Default)]
pub struct InMemoryDatastore {
    inner: Arc<Inner>,
}

impl InMemoryDatastore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the desired entry without notifying anyone.
    pub fn seed_desired(&self, entry: PartialConfig) {
        self.inner.lock().desired = Some(entry);
    }

    /// Set the operational entry without notifying anyone.
    pub fn seed_operational(&self, entry: OperationalEntry) {
        self.inner.lock().operational = Some(entry);
    }

    /// Administrator write to the desired scope. Invalid entries are rejected.
    pub async fn put_desired(&self, entry: PartialConfig) -> Result<(), DatastoreError> {
        entry.validate()?;
        let mut tx = self.begin();
        tx.put_desired(entry);
        tx.commit().await
    }

    /// Administrator delete of the desired entry.
    pub async fn delete_desired(&self) -> Result<(), DatastoreError> {
        let mut tx = self.begin();
        tx.delete_desired();
        tx.commit().await
    }

    pub fn desired(&self) -> Option<PartialConfig> {
        self.inner.lock().desired.clone()
    }

    pub fn operational(&self) -> Option<OperationalEntry> {
        self.inner.lock().operational.clone()
    }

    /// Make the next `count` commits fail.
    pub fn fail_next_commits(&self, count: usize) {
        self.inner.failing_commits.store(count, Ordering::SeqCst);
    }

    /// Number of commit attempts, including failed ones.
    pub fn commit_count(&self) -> usize {
        self.inner.commits.load(Ordering::SeqCst)
    }

    /// Number of live listener registrations.
    pub fn listener_count(&self) -> usize {
        self.inner.desired_listeners.len() + self.inner.operational_listeners.len()
    }

    /// Number of times any registration's `close` was invoked.
    pub fn close_calls(&self) -> usize {
        self.inner.close_calls.load(Ordering::SeqCst)
    }

    fn register<T, F>(
        &self,
        scope: Scope,
        senders: &Senders<T>,
        current: F,
        listener: Arc<dyn DataChangeListener<T>>,
    ) -> Result<Box<dyn ListenerRegistration>, DatastoreError>
    where
        T: Send + Sync + 'static,
        F: FnOnce(&State) -> Option<T>,
    {
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| DatastoreError::Registration(e.to_string()))?;

        let id = Uuid::new_v4();
        let (tx, mut rx) = mpsc::unbounded_channel();
        {
            // Holding the state lock orders the initial event before any
            // later commit's events.
            let state = self.inner.lock();
            if let Some(after) = current(&*state) {
                let _ = tx.send(ChangeEvent::Created { after });
            }
            senders.insert(id, tx);
        }

        let closed = Arc::new(AtomicBool::new(false));
        let stop = closed.clone();
        runtime.spawn(async move {
            while let Some(event) = rx.recv().await {
                if stop.load(Ordering::Acquire) {
                    break;
                }
                listener.dispatch(&event);
            }
        });

        tracing::debug!(%scope, listener_id = %id, "Registered change listener");
        Ok(Box::new(MemoryRegistration {
            id,
            scope,
            closed,
            inner: self.inner.clone(),
        }))
    }
}

impl ConfigDatastore for InMemoryDatastore {
    fn begin(&self) -> Box<dyn ConfigTransaction> {
        Box::new(MemoryTransaction {
            inner: self.inner.clone(),
            desired: None,
            operational: None,
            committed: false,
        })
    }

    fn register_desired_listener(
        &self,
        listener: Arc<dyn DataChangeListener<PartialConfig>>,
    ) -> Result<Box<dyn ListenerRegistration>, DatastoreError> {
        self.register(
            Scope::Desired,
            &self.inner.desired_listeners,
            |state| state.desired.clone(),
            listener,
        )
    }

    fn register_operational_listener(
        &self,
        listener: Arc<dyn DataChangeListener<OperationalEntry>>,
    ) -> Result<Box<dyn ListenerRegistration>, DatastoreError> {
        self.register(
            Scope::Operational,
            &self.inner.operational_listeners,
            |state| state.operational.clone(),
            listener,
        )
    }
}

struct MemoryRegistration {
    id: Uuid,
    scope: Scope,
    closed: Arc<AtomicBool>,
    inner: Arc<Inner>,
}

impl ListenerRegistration for MemoryRegistration {
    fn close(&self) {
        self.inner.close_calls.fetch_add(1, Ordering::SeqCst);
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        match self.scope {
            Scope::Desired => {
                self.inner.desired_listeners.remove(&self.id);
            }
            Scope::Operational => {
                self.inner.operational_listeners.remove(&self.id);
            }
        }
        tracing::debug!(scope = %self.scope, listener_id = %self.id, "Unregistered change listener");
    }
}

impl Drop for MemoryRegistration {
    fn drop(&mut self) {
        // Dropping without close still stops delivery, but is not counted.
        if !self.closed.swap(true, Ordering::AcqRel) {
            self.inner.desired_listeners.remove(&self.id);
            self.inner.operational_listeners.remove(&self.id);
        }
    }
}

enum Pending<T> {
    Put(T),
    Delete,
}

struct MemoryTransaction {
    inner: Arc<Inner>,
    desired: Option<Pending<PartialConfig>>,
    operational: Option<Pending<OperationalEntry>>,
    committed: bool,
}

fn overlay<T: Clone>(pending: &Option<Pending<T>>, committed: &Option<T>) -> Option<T> {
    match pending {
        Some(Pending::Put(value)) => Some(value.clone()),
        Some(Pending::Delete) => None,
        None => committed.clone(),
    }
}

fn apply<T: Clone>(slot: &mut Option<T>, pending: Pending<T>) -> Option<ChangeEvent<T>> {
    match (slot.take(), pending) {
        (None, Pending::Put(after)) => {
            *slot = Some(after.clone());
            Some(ChangeEvent::Created { after })
        }
        (Some(before), Pending::Put(after)) => {
            *slot = Some(after.clone());
            Some(ChangeEvent::Updated { before, after })
        }
        (Some(before), Pending::Delete) => Some(ChangeEvent::Removed { before }),
        (None, Pending::Delete) => None,
    }
}

fn publish<T: Clone>(senders: &Senders<T>, event: ChangeEvent<T>) {
    for entry in senders.iter() {
        let _ = entry.value().send(event.clone());
    }
}

#[async_trait]
impl ConfigTransaction for MemoryTransaction {
    async fn read_desired(&mut self) -> Result<Option<PartialConfig>, DatastoreError> {
        let state = self.inner.lock();
        Ok(overlay(&self.desired, &state.desired))
    }

    async fn read_operational(&mut self) -> Result<Option<OperationalEntry>, DatastoreError> {
        let state = self.inner.lock();
        Ok(overlay(&self.operational, &state.operational))
    }

    fn put_desired(&mut self, entry: PartialConfig) {
        self.desired = Some(Pending::Put(entry));
    }

    fn delete_desired(&mut self) {
        self.desired = Some(Pending::Delete);
    }

    fn put_operational(&mut self, entry: OperationalEntry) {
        self.operational = Some(Pending::Put(entry));
    }

    async fn commit(&mut self) -> Result<(), DatastoreError> {
        if self.committed {
            return Err(DatastoreError::AlreadyCommitted);
        }
        self.committed = true;
        self.inner.commits.fetch_add(1, Ordering::SeqCst);

        let injected = self
            .inner
            .failing_commits
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if injected {
            return Err(DatastoreError::Commit("injected commit failure".to_string()));
        }

        let mut state = self.inner.lock();
        if let Some(pending) = self.desired.take() {
            if let Some(event) = apply(&mut state.desired, pending) {
                publish(&self.inner.desired_listeners, event);
            }
        }
        if let Some(pending) = self.operational.take() {
            if let Some(event) = apply(&mut state.operational, pending) {
                publish(&self.inner.operational_listeners, event);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::EffectiveConfig;
    use std::time::Duration;

    #[derive(Default)]
    struct Recorder {
        events: Mutex<Vec<String>>,
    }

    impl Recorder {
        fn events(&self) -> Vec<String> {
            self.events.lock().unwrap().clone()
        }
    }

    impl DataChangeListener<PartialConfig> for Recorder {
        fn on_created(&self, after: &PartialConfig) {
            self.events
                .lock()
                .unwrap()
                .push(format!("created:{:?}", after.flow_mod_timeout));
        }

        fn on_updated(&self, before: &PartialConfig, after: &PartialConfig) {
            self.events.lock().unwrap().push(format!(
                "updated:{:?}->{:?}",
                before.flow_mod_timeout, after.flow_mod_timeout
            ));
        }

        fn on_removed(&self, before: &PartialConfig) {
            self.events
                .lock()
                .unwrap()
                .push(format!("removed:{:?}", before.flow_mod_timeout));
        }
    }

    fn timeout(ms: u32) -> PartialConfig {
        PartialConfig {
            flow_mod_timeout: Some(ms),
            ..Default::default()
        }
    }

    async fn settle() {
        tokio::time::sleep(Duration::from_millis(50)).await;
    }

    #[tokio::test]
    async fn test_events_delivered_in_order() {
        let store = InMemoryDatastore::new();
        store.seed_desired(timeout(1000));

        let recorder = Arc::new(Recorder::default());
        let _reg = store.register_desired_listener(recorder.clone()).unwrap();

        store.put_desired(timeout(2000)).await.unwrap();
        store.delete_desired().await.unwrap();
        settle().await;

        assert_eq!(
            recorder.events(),
            vec![
                "created:Some(1000)",
                "updated:Some(1000)->Some(2000)",
                "removed:Some(2000)",
            ]
        );
    }

    #[tokio::test]
    async fn test_invalid_desired_entry_rejected() {
        let store = InMemoryDatastore::new();
        let err = store
            .put_desired(PartialConfig {
                l2_flow_priority: Some(0),
                ..Default::default()
            })
            .await
            .unwrap_err();
        assert!(matches!(err, DatastoreError::Invalid(_)));
        assert!(store.desired().is_none());
    }

    #[tokio::test]
    async fn test_transaction_reads_own_writes() {
        let store = InMemoryDatastore::new();
        let mut tx = store.begin();
        assert!(tx.read_operational().await.unwrap().is_none());

        let entry = OperationalEntry::new(EffectiveConfig::default());
        tx.put_operational(entry.clone());
        assert_eq!(tx.read_operational().await.unwrap(), Some(entry.clone()));
        assert!(store.operational().is_none());

        tx.commit().await.unwrap();
        assert_eq!(store.operational(), Some(entry));
        assert!(matches!(
            tx.commit().await,
            Err(DatastoreError::AlreadyCommitted)
        ));
    }

    #[tokio::test]
    async fn test_injected_failure_leaves_state_untouched() {
        let store = InMemoryDatastore::new();
        store.fail_next_commits(1);

        assert!(store.put_desired(timeout(2000)).await.is_err());
        assert!(store.desired().is_none());

        store.put_desired(timeout(2000)).await.unwrap();
        assert_eq!(store.desired(), Some(timeout(2000)));
        assert_eq!(store.commit_count(), 2);
    }

    #[tokio::test]
    async fn test_closed_registration_stops_delivery() {
        let store = InMemoryDatastore::new();
        let recorder = Arc::new(Recorder::default());
        let reg = store.register_desired_listener(recorder.clone()).unwrap();
        assert_eq!(store.listener_count(), 1);

        reg.close();
        reg.close();
        assert_eq!(store.listener_count(), 0);
        assert_eq!(store.close_calls(), 2);

        store.put_desired(timeout(2000)).await.unwrap();
        settle().await;
        assert!(recorder.events().is_empty());
    }

    #[test]
    fn test_register_outside_runtime_fails() {
        let store = InMemoryDatastore::new();
        let recorder = Arc::new(Recorder::default());
        assert!(matches!(
            store.register_desired_listener(recorder),
            Err(DatastoreError::Registration(_))
        ));
    }
}
