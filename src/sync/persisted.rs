//! Queue guarded by a single lock, saved after each mutation.

use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::Mutex;

use super::queue::OperationQueue;
use super::store::DurableStore;

/// The operation queue together with its durable snapshot.
///
/// Mutation and the following save happen under one lock, so the snapshot
/// never lags memory by more than the mutation in flight. A failed save is
/// logged and counted; memory stays authoritative until the next save
/// succeeds.
pub struct PersistedQueue {
    queue: Mutex<OperationQueue>,
    store: DurableStore,
    save_failures: AtomicU64,
}

impl PersistedQueue {
    /// Load the last snapshot from `store`.
    #[must_use]
    pub fn load(store: DurableStore) -> Self {
        let queue = OperationQueue::from_operations(store.load());
        tracing::debug!(count = queue.len(), "Restored sync queue");
        Self {
            queue: Mutex::new(queue),
            store,
            save_failures: AtomicU64::new(0),
        }
    }

    /// Read the queue.
    pub async fn read<R>(&self, f: impl FnOnce(&OperationQueue) -> R) -> R {
        let queue = self.queue.lock().await;
        f(&queue)
    }

    /// Mutate the queue and save the result.
    pub async fn mutate<R>(&self, f: impl FnOnce(&mut OperationQueue) -> R) -> R {
        let mut queue = self.queue.lock().await;
        let result = f(&mut queue);
        self.save_locked(&queue);
        result
    }

    /// Mutate the queue without saving. The caller must follow up with
    /// [`mutate`](Self::mutate) or [`flush`](Self::flush).
    pub async fn mutate_unsaved<R>(&self, f: impl FnOnce(&mut OperationQueue) -> R) -> R {
        let mut queue = self.queue.lock().await;
        f(&mut queue)
    }

    /// Save the current queue.
    pub async fn flush(&self) {
        let queue = self.queue.lock().await;
        self.save_locked(&queue);
    }

    /// Number of saves that failed since startup.
    #[must_use]
    pub fn save_failures(&self) -> u64 {
        self.save_failures.load(Ordering::Relaxed)
    }

    fn save_locked(&self, queue: &OperationQueue) {
        if let Err(e) = self.store.save(queue.as_slice()) {
            self.save_failures.fetch_add(1, Ordering::Relaxed);
            tracing::warn!(
                count = queue.len(),
                "Failed to persist sync queue, keeping in-memory state: {e}"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::error::ShopsyncError;
    use crate::storage::{KeyValueStore, MemoryKeyValueStore, MockKeyValueStore};
    use crate::sync::operation::{Action, Payload, Priority, ReportPayload};

    fn report(title: &str) -> Payload {
        Payload::Report(ReportPayload {
            id: None,
            device_id: None,
            title: title.to_string(),
            body: serde_json::json!({"pages": 2}),
        })
    }

    #[tokio::test]
    async fn test_mutation_is_persisted() {
        let backend = Arc::new(MemoryKeyValueStore::new());
        let queue = PersistedQueue::load(DurableStore::new(backend.clone()));

        let id = queue
            .mutate(|q| q.enqueue(report("a"), Action::Create, Priority::Low, 3))
            .await;

        let reloaded = PersistedQueue::load(DurableStore::new(backend.clone()));
        assert!(reloaded.read(|q| q.get(id).is_some()).await);

        queue.mutate(|q| q.remove(id)).await;
        let reloaded = PersistedQueue::load(DurableStore::new(backend));
        assert!(reloaded.read(OperationQueue::is_empty).await);
    }

    #[tokio::test]
    async fn test_unsaved_mutation_waits_for_flush() {
        let backend = Arc::new(MemoryKeyValueStore::new());
        let queue = PersistedQueue::load(DurableStore::new(backend.clone()));

        queue
            .mutate_unsaved(|q| q.enqueue(report("a"), Action::Create, Priority::Low, 3))
            .await;
        assert!(backend.get(crate::sync::store::QUEUE_KEY).unwrap().is_none());

        queue.flush().await;
        assert!(backend.get(crate::sync::store::QUEUE_KEY).unwrap().is_some());
    }

    #[tokio::test]
    async fn test_save_failure_keeps_memory() {
        let mut backend = MockKeyValueStore::new();
        backend.expect_get().returning(|_| Ok(None));
        backend
            .expect_set()
            .returning(|_, _| Err(ShopsyncError::Storage("quota exceeded".to_string())));
        let queue = PersistedQueue::load(DurableStore::new(Arc::new(backend)));

        let id = queue
            .mutate(|q| q.enqueue(report("a"), Action::Create, Priority::High, 3))
            .await;

        assert!(queue.read(|q| q.get(id).is_some()).await);
        assert_eq!(queue.save_failures(), 1);
    }
}
