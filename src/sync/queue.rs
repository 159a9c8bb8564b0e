//! In-memory operation queue.
//!
//! Holds pending operations in processing order: priority first
//! (high, medium, low), then enqueue time, oldest first. Operations with
//! equal keys keep their insertion order.

use std::collections::HashSet;

use serde::Serialize;
use uuid::Uuid;

use super::operation::{Action, Operation, Payload, Priority};

/// Ordered set of pending operations.
#[derive(Debug, Clone, Default)]
pub struct OperationQueue {
    operations: Vec<Operation>,
}

/// Queue counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct QueueCounts {
    /// All operations in the queue
    pub total: usize,
    /// Operations with retries left
    pub pending: usize,
    /// Operations that exhausted their retries
    pub failed: usize,
}

impl OperationQueue {
    /// Create an empty queue.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            operations: Vec::new(),
        }
    }

    /// Build a queue from a loaded snapshot.
    ///
    /// Sorts stably into processing order and drops repeated ids, keeping the
    /// first occurrence.
    #[must_use]
    pub fn from_operations(operations: Vec<Operation>) -> Self {
        let mut seen = HashSet::with_capacity(operations.len());
        let mut operations: Vec<Operation> = operations
            .into_iter()
            .filter(|op| seen.insert(op.id))
            .collect();
        operations.sort_by(|a, b| sort_key(a).cmp(&sort_key(b)));
        Self { operations }
    }

    /// Queue a new operation and return its id.
    pub fn enqueue(
        &mut self,
        payload: Payload,
        action: Action,
        priority: Priority,
        max_attempts: u32,
    ) -> Uuid {
        let operation = Operation::new(action, payload, priority, max_attempts);
        let id = operation.id;
        self.insert(operation);
        id
    }

    /// Insert an existing operation in order, replacing any entry with the same id.
    pub fn insert(&mut self, operation: Operation) {
        self.operations.retain(|op| op.id != operation.id);
        let key = sort_key(&operation);
        let index = self.operations.partition_point(|op| sort_key(op) <= key);
        self.operations.insert(index, operation);
    }

    /// Remove an operation. Returns whether it was present.
    pub fn remove(&mut self, id: Uuid) -> bool {
        let before = self.operations.len();
        self.operations.retain(|op| op.id != id);
        self.operations.len() != before
    }

    /// Remove every operation whose id is in `ids`. Returns how many were removed.
    pub fn remove_all(&mut self, ids: &HashSet<Uuid>) -> usize {
        let before = self.operations.len();
        self.operations.retain(|op| !ids.contains(&op.id));
        before - self.operations.len()
    }

    /// Remove all permanently failed operations. Returns how many were removed.
    pub fn purge_failed(&mut self) -> usize {
        let before = self.operations.len();
        self.operations.retain(|op| !op.is_failed());
        before - self.operations.len()
    }

    /// Reset attempts on failed operations so they are retried.
    pub fn reset_failed(&mut self) -> usize {
        let mut count = 0;
        for op in self.operations.iter_mut().filter(|op| op.is_failed()) {
            op.reset_attempts();
            count += 1;
        }
        count
    }

    /// Current counts.
    #[must_use]
    pub fn status(&self) -> QueueCounts {
        let failed = self.operations.iter().filter(|op| op.is_failed()).count();
        QueueCounts {
            total: self.operations.len(),
            pending: self.operations.len() - failed,
            failed,
        }
    }

    /// Look up an operation.
    #[must_use]
    pub fn get(&self, id: Uuid) -> Option<&Operation> {
        self.operations.iter().find(|op| op.id == id)
    }

    /// Mutable lookup. Callers must not change `priority` or `enqueued_at`.
    pub fn get_mut(&mut self, id: Uuid) -> Option<&mut Operation> {
        self.operations.iter_mut().find(|op| op.id == id)
    }

    /// Ids in processing order.
    #[must_use]
    pub fn ids(&self) -> Vec<Uuid> {
        self.operations.iter().map(|op| op.id).collect()
    }

    /// Iterate in processing order.
    pub fn iter(&self) -> impl Iterator<Item = &Operation> {
        self.operations.iter()
    }

    /// Operations in processing order.
    #[must_use]
    pub fn as_slice(&self) -> &[Operation] {
        &self.operations
    }

    /// Number of queued operations.
    #[must_use]
    pub fn len(&self) -> usize {
        self.operations.len()
    }

    /// Whether the queue is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }
}

fn sort_key(op: &Operation) -> (Priority, chrono::DateTime<chrono::Utc>) {
    (op.priority, op.enqueued_at)
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};

    use super::*;
    use crate::sync::operation::DevicePayload;

    fn device(serial: &str) -> Payload {
        Payload::Device(DevicePayload {
            id: None,
            serial_number: serial.to_string(),
            model: "Galaxy S22".to_string(),
            customer_id: None,
            status: None,
        })
    }

    fn serials(queue: &OperationQueue) -> Vec<String> {
        queue
            .iter()
            .map(|op| match &op.payload {
                Payload::Device(p) => p.serial_number.clone(),
                _ => String::new(),
            })
            .collect()
    }

    #[test]
    fn test_priority_then_fifo_order() {
        let mut queue = OperationQueue::new();

        queue.enqueue(device("low-1"), Action::Create, Priority::Low, 3);
        queue.enqueue(device("high-1"), Action::Create, Priority::High, 3);
        queue.enqueue(device("medium-1"), Action::Create, Priority::Medium, 3);
        queue.enqueue(device("high-2"), Action::Create, Priority::High, 3);
        queue.enqueue(device("low-2"), Action::Create, Priority::Low, 3);

        assert_eq!(
            serials(&queue),
            vec!["high-1", "high-2", "medium-1", "low-1", "low-2"]
        );
    }

    #[test]
    fn test_enqueue_returns_unique_ids() {
        let mut queue = OperationQueue::new();
        let a = queue.enqueue(device("a"), Action::Create, Priority::Low, 3);
        let b = queue.enqueue(device("b"), Action::Create, Priority::Low, 3);

        assert_ne!(a, b);
        assert_eq!(queue.get(a).unwrap().attempts, 0);
    }

    #[test]
    fn test_remove_keeps_order() {
        let mut queue = OperationQueue::new();
        queue.enqueue(device("a"), Action::Create, Priority::High, 3);
        let b = queue.enqueue(device("b"), Action::Create, Priority::High, 3);
        queue.enqueue(device("c"), Action::Create, Priority::Low, 3);

        assert!(queue.remove(b));
        assert!(!queue.remove(b));
        assert_eq!(serials(&queue), vec!["a", "c"]);
    }

    #[test]
    fn test_status_counts() {
        let mut queue = OperationQueue::new();
        let a = queue.enqueue(device("a"), Action::Create, Priority::High, 1);
        queue.enqueue(device("b"), Action::Create, Priority::High, 3);

        queue.get_mut(a).unwrap().record_failure("boom", Utc::now());

        let counts = queue.status();
        assert_eq!(counts.total, 2);
        assert_eq!(counts.pending, 1);
        assert_eq!(counts.failed, 1);
    }

    #[test]
    fn test_purge_failed_keeps_remaining_order() {
        let mut queue = OperationQueue::new();
        let mut ids = Vec::new();
        for (serial, priority) in [
            ("a", Priority::High),
            ("b", Priority::High),
            ("c", Priority::Medium),
            ("d", Priority::Low),
            ("e", Priority::Low),
        ] {
            ids.push(queue.enqueue(device(serial), Action::Create, priority, 2));
        }

        for id in [ids[1], ids[3]] {
            let op = queue.get_mut(id).unwrap();
            op.record_failure("boom", Utc::now());
            op.record_failure("boom", Utc::now());
        }

        assert_eq!(queue.purge_failed(), 2);
        assert_eq!(serials(&queue), vec!["a", "c", "e"]);
        assert!(queue.iter().all(|op| op.attempts == 0));
        assert_eq!(queue.purge_failed(), 0);
    }

    #[test]
    fn test_reset_failed() {
        let mut queue = OperationQueue::new();
        let a = queue.enqueue(device("a"), Action::Create, Priority::High, 1);
        queue.get_mut(a).unwrap().record_failure("boom", Utc::now());

        assert_eq!(queue.reset_failed(), 1);
        assert_eq!(queue.status().failed, 0);
    }

    #[test]
    fn test_from_operations_sorts_and_dedupes() {
        let now = Utc::now();
        let mut old_low = Operation::new(Action::Create, device("old-low"), Priority::Low, 3);
        old_low.enqueued_at = now - Duration::minutes(10);
        let mut new_high = Operation::new(Action::Create, device("new-high"), Priority::High, 3);
        new_high.enqueued_at = now;
        let mut new_low = Operation::new(Action::Create, device("new-low"), Priority::Low, 3);
        new_low.enqueued_at = now;
        let duplicate = old_low.clone();

        let queue = OperationQueue::from_operations(vec![new_low, old_low, duplicate, new_high]);

        assert_eq!(serials(&queue), vec!["new-high", "old-low", "new-low"]);
    }

    #[test]
    fn test_insert_replaces_same_id() {
        let mut queue = OperationQueue::new();
        let id = queue.enqueue(device("a"), Action::Create, Priority::Low, 3);
        let mut op = queue.get(id).unwrap().clone();
        op.priority = Priority::High;

        queue.insert(op);

        assert_eq!(queue.len(), 1);
        assert_eq!(queue.get(id).unwrap().priority, Priority::High);
    }
}
