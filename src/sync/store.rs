//! Durable queue snapshots.
//!
//! The whole queue is written as one versioned JSON document under a single
//! key. Loading never fails: a missing, corrupt, or foreign-version snapshot
//! yields an empty queue.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::operation::Operation;
use crate::error::ShopsyncError;
use crate::storage::KeyValueStore;

/// Storage key holding the queue snapshot.
pub const QUEUE_KEY: &str = "shopsync.queue";

/// Snapshot format version.
pub const SNAPSHOT_VERSION: u32 = 1;

#[derive(Debug, Serialize, Deserialize)]
struct Snapshot {
    version: u32,
    saved_at: DateTime<Utc>,
    operations: Vec<Operation>,
}

#[derive(Debug, Serialize)]
struct SnapshotRef<'a> {
    version: u32,
    saved_at: DateTime<Utc>,
    operations: &'a [Operation],
}

/// Reads and writes queue snapshots through a [`KeyValueStore`].
#[derive(Clone)]
pub struct DurableStore {
    backend: Arc<dyn KeyValueStore>,
    key: String,
}

impl DurableStore {
    /// Use `backend` with the default key.
    pub fn new(backend: Arc<dyn KeyValueStore>) -> Self {
        Self::with_key(backend, QUEUE_KEY)
    }

    /// Use `backend` with a custom key.
    pub fn with_key(backend: Arc<dyn KeyValueStore>, key: impl Into<String>) -> Self {
        Self {
            backend,
            key: key.into(),
        }
    }

    /// Overwrite the snapshot with `operations`.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or the backend write fails.
    pub fn save(&self, operations: &[Operation]) -> Result<(), ShopsyncError> {
        let snapshot = SnapshotRef {
            version: SNAPSHOT_VERSION,
            saved_at: Utc::now(),
            operations,
        };
        let json = serde_json::to_string(&snapshot)?;
        self.backend.set(&self.key, &json)
    }

    /// Load the last snapshot, or an empty list if there is none usable.
    #[must_use]
    pub fn load(&self) -> Vec<Operation> {
        let raw = match self.backend.get(&self.key) {
            Ok(Some(raw)) => raw,
            Ok(None) => return Vec::new(),
            Err(e) => {
                tracing::warn!(key = %self.key, "Failed to read queue snapshot, starting empty: {e}");
                return Vec::new();
            }
        };

        match serde_json::from_str::<Snapshot>(&raw) {
            Ok(snapshot) if snapshot.version == SNAPSHOT_VERSION => {
                tracing::debug!(
                    count = snapshot.operations.len(),
                    saved_at = %snapshot.saved_at,
                    "Loaded queue snapshot"
                );
                snapshot.operations
            }
            Ok(snapshot) => {
                tracing::warn!(
                    found = snapshot.version,
                    expected = SNAPSHOT_VERSION,
                    "Queue snapshot version mismatch, resetting to empty"
                );
                Vec::new()
            }
            Err(e) => {
                tracing::warn!("Queue snapshot is corrupt, starting empty: {e}");
                Vec::new()
            }
        }
    }
}
