//! Key-value backends for queue snapshots.
//!
//! Every backend stores opaque string values under string keys and
//! overwrites on `set`. Snapshot format and fail-open policy live one level
//! up, in [`DurableStore`](crate::sync::DurableStore).

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::Utc;
use rusqlite::params;

use super::Database;
use crate::error::ShopsyncError;

/// Whole-value key-value persistence.
#[cfg_attr(test, mockall::automock)]
pub trait KeyValueStore: Send + Sync {
    /// Read the value stored under `key`.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be read.
    fn get(&self, key: &str) -> Result<Option<String>, ShopsyncError>;

    /// Overwrite the value stored under `key`.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be written.
    fn set(&self, key: &str, value: &str) -> Result<(), ShopsyncError>;
}

/// Key-value store backed by the `kv_store` table.
pub struct SqliteKeyValueStore {
    db: Mutex<Database>,
}

impl SqliteKeyValueStore {
    /// Wrap an open database.
    #[must_use]
    pub const fn new(db: Database) -> Self {
        Self { db: Mutex::new(db) }
    }

    fn with_db<T>(
        &self,
        f: impl FnOnce(&Database) -> Result<T, ShopsyncError>,
    ) -> Result<T, ShopsyncError> {
        let db = self
            .db
            .lock()
            .map_err(|_| ShopsyncError::Storage("Database lock poisoned".to_string()))?;
        f(&db)
    }
}

impl KeyValueStore for SqliteKeyValueStore {
    fn get(&self, key: &str) -> Result<Option<String>, ShopsyncError> {
        self.with_db(|db| {
            let result = db
                .connection()
                .query_row("SELECT value FROM kv_store WHERE key = ?1", [key], |row| {
                    row.get::<_, String>(0)
                });

            match result {
                Ok(value) => Ok(Some(value)),
                Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                Err(e) => Err(ShopsyncError::Database(format!(
                    "Failed to read key {key}: {e}"
                ))),
            }
        })
    }

    fn set(&self, key: &str, value: &str) -> Result<(), ShopsyncError> {
        self.with_db(|db| {
            db.connection()
                .execute(
                    r"INSERT INTO kv_store (key, value, updated_at)
                      VALUES (?1, ?2, ?3)
                      ON CONFLICT(key) DO UPDATE SET
                        value = excluded.value,
                        updated_at = excluded.updated_at",
                    params![key, value, Utc::now().to_rfc3339()],
                )
                .map_err(|e| ShopsyncError::Database(format!("Failed to write key {key}: {e}")))?;
            Ok(())
        })
    }
}

/// Key-value store keeping one file per key in a directory.
///
/// Writes land in a temporary file in the same directory and are renamed
/// over the target, so a crash mid-write leaves the previous value intact.
#[derive(Debug, Clone)]
pub struct FileKeyValueStore {
    dir: PathBuf,
}

impl FileKeyValueStore {
    /// Use `dir` for storage, creating it if necessary.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created.
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self, ShopsyncError> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir).map_err(|e| {
            ShopsyncError::Storage(format!("Failed to create {}: {e}", dir.display()))
        })?;
        Ok(Self { dir })
    }

    /// Directory holding the value files.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> PathBuf {
        let file_name: String = key
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '.' || c == '-' { c } else { '_' })
            .collect();
        self.dir.join(format!("{file_name}.json"))
    }
}

impl KeyValueStore for FileKeyValueStore {
    fn get(&self, key: &str) -> Result<Option<String>, ShopsyncError> {
        let path = self.path_for(key);
        match std::fs::read_to_string(&path) {
            Ok(contents) => Ok(Some(contents)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(ShopsyncError::Storage(format!(
                "Failed to read {}: {e}",
                path.display()
            ))),
        }
    }

    fn set(&self, key: &str, value: &str) -> Result<(), ShopsyncError> {
        use std::io::Write;

        let path = self.path_for(key);
        let mut tmp = tempfile::NamedTempFile::new_in(&self.dir)?;
        tmp.write_all(value.as_bytes())?;
        tmp.as_file().sync_all()?;
        tmp.persist(&path).map_err(|e| {
            ShopsyncError::Storage(format!("Failed to replace {}: {}", path.display(), e.error))
        })?;
        Ok(())
    }
}

/// In-process key-value store.
#[derive(Debug, Default)]
pub struct MemoryKeyValueStore {
    values: Mutex<HashMap<String, String>>,
}

impl MemoryKeyValueStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryKeyValueStore {
    fn get(&self, key: &str) -> Result<Option<String>, ShopsyncError> {
        let values = self
            .values
            .lock()
            .map_err(|_| ShopsyncError::Storage("Memory store lock poisoned".to_string()))?;
        Ok(values.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), ShopsyncError> {
        let mut values = self
            .values
            .lock()
            .map_err(|_| ShopsyncError::Storage("Memory store lock poisoned".to_string()))?;
        values.insert(key.to_string(), value.to_string());
        Ok(())
    }
}
