//! `SQLite` database connection.
//!
//! The database is stored at `~/.shopsync/shopsync.db` and holds the
//! `kv_store` table used by [`SqliteKeyValueStore`](super::SqliteKeyValueStore).

use rusqlite::Connection;

use crate::error::ShopsyncError;

use super::migrations;

/// Database connection wrapper.
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Open the database at a specific path.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or migrations fail.
    pub fn open_at(path: &std::path::Path) -> Result<Self, ShopsyncError> {
        let conn = Connection::open(path).map_err(|e| {
            ShopsyncError::Database(format!("Failed to open database {}: {e}", path.display()))
        })?;

        // `shopsync status` reads while the daemon writes.
        conn.execute_batch("PRAGMA journal_mode = WAL;")
            .map_err(|e| ShopsyncError::Database(format!("Failed to enable WAL: {e}")))?;

        let db = Self { conn };
        db.migrate()?;

        Ok(db)
    }

    /// Open an in-memory database (useful for testing).
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or migrations fail.
    pub fn open_in_memory() -> Result<Self, ShopsyncError> {
        let conn = Connection::open_in_memory().map_err(|e| {
            ShopsyncError::Database(format!("Failed to open in-memory database: {e}"))
        })?;

        let db = Self { conn };
        db.migrate()?;

        Ok(db)
    }

    fn migrate(&self) -> Result<(), ShopsyncError> {
        migrations::run(&self.conn)
    }

    /// Get a reference to the underlying connection.
    #[must_use]
    pub const fn connection(&self) -> &Connection {
        &self.conn
    }
}
