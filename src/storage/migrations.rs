//! Schema migrations, tracked through `PRAGMA user_version`.
//!
//! `MIGRATIONS[n]` upgrades the schema from version `n` to `n + 1`. Each
//! step and its version bump commit together.

use rusqlite::Connection;

use crate::error::ShopsyncError;

/// Ordered schema steps.
const MIGRATIONS: &[&str] = &[
    // v1: whole-queue snapshots keyed by store key
    r"
    CREATE TABLE IF NOT EXISTS kv_store (
        key TEXT PRIMARY KEY,
        value TEXT NOT NULL,
        updated_at TEXT NOT NULL
    );
    ",
];

/// Schema version a fully migrated database reports.
#[allow(clippy::cast_possible_truncation, clippy::cast_possible_wrap)]
pub const CURRENT_VERSION: i32 = MIGRATIONS.len() as i32;

/// Schema version stored in the database; 0 for a fresh file.
///
/// # Errors
///
/// Returns an error if the pragma cannot be read.
pub fn version(conn: &Connection) -> Result<i32, ShopsyncError> {
    conn.query_row("PRAGMA user_version", [], |row| row.get(0))
        .map_err(|e| ShopsyncError::Database(format!("Failed to read schema version: {e}")))
}

/// Apply every step above the stored version.
///
/// # Errors
///
/// Returns an error if the stored version is newer than this build knows,
/// or if a step fails. A failed step leaves the previous version intact.
pub fn run(conn: &Connection) -> Result<(), ShopsyncError> {
    let current = version(conn)?;
    if current > CURRENT_VERSION {
        return Err(ShopsyncError::Database(format!(
            "Database schema v{current} is newer than supported v{CURRENT_VERSION}"
        )));
    }
    let applied = usize::try_from(current).map_err(|_| {
        ShopsyncError::Database(format!("Invalid schema version {current}"))
    })?;

    for (target, sql) in (current + 1..).zip(&MIGRATIONS[applied..]) {
        let step = format!("BEGIN;\n{sql}\nPRAGMA user_version = {target};\nCOMMIT;");
        if let Err(e) = conn.execute_batch(&step) {
            conn.execute_batch("ROLLBACK;").ok();
            return Err(ShopsyncError::Database(format!(
                "Migration to v{target} failed: {e}"
            )));
        }
        tracing::debug!(version = target, "Applied schema migration");
    }

    Ok(())
}
