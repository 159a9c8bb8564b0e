//! Storage layer for shopsync.
//!
//! This module provides the key-value backends that hold the queue snapshot:
//! - `SQLite` (`~/.shopsync/shopsync.db`)
//! - Atomic-rename JSON files
//! - In-memory, for tests

mod database;
mod kv;
mod migrations;

pub use database::Database;
pub use kv::{FileKeyValueStore, KeyValueStore, MemoryKeyValueStore, SqliteKeyValueStore};

#[cfg(test)]
pub use kv::MockKeyValueStore;
