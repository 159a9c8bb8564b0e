//! Path resolution for shopsync configuration and data files.
//!
//! All shopsync data is stored in `~/.shopsync/`:
//! - `config.yaml` - Main configuration file
//! - `shopsync.db` - SQLite database holding the queue snapshot
//! - `store/` - Snapshot files when the file backend is selected

use std::path::PathBuf;

use crate::error::ShopsyncError;

/// Paths to shopsync configuration and data directories.
#[derive(Debug, Clone)]
pub struct Paths {
    /// Root directory: `~/.shopsync/`
    pub root: PathBuf,
    /// Config file: `~/.shopsync/config.yaml`
    pub config_file: PathBuf,
    /// Database file: `~/.shopsync/shopsync.db`
    pub database: PathBuf,
    /// File store directory: `~/.shopsync/store/`
    pub store: PathBuf,
}

impl Paths {
    /// Create paths based on the user's home directory.
    ///
    /// `SHOPSYNC_HOME` overrides the root when set.
    ///
    /// # Errors
    ///
    /// Returns an error if the home directory cannot be determined.
    pub fn new() -> Result<Self, ShopsyncError> {
        if let Ok(root) = std::env::var("SHOPSYNC_HOME") {
            return Ok(Self::with_root(PathBuf::from(root)));
        }

        let home = std::env::var("HOME").map_err(|_| {
            ShopsyncError::Config("Could not determine home directory".to_string())
        })?;

        Ok(Self::with_root(PathBuf::from(home).join(".shopsync")))
    }

    /// Create paths with a custom root directory (useful for testing).
    #[must_use]
    pub fn with_root(root: PathBuf) -> Self {
        Self {
            config_file: root.join("config.yaml"),
            database: root.join("shopsync.db"),
            store: root.join("store"),
            root,
        }
    }

    /// Ensure all directories exist, creating them if necessary.
    ///
    /// # Errors
    ///
    /// Returns an error if directory creation fails.
    pub fn ensure_dirs(&self) -> Result<(), ShopsyncError> {
        for dir in [&self.root, &self.store] {
            if !dir.exists() {
                std::fs::create_dir_all(dir).map_err(|e| {
                    ShopsyncError::Config(format!(
                        "Failed to create directory {}: {e}",
                        dir.display()
                    ))
                })?;
            }
        }

        Ok(())
    }
}
