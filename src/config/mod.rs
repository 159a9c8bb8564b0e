//! Configuration management for shopsync.
//!
//! This module handles loading configuration from `~/.shopsync/`.

mod paths;
mod settings;

pub use paths::Paths;
pub use settings::{ApiConfig, Config, GeneralConfig, QueueConfig, StorageBackend, TriggerConfig};
