//! Configuration settings for shopsync.
//!
//! Settings are loaded from `~/.shopsync/config.yaml`.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::cli::args::OutputFormat;
use crate::error::ShopsyncError;

/// Main configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    /// General settings.
    pub general: GeneralConfig,
    /// Remote API settings.
    pub api: ApiConfig,
    /// Queue and retry settings.
    pub queue: QueueConfig,
    /// Pass trigger settings.
    pub trigger: TriggerConfig,
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Default output format.
    #[serde(default = "default_output_format")]
    pub default_output: OutputFormat,
}

/// Remote API settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// Base URL of the shop API, without the `/api/v1` suffix.
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Bearer token sent with every request.
    #[serde(default)]
    pub token: Option<String>,
    /// Request timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

/// Which key-value backend holds the queue snapshot.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    /// `~/.shopsync/shopsync.db`.
    #[default]
    Sqlite,
    /// JSON files under `~/.shopsync/store/`.
    File,
}

/// Queue and retry settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueConfig {
    /// Attempts before an operation is marked permanently failed.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Pause between operations within a pass, in milliseconds.
    #[serde(default = "default_inter_operation_delay_ms")]
    pub inter_operation_delay_ms: u64,
    /// First retry delay in seconds. 0 disables backoff.
    #[serde(default = "default_backoff_base_secs")]
    pub backoff_base_secs: u64,
    /// Upper bound for the retry delay in seconds.
    #[serde(default = "default_backoff_max_secs")]
    pub backoff_max_secs: u64,
    /// Snapshot backend.
    #[serde(default)]
    pub storage: StorageBackend,
}

/// Pass trigger settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TriggerConfig {
    /// Periodic pass interval in seconds.
    #[serde(default = "default_sync_interval_secs")]
    pub sync_interval_secs: u64,
    /// Connectivity probe interval in seconds.
    #[serde(default = "default_probe_interval_secs")]
    pub probe_interval_secs: u64,
    /// Register a `SIGUSR1` wake listener in daemon mode.
    #[serde(default = "default_true")]
    pub wake_on_signal: bool,
}

// Default value functions for serde
const fn default_output_format() -> OutputFormat {
    OutputFormat::Pretty
}

fn default_base_url() -> String {
    "http://localhost:8080".to_string()
}

const fn default_timeout_secs() -> u64 {
    10
}

const fn default_max_attempts() -> u32 {
    3
}

const fn default_inter_operation_delay_ms() -> u64 {
    100
}

const fn default_backoff_base_secs() -> u64 {
    5
}

const fn default_backoff_max_secs() -> u64 {
    300
}

const fn default_sync_interval_secs() -> u64 {
    30
}

const fn default_probe_interval_secs() -> u64 {
    15
}

const fn default_true() -> bool {
    true
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            default_output: default_output_format(),
        }
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            token: None,
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            inter_operation_delay_ms: default_inter_operation_delay_ms(),
            backoff_base_secs: default_backoff_base_secs(),
            backoff_max_secs: default_backoff_max_secs(),
            storage: StorageBackend::default(),
        }
    }
}

impl Default for TriggerConfig {
    fn default() -> Self {
        Self {
            sync_interval_secs: default_sync_interval_secs(),
            probe_interval_secs: default_probe_interval_secs(),
            wake_on_signal: default_true(),
        }
    }
}

impl ApiConfig {
    /// Request timeout as a [`Duration`].
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl TriggerConfig {
    /// Periodic pass interval as a [`Duration`], never zero.
    #[must_use]
    pub fn sync_interval(&self) -> Duration {
        Duration::from_secs(self.sync_interval_secs.max(1))
    }

    /// Probe interval as a [`Duration`], never zero.
    #[must_use]
    pub fn probe_interval(&self) -> Duration {
        Duration::from_secs(self.probe_interval_secs.max(1))
    }
}

impl Config {
    /// Load configuration from a specific path.
    ///
    /// If the config file doesn't exist, returns default configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file exists but cannot be parsed or
    /// fails validation.
    pub fn load_from_path(path: &std::path::Path) -> Result<Self, ShopsyncError> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let contents = std::fs::read_to_string(path).map_err(|e| {
            ShopsyncError::Config(format!(
                "Failed to read config file {}: {e}",
                path.display()
            ))
        })?;

        let config: Self = serde_yaml::from_str(&contents).map_err(|e| {
            ShopsyncError::Config(format!(
                "Failed to parse config file {}: {e}",
                path.display()
            ))
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a specific path.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file cannot be written.
    pub fn save_to_path(&self, path: &std::path::Path) -> Result<(), ShopsyncError> {
        let contents = serde_yaml::to_string(self)
            .map_err(|e| ShopsyncError::Config(format!("Failed to serialize config: {e}")))?;

        std::fs::write(path, contents).map_err(|e| {
            ShopsyncError::Config(format!(
                "Failed to write config file {}: {e}",
                path.display()
            ))
        })
    }

    /// Reject values the queue cannot run with.
    ///
    /// # Errors
    ///
    /// Returns `ShopsyncError::Config` naming the offending field.
    pub fn validate(&self) -> Result<(), ShopsyncError> {
        if self.queue.max_attempts == 0 {
            return Err(ShopsyncError::Config(
                "queue.max_attempts must be at least 1".to_string(),
            ));
        }
        if self.queue.backoff_max_secs < self.queue.backoff_base_secs {
            return Err(ShopsyncError::Config(
                "queue.backoff_max_secs must not be below queue.backoff_base_secs".to_string(),
            ));
        }
        if !self.api.base_url.starts_with("http://") && !self.api.base_url.starts_with("https://")
        {
            return Err(ShopsyncError::Config(format!(
                "api.base_url must be an http(s) URL, got '{}'",
                self.api.base_url
            )));
        }
        Ok(())
    }
}
