//! Shared setup for commands: paths, config, and the sync service.

use std::path::Path;
use std::sync::Arc;

use crate::cli::args::OutputFormat;
use crate::config::{Config, Paths, StorageBackend};
use crate::error::ShopsyncError;
use crate::storage::{Database, FileKeyValueStore, KeyValueStore, SqliteKeyValueStore};
use crate::sync::{
    Connectivity, ConnectivityProbe, DispatcherConfig, DurableStore, HandlerRegistry, HttpHandler,
    SyncService,
};

/// Resolved paths and configuration for one invocation.
#[derive(Debug, Clone)]
pub struct Context {
    /// Data directories
    pub paths: Paths,
    /// Loaded configuration
    pub config: Config,
}

impl Context {
    /// Resolve paths and load the config, from `config_path` if given.
    ///
    /// # Errors
    ///
    /// Returns an error if the paths cannot be resolved or the config is invalid.
    pub fn load(config_path: Option<&Path>) -> Result<Self, ShopsyncError> {
        let paths = Paths::new()?;
        let config = Config::load_from_path(config_path.unwrap_or(paths.config_file.as_path()))?;
        Ok(Self { paths, config })
    }

    /// Build a context from explicit parts.
    #[must_use]
    pub const fn new(paths: Paths, config: Config) -> Self {
        Self { paths, config }
    }

    /// The CLI choice, falling back to the configured default.
    #[must_use]
    pub fn output_format(&self, requested: Option<OutputFormat>) -> OutputFormat {
        requested.unwrap_or(self.config.general.default_output)
    }

    /// Open the configured key-value backend.
    ///
    /// # Errors
    ///
    /// Returns an error if the directories or database cannot be created.
    pub fn backend(&self) -> Result<Arc<dyn KeyValueStore>, ShopsyncError> {
        self.paths.ensure_dirs()?;
        let backend: Arc<dyn KeyValueStore> = match self.config.queue.storage {
            StorageBackend::Sqlite => Arc::new(SqliteKeyValueStore::new(Database::open_at(
                &self.paths.database,
            )?)),
            StorageBackend::File => Arc::new(FileKeyValueStore::new(&self.paths.store)?),
        };
        Ok(backend)
    }

    /// Restore the queue and wire HTTP handlers for every kind.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend or HTTP client cannot be created.
    pub fn service(&self, connectivity: Connectivity) -> Result<SyncService, ShopsyncError> {
        let handler = Arc::new(HttpHandler::new(&self.config.api)?);
        Ok(SyncService::new(
            DurableStore::new(self.backend()?),
            HandlerRegistry::uniform(handler),
            connectivity,
            DispatcherConfig::from(&self.config.queue),
        ))
    }

    /// Probe for the configured API.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn probe(&self) -> Result<ConnectivityProbe, ShopsyncError> {
        ConnectivityProbe::new(
            self.config.api.base_url.clone(),
            self.config.trigger.probe_interval(),
        )
    }
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;
    use crate::sync::{Action, DevicePayload};

    fn context(dir: &TempDir, storage: StorageBackend) -> Context {
        let mut config = Config::default();
        config.queue.storage = storage;
        Context::new(Paths::with_root(dir.path().join("home")), config)
    }

    #[tokio::test]
    async fn test_queue_survives_reopen_for_each_backend() {
        for storage in [StorageBackend::Sqlite, StorageBackend::File] {
            let dir = TempDir::new().unwrap();
            let ctx = context(&dir, storage);

            let id = ctx
                .service(Connectivity::offline())
                .unwrap()
                .sync_device(
                    Action::Create,
                    DevicePayload {
                        id: None,
                        serial_number: "SN-42".to_string(),
                        model: "Surface Pro".to_string(),
                        customer_id: None,
                        status: None,
                    },
                    None,
                )
                .await;

            let reopened = ctx.service(Connectivity::offline()).unwrap();
            assert!(reopened.operation(id).await.is_some(), "{storage:?}");
        }
    }

    #[test]
    fn test_output_format_falls_back_to_config() {
        let dir = TempDir::new().unwrap();
        let mut ctx = context(&dir, StorageBackend::Sqlite);
        ctx.config.general.default_output = OutputFormat::Json;

        assert_eq!(ctx.output_format(None), OutputFormat::Json);
        assert_eq!(ctx.output_format(Some(OutputFormat::Pretty)), OutputFormat::Pretty);
    }
}
