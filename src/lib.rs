//! Main integration module for the endpoint registry
//!
//! This module wires configuration, storage and the registry together
//! and provides the entry point used by the `registry` binary.

use std::sync::Arc;
use anyhow::Result;
use serde_json::Value;
use tracing::info;

use cli_interface::cli::Command;
use model_registry::ModelRegistry;
use registry_config::{ConfigManager, RegistrySettings};
use storage_adapter::{RegistryStore, StorageManager};

pub use common;
pub use model_registry;
pub use registry_config;
pub use storage_adapter;

/// Configured registry with its backing store
pub struct EndpointRegistry {
    /// Settings the registry was opened with
    settings: RegistrySettings,

    /// Registry operations
    registry: Arc<ModelRegistry>,
}

impl EndpointRegistry {
    /// Opens the configured store and builds the registry on top of it
    pub async fn new(settings: RegistrySettings) -> Result<Self> {
        info!(
            "Opening endpoint registry ({} backend)",
            settings.database.backend
        );

        let store = StorageManager::open(&settings.database)
            .await
            .map_err(common::Error::from)?;

        Ok(Self {
            settings,
            registry: Arc::new(ModelRegistry::new(store)),
        })
    }

    /// Loads settings from a configuration manager and opens the registry
    pub async fn from_config(config_manager: &ConfigManager) -> Result<Self> {
        let settings = config_manager.settings()?;
        Self::new(settings).await
    }

    /// Runs one command and returns its JSON result
    pub async fn execute(&self, command: Command) -> Result<Value> {
        cli_interface::execute(&self.registry, command).await
    }

    /// Gets the settings
    pub fn get_settings(&self) -> &RegistrySettings {
        &self.settings
    }

    /// Gets the registry
    pub fn get_registry(&self) -> Arc<ModelRegistry> {
        self.registry.clone()
    }

    /// Gets the backing store
    pub fn get_store(&self) -> Arc<dyn RegistryStore> {
        self.registry.store()
    }
}
