//! Configuration manager
//!
//! Builds [`RegistrySettings`] from layered sources. Later layers win:
//! defaults, then the TOML file, then `REGISTRY__SECTION__KEY` environment
//! variables, then overrides set at runtime (command-line flags).

use std::path::{Path, PathBuf};
use config::{Config, Environment, File, FileFormat};
use dashmap::DashMap;
use tracing::debug;

use common::error::{Error, Result};

use crate::defaults::DefaultConfig;
use crate::settings::RegistrySettings;
use crate::validation::ConfigValidator;

/// Environment variable prefix
pub const ENV_PREFIX: &str = "REGISTRY";

/// File looked up in the working directory when no path is given
pub const DEFAULT_CONFIG_FILE: &str = "registry.toml";

/// Configuration manager
pub struct ConfigManager {
    /// Explicit configuration file
    config_file: Option<PathBuf>,

    /// Replacement for the process environment
    env_source: Option<config::Map<String, String>>,

    /// Runtime overrides (dotted key -> value)
    overrides: DashMap<String, String>,
}

impl ConfigManager {
    /// Creates a manager reading `path`, or `registry.toml` when it exists
    pub fn new(path: Option<PathBuf>) -> Self {
        let config_file = path.or_else(|| {
            let fallback = PathBuf::from(DEFAULT_CONFIG_FILE);
            fallback.exists().then_some(fallback)
        });

        Self {
            config_file,
            env_source: None,
            overrides: DashMap::new(),
        }
    }

    /// Reads environment values from `vars` instead of the process environment
    pub fn with_env(mut self, vars: config::Map<String, String>) -> Self {
        self.env_source = Some(vars);
        self
    }

    pub fn config_file(&self) -> Option<&Path> {
        self.config_file.as_deref()
    }

    /// Sets a runtime override, e.g. `("database.url", "sqlite://x.db")`
    pub fn set_override(&self, key: impl Into<String>, value: impl Into<String>) {
        self.overrides.insert(key.into(), value.into());
    }

    /// Removes a runtime override
    pub fn clear_override(&self, key: &str) {
        self.overrides.remove(key);
    }

    /// Loads and validates the settings
    pub fn settings(&self) -> Result<RegistrySettings> {
        let mut builder = DefaultConfig::apply(Config::builder()).map_err(config_error)?;

        if let Some(path) = &self.config_file {
            debug!("Reading configuration from {:?}", path);
            builder = builder.add_source(File::from(path.as_path()).format(FileFormat::Toml));
        }

        builder = builder.add_source(
            Environment::with_prefix(ENV_PREFIX)
                .separator("__")
                .source(self.env_source.clone()),
        );

        for entry in self.overrides.iter() {
            builder = builder
                .set_override(entry.key().as_str(), entry.value().as_str())
                .map_err(config_error)?;
        }

        let settings: RegistrySettings = builder
            .build()
            .and_then(|config| config.try_deserialize())
            .map_err(config_error)?;

        ConfigValidator::validate(&settings)?;

        Ok(settings)
    }
}

impl Default for ConfigManager {
    fn default() -> Self {
        Self::new(None)
    }
}

fn config_error(err: config::ConfigError) -> Error {
    Error::Config(err.to_string())
}
