//! Settings validation

use common::error::{Error, Result};

use crate::settings::{RegistrySettings, StorageBackend};

const LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// Checks loaded settings before they are used
pub struct ConfigValidator;

impl ConfigValidator {
    pub fn validate(settings: &RegistrySettings) -> Result<()> {
        let database = &settings.database;

        if database.backend == StorageBackend::Sqlite && !database.url.starts_with("sqlite:") {
            return Err(Error::Config(format!(
                "database.url must be a sqlite URL, got {}",
                database.url
            )));
        }

        if database.max_connections == 0 {
            return Err(Error::Config("database.max_connections must be at least 1".to_string()));
        }

        if !LEVELS.contains(&settings.logging.level.to_lowercase().as_str()) {
            return Err(Error::Config(format!(
                "logging.level must be one of {}, got {}",
                LEVELS.join(", "),
                settings.logging.level
            )));
        }

        Ok(())
    }
}
