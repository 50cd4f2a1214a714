//! Built-in configuration defaults

use config::builder::DefaultState;
use config::{ConfigBuilder, ConfigError};

/// Default configuration values
pub struct DefaultConfig;

impl DefaultConfig {
    pub const DATABASE_BACKEND: &'static str = "sqlite";
    pub const DATABASE_URL: &'static str = "sqlite://registry.db";
    pub const MAX_CONNECTIONS: i64 = 8;
    pub const CONNECT_TIMEOUT_SECS: i64 = 30;
    pub const LOG_LEVEL: &'static str = "info";
    pub const LOG_FORMAT: &'static str = "pretty";

    /// Registers every default on the builder
    pub fn apply(
        builder: ConfigBuilder<DefaultState>,
    ) -> Result<ConfigBuilder<DefaultState>, ConfigError> {
        builder
            .set_default("database.backend", Self::DATABASE_BACKEND)?
            .set_default("database.url", Self::DATABASE_URL)?
            .set_default("database.max_connections", Self::MAX_CONNECTIONS)?
            .set_default("database.connect_timeout_secs", Self::CONNECT_TIMEOUT_SECS)?
            .set_default("logging.level", Self::LOG_LEVEL)?
            .set_default("logging.format", Self::LOG_FORMAT)
    }
}
