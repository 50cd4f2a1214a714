//! Configuration management for the endpoint registry
//!
//! Settings are layered from built-in defaults, an optional TOML file,
//! `REGISTRY__*` environment variables and runtime overrides.

pub mod defaults;
pub mod manager;
pub mod settings;
pub mod validation;

// Re-export commonly used types
pub use manager::ConfigManager;
pub use settings::{DatabaseSettings, LogFormat, LoggingSettings, RegistrySettings, StorageBackend};
pub use validation::ConfigValidator;
