use anyhow::Result;
use clap::Parser;
use tracing::debug;

use cli_interface::Cli;
use endpoint_registry::EndpointRegistry;
use logging::Logger;
use registry_config::ConfigManager;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config_manager = ConfigManager::new(cli.config.clone());
    if let Some(url) = &cli.database {
        config_manager.set_override("database.backend", "sqlite");
        config_manager.set_override("database.url", url.as_str());
    }
    if cli.memory {
        config_manager.set_override("database.backend", "memory");
    }
    if let Some(level) = &cli.log_level {
        config_manager.set_override("logging.level", level.as_str());
    }

    let settings = config_manager.settings()?;

    // Held until exit so buffered file output is flushed
    let _logger = Logger::init(&settings.logging)?;
    debug!("Using configuration file {:?}", config_manager.config_file());

    let registry = EndpointRegistry::new(settings).await?;
    let output = registry.execute(cli.command).await?;

    println!("{}", serde_json::to_string_pretty(&output)?);

    Ok(())
}
