//! Global subscriber setup

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::fmt::{self, writer::BoxMakeWriter};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, Registry};

use common::error::{Error, Result};
use registry_config::{LogFormat, LoggingSettings};

/// Base name of the rolling log file
pub const LOG_FILE_NAME: &str = "registry.log";

/// Handle keeping the background log writer alive
pub struct Logger {
    _guard: Option<WorkerGuard>,
}

impl Logger {
    /// Installs the global subscriber. Fails if one is already installed.
    pub fn init(settings: &LoggingSettings) -> Result<Self> {
        let env_filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(default_directive(&settings.level)));

        let (writer, guard) = match &settings.directory {
            Some(directory) => {
                std::fs::create_dir_all(directory)?;
                let appender = tracing_appender::rolling::daily(directory, LOG_FILE_NAME);
                let (non_blocking, guard) = tracing_appender::non_blocking(appender);
                (BoxMakeWriter::new(non_blocking), Some(guard))
            }
            None => (BoxMakeWriter::new(std::io::stderr), None),
        };

        let fmt_layer = match settings.format {
            LogFormat::Json => fmt::layer()
                .json()
                .with_writer(writer)
                .with_target(true)
                .boxed(),
            LogFormat::Pretty => fmt::layer()
                .pretty()
                .with_writer(writer)
                .with_target(true)
                .boxed(),
            LogFormat::Compact => fmt::layer()
                .compact()
                .with_writer(writer)
                .with_target(true)
                .boxed(),
        };

        Registry::default()
            .with(env_filter)
            .with(fmt_layer)
            .try_init()
            .map_err(|e| Error::Internal(format!("Failed to set logger: {}", e)))?;

        Ok(Self { _guard: guard })
    }
}

/// Filter used when `RUST_LOG` is unset; sqlx statement logs stay at warn
fn default_directive(level: &str) -> String {
    format!("{},sqlx=warn", level.to_lowercase())
}
