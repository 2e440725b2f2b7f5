//! CLI runner for common setup.
//!
//! Encapsulates configuration loading and logging initialization to
//! reduce duplication across command handlers.

use crate::error::CliError;
use stationctl::config::ConfigFile;
use stationctl::logging::{init_logging, LoggingGuard};
use tracing::info;

/// Runner that manages CLI lifecycle and common setup.
pub struct CliRunner {
    /// Logging guard - keeps logging active while runner exists
    #[allow(dead_code)]
    logging_guard: LoggingGuard,
    /// Loaded configuration file
    config: ConfigFile,
}

impl CliRunner {
    /// Create a new CLI runner with optional debug logging.
    ///
    /// Loads the config file (or defaults when absent) and initializes
    /// logging, optionally with a file sink from the config.
    pub fn with_debug(debug_mode: bool) -> Result<Self, CliError> {
        let config = ConfigFile::load()?;

        if debug_mode && std::env::var_os("RUST_LOG").is_none() {
            std::env::set_var("RUST_LOG", "debug");
        }

        let logging_guard = init_logging(config.logging.file.as_deref())
            .map_err(|e| CliError::LoggingInit(e.to_string()))?;

        Ok(Self {
            logging_guard,
            config,
        })
    }

    /// Get the loaded configuration.
    pub fn config(&self) -> &ConfigFile {
        &self.config
    }

    /// Log startup information for a command.
    pub fn log_startup(&self, command: &str) {
        info!(
            station = %self.config.station.name,
            "stationctl v{} - {} command",
            stationctl::VERSION,
            command
        );
    }
}
