//! CLI error handling with user-friendly messages.
//!
//! Centralizes error handling for the CLI, providing consistent
//! formatting and appropriate exit codes.

use stationctl::controller::StartResult;
use std::fmt;
use std::process;

/// CLI-specific errors with user-friendly messages.
#[derive(Debug)]
pub enum CliError {
    /// Failed to initialize logging
    LoggingInit(String),
    /// Configuration error
    Config(String),
    /// Failed to create the async runtime
    Runtime(String),
    /// Invalid or unreadable parameter set
    Parset(String),
    /// The controller refused to start an observation
    Start { obs_id: String, result: StartResult },
}

impl CliError {
    /// Exit the process with an appropriate error message and code.
    pub fn exit(&self) -> ! {
        eprintln!("Error: {}", self);

        if let CliError::Config(_) = self {
            eprintln!();
            eprintln!(
                "Check ~/.stationctl/config.ini or remove it to fall back to defaults"
            );
        }

        process::exit(1)
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CliError::LoggingInit(msg) => write!(f, "Failed to initialize logging: {}", msg),
            CliError::Config(msg) => write!(f, "Configuration error: {}", msg),
            CliError::Runtime(msg) => write!(f, "Failed to create async runtime: {}", msg),
            CliError::Parset(msg) => write!(f, "Invalid parameter set: {}", msg),
            CliError::Start { obs_id, result } => {
                write!(f, "Observation {} refused: {}", obs_id, result)
            }
        }
    }
}

impl std::error::Error for CliError {}

impl From<stationctl::config::ConfigFileError> for CliError {
    fn from(e: stationctl::config::ConfigFileError) -> Self {
        CliError::Config(e.to_string())
    }
}
