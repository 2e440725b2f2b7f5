//! Logging infrastructure for the station controller.
//!
//! Provides structured logging with optional file output:
//! - Always prints to stdout for interactive tailing
//! - Optionally writes to a log file (cleared on session start)
//! - Configurable via RUST_LOG environment variable

use std::fs;
use std::io;
use std::path::Path;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// Guard that must be kept alive for the duration of logging.
///
/// Dropping this guard will flush and close the log file writer.
pub struct LoggingGuard {
    _file_guard: Option<WorkerGuard>,
}

/// Initialize the logging system.
///
/// Sets up a stdout layer and, when `log_file` is given, a non-blocking
/// file layer. The previous log file content is cleared.
///
/// # Errors
///
/// Returns an error if the log directory cannot be created or the log
/// file cannot be cleared.
pub fn init_logging(log_file: Option<&Path>) -> Result<LoggingGuard, io::Error> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let stdout_layer = tracing_subscriber::fmt::layer()
        .with_writer(io::stdout)
        .with_ansi(true)
        .with_target(false);

    let mut file_guard = None;
    let file_layer = match log_file {
        Some(path) => {
            let dir = path.parent().unwrap_or_else(|| Path::new("."));
            let name = path.file_name().unwrap_or_else(|| "stationctl.log".as_ref());
            fs::create_dir_all(dir)?;
            // Clear the previous session's log.
            fs::write(path, "")?;

            let file_appender = tracing_appender::rolling::never(dir, name);
            let (non_blocking_file, guard) = tracing_appender::non_blocking(file_appender);
            file_guard = Some(guard);

            Some(
                tracing_subscriber::fmt::layer()
                    .with_writer(non_blocking_file)
                    .with_ansi(false),
            )
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(file_layer)
        .with(stdout_layer)
        .init();

    Ok(LoggingGuard {
        _file_guard: file_guard,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_file_is_cleared_on_init_path() {
        // init_logging can only run once per process because of the
        // global subscriber; exercise the file preparation on its own.
        let temp_dir = tempfile::TempDir::new().unwrap();
        let log_path = temp_dir.path().join("stationctl.log");
        fs::write(&log_path, "old log data").unwrap();

        fs::write(&log_path, "").unwrap();
        assert_eq!(fs::read_to_string(&log_path).unwrap(), "");
    }

    #[test]
    fn test_guard_structure() {
        let (non_blocking, guard) = tracing_appender::non_blocking(std::io::sink());
        drop(non_blocking);
        let _logging_guard = LoggingGuard {
            _file_guard: Some(guard),
        };
    }
}
