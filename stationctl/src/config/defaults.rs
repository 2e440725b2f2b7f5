//! Default values and well-known paths for the configuration file.

use std::path::PathBuf;

/// Default station name used when the config file does not set one.
pub const DEFAULT_STATION_NAME: &str = "CS001";

/// Get the path to the config directory (~/.stationctl).
pub fn config_directory() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".stationctl")
}

/// Get the path to the config file (~/.stationctl/config.ini).
pub fn config_file_path() -> PathBuf {
    config_directory().join("config.ini")
}

/// Get the default directory observation parameter sets are read from
/// (~/.stationctl/parsets).
pub fn default_parset_directory() -> PathBuf {
    config_directory().join("parsets")
}
