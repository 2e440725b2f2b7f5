//! INI parsing logic for converting `Ini` → `ConfigFile`.
//!
//! This module contains the `parse_ini()` function. It is the single
//! place where INI key names are mapped to struct fields.

use super::file::ConfigFileError;
use super::settings::ConfigFile;
use ini::Ini;
use std::path::PathBuf;

/// Parse an `Ini` object into a `ConfigFile`.
///
/// Starts from `ConfigFile::default()` and overlays any values found in
/// the INI.
pub(super) fn parse_ini(ini: &Ini) -> Result<ConfigFile, ConfigFileError> {
    let mut config = ConfigFile::default();

    // [station] section
    if let Some(section) = ini.section(Some("station")) {
        if let Some(v) = section.get("name") {
            let v = v.trim();
            if !v.is_empty() {
                config.station.name = v.to_string();
            }
        }
    }

    // [controller] section
    if let Some(section) = ini.section(Some("controller")) {
        if let Some(v) = section.get("guard_timeout_secs") {
            let parsed: u64 = v.parse().map_err(|_| ConfigFileError::InvalidValue {
                section: "controller".to_string(),
                key: "guard_timeout_secs".to_string(),
                value: v.to_string(),
                reason: "must be a positive integer (seconds)".to_string(),
            })?;
            if parsed == 0 {
                return Err(ConfigFileError::InvalidValue {
                    section: "controller".to_string(),
                    key: "guard_timeout_secs".to_string(),
                    value: v.to_string(),
                    reason: "must be at least 1 second".to_string(),
                });
            }
            config.controller.guard_timeout_secs = parsed;
        }
        if let Some(v) = section.get("calibration_host") {
            let v = v.trim();
            if !v.is_empty() {
                config.controller.calibration_host = v.to_string();
            }
        }
        if let Some(v) = section.get("beam_host") {
            let v = v.trim();
            if !v.is_empty() {
                config.controller.beam_host = v.to_string();
            }
        }
        if let Some(v) = section.get("transient_buffer_host") {
            let v = v.trim();
            if !v.is_empty() {
                config.controller.transient_buffer_host = v.to_string();
            }
        }
    }

    // [parset] section
    if let Some(section) = ini.section(Some("parset")) {
        if let Some(v) = section.get("directory") {
            let v = v.trim();
            if !v.is_empty() {
                config.parset.directory = expand_tilde(v);
            }
        }
    }

    // [logging] section
    if let Some(section) = ini.section(Some("logging")) {
        if let Some(v) = section.get("file") {
            let v = v.trim();
            if !v.is_empty() {
                config.logging.file = Some(expand_tilde(v));
            }
        }
    }

    Ok(config)
}

/// Expand a leading `~` to the user's home directory.
fn expand_tilde(path: &str) -> PathBuf {
    if let Some(stripped) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(stripped);
        }
    }
    PathBuf::from(path)
}
