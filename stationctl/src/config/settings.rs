//! Settings structs for the configuration file.
//!
//! Each struct maps to one INI section. Key-to-field mapping lives in
//! [`super::parser`], the reverse in [`super::writer`].

use super::defaults::{default_parset_directory, DEFAULT_STATION_NAME};
use crate::controller::{
    DEFAULT_BEAM_HOST, DEFAULT_CALIBRATION_HOST, DEFAULT_GUARD_TIMEOUT_SECS,
    DEFAULT_TRANSIENT_BUFFER_HOST,
};
use std::path::PathBuf;

/// The full configuration file.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ConfigFile {
    /// `[station]` section.
    pub station: StationSettings,
    /// `[controller]` section.
    pub controller: ControllerSettings,
    /// `[parset]` section.
    pub parset: ParsetSettings,
    /// `[logging]` section.
    pub logging: LoggingSettings,
}

/// `[station]` section: station identity.
#[derive(Clone, Debug, PartialEq)]
pub struct StationSettings {
    /// Station name, used in log context.
    pub name: String,
}

impl Default for StationSettings {
    fn default() -> Self {
        Self {
            name: DEFAULT_STATION_NAME.to_string(),
        }
    }
}

/// `[controller]` section: supervisor tunables.
#[derive(Clone, Debug, PartialEq)]
pub struct ControllerSettings {
    /// Guard timer in seconds for awaiting child acknowledgements.
    pub guard_timeout_secs: u64,
    /// Host calibration controllers are started on.
    pub calibration_host: String,
    /// Host beam controllers are started on.
    pub beam_host: String,
    /// Host transient-buffer controllers are started on.
    pub transient_buffer_host: String,
}

impl Default for ControllerSettings {
    fn default() -> Self {
        Self {
            guard_timeout_secs: DEFAULT_GUARD_TIMEOUT_SECS,
            calibration_host: DEFAULT_CALIBRATION_HOST.to_string(),
            beam_host: DEFAULT_BEAM_HOST.to_string(),
            transient_buffer_host: DEFAULT_TRANSIENT_BUFFER_HOST.to_string(),
        }
    }
}

/// `[parset]` section: where observation parameter sets are read from.
#[derive(Clone, Debug, PartialEq)]
pub struct ParsetSettings {
    /// Directory holding `Observation<id>.parset` files.
    pub directory: PathBuf,
}

impl Default for ParsetSettings {
    fn default() -> Self {
        Self {
            directory: default_parset_directory(),
        }
    }
}

/// `[logging]` section.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct LoggingSettings {
    /// Log file path; `None` logs to stdout only.
    pub file: Option<PathBuf>,
}
