//! Station controller configuration.
//!
//! This module contains the [`ControllerConfig`] struct and related
//! constants for configuring the supervisor.

use std::time::Duration;

/// Default guard timer for awaiting child acknowledgements (seconds).
pub const DEFAULT_GUARD_TIMEOUT_SECS: u64 = 10;

/// Default host the calibration controllers run on.
pub const DEFAULT_CALIBRATION_HOST: &str = "localhost";

/// Default host the beam controllers run on.
pub const DEFAULT_BEAM_HOST: &str = "localhost";

/// Default host the transient-buffer controllers run on.
pub const DEFAULT_TRANSIENT_BUFFER_HOST: &str = "localhost";

/// Configuration for the station controller.
#[derive(Clone, Debug)]
pub struct ControllerConfig {
    /// Guard timer armed while awaiting child acknowledgements.
    pub guard_timeout: Duration,

    /// Host to start calibration controllers on.
    pub calibration_host: String,

    /// Host to start beam controllers on.
    pub beam_host: String,

    /// Host to start transient-buffer controllers on.
    pub transient_buffer_host: String,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            guard_timeout: Duration::from_secs(DEFAULT_GUARD_TIMEOUT_SECS),
            calibration_host: DEFAULT_CALIBRATION_HOST.to_string(),
            beam_host: DEFAULT_BEAM_HOST.to_string(),
            transient_buffer_host: DEFAULT_TRANSIENT_BUFFER_HOST.to_string(),
        }
    }
}

impl ControllerConfig {
    /// The host a controller of the given type should be started on.
    pub fn host_for(&self, ctype: crate::child::ChildType) -> &str {
        match ctype {
            crate::child::ChildType::Calibration => &self.calibration_host,
            crate::child::ChildType::Beam => &self.beam_host,
            crate::child::ChildType::TransientBuffer => &self.transient_buffer_host,
        }
    }
}

impl From<&crate::config::ConfigFile> for ControllerConfig {
    fn from(file: &crate::config::ConfigFile) -> Self {
        Self {
            guard_timeout: Duration::from_secs(file.controller.guard_timeout_secs),
            calibration_host: file.controller.calibration_host.clone(),
            beam_host: file.controller.beam_host.clone(),
            transient_buffer_host: file.controller.transient_buffer_host.clone(),
        }
    }
}
