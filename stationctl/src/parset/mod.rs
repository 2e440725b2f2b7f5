//! Observation parameter sets.
//!
//! An observation is described by a flat key/value parameter file
//! (`Observation.sampleClock = 200` style). This module is the single
//! place where parameter keys are mapped to typed values; descriptor
//! construction lives in [`crate::observation::ObservationDescriptor`].

mod store;

pub use store::{DirParsetStore, MemParsetStore, ParsetStore};

use chrono::{DateTime, NaiveDateTime, Utc};
use ini::Ini;
use std::path::Path;
use thiserror::Error;

/// Parameter set errors.
#[derive(Debug, Error)]
pub enum ParsetError {
    /// Failed to read or parse the parameter file
    #[error("Failed to read parameter set: {0}")]
    ReadError(#[from] ini::Error),

    /// A required key is absent
    #[error("Missing parameter: {0}")]
    MissingKey(String),

    /// A key is present but its value cannot be interpreted
    #[error("Invalid parameter: {key} = '{value}' - {reason}")]
    InvalidValue {
        key: String,
        value: String,
        reason: String,
    },

    /// No parameter set exists for the requested observation
    #[error("No parameter set for observation {0}")]
    NotFound(String),
}

/// A flat key/value parameter set for one observation.
///
/// Keys are dotted paths (`Observation.sampleClock`); values are
/// untyped strings until read through one of the typed getters.
#[derive(Debug, Clone)]
pub struct ParameterSet {
    ini: Ini,
}

impl ParameterSet {
    /// Parse a parameter set from a string.
    pub fn from_str(content: &str) -> Result<Self, ParsetError> {
        let ini = Ini::load_from_str(content).map_err(ini::Error::Parse)?;
        Ok(Self { ini })
    }

    /// Load a parameter set from a file.
    pub fn from_file(path: &Path) -> Result<Self, ParsetError> {
        let ini = Ini::load_from_file(path)?;
        Ok(Self { ini })
    }

    /// Raw string lookup.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.ini.general_section().get(key).map(str::trim)
    }

    /// Required string value.
    pub fn get_str(&self, key: &str) -> Result<&str, ParsetError> {
        self.get(key)
            .ok_or_else(|| ParsetError::MissingKey(key.to_string()))
    }

    /// Required `u32` value.
    pub fn get_u32(&self, key: &str) -> Result<u32, ParsetError> {
        let value = self.get_str(key)?;
        value.parse().map_err(|_| ParsetError::InvalidValue {
            key: key.to_string(),
            value: value.to_string(),
            reason: "must be a non-negative integer".to_string(),
        })
    }

    /// Required `u8` value.
    pub fn get_u8(&self, key: &str) -> Result<u8, ParsetError> {
        let value = self.get_str(key)?;
        value.parse().map_err(|_| ParsetError::InvalidValue {
            key: key.to_string(),
            value: value.to_string(),
            reason: "must be a small non-negative integer".to_string(),
        })
    }

    /// Boolean value, defaulting to `false` when the key is absent.
    ///
    /// Accepts `true/false`, `yes/no`, `on/off`, `1/0`.
    pub fn get_bool(&self, key: &str) -> Result<bool, ParsetError> {
        let Some(value) = self.get(key) else {
            return Ok(false);
        };
        match value.to_lowercase().as_str() {
            "true" | "yes" | "on" | "1" => Ok(true),
            "false" | "no" | "off" | "0" => Ok(false),
            _ => Err(ParsetError::InvalidValue {
                key: key.to_string(),
                value: value.to_string(),
                reason: "must be a boolean (true/false, yes/no, on/off, 1/0)".to_string(),
            }),
        }
    }

    /// Required UTC timestamp in `YYYY-MM-DD HH:MM:SS` format.
    pub fn get_datetime(&self, key: &str) -> Result<DateTime<Utc>, ParsetError> {
        let value = self.get_str(key)?;
        NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S")
            .map(|naive| naive.and_utc())
            .map_err(|_| ParsetError::InvalidValue {
                key: key.to_string(),
                value: value.to_string(),
                reason: "expected timestamp like '2026-08-25 12:00:00'".to_string(),
            })
    }
}
