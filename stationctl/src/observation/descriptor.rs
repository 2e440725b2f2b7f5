//! Observation identity and descriptor.
//!
//! The descriptor is immutable once loaded from a parameter set; the
//! single exception is recording the hardware-corrected receiver
//! selection reported back during claim.

use crate::parset::{ParameterSet, ParsetError};
use chrono::{DateTime, Utc};
use std::fmt;

/// Unique identifier of an observation (the scheduler's tree id).
#[derive(Clone, Hash, Eq, PartialEq)]
pub struct ObservationId(String);

impl ObservationId {
    /// Creates an observation id from its string form.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the string value of this id.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for ObservationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ObservationId({})", self.0)
    }
}

impl fmt::Display for ObservationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for ObservationId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Canonical supervisor-level name of one observation instance.
///
/// Every lifecycle event is demultiplexed by reconstructing this key
/// from the originating controller name's instance number and
/// observation id.
#[derive(Clone, Hash, Eq, PartialEq)]
pub struct ObsKey {
    instance_nr: u32,
    obs_id: ObservationId,
}

impl ObsKey {
    /// Builds the canonical key from its parts.
    pub fn new(instance_nr: u32, obs_id: ObservationId) -> Self {
        Self { instance_nr, obs_id }
    }

    /// The observation id component.
    pub fn obs_id(&self) -> &ObservationId {
        &self.obs_id
    }

    /// The instance number component.
    pub fn instance_nr(&self) -> u32 {
        self.instance_nr
    }
}

impl fmt::Debug for ObsKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ObsKey({self})")
    }
}

impl fmt::Display for ObsKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Observation[{}]{{{}}}", self.instance_nr, self.obs_id)
    }
}

/// Immutable description of one scheduled observation.
#[derive(Clone, Debug)]
pub struct ObservationDescriptor {
    /// Observation (tree) id.
    pub obs_id: ObservationId,
    /// Instance number within the station controller.
    pub instance_nr: u32,
    /// Scheduled start of the observation window.
    pub start_time: DateTime<Utc>,
    /// Scheduled end of the observation window.
    pub stop_time: DateTime<Utc>,
    /// Required sample clock in MHz (160 or 200).
    pub sample_clock_mhz: u32,
    /// Required bit mode (4, 8 or 16).
    pub bit_mode: u8,
    /// Requested receiver selection, as scheduled.
    pub receivers: String,
    /// Whether transient-buffer capture is requested.
    pub transient_buffer: bool,
    /// Whether the antenna splitter must be enabled.
    pub splitter: bool,
    /// Receiver selection after hardware correction, once known.
    corrected_receivers: Option<String>,
}

impl ObservationDescriptor {
    /// Builds a descriptor from an observation's parameter set.
    pub fn from_parset(
        obs_id: ObservationId,
        instance_nr: u32,
        parset: &ParameterSet,
    ) -> Result<Self, ParsetError> {
        let sample_clock_mhz = parset.get_u32("Observation.sampleClock")?;
        if sample_clock_mhz != 160 && sample_clock_mhz != 200 {
            return Err(ParsetError::InvalidValue {
                key: "Observation.sampleClock".to_string(),
                value: sample_clock_mhz.to_string(),
                reason: "sample clock must be 160 or 200 MHz".to_string(),
            });
        }

        let bit_mode = parset.get_u8("Observation.bitMode")?;
        if !matches!(bit_mode, 4 | 8 | 16) {
            return Err(ParsetError::InvalidValue {
                key: "Observation.bitMode".to_string(),
                value: bit_mode.to_string(),
                reason: "bit mode must be 4, 8 or 16".to_string(),
            });
        }

        let start_time = parset.get_datetime("Observation.startTime")?;
        let stop_time = parset.get_datetime("Observation.stopTime")?;
        if stop_time <= start_time {
            return Err(ParsetError::InvalidValue {
                key: "Observation.stopTime".to_string(),
                value: stop_time.to_string(),
                reason: "stop time must be after start time".to_string(),
            });
        }

        Ok(Self {
            obs_id,
            instance_nr,
            start_time,
            stop_time,
            sample_clock_mhz,
            bit_mode,
            receivers: parset.get_str("Observation.receiverList")?.to_string(),
            transient_buffer: parset.get_bool("Observation.TBB.enabled")?,
            splitter: parset.get_bool("Observation.splitterOn")?,
            corrected_receivers: None,
        })
    }

    /// Canonical supervisor-level key for this observation.
    pub fn key(&self) -> ObsKey {
        ObsKey::new(self.instance_nr, self.obs_id.clone())
    }

    /// Records the hardware-corrected receiver selection.
    ///
    /// This is the only mutation the core ever performs on a descriptor.
    pub fn set_corrected_receivers(&mut self, receivers: impl Into<String>) {
        self.corrected_receivers = Some(receivers.into());
    }

    /// The receiver selection in effect: corrected if known, scheduled
    /// otherwise.
    pub fn effective_receivers(&self) -> &str {
        self.corrected_receivers.as_deref().unwrap_or(&self.receivers)
    }

    /// Returns true when the two observation windows overlap in time.
    pub fn overlaps(&self, other: &Self) -> bool {
        self.start_time < other.stop_time && other.start_time < self.stop_time
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parset::ParameterSet;

    fn sample_parset(clock: u32, start: &str, stop: &str) -> ParameterSet {
        ParameterSet::from_str(&format!(
            "Observation.sampleClock = {clock}\n\
             Observation.bitMode = 16\n\
             Observation.startTime = {start}\n\
             Observation.stopTime = {stop}\n\
             Observation.receiverList = 0..47\n"
        ))
        .unwrap()
    }

    fn descriptor(id: &str, clock: u32, start: &str, stop: &str) -> ObservationDescriptor {
        ObservationDescriptor::from_parset(
            ObservationId::new(id),
            0,
            &sample_parset(clock, start, stop),
        )
        .unwrap()
    }

    #[test]
    fn test_descriptor_from_parset() {
        let desc = descriptor("100", 200, "2026-08-25 12:00:00", "2026-08-25 13:00:00");
        assert_eq!(desc.sample_clock_mhz, 200);
        assert_eq!(desc.bit_mode, 16);
        assert!(!desc.transient_buffer);
        assert!(!desc.splitter);
        assert_eq!(desc.effective_receivers(), "0..47");
    }

    #[test]
    fn test_invalid_clock_rejected() {
        let parset = sample_parset(150, "2026-08-25 12:00:00", "2026-08-25 13:00:00");
        let err = ObservationDescriptor::from_parset(ObservationId::new("1"), 0, &parset);
        assert!(err.is_err());
    }

    #[test]
    fn test_inverted_window_rejected() {
        let parset = sample_parset(200, "2026-08-25 13:00:00", "2026-08-25 12:00:00");
        assert!(ObservationDescriptor::from_parset(ObservationId::new("1"), 0, &parset).is_err());
    }

    #[test]
    fn test_corrected_receivers_override() {
        let mut desc = descriptor("100", 200, "2026-08-25 12:00:00", "2026-08-25 13:00:00");
        desc.set_corrected_receivers("0..45");
        assert_eq!(desc.effective_receivers(), "0..45");
    }

    #[test]
    fn test_window_overlap() {
        let a = descriptor("1", 200, "2026-08-25 12:00:00", "2026-08-25 13:00:00");
        let b = descriptor("2", 200, "2026-08-25 12:30:00", "2026-08-25 14:00:00");
        let c = descriptor("3", 200, "2026-08-25 13:00:00", "2026-08-25 14:00:00");
        assert!(a.overlaps(&b));
        assert!(b.overlaps(&a));
        assert!(!a.overlaps(&c));
    }

    #[test]
    fn test_obs_key_display() {
        let key = ObsKey::new(2, ObservationId::new("4242"));
        assert_eq!(key.to_string(), "Observation[2]{4242}");
    }
}
