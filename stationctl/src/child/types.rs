//! Child controller types and canonical naming.
//!
//! Child controller names are derived deterministically from the
//! controller type, the observation's instance number and the
//! observation id, and can be parsed back into those parts. The
//! supervisor relies on the round trip to route every acknowledgement
//! to the owning observation.

use crate::observation::{ObsKey, ObservationId};
use std::fmt;

/// Type of a subordinate hardware controller.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ChildType {
    /// Antenna calibration controller.
    Calibration,
    /// Beamforming controller.
    Beam,
    /// Transient-buffer capture controller (optional per observation).
    TransientBuffer,
}

impl ChildType {
    /// All controller types, in prepare order (calibration first).
    pub const ALL: [ChildType; 3] = [
        ChildType::Calibration,
        ChildType::Beam,
        ChildType::TransientBuffer,
    ];

    /// Canonical name prefix for controllers of this type.
    pub fn prefix(&self) -> &'static str {
        match self {
            Self::Calibration => "CalCtl",
            Self::Beam => "BeamCtl",
            Self::TransientBuffer => "TBBCtl",
        }
    }

    /// Parses a controller type from its name prefix.
    pub fn from_prefix(prefix: &str) -> Option<Self> {
        match prefix {
            "CalCtl" => Some(Self::Calibration),
            "BeamCtl" => Some(Self::Beam),
            "TBBCtl" => Some(Self::TransientBuffer),
            _ => None,
        }
    }
}

impl fmt::Display for ChildType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.prefix())
    }
}

/// Canonical name of one child controller instance.
///
/// Formatted as `{prefix}[{instance}]{{{obs_id}}}`, for example
/// `BeamCtl[0]{12345}`.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct ChildName {
    ctype: ChildType,
    instance_nr: u32,
    obs_id: ObservationId,
}

impl ChildName {
    /// Derives the canonical name for a controller.
    pub fn new(ctype: ChildType, instance_nr: u32, obs_id: ObservationId) -> Self {
        Self {
            ctype,
            instance_nr,
            obs_id,
        }
    }

    /// The controller type.
    pub fn ctype(&self) -> ChildType {
        self.ctype
    }

    /// The observation id embedded in the name.
    pub fn obs_id(&self) -> &ObservationId {
        &self.obs_id
    }

    /// The instance number embedded in the name.
    pub fn instance_nr(&self) -> u32 {
        self.instance_nr
    }

    /// Reconstructs the supervisor-level observation key this
    /// controller belongs to.
    pub fn obs_key(&self) -> ObsKey {
        ObsKey::new(self.instance_nr, self.obs_id.clone())
    }

    /// Parses a canonical name back into its parts.
    ///
    /// Returns `None` for names not produced by [`ChildName::new`].
    pub fn parse(name: &str) -> Option<Self> {
        let bracket = name.find('[')?;
        let ctype = ChildType::from_prefix(&name[..bracket])?;
        let rest = &name[bracket + 1..];
        let close = rest.find(']')?;
        let instance_nr: u32 = rest[..close].parse().ok()?;
        let rest = &rest[close + 1..];
        let obs_id = rest.strip_prefix('{')?.strip_suffix('}')?;
        if obs_id.is_empty() {
            return None;
        }
        Some(Self::new(ctype, instance_nr, ObservationId::new(obs_id)))
    }
}

impl fmt::Debug for ChildName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ChildName({self})")
    }
}

impl fmt::Display for ChildName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}[{}]{{{}}}", self.ctype.prefix(), self.instance_nr, self.obs_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_child_name_format() {
        let name = ChildName::new(ChildType::Beam, 0, ObservationId::new("12345"));
        assert_eq!(name.to_string(), "BeamCtl[0]{12345}");
    }

    #[test]
    fn test_child_name_parse_round_trip() {
        for ctype in ChildType::ALL {
            let name = ChildName::new(ctype, 7, ObservationId::new("998"));
            let parsed = ChildName::parse(&name.to_string()).unwrap();
            assert_eq!(parsed, name);
            assert_eq!(parsed.obs_key().to_string(), "Observation[7]{998}");
        }
    }

    #[test]
    fn test_parse_rejects_foreign_names() {
        assert!(ChildName::parse("StationCtl[0]{1}").is_none());
        assert!(ChildName::parse("BeamCtl{1}").is_none());
        assert!(ChildName::parse("BeamCtl[x]{1}").is_none());
        assert!(ChildName::parse("BeamCtl[0]{}").is_none());
    }

    #[test]
    fn test_prefix_round_trip() {
        for ctype in ChildType::ALL {
            assert_eq!(ChildType::from_prefix(ctype.prefix()), Some(ctype));
        }
    }
}
