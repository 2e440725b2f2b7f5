//! Lifecycle vocabulary shared by the supervisor and all controllers.
//!
//! Every controller on the station, parent or child, speaks the same
//! request/acknowledgement pairs (`Claim`/`Claimed`, ...). This module
//! defines the observation states, the phase vocabulary, and the result
//! codes carried on acknowledgements.

use std::fmt;

/// Lifecycle state of an active observation.
///
/// States advance strictly in order on the happy path; `Standby` and
/// `Operational` are revisited by suspend/resume and prepare/release
/// cycles, and `Stopping` is reachable from every state via abort.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ObsState {
    /// Just created; identity not yet published.
    #[default]
    Initial,

    /// Child controllers are being started and connected.
    Starting,

    /// All required children connected; awaiting a claim.
    Connected,

    /// Station resources claimed; ready to prepare.
    Standby,

    /// Fully prepared; the observation is (or can be) taking data.
    Operational,

    /// Shutting down; children are being quit.
    Stopping,
}

impl ObsState {
    /// Returns true while the observation still reacts to lifecycle requests.
    pub fn is_active(&self) -> bool {
        !matches!(self, Self::Stopping)
    }

    /// Returns true once the observation holds station resources.
    ///
    /// Resource conflict checks only consider observations that are at
    /// `Standby` or beyond; an observation still connecting has not yet
    /// pinned the clock or bit mode.
    pub fn holds_resources(&self) -> bool {
        matches!(self, Self::Standby | Self::Operational)
    }
}

impl fmt::Display for ObsState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Initial => write!(f, "Initial"),
            Self::Starting => write!(f, "Starting"),
            Self::Connected => write!(f, "Connected"),
            Self::Standby => write!(f, "Standby"),
            Self::Operational => write!(f, "Operational"),
            Self::Stopping => write!(f, "Stopping"),
        }
    }
}

/// One step of the station-wide lifecycle protocol.
///
/// Requests travel down (parent to child) as the bare phase; the
/// matching acknowledgement travels back up carrying a [`ResultCode`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum LifecyclePhase {
    /// Start and connect child controllers.
    Connect,
    /// Claim station resources for the observation.
    Claim,
    /// Configure hardware for data taking (sequential per child type).
    Prepare,
    /// Pause data taking without releasing hardware.
    Suspend,
    /// Resume data taking after a suspend.
    Resume,
    /// Undo a prepare, returning to the claimed state.
    Release,
    /// Shut down; terminal for the observation.
    Quit,
}

impl LifecyclePhase {
    /// The observation state reached once every required child has
    /// acknowledged this phase.
    pub fn target_state(&self) -> ObsState {
        match self {
            Self::Connect => ObsState::Connected,
            Self::Claim => ObsState::Standby,
            Self::Prepare => ObsState::Operational,
            Self::Suspend => ObsState::Standby,
            Self::Resume => ObsState::Operational,
            Self::Release => ObsState::Standby,
            Self::Quit => ObsState::Stopping,
        }
    }

    /// The state an observation must be in for this phase to be valid.
    pub fn valid_from(&self) -> &'static [ObsState] {
        match self {
            Self::Connect => &[ObsState::Initial, ObsState::Starting],
            Self::Claim => &[ObsState::Connected],
            Self::Prepare => &[ObsState::Standby],
            Self::Suspend => &[ObsState::Operational],
            Self::Resume => &[ObsState::Standby],
            Self::Release => &[ObsState::Operational],
            // Quit is accepted from any state; it resolves into Stopping.
            Self::Quit => &[
                ObsState::Initial,
                ObsState::Starting,
                ObsState::Connected,
                ObsState::Standby,
                ObsState::Operational,
                ObsState::Stopping,
            ],
        }
    }
}

impl fmt::Display for LifecyclePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Connect => write!(f, "Connect"),
            Self::Claim => write!(f, "Claim"),
            Self::Prepare => write!(f, "Prepare"),
            Self::Suspend => write!(f, "Suspend"),
            Self::Resume => write!(f, "Resume"),
            Self::Release => write!(f, "Release"),
            Self::Quit => write!(f, "Quit"),
        }
    }
}

/// Result code carried on every lifecycle acknowledgement.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ResultCode {
    /// The request succeeded.
    #[default]
    NoError,
    /// The connection to the controller was lost.
    LostConnection,
    /// The controller does not know the observation.
    UnknownObservation,
    /// A station-wide resource (clock, bit mode, splitters) was in use.
    ResourceConflict,
    /// No parameter set exists for the observation.
    NoParameterSet,
    /// The observation is already registered.
    AlreadyRegistered,
    /// A guard timer expired while awaiting acknowledgements.
    Timeout,
    /// Any failure without a more specific code.
    Unspecified,
}

impl ResultCode {
    /// Returns true for a successful result.
    pub fn is_ok(&self) -> bool {
        matches!(self, Self::NoError)
    }
}

impl fmt::Display for ResultCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoError => write!(f, "NoError"),
            Self::LostConnection => write!(f, "LostConnection"),
            Self::UnknownObservation => write!(f, "UnknownObservation"),
            Self::ResourceConflict => write!(f, "ResourceConflict"),
            Self::NoParameterSet => write!(f, "NoParameterSet"),
            Self::AlreadyRegistered => write!(f, "AlreadyRegistered"),
            Self::Timeout => write!(f, "Timeout"),
            Self::Unspecified => write!(f, "Unspecified"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_state_is_initial() {
        assert_eq!(ObsState::default(), ObsState::Initial);
    }

    #[test]
    fn test_holds_resources() {
        assert!(!ObsState::Initial.holds_resources());
        assert!(!ObsState::Starting.holds_resources());
        assert!(!ObsState::Connected.holds_resources());
        assert!(ObsState::Standby.holds_resources());
        assert!(ObsState::Operational.holds_resources());
        assert!(!ObsState::Stopping.holds_resources());
    }

    #[test]
    fn test_phase_targets_follow_state_order() {
        assert_eq!(LifecyclePhase::Connect.target_state(), ObsState::Connected);
        assert_eq!(LifecyclePhase::Claim.target_state(), ObsState::Standby);
        assert_eq!(LifecyclePhase::Prepare.target_state(), ObsState::Operational);
        assert_eq!(LifecyclePhase::Release.target_state(), ObsState::Standby);
        assert_eq!(LifecyclePhase::Quit.target_state(), ObsState::Stopping);
    }

    #[test]
    fn test_quit_is_valid_from_every_state() {
        for state in [
            ObsState::Initial,
            ObsState::Starting,
            ObsState::Connected,
            ObsState::Standby,
            ObsState::Operational,
            ObsState::Stopping,
        ] {
            assert!(LifecyclePhase::Quit.valid_from().contains(&state));
        }
    }

    #[test]
    fn test_prepare_only_valid_from_standby() {
        assert_eq!(LifecyclePhase::Prepare.valid_from(), &[ObsState::Standby]);
    }

    #[test]
    fn test_result_code_display() {
        assert_eq!(format!("{}", ResultCode::NoError), "NoError");
        assert_eq!(format!("{}", ResultCode::ResourceConflict), "ResourceConflict");
    }
}
