//! Station controller event vocabulary.
//!
//! Everything the supervisor reacts to arrives as a [`StationEvent`] on
//! its single channel: new-observation requests from the scheduling
//! side, lifecycle requests and acknowledgements, and the clock
//! controller's configuration acks. Guard expiries and shutdown are
//! internal to the run loop.

use crate::child::ChildName;
use crate::observation::{LifecyclePhase, ObsKey, ObsState, ObservationId, ResultCode};
use std::fmt;
use tokio::sync::oneshot;

/// Typed result of a start-observation request.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StartResult {
    /// The observation was accepted and is starting.
    NoError,
    /// An observation with the same key is already registered.
    AlreadyRegistered,
    /// No (valid) parameter set exists for the observation.
    NoParameterSet,
    /// The observation's clock, bit mode or time window conflicts with
    /// a running observation.
    ResourceConflict,
    /// The observation is not known to the station controller.
    UnknownObservation,
    /// Any other failure.
    Unspecified,
}

impl StartResult {
    /// Returns true when the observation was accepted.
    pub fn is_ok(&self) -> bool {
        matches!(self, Self::NoError)
    }
}

impl fmt::Display for StartResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoError => write!(f, "NoError"),
            Self::AlreadyRegistered => write!(f, "AlreadyRegistered"),
            Self::NoParameterSet => write!(f, "NoParameterSet"),
            Self::ResourceConflict => write!(f, "ResourceConflict"),
            Self::UnknownObservation => write!(f, "UnknownObservation"),
            Self::Unspecified => write!(f, "Unspecified"),
        }
    }
}

/// Point-in-time view of one active observation.
#[derive(Clone, Debug)]
pub struct ObservationSnapshot {
    /// Canonical observation key.
    pub key: ObsKey,
    /// Current lifecycle state.
    pub current: ObsState,
    /// Requested lifecycle state (`current` lags while children are
    /// outstanding).
    pub requested: ObsState,
    /// True once the observation has fully shut down.
    pub finished: bool,
}

/// An event delivered to the station controller's run loop.
#[derive(Debug)]
pub enum StationEvent {
    /// Request to start a new observation.
    ///
    /// The descriptor is loaded from the parameter store; the typed
    /// outcome is sent on `reply` once validation has run.
    StartObservation {
        /// Observation (tree) id to look up in the parameter store.
        obs_id: ObservationId,
        /// Instance number assigned by the scheduler.
        instance_nr: u32,
        /// Reply channel for the typed start result.
        reply: Option<oneshot::Sender<StartResult>>,
    },

    /// Lifecycle request from the parent scheduling side for one
    /// observation (claim, prepare, suspend, resume, release, quit).
    Request {
        /// Canonical key of the target observation.
        key: ObsKey,
        /// Requested lifecycle phase.
        phase: LifecyclePhase,
    },

    /// A child controller finished starting (or failed to).
    ChildConnected {
        /// Canonical name of the child controller.
        name: ChildName,
        /// Connect outcome.
        result: ResultCode,
    },

    /// Acknowledgement of a lifecycle request from a child controller.
    ///
    /// A `Quit` acknowledgement that was never requested signals an
    /// unsolicited child death.
    ChildAck {
        /// Canonical name of the child controller.
        name: ChildName,
        /// Acknowledged lifecycle phase.
        phase: LifecyclePhase,
        /// Result carried on the acknowledgement.
        result: ResultCode,
    },

    /// Acknowledgement of a `SetClock` request, or an out-of-band
    /// clock change observed by the hardware monitor.
    ClockAck {
        /// Sample clock actually in effect, in MHz.
        clock_mhz: u32,
        /// Outcome of the clock change.
        result: ResultCode,
    },

    /// Acknowledgement of a `SetSplitters` request, or an out-of-band
    /// splitter change observed by the hardware monitor.
    SplittersAck {
        /// Splitter state actually in effect.
        on: bool,
        /// Outcome of the splitter change.
        result: ResultCode,
    },

    /// Acknowledgement of a `SetBitmode` request, or an out-of-band
    /// bit mode change observed by the hardware monitor.
    BitModeAck {
        /// Bit mode actually in effect.
        bit_mode: u8,
        /// Outcome of the bit mode change.
        result: ResultCode,
    },

    /// Abort one observation (synthetic quit, accepted from any state).
    Abort {
        /// Canonical key of the observation to abort.
        key: ObsKey,
        /// Result code to record as the abort reason.
        reason: ResultCode,
    },

    /// Snapshot query of all active observations.
    Snapshot {
        /// Reply channel for the snapshot.
        reply: oneshot::Sender<Vec<ObservationSnapshot>>,
    },
}
