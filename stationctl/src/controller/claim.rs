//! Pre-claim station configuration sequence.
//!
//! Before a claim is forwarded to an observation, the station hardware
//! is brought to the observation's required settings in a strict order:
//! (1) sample clock, (2) antenna splitters, (3) bit mode. Each step is
//! asynchronous; its acknowledgement advances an explicit index. At
//! most one sequence is in flight station-wide; later claims are
//! deferred until it completes.

use crate::observation::{ObsKey, ObservationDescriptor};
use crate::resources::StationResources;

/// One step of the pre-claim configuration sequence.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum ClaimStep {
    /// `SetClock(frequency)`
    Clock(u32),
    /// `SetSplitters(on)`
    Splitters(bool),
    /// `SetBitmode(bits)`
    BitMode(u8),
}

/// The ordered configuration steps for one observation's claim.
///
/// Steps whose required value already matches the station state are
/// omitted; an empty sequence means the claim can be forwarded at once.
#[derive(Debug)]
pub(crate) struct ClaimSequence {
    key: ObsKey,
    steps: Vec<ClaimStep>,
    index: usize,
}

impl ClaimSequence {
    /// Builds the step list for a descriptor against the current
    /// station state. Legality must have been checked beforehand via
    /// the resource arbiter.
    pub(crate) fn build(descriptor: &ObservationDescriptor, resources: &StationResources) -> Self {
        let mut steps = Vec::new();
        if descriptor.sample_clock_mhz != resources.clock_mhz() {
            steps.push(ClaimStep::Clock(descriptor.sample_clock_mhz));
        }
        if descriptor.splitter != resources.splitters_on() {
            steps.push(ClaimStep::Splitters(descriptor.splitter));
        }
        if descriptor.bit_mode != resources.bit_mode() {
            steps.push(ClaimStep::BitMode(descriptor.bit_mode));
        }
        Self {
            key: descriptor.key(),
            steps,
            index: 0,
        }
    }

    /// The observation this sequence configures the station for.
    pub(crate) fn key(&self) -> &ObsKey {
        &self.key
    }

    /// The step currently awaiting its acknowledgement.
    pub(crate) fn current(&self) -> Option<ClaimStep> {
        self.steps.get(self.index).copied()
    }

    /// Advances past the current step.
    pub(crate) fn advance(&mut self) {
        self.index += 1;
    }

    /// True once every step has been acknowledged.
    pub(crate) fn is_complete(&self) -> bool {
        self.index >= self.steps.len()
    }
}
