//! Observation identity, descriptors and the lifecycle state machine.

mod active;
mod descriptor;
mod state;

pub use active::{Action, ActiveObservation};
pub use descriptor::{ObsKey, ObservationDescriptor, ObservationId};
pub use state::{LifecyclePhase, ObsState, ResultCode};
