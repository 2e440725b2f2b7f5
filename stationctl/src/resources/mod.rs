//! Station-wide resources: the arbiter and the clock controller facade.

mod clockctl;
mod state;

pub use clockctl::{ClockCommand, ClockControl, LoopbackClockControl};
pub use state::{
    ResourceNeeds, StationResources, DEFAULT_BIT_MODE, DEFAULT_SAMPLE_CLOCK_MHZ,
};
