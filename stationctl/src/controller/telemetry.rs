//! Telemetry for station and observation state.
//!
//! The controller publishes its state through a sink abstraction: it
//! emits structured events and does not know how they are consumed.
//! A production deployment plugs in a sink writing to the station's
//! state database; the library ships a null sink and a tracing-backed
//! sink.

use crate::observation::{LifecyclePhase, ObsKey, ObsState, ResultCode};
use tracing::info;

/// Events emitted by the station controller.
#[derive(Clone, Debug)]
pub enum TelemetryEvent {
    /// A new observation was accepted; its identity is now public.
    ObservationRegistered {
        /// Canonical observation key.
        key: ObsKey,
    },

    /// An observation's lifecycle state changed.
    StateChanged {
        /// Canonical observation key.
        key: ObsKey,
        /// Previous state.
        from: ObsState,
        /// New current state.
        to: ObsState,
    },

    /// All actions for a lifecycle event finished; the overall result
    /// is being reported upward.
    PhaseReported {
        /// Canonical observation key.
        key: ObsKey,
        /// The phase the report is for.
        phase: LifecyclePhase,
        /// Overall result of the phase.
        result: ResultCode,
    },

    /// The station sample clock changed.
    ClockChanged {
        /// New clock in MHz.
        clock_mhz: u32,
    },

    /// The station bit mode changed.
    BitModeChanged {
        /// New bit mode.
        bit_mode: u8,
    },

    /// The antenna splitters changed.
    SplittersChanged {
        /// New splitter state.
        on: bool,
    },

    /// A guard timer expired for an observation.
    GuardExpired {
        /// Canonical observation key.
        key: ObsKey,
    },

    /// An observation fully shut down and was removed.
    ObservationFinished {
        /// Canonical observation key.
        key: ObsKey,
        /// Final result of the observation.
        result: ResultCode,
    },

    /// The controller is going down; telemetry should be flushed.
    ControllerFinishing,
}

/// Consumer of controller telemetry.
pub trait TelemetrySink: Send + Sync {
    /// Handle one event.
    fn emit(&self, event: TelemetryEvent);

    /// Flush any buffered state. Called once during shutdown.
    fn flush(&self) {}
}

/// Sink that discards every event.
pub struct NullTelemetrySink;

impl TelemetrySink for NullTelemetrySink {
    fn emit(&self, _event: TelemetryEvent) {}
}

/// Sink that logs every event through `tracing`.
pub struct LogTelemetrySink;

impl TelemetrySink for LogTelemetrySink {
    fn emit(&self, event: TelemetryEvent) {
        match event {
            TelemetryEvent::ObservationRegistered { key } => {
                info!(obs = %key, "Observation registered");
            }
            TelemetryEvent::StateChanged { key, from, to } => {
                info!(obs = %key, %from, %to, "Observation state changed");
            }
            TelemetryEvent::PhaseReported { key, phase, result } => {
                info!(obs = %key, %phase, %result, "Phase result reported");
            }
            TelemetryEvent::ClockChanged { clock_mhz } => {
                info!(clock_mhz, "Station clock changed");
            }
            TelemetryEvent::BitModeChanged { bit_mode } => {
                info!(bit_mode, "Station bit mode changed");
            }
            TelemetryEvent::SplittersChanged { on } => {
                info!(splitters = on, "Station splitters changed");
            }
            TelemetryEvent::GuardExpired { key } => {
                info!(obs = %key, "Guard timer expired");
            }
            TelemetryEvent::ObservationFinished { key, result } => {
                info!(obs = %key, %result, "Observation finished");
            }
            TelemetryEvent::ControllerFinishing => {
                info!("Station controller finishing");
            }
        }
    }
}
