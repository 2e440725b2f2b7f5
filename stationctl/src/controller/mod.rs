//! Station Controller Framework
//!
//! This module provides the supervisory core of the station: a single
//! event loop arbitrating the shared hardware settings and driving one
//! state machine per running observation.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      StationHandle                           │
//! │  Start observations, submit lifecycle requests, query       │
//! ├─────────────────────────────────────────────────────────────┤
//! │                    StationController                         │
//! │  Main event loop: demux events, guard timers, claims        │
//! ├─────────────────────────────────────────────────────────────┤
//! │  ┌─────────────┐  ┌─────────────┐  ┌─────────────────────┐  │
//! │  │ Active      │  │ Resource    │  │ Telemetry           │  │
//! │  │ Observations│  │ Arbiter     │  │ Sink                │  │
//! │  └─────────────┘  └─────────────┘  └─────────────────────┘  │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Core Concepts
//!
//! - **Observation**: One scheduled measurement. Its lifecycle is a
//!   pure state machine ([`crate::observation::ActiveObservation`])
//!   owned by the controller.
//!
//! - **Claim**: Before the claim reaches an observation's children, the
//!   station hardware is brought to the required clock, splitter and
//!   bit-mode settings. At most one such configuration sequence runs at
//!   a time; later claims are deferred.
//!
//! - **Guard timer**: Every transition awaiting acknowledgements is
//!   covered by a timer; expiry aborts the observation rather than
//!   waiting forever.
//!
//! - **Facades**: Child controllers and the clock board are reached
//!   through the [`crate::child::ChildControl`] and
//!   [`crate::resources::ClockControl`] traits. Their outcomes come
//!   back asynchronously as [`StationEvent`]s.
//!
//! # Example
//!
//! ```ignore
//! use stationctl::controller::{simulated_station, ControllerConfig, NullTelemetrySink};
//! use stationctl::observation::{LifecyclePhase, ObservationId};
//! use stationctl::parset::MemParsetStore;
//! use std::sync::Arc;
//!
//! let parsets = Arc::new(MemParsetStore::new());
//! let (controller, handle, _children, _clock) = simulated_station(
//!     ControllerConfig::default(),
//!     parsets,
//!     Arc::new(NullTelemetrySink),
//! );
//!
//! let shutdown = tokio_util::sync::CancellationToken::new();
//! tokio::spawn(controller.run(shutdown.clone()));
//!
//! let result = handle.start_observation(ObservationId::new("12345"), 0).await;
//! assert!(result.is_ok());
//! ```
//!
//! # Telemetry
//!
//! The controller emits structured events via the [`TelemetrySink`]
//! trait: registrations, state changes, phase reports, station setting
//! changes and guard expiries. It never presents state itself.

mod claim;
mod config;
mod core;
mod event;
mod handle;
mod lifecycle;
mod telemetry;

pub use config::{
    ControllerConfig, DEFAULT_BEAM_HOST, DEFAULT_CALIBRATION_HOST, DEFAULT_GUARD_TIMEOUT_SECS,
    DEFAULT_TRANSIENT_BUFFER_HOST,
};
pub use core::{simulated_station, StationController};
pub use event::{ObservationSnapshot, StartResult, StationEvent};
pub use handle::StationHandle;
pub use telemetry::{LogTelemetrySink, NullTelemetrySink, TelemetryEvent, TelemetrySink};
