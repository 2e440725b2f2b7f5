//! stationctl - Supervisory control core for a radio-telescope station
//!
//! This library drives the per-observation lifecycle (connect, claim,
//! prepare, suspend/resume, release, quit) and arbitrates the shared
//! station hardware settings: the sample clock, the bit mode and the
//! antenna splitters.
//!
//! # High-Level API
//!
//! The [`controller`] module provides the supervisor and its handle:
//!
//! ```ignore
//! use stationctl::controller::{StationController, ControllerConfig, LogTelemetrySink};
//! use stationctl::observation::ObservationId;
//!
//! let (controller, handle) = StationController::new(
//!     ControllerConfig::default(),
//!     children,
//!     clock,
//!     parsets,
//!     telemetry,
//! );
//! tokio::spawn(controller.run(shutdown));
//!
//! let result = handle.start_observation(ObservationId::new("12345"), 0).await;
//! ```

pub mod child;
pub mod config;
pub mod controller;
pub mod logging;
pub mod observation;
pub mod parset;
pub mod resources;

/// Version of the stationctl library and CLI.
///
/// This is synchronized across all components in the workspace.
/// The version is defined in `Cargo.toml` and injected at compile time.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
