//! CLI command implementations.
//!
//! Each subcommand has its own module with argument definitions and
//! handlers.
//!
//! # Command Modules
//!
//! - [`run`] - Run the station controller
//! - [`check_parset`] - Validate an observation parameter set

pub mod check_parset;
pub mod run;
