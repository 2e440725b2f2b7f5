//! stationctl CLI - Command-line interface
//!
//! This binary provides a command-line interface to the stationctl
//! library: running the station controller and validating observation
//! parameter sets.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod commands;
mod error;
mod runner;

use error::CliError;
use runner::CliRunner;

#[derive(Parser)]
#[command(name = "stationctl")]
#[command(about = "Supervisory controller for a radio-telescope station", long_about = None)]
#[command(version)]
struct Cli {
    /// Enable debug logging
    #[arg(long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the station controller with in-process backends
    Run {
        /// Directory holding Observation<id>.parset files
        /// (defaults to the configured parset directory)
        #[arg(long)]
        parset_dir: Option<PathBuf>,

        /// Observation ids to start and drive to operational
        /// (repeatable)
        #[arg(long = "observation")]
        observations: Vec<String>,
    },

    /// Validate an observation parameter set file
    CheckParset {
        /// Path to the .parset file
        path: PathBuf,
    },
}

fn main() {
    let cli = Cli::parse();
    if let Err(error) = dispatch(cli) {
        error.exit();
    }
}

fn dispatch(cli: Cli) -> Result<(), CliError> {
    match cli.command {
        Commands::Run {
            parset_dir,
            observations,
        } => {
            let runner = CliRunner::with_debug(cli.debug)?;
            runner.log_startup("run");

            let runtime = tokio::runtime::Runtime::new()
                .map_err(|e| CliError::Runtime(e.to_string()))?;
            runtime.block_on(commands::run::run(
                &runner,
                commands::run::RunArgs {
                    parset_dir,
                    observations,
                },
            ))
        }
        Commands::CheckParset { path } => commands::check_parset::run(&path),
    }
}
