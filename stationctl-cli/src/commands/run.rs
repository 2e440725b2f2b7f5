//! Run command - start the station controller.
//!
//! Wires the controller to in-process loopback backends and a
//! directory-backed parameter store, optionally starts a set of
//! observations and drives them to operational, then runs until
//! interrupted.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use stationctl::controller::{
    simulated_station, ControllerConfig, LogTelemetrySink, StationHandle,
};
use stationctl::observation::{LifecyclePhase, ObsKey, ObsState, ObservationId};
use stationctl::parset::DirParsetStore;

use crate::error::CliError;
use crate::runner::CliRunner;

/// How long to wait for a driven observation to settle in a state.
const SETTLE_TIMEOUT: Duration = Duration::from_secs(30);

/// Arguments for the run command.
#[derive(Default)]
pub struct RunArgs {
    pub parset_dir: Option<PathBuf>,
    pub observations: Vec<String>,
}

/// Run the run command.
pub async fn run(runner: &CliRunner, args: RunArgs) -> Result<(), CliError> {
    let config = runner.config();
    let parset_dir = args
        .parset_dir
        .unwrap_or_else(|| config.parset.directory.clone());

    if atty::is(atty::Stream::Stdout) {
        println!("stationctl v{}", stationctl::VERSION);
        println!("  Station:  {}", config.station.name);
        println!("  Parsets:  {}", parset_dir.display());
        println!();
    }

    let parsets = Arc::new(DirParsetStore::new(parset_dir));
    let (controller, handle, _children, _clock) = simulated_station(
        ControllerConfig::from(config),
        parsets,
        Arc::new(LogTelemetrySink),
    );

    let shutdown = CancellationToken::new();
    let controller_task = tokio::spawn(controller.run(shutdown.clone()));

    for obs_id in &args.observations {
        start_and_drive(&handle, obs_id).await?;
    }

    info!("Station controller running, press Ctrl-C to stop");
    tokio::signal::ctrl_c()
        .await
        .map_err(|e| CliError::Runtime(e.to_string()))?;

    info!("Interrupt received, shutting down");
    shutdown.cancel();
    let _ = controller_task.await;
    Ok(())
}

/// Starts one observation and walks it through claim and prepare.
async fn start_and_drive(handle: &StationHandle, obs_id: &str) -> Result<(), CliError> {
    let id = ObservationId::new(obs_id);
    let result = handle.start_observation(id.clone(), 0).await;
    if !result.is_ok() {
        return Err(CliError::Start {
            obs_id: obs_id.to_string(),
            result,
        });
    }

    let key = ObsKey::new(0, id);
    wait_for_state(handle, &key, ObsState::Connected).await?;

    handle.request(key.clone(), LifecyclePhase::Claim);
    wait_for_state(handle, &key, ObsState::Standby).await?;

    handle.request(key.clone(), LifecyclePhase::Prepare);
    wait_for_state(handle, &key, ObsState::Operational).await?;

    info!(obs = %key, "Observation operational");
    Ok(())
}

async fn wait_for_state(
    handle: &StationHandle,
    key: &ObsKey,
    state: ObsState,
) -> Result<(), CliError> {
    let settled = tokio::time::timeout(SETTLE_TIMEOUT, async {
        loop {
            let snapshot = handle.observations().await;
            match snapshot.iter().find(|obs| &obs.key == key) {
                Some(obs) if obs.current == state => return true,
                // Aborted and removed while we were waiting.
                None => return false,
                _ => tokio::time::sleep(Duration::from_millis(20)).await,
            }
        }
    })
    .await;

    match settled {
        Ok(true) => Ok(()),
        Ok(false) => {
            warn!(obs = %key, %state, "Observation was aborted before reaching state");
            Err(CliError::Runtime(format!(
                "observation {key} was aborted before reaching {state}"
            )))
        }
        Err(_) => Err(CliError::Runtime(format!(
            "observation {key} did not reach {state} within {}s",
            SETTLE_TIMEOUT.as_secs()
        ))),
    }
}
