//! Integration tests for the station controller event loop.
//!
//! A controller is spawned with loopback child/clock backends and
//! driven through the observation lifecycle via its handle. Waits are
//! timeout-guarded polls of the snapshot query, which goes through the
//! same event channel as everything else.

use parking_lot::Mutex;
use stationctl::child::{ChildName, ChildType, LoopbackChildControl};
use stationctl::controller::{
    simulated_station, ControllerConfig, NullTelemetrySink, StartResult, StationEvent,
    StationHandle, TelemetryEvent, TelemetrySink,
};
use stationctl::observation::{LifecyclePhase, ObsKey, ObsState, ObservationId, ResultCode};
use stationctl::parset::{MemParsetStore, ParameterSet};
use stationctl::resources::{ClockCommand, LoopbackClockControl};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

struct TestStation {
    handle: StationHandle,
    children: Arc<LoopbackChildControl>,
    clock: Arc<LoopbackClockControl>,
    shutdown: CancellationToken,
}

fn parset_text(clock: u32, bits: u8, tbb: bool) -> String {
    parset_windowed(clock, bits, tbb, "2026-08-25 12:00:00", "2026-08-25 13:00:00")
}

fn parset_windowed(clock: u32, bits: u8, tbb: bool, start: &str, stop: &str) -> String {
    format!(
        "Observation.sampleClock = {clock}\n\
         Observation.bitMode = {bits}\n\
         Observation.startTime = {start}\n\
         Observation.stopTime = {stop}\n\
         Observation.receiverList = 0..95\n\
         Observation.TBB.enabled = {tbb}\n"
    )
}

fn store_with(sets: &[(&str, String)]) -> MemParsetStore {
    let store = MemParsetStore::new();
    for (obs_id, text) in sets {
        store.insert(
            ObservationId::new(*obs_id),
            ParameterSet::from_str(text).unwrap(),
        );
    }
    store
}

/// Sink recording every telemetry event for assertions.
#[derive(Default)]
struct RecordingTelemetry {
    events: Mutex<Vec<TelemetryEvent>>,
}

impl RecordingTelemetry {
    fn phase_reports(&self, phase: LifecyclePhase) -> usize {
        self.events
            .lock()
            .iter()
            .filter(|event| {
                matches!(event, TelemetryEvent::PhaseReported { phase: reported, .. }
                    if *reported == phase)
            })
            .count()
    }
}

impl TelemetrySink for RecordingTelemetry {
    fn emit(&self, event: TelemetryEvent) {
        self.events.lock().push(event);
    }
}

fn spawn_station(parsets: MemParsetStore, guard_timeout: Duration) -> TestStation {
    spawn_station_with_telemetry(parsets, guard_timeout, Arc::new(NullTelemetrySink))
}

fn spawn_station_with_telemetry(
    parsets: MemParsetStore,
    guard_timeout: Duration,
    telemetry: Arc<dyn TelemetrySink>,
) -> TestStation {
    let config = ControllerConfig {
        guard_timeout,
        ..ControllerConfig::default()
    };
    let (controller, handle, children, clock) =
        simulated_station(config, Arc::new(parsets), telemetry);
    let shutdown = CancellationToken::new();
    tokio::spawn(controller.run(shutdown.clone()));
    TestStation {
        handle,
        children,
        clock,
        shutdown,
    }
}

fn key(obs_id: &str) -> ObsKey {
    ObsKey::new(0, ObservationId::new(obs_id))
}

fn child(ctype: ChildType, obs_id: &str) -> ChildName {
    ChildName::new(ctype, 0, ObservationId::new(obs_id))
}

async fn wait_for_state(handle: &StationHandle, key: &ObsKey, state: ObsState) {
    tokio::time::timeout(Duration::from_secs(2), async {
        loop {
            let snapshot = handle.observations().await;
            if snapshot
                .iter()
                .any(|obs| &obs.key == key && obs.current == state)
            {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .unwrap_or_else(|_| panic!("timed out waiting for {key} to reach {state}"));
}

async fn wait_until_removed(handle: &StationHandle, key: &ObsKey) {
    tokio::time::timeout(Duration::from_secs(2), async {
        loop {
            let snapshot = handle.observations().await;
            if !snapshot.iter().any(|obs| &obs.key == key) {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .unwrap_or_else(|_| panic!("timed out waiting for {key} to be removed"));
}

#[tokio::test]
async fn test_full_lifecycle_reaches_operational_and_back() {
    let station = spawn_station(
        store_with(&[("101", parset_text(200, 16, false))]),
        Duration::from_secs(5),
    );
    let key = key("101");

    let result = station
        .handle
        .start_observation(ObservationId::new("101"), 0)
        .await;
    assert_eq!(result, StartResult::NoError);
    wait_for_state(&station.handle, &key, ObsState::Connected).await;

    station.handle.request(key.clone(), LifecyclePhase::Claim);
    wait_for_state(&station.handle, &key, ObsState::Standby).await;

    station.handle.request(key.clone(), LifecyclePhase::Prepare);
    wait_for_state(&station.handle, &key, ObsState::Operational).await;

    station.handle.request(key.clone(), LifecyclePhase::Suspend);
    wait_for_state(&station.handle, &key, ObsState::Standby).await;

    station.handle.request(key.clone(), LifecyclePhase::Resume);
    wait_for_state(&station.handle, &key, ObsState::Operational).await;

    station.handle.request(key.clone(), LifecyclePhase::Release);
    wait_for_state(&station.handle, &key, ObsState::Standby).await;

    station.handle.request(key.clone(), LifecyclePhase::Quit);
    wait_until_removed(&station.handle, &key).await;

    // Matching station defaults: no hardware reconfiguration needed.
    assert!(station.clock.calls().is_empty());
    station.shutdown.cancel();
}

#[tokio::test]
async fn test_duplicate_start_is_rejected() {
    let station = spawn_station(
        store_with(&[("101", parset_text(200, 16, false))]),
        Duration::from_secs(5),
    );

    let first = station
        .handle
        .start_observation(ObservationId::new("101"), 0)
        .await;
    assert_eq!(first, StartResult::NoError);

    let second = station
        .handle
        .start_observation(ObservationId::new("101"), 0)
        .await;
    assert_eq!(second, StartResult::AlreadyRegistered);
    station.shutdown.cancel();
}

#[tokio::test]
async fn test_start_without_parset_is_rejected() {
    let station = spawn_station(store_with(&[]), Duration::from_secs(5));
    let result = station
        .handle
        .start_observation(ObservationId::new("404"), 0)
        .await;
    assert_eq!(result, StartResult::NoParameterSet);
    station.shutdown.cancel();
}

#[tokio::test]
async fn test_conflicting_start_is_rejected_and_running_untouched() {
    let station = spawn_station(
        store_with(&[
            ("101", parset_text(160, 16, false)),
            ("102", parset_text(200, 16, false)),
        ]),
        Duration::from_secs(5),
    );
    let key_a = key("101");

    let result = station
        .handle
        .start_observation(ObservationId::new("101"), 0)
        .await;
    assert_eq!(result, StartResult::NoError);
    wait_for_state(&station.handle, &key_a, ObsState::Connected).await;

    // Overlapping window, different clock: refused outright.
    let result = station
        .handle
        .start_observation(ObservationId::new("102"), 0)
        .await;
    assert_eq!(result, StartResult::ResourceConflict);

    let snapshot = station.handle.observations().await;
    assert_eq!(snapshot.len(), 1);
    assert_eq!(snapshot[0].key, key_a);
    assert_eq!(snapshot[0].current, ObsState::Connected);
    station.shutdown.cancel();
}

#[tokio::test]
async fn test_claim_configures_station_hardware_in_order() {
    let mut text = parset_text(160, 8, false);
    text.push_str("Observation.splitterOn = true\n");
    let station = spawn_station(store_with(&[("101", text)]), Duration::from_secs(5));
    let key = key("101");

    station
        .handle
        .start_observation(ObservationId::new("101"), 0)
        .await;
    wait_for_state(&station.handle, &key, ObsState::Connected).await;

    station.handle.request(key.clone(), LifecyclePhase::Claim);
    wait_for_state(&station.handle, &key, ObsState::Standby).await;

    assert_eq!(
        station.clock.calls(),
        vec![
            ClockCommand::SetClock(160),
            ClockCommand::SetSplitters(true),
            ClockCommand::SetBitMode(8),
        ]
    );
    station.shutdown.cancel();
}

#[tokio::test]
async fn test_concurrent_claims_serialize_on_the_clock_controller() {
    let station = spawn_station(
        store_with(&[
            ("101", parset_text(160, 16, false)),
            ("102", parset_text(160, 16, false)),
        ]),
        Duration::from_secs(5),
    );
    let key_a = key("101");
    let key_b = key("102");

    for obs_id in ["101", "102"] {
        let result = station
            .handle
            .start_observation(ObservationId::new(obs_id), 0)
            .await;
        assert_eq!(result, StartResult::NoError);
    }
    wait_for_state(&station.handle, &key_a, ObsState::Connected).await;
    wait_for_state(&station.handle, &key_b, ObsState::Connected).await;

    // Hold the clock ack: the first claim stays in flight, the second
    // is deferred behind it.
    station.clock.hold();
    station.handle.request(key_a.clone(), LifecyclePhase::Claim);
    station.handle.request(key_b.clone(), LifecyclePhase::Claim);

    let snapshot = station.handle.observations().await;
    for obs in &snapshot {
        assert_eq!(obs.current, ObsState::Connected);
    }

    assert!(station.clock.release());
    wait_for_state(&station.handle, &key_a, ObsState::Standby).await;
    wait_for_state(&station.handle, &key_b, ObsState::Standby).await;

    // The station was reconfigured exactly once; the deferred claim
    // found the settings already in place.
    assert_eq!(station.clock.calls(), vec![ClockCommand::SetClock(160)]);
    station.shutdown.cancel();
}

#[tokio::test]
async fn test_claim_refused_while_settings_in_use() {
    let station = spawn_station(
        store_with(&[
            ("101", parset_text(160, 16, false)),
            (
                "102",
                parset_windowed(200, 16, false, "2026-08-25 14:00:00", "2026-08-25 15:00:00"),
            ),
        ]),
        Duration::from_secs(5),
    );
    let key_a = key("101");
    let key_b = key("102");

    for obs_id in ["101", "102"] {
        station
            .handle
            .start_observation(ObservationId::new(obs_id), 0)
            .await;
    }
    station.handle.request(key_a.clone(), LifecyclePhase::Claim);
    wait_for_state(&station.handle, &key_a, ObsState::Standby).await;

    // The station runs at 160 MHz for observation 101 now; 102 cannot
    // claim 200 MHz and is aborted.
    station.handle.request(key_b.clone(), LifecyclePhase::Claim);
    wait_until_removed(&station.handle, &key_b).await;

    let snapshot = station.handle.observations().await;
    assert_eq!(snapshot.len(), 1);
    assert_eq!(snapshot[0].current, ObsState::Standby);
    station.shutdown.cancel();
}

#[tokio::test]
async fn test_out_of_band_clock_change_aborts_dependent_observation() {
    let station = spawn_station(
        store_with(&[("101", parset_text(200, 16, false))]),
        Duration::from_secs(5),
    );
    let key = key("101");

    station
        .handle
        .start_observation(ObservationId::new("101"), 0)
        .await;
    station.handle.request(key.clone(), LifecyclePhase::Claim);
    wait_for_state(&station.handle, &key, ObsState::Standby).await;

    // The hardware monitor reports a clock change made from outside
    // the controller; the running observation needs 200 MHz.
    station.clock.report_clock(160);
    wait_until_removed(&station.handle, &key).await;
    station.shutdown.cancel();
}

#[tokio::test]
async fn test_out_of_band_bit_mode_change_spares_matching_observation() {
    let station = spawn_station(
        store_with(&[("101", parset_text(200, 16, false))]),
        Duration::from_secs(5),
    );
    let key = key("101");

    station
        .handle
        .start_observation(ObservationId::new("101"), 0)
        .await;
    station.handle.request(key.clone(), LifecyclePhase::Claim);
    wait_for_state(&station.handle, &key, ObsState::Standby).await;

    // Reported value matches what the observation already depends on.
    station.clock.report_bit_mode(16);

    let snapshot = station.handle.observations().await;
    assert_eq!(snapshot.len(), 1);
    assert_eq!(snapshot[0].current, ObsState::Standby);
    station.shutdown.cancel();
}

#[tokio::test]
async fn test_settled_phase_is_reported_once() {
    let telemetry = Arc::new(RecordingTelemetry::default());
    let station = spawn_station_with_telemetry(
        store_with(&[("101", parset_text(200, 16, false))]),
        Duration::from_secs(5),
        telemetry.clone(),
    );
    let key = key("101");

    station
        .handle
        .start_observation(ObservationId::new("101"), 0)
        .await;
    station.handle.request(key.clone(), LifecyclePhase::Claim);
    wait_for_state(&station.handle, &key, ObsState::Standby).await;

    // Re-deliver an acknowledgement for the already settled claim.
    station
        .handle
        .sender()
        .send(StationEvent::ChildAck {
            name: child(ChildType::Beam, "101"),
            phase: LifecyclePhase::Claim,
            result: ResultCode::NoError,
        })
        .unwrap();
    // A snapshot query round-trips the channel behind the duplicate.
    let _ = station.handle.observations().await;

    assert_eq!(telemetry.phase_reports(LifecyclePhase::Claim), 1);
    station.shutdown.cancel();
}

#[tokio::test]
async fn test_request_during_claim_sequence_is_postponed() {
    let station = spawn_station(
        store_with(&[("101", parset_text(160, 16, false))]),
        Duration::from_secs(5),
    );
    let key = key("101");

    station
        .handle
        .start_observation(ObservationId::new("101"), 0)
        .await;
    wait_for_state(&station.handle, &key, ObsState::Connected).await;

    // Hold the clock ack so the prepare arrives mid-sequence.
    station.clock.hold();
    station.handle.request(key.clone(), LifecyclePhase::Claim);
    station.handle.request(key.clone(), LifecyclePhase::Prepare);

    let snapshot = station.handle.observations().await;
    assert_eq!(snapshot[0].current, ObsState::Connected);

    // Once the sequence completes, the claim settles and the postponed
    // prepare is replayed.
    assert!(station.clock.release());
    wait_for_state(&station.handle, &key, ObsState::Operational).await;
    station.shutdown.cancel();
}

#[tokio::test]
async fn test_prepare_and_release_child_ordering() {
    let station = spawn_station(
        store_with(&[("101", parset_text(200, 16, true))]),
        Duration::from_secs(5),
    );
    let key = key("101");

    station
        .handle
        .start_observation(ObservationId::new("101"), 0)
        .await;
    station.handle.request(key.clone(), LifecyclePhase::Claim);
    wait_for_state(&station.handle, &key, ObsState::Standby).await;

    station.handle.request(key.clone(), LifecyclePhase::Prepare);
    wait_for_state(&station.handle, &key, ObsState::Operational).await;

    station.handle.request(key.clone(), LifecyclePhase::Release);
    wait_for_state(&station.handle, &key, ObsState::Standby).await;

    let requests = station.children.requests();
    let prepare_order: Vec<ChildType> = requests
        .iter()
        .filter(|(_, phase)| *phase == LifecyclePhase::Prepare)
        .map(|(name, _)| name.ctype())
        .collect();
    assert_eq!(
        prepare_order,
        vec![
            ChildType::Calibration,
            ChildType::Beam,
            ChildType::TransientBuffer,
        ]
    );

    let release_order: Vec<ChildType> = requests
        .iter()
        .filter(|(_, phase)| *phase == LifecyclePhase::Release)
        .map(|(name, _)| name.ctype())
        .collect();
    assert_eq!(
        release_order,
        vec![
            ChildType::Beam,
            ChildType::Calibration,
            ChildType::TransientBuffer,
        ]
    );
    station.shutdown.cancel();
}

#[tokio::test]
async fn test_transient_buffer_prepare_failure_is_tolerated() {
    let station = spawn_station(
        store_with(&[("101", parset_text(200, 16, true))]),
        Duration::from_secs(5),
    );
    let key = key("101");

    station
        .handle
        .start_observation(ObservationId::new("101"), 0)
        .await;
    station.handle.request(key.clone(), LifecyclePhase::Claim);
    wait_for_state(&station.handle, &key, ObsState::Standby).await;

    station.children.fail(
        ChildType::TransientBuffer,
        LifecyclePhase::Prepare,
        ResultCode::Unspecified,
    );
    station.handle.request(key.clone(), LifecyclePhase::Prepare);
    wait_for_state(&station.handle, &key, ObsState::Operational).await;

    // The transient buffer is disabled from here on: a release only
    // reaches beam and calibration.
    station.handle.request(key.clone(), LifecyclePhase::Release);
    wait_for_state(&station.handle, &key, ObsState::Standby).await;

    let release_order: Vec<ChildType> = station
        .children
        .requests()
        .iter()
        .filter(|(_, phase)| *phase == LifecyclePhase::Release)
        .map(|(name, _)| name.ctype())
        .collect();
    assert_eq!(release_order, vec![ChildType::Beam, ChildType::Calibration]);
    station.shutdown.cancel();
}

#[tokio::test]
async fn test_guard_timeout_aborts_stuck_observation() {
    let station = spawn_station(
        store_with(&[("101", parset_text(200, 16, false))]),
        Duration::from_millis(100),
    );
    let key = key("101");

    // The beam controller never reports its connect.
    station
        .children
        .silence(ChildType::Beam, LifecyclePhase::Connect);

    let result = station
        .handle
        .start_observation(ObservationId::new("101"), 0)
        .await;
    assert_eq!(result, StartResult::NoError);

    wait_until_removed(&station.handle, &key).await;
    station.shutdown.cancel();
}

#[tokio::test]
async fn test_unsolicited_child_death_aborts_observation() {
    let station = spawn_station(
        store_with(&[("101", parset_text(200, 16, false))]),
        Duration::from_secs(5),
    );
    let key = key("101");

    station
        .handle
        .start_observation(ObservationId::new("101"), 0)
        .await;
    station.handle.request(key.clone(), LifecyclePhase::Claim);
    wait_for_state(&station.handle, &key, ObsState::Standby).await;
    station.handle.request(key.clone(), LifecyclePhase::Prepare);
    wait_for_state(&station.handle, &key, ObsState::Operational).await;

    station.children.kill(child(ChildType::Beam, "101"));
    wait_until_removed(&station.handle, &key).await;
    station.shutdown.cancel();
}

#[tokio::test]
async fn test_abort_quits_observation() {
    let station = spawn_station(
        store_with(&[("101", parset_text(200, 16, false))]),
        Duration::from_secs(5),
    );
    let key = key("101");

    station
        .handle
        .start_observation(ObservationId::new("101"), 0)
        .await;
    wait_for_state(&station.handle, &key, ObsState::Connected).await;

    station
        .handle
        .abort(key.clone(), ResultCode::LostConnection);
    wait_until_removed(&station.handle, &key).await;
    station.shutdown.cancel();
}

#[tokio::test]
async fn test_shutdown_quits_all_observations_and_exits() {
    let station = spawn_station(
        store_with(&[
            ("101", parset_text(200, 16, false)),
            ("102", parset_text(200, 16, false)),
        ]),
        Duration::from_secs(5),
    );

    for obs_id in ["101", "102"] {
        station
            .handle
            .start_observation(ObservationId::new(obs_id), 0)
            .await;
    }
    wait_for_state(&station.handle, &key("101"), ObsState::Connected).await;
    wait_for_state(&station.handle, &key("102"), ObsState::Connected).await;

    station.shutdown.cancel();
    wait_until_removed(&station.handle, &key("101")).await;
    wait_until_removed(&station.handle, &key("102")).await;
}
