//! Station controller core - main struct and run loop.
//!
//! This module contains the [`StationController`] struct and its event
//! loop. Handler methods are implemented in separate modules:
//! - `lifecycle`: observation lifecycle and event demultiplexing
//! - `claim`: the pre-claim configuration sequence (types)
//!
//! The loop is strictly single-threaded: all waiting is a state plus an
//! armed guard timer, never a blocking call, so shared station state
//! needs no locking.

use super::claim::ClaimSequence;
use super::config::ControllerConfig;
use super::event::StationEvent;
use super::handle::StationHandle;
use super::telemetry::TelemetrySink;
use crate::child::ChildControl;
use crate::observation::{ActiveObservation, LifecyclePhase, ObsKey};
use crate::parset::ParsetStore;
use crate::resources::{ClockControl, StationResources};
use futures::StreamExt;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tokio_util::time::{delay_queue, DelayQueue};
use tracing::info;

/// The station's supervisory state machine.
///
/// Owns every [`ActiveObservation`], the station resource state, and
/// the guard timers. Created together with the [`StationHandle`] used
/// to submit events from outside the loop.
pub struct StationController {
    /// Configuration.
    pub(crate) config: ControllerConfig,

    /// Active observations by canonical key.
    pub(crate) observations: HashMap<ObsKey, ActiveObservation>,

    /// Station-wide resource state and arbiter.
    pub(crate) resources: StationResources,

    /// Child controller facade.
    pub(crate) children: Arc<dyn ChildControl>,

    /// Clock/configuration controller facade.
    pub(crate) clock: Arc<dyn ClockControl>,

    /// Observation parameter store.
    pub(crate) parsets: Arc<dyn ParsetStore>,

    /// Telemetry sink for state publication.
    pub(crate) telemetry: Arc<dyn TelemetrySink>,

    /// Receiver for station events.
    pub(crate) event_rx: mpsc::UnboundedReceiver<StationEvent>,

    /// Guard timers, one slot per observation.
    pub(crate) guards: DelayQueue<ObsKey>,

    /// Timer keys for cancelling armed guards.
    pub(crate) guard_keys: HashMap<ObsKey, delay_queue::Key>,

    /// The pre-claim sequence currently in flight, if any.
    pub(crate) claim_active: Option<ClaimSequence>,

    /// Claims deferred while another sequence is in flight.
    pub(crate) claim_queue: VecDeque<ObsKey>,

    /// Requests postponed while their observation's pre-claim sequence
    /// is pending, replayed in arrival order as transitions settle.
    pub(crate) postponed: Vec<(ObsKey, LifecyclePhase)>,

    /// True once shutdown was requested; the loop exits when the last
    /// observation is gone.
    pub(crate) finishing: bool,
}

impl StationController {
    /// Creates a station controller and its handle.
    pub fn new(
        config: ControllerConfig,
        children: Arc<dyn ChildControl>,
        clock: Arc<dyn ClockControl>,
        parsets: Arc<dyn ParsetStore>,
        telemetry: Arc<dyn TelemetrySink>,
    ) -> (Self, StationHandle) {
        let (event_tx, event_rx) = mpsc::unbounded_channel();

        let controller = Self {
            config,
            observations: HashMap::new(),
            resources: StationResources::new(),
            children,
            clock,
            parsets,
            telemetry,
            event_rx,
            guards: DelayQueue::new(),
            guard_keys: HashMap::new(),
            claim_active: None,
            claim_queue: VecDeque::new(),
            postponed: Vec::new(),
            finishing: false,
        };

        (controller, StationHandle::new(event_tx))
    }

    /// Runs the controller until shutdown is signalled and every
    /// observation has shut down.
    pub async fn run(mut self, shutdown: CancellationToken) {
        info!(
            guard_timeout_secs = self.config.guard_timeout.as_secs(),
            "Station controller started"
        );

        loop {
            tokio::select! {
                biased;

                _ = shutdown.cancelled(), if !self.finishing => {
                    self.begin_finishing();
                }

                Some(expired) = self.guards.next() => {
                    self.handle_guard_expired(expired.into_inner());
                }

                event = self.event_rx.recv() => {
                    match event {
                        Some(event) => self.handle_event(event),
                        // Every handle dropped: nothing can reach the
                        // station any more, go down cleanly.
                        None => self.begin_finishing(),
                    }
                }
            }

            self.reap_finished();

            if self.finishing && self.observations.is_empty() {
                break;
            }
        }

        self.telemetry.flush();
        info!("Station controller finished");
    }

    /// Arms (or re-arms) the guard timer for one observation.
    pub(crate) fn arm_guard(&mut self, key: &ObsKey) {
        self.cancel_guard(key);
        let timer_key = self.guards.insert(key.clone(), self.config.guard_timeout);
        self.guard_keys.insert(key.clone(), timer_key);
    }

    /// Cancels the guard timer for one observation, if armed.
    pub(crate) fn cancel_guard(&mut self, key: &ObsKey) {
        if let Some(timer_key) = self.guard_keys.remove(key) {
            self.guards.try_remove(&timer_key);
        }
    }
}

impl std::fmt::Debug for StationController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StationController")
            .field("observations", &self.observations.len())
            .field("claim_active", &self.claim_active)
            .field("claim_queue", &self.claim_queue.len())
            .field("finishing", &self.finishing)
            .finish_non_exhaustive()
    }
}

/// Convenience wiring for a fully in-process station.
///
/// Creates a controller whose child and clock backends loop straight
/// back onto the event channel. Used by the CLI simulation mode and the
/// integration tests.
pub fn simulated_station(
    config: ControllerConfig,
    parsets: Arc<dyn ParsetStore>,
    telemetry: Arc<dyn TelemetrySink>,
) -> (
    StationController,
    StationHandle,
    Arc<crate::child::LoopbackChildControl>,
    Arc<crate::resources::LoopbackClockControl>,
) {
    let children = Arc::new(crate::child::LoopbackChildControl::new());
    let clock = Arc::new(crate::resources::LoopbackClockControl::new());
    let (controller, handle) = StationController::new(
        config,
        children.clone(),
        clock.clone(),
        parsets,
        telemetry,
    );
    children.attach(handle.sender());
    clock.attach(handle.sender());
    (controller, handle, children, clock)
}
