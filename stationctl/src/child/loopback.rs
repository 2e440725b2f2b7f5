//! In-process child controller backend.
//!
//! Acknowledges every request by posting the matching event back onto
//! the station channel, while keeping the outstanding-request table
//! consistent. Individual (controller type, phase) pairs can be
//! scripted to fail or to never answer, and unsolicited child deaths
//! can be injected. Backs the CLI simulation mode and the test suite.

use super::facade::{ChildControl, PendingRequest};
use super::pending::PendingTable;
use super::types::{ChildName, ChildType};
use crate::controller::StationEvent;
use crate::observation::{LifecyclePhase, ObservationId, ResultCode};
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use tokio::sync::mpsc;
use tracing::warn;

/// Scriptable in-process implementation of [`ChildControl`].
#[derive(Default)]
pub struct LoopbackChildControl {
    events: Mutex<Option<mpsc::UnboundedSender<StationEvent>>>,
    pending: PendingTable,
    /// Requests received, in order (for sequencing assertions).
    requests: Mutex<Vec<(ChildName, LifecyclePhase)>>,
    /// One-shot scripted failures per (type, phase).
    failures: Mutex<HashMap<(ChildType, LifecyclePhase), ResultCode>>,
    /// (type, phase) pairs that never get acknowledged.
    silenced: Mutex<HashSet<(ChildType, LifecyclePhase)>>,
}

impl LoopbackChildControl {
    /// Creates a loopback backend; call [`attach`](Self::attach) before
    /// use.
    pub fn new() -> Self {
        Self::default()
    }

    /// Connects the backend to the station event channel.
    pub fn attach(&self, events: mpsc::UnboundedSender<StationEvent>) {
        *self.events.lock() = Some(events);
    }

    /// Scripts the next request of this (type, phase) to be
    /// acknowledged with `result`.
    pub fn fail(&self, ctype: ChildType, phase: LifecyclePhase, result: ResultCode) {
        self.failures.lock().insert((ctype, phase), result);
    }

    /// Scripts requests of this (type, phase) to never be acknowledged,
    /// leaving the guard timer to fire.
    pub fn silence(&self, ctype: ChildType, phase: LifecyclePhase) {
        self.silenced.lock().insert((ctype, phase));
    }

    /// Injects an unsolicited child death: a `Quited` acknowledgement
    /// nobody asked for.
    pub fn kill(&self, name: ChildName) {
        self.post(StationEvent::ChildAck {
            name,
            phase: LifecyclePhase::Quit,
            result: ResultCode::LostConnection,
        });
    }

    /// Requests received so far, in order.
    pub fn requests(&self) -> Vec<(ChildName, LifecyclePhase)> {
        self.requests.lock().clone()
    }

    fn post(&self, event: StationEvent) {
        let guard = self.events.lock();
        match guard.as_ref() {
            Some(tx) => {
                if tx.send(event).is_err() {
                    warn!("Station channel closed, dropping child event");
                }
            }
            None => warn!("Loopback child control not attached, dropping event"),
        }
    }

    fn scripted_result(&self, ctype: ChildType, phase: LifecyclePhase) -> Option<ResultCode> {
        if self.silenced.lock().contains(&(ctype, phase)) {
            return None;
        }
        Some(
            self.failures
                .lock()
                .remove(&(ctype, phase))
                .unwrap_or(ResultCode::NoError),
        )
    }
}

impl ChildControl for LoopbackChildControl {
    fn start_child(&self, ctype: ChildType, obs_id: &ObservationId, instance_nr: u32, _host: &str) {
        let name = ChildName::new(ctype, instance_nr, obs_id.clone());
        self.requests
            .lock()
            .push((name.clone(), LifecyclePhase::Connect));

        if let Some(result) = self.scripted_result(ctype, LifecyclePhase::Connect) {
            self.post(StationEvent::ChildConnected { name, result });
        }
    }

    fn request_state(&self, phase: LifecyclePhase, name: &ChildName) {
        self.requests.lock().push((name.clone(), phase));
        self.pending.record(name.clone(), phase);

        let Some(result) = self.scripted_result(name.ctype(), phase) else {
            return;
        };
        // The transport edge resolves the side-table before the ack is
        // seen by the supervisor.
        self.pending.resolve(name, phase, result);
        self.post(StationEvent::ChildAck {
            name: name.clone(),
            phase,
            result,
        });
    }

    fn pending_requests(&self, obs_id: &ObservationId) -> Vec<PendingRequest> {
        self.pending.outstanding_for(obs_id)
    }
}
