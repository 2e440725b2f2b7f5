//! Handle for interacting with a running station controller.

use super::event::{ObservationSnapshot, StartResult, StationEvent};
use crate::observation::{LifecyclePhase, ObsKey, ObservationId, ResultCode};
use tokio::sync::{mpsc, oneshot};

/// Cloneable handle for submitting events to the station controller.
///
/// All methods are non-blocking sends onto the controller's channel;
/// the async ones additionally await the typed reply.
#[derive(Clone)]
pub struct StationHandle {
    events: mpsc::UnboundedSender<StationEvent>,
}

impl StationHandle {
    pub(crate) fn new(events: mpsc::UnboundedSender<StationEvent>) -> Self {
        Self { events }
    }

    /// A clone of the raw event sender, for wiring backends that post
    /// their acknowledgements onto the station channel.
    pub fn sender(&self) -> mpsc::UnboundedSender<StationEvent> {
        self.events.clone()
    }

    /// Requests the start of a new observation and awaits the typed
    /// validation outcome.
    pub async fn start_observation(
        &self,
        obs_id: ObservationId,
        instance_nr: u32,
    ) -> StartResult {
        let (reply_tx, reply_rx) = oneshot::channel();
        let sent = self.events.send(StationEvent::StartObservation {
            obs_id,
            instance_nr,
            reply: Some(reply_tx),
        });
        if sent.is_err() {
            return StartResult::Unspecified;
        }
        reply_rx.await.unwrap_or(StartResult::Unspecified)
    }

    /// Submits a lifecycle request for one observation.
    pub fn request(&self, key: ObsKey, phase: LifecyclePhase) {
        let _ = self.events.send(StationEvent::Request { key, phase });
    }

    /// Aborts one observation with the given reason.
    pub fn abort(&self, key: ObsKey, reason: ResultCode) {
        let _ = self.events.send(StationEvent::Abort { key, reason });
    }

    /// Queries a snapshot of every active observation.
    pub async fn observations(&self) -> Vec<ObservationSnapshot> {
        let (reply_tx, reply_rx) = oneshot::channel();
        if self
            .events
            .send(StationEvent::Snapshot { reply: reply_tx })
            .is_err()
        {
            return Vec::new();
        }
        reply_rx.await.unwrap_or_default()
    }
}

impl std::fmt::Debug for StationHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StationHandle").finish_non_exhaustive()
    }
}
