//! Child controller facade.
//!
//! The facade is the seam between the supervisory core and whatever
//! transport actually reaches the child controller processes. The core
//! fires requests through the trait and receives the outcomes later as
//! events on the station channel; the only synchronous query is the
//! outstanding-request table.

use super::types::{ChildName, ChildType};
use crate::observation::{LifecyclePhase, ObservationId, ResultCode};

/// One outstanding (or just-resolved) request towards a child controller.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PendingRequest {
    /// Canonical name of the controller the request was sent to.
    pub name: ChildName,
    /// The lifecycle transition that was requested.
    pub phase: LifecyclePhase,
    /// The result, once the acknowledgement has arrived.
    pub result: Option<ResultCode>,
}

impl PendingRequest {
    /// Returns true while the acknowledgement is still outstanding.
    pub fn is_outstanding(&self) -> bool {
        self.result.is_none()
    }
}

/// Proxy for starting child controllers and driving their lifecycle.
///
/// All methods except [`pending_requests`](ChildControl::pending_requests)
/// are fire-and-forget: the eventual outcome is delivered asynchronously
/// as a lifecycle event carrying the controller's canonical name.
pub trait ChildControl: Send + Sync {
    /// Start a child controller process for an observation.
    ///
    /// The result arrives later as a `Connect` acknowledgement event.
    fn start_child(&self, ctype: ChildType, obs_id: &ObservationId, instance_nr: u32, host: &str);

    /// Request that a child controller transition to the target phase.
    ///
    /// The result arrives later as the phase's acknowledgement event.
    fn request_state(&self, phase: LifecyclePhase, name: &ChildName);

    /// Requests still outstanding for one observation.
    ///
    /// The supervisor reports an observation's overall lifecycle result
    /// upward once this returns empty for it.
    fn pending_requests(&self, obs_id: &ObservationId) -> Vec<PendingRequest>;
}
