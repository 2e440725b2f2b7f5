//! Outstanding-request side-table.
//!
//! Shared by facade implementations: a request is recorded when it is
//! sent and resolved when its acknowledgement comes back. The
//! supervisor polls the table per observation to decide when all
//! actions for an event have finished.

use super::facade::PendingRequest;
use super::types::ChildName;
use crate::observation::{LifecyclePhase, ObservationId, ResultCode};
use parking_lot::Mutex;
use std::collections::HashMap;

/// Table of requests sent to child controllers that have not yet been
/// acknowledged.
///
/// Keyed by controller name: at most one request per controller can be
/// in flight, matching the strictly sequential phase protocol.
#[derive(Default)]
pub struct PendingTable {
    requests: Mutex<HashMap<ChildName, PendingRequest>>,
}

impl PendingTable {
    /// Creates an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a request sent to a controller.
    ///
    /// A still-outstanding earlier request for the same controller is
    /// superseded; this only happens on abort, where a forced `Quit`
    /// overrides whatever phase was in flight.
    pub fn record(&self, name: ChildName, phase: LifecyclePhase) {
        let request = PendingRequest {
            name: name.clone(),
            phase,
            result: None,
        };
        self.requests.lock().insert(name, request);
    }

    /// Resolves the outstanding request for a controller, removing it.
    ///
    /// Returns the resolved request, or `None` for an unsolicited
    /// acknowledgement (nothing was outstanding).
    pub fn resolve(
        &self,
        name: &ChildName,
        phase: LifecyclePhase,
        result: ResultCode,
    ) -> Option<PendingRequest> {
        let mut requests = self.requests.lock();
        match requests.get(name) {
            Some(pending) if pending.phase == phase => {
                let mut resolved = requests.remove(name)?;
                resolved.result = Some(result);
                Some(resolved)
            }
            _ => None,
        }
    }

    /// Drops every outstanding request for one observation.
    pub fn clear_observation(&self, obs_id: &ObservationId) {
        self.requests
            .lock()
            .retain(|name, _| name.obs_id() != obs_id);
    }

    /// Snapshot of the outstanding requests for one observation.
    pub fn outstanding_for(&self, obs_id: &ObservationId) -> Vec<PendingRequest> {
        self.requests
            .lock()
            .values()
            .filter(|request| request.name.obs_id() == obs_id)
            .cloned()
            .collect()
    }

    /// Total number of outstanding requests.
    pub fn len(&self) -> usize {
        self.requests.lock().len()
    }

    /// Returns true when no requests are outstanding.
    pub fn is_empty(&self) -> bool {
        self.requests.lock().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::child::ChildType;

    fn name(ctype: ChildType, obs: &str) -> ChildName {
        ChildName::new(ctype, 0, ObservationId::new(obs))
    }

    #[test]
    fn test_record_and_resolve() {
        let table = PendingTable::new();
        let cal = name(ChildType::Calibration, "1");

        table.record(cal.clone(), LifecyclePhase::Claim);
        assert_eq!(table.outstanding_for(&ObservationId::new("1")).len(), 1);

        let resolved = table
            .resolve(&cal, LifecyclePhase::Claim, ResultCode::NoError)
            .unwrap();
        assert_eq!(resolved.result, Some(ResultCode::NoError));
        assert!(table.is_empty());
    }

    #[test]
    fn test_unsolicited_ack_is_ignored() {
        let table = PendingTable::new();
        let beam = name(ChildType::Beam, "1");
        assert!(table
            .resolve(&beam, LifecyclePhase::Claim, ResultCode::NoError)
            .is_none());
    }

    #[test]
    fn test_phase_mismatch_is_not_resolved() {
        let table = PendingTable::new();
        let beam = name(ChildType::Beam, "1");
        table.record(beam.clone(), LifecyclePhase::Prepare);

        assert!(table
            .resolve(&beam, LifecyclePhase::Claim, ResultCode::NoError)
            .is_none());
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_outstanding_is_scoped_per_observation() {
        let table = PendingTable::new();
        table.record(name(ChildType::Calibration, "1"), LifecyclePhase::Claim);
        table.record(name(ChildType::Beam, "2"), LifecyclePhase::Claim);

        assert_eq!(table.outstanding_for(&ObservationId::new("1")).len(), 1);
        assert_eq!(table.outstanding_for(&ObservationId::new("2")).len(), 1);

        table.clear_observation(&ObservationId::new("1"));
        assert_eq!(table.outstanding_for(&ObservationId::new("1")).len(), 0);
        assert_eq!(table.len(), 1);
    }
}
