//! Active observation state machine.
//!
//! One instance per running observation. The machine is pure: every
//! handler mutates local state and returns the [`Action`]s the
//! supervisor must execute (start a child, request a child state, arm
//! or cancel the guard timer). No I/O happens here, which makes every
//! transition testable without a live event loop.
//!
//! Phase discipline:
//! - readiness flags are reset at the start of every phase and are
//!   monotonic within it (re-delivered acknowledgements are ignored),
//! - `current` lags `requested` until every participating child has
//!   acknowledged, then snaps to it,
//! - `Claim`, `Suspend` and `Resume` are broadcast; `Prepare` runs
//!   calibration → beam → transient-buffer sequentially and `Release`
//!   the reverse,
//! - a transient-buffer failure during `Prepare` is tolerated: the
//!   child is disabled for the rest of the observation,
//! - a `Quit` is accepted from any state and resolves into `Stopping`.

use super::descriptor::{ObsKey, ObservationDescriptor};
use super::state::{LifecyclePhase, ObsState, ResultCode};
use crate::child::{ChildName, ChildType};
use std::collections::{HashMap, HashSet};
use tracing::{debug, warn};

/// An effect the supervisor must carry out for the observation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Action {
    /// Start a child controller of the given type.
    StartChild {
        /// Controller type to start.
        ctype: ChildType,
    },
    /// Request a lifecycle transition from a child controller.
    RequestChild {
        /// Canonical name of the target controller.
        name: ChildName,
        /// Requested phase.
        phase: LifecyclePhase,
    },
    /// Arm (or re-arm) the observation's guard timer.
    ArmGuard,
    /// Cancel the observation's guard timer.
    CancelGuard,
}

/// State machine for one running observation.
pub struct ActiveObservation {
    descriptor: ObservationDescriptor,
    key: ObsKey,
    current: ObsState,
    requested: ObsState,
    /// Transition currently in flight, if any.
    phase: Option<LifecyclePhase>,
    /// Readiness per participating child for the phase in flight.
    ready: HashMap<ChildName, bool>,
    /// Remaining children of a sequential phase, front first.
    sequence: Vec<ChildName>,
    /// Children started for this observation (quit targets).
    started: Vec<ChildName>,
    /// Children confirmed down.
    down: HashSet<ChildName>,
    /// Phase that settled most recently, pending upward report.
    completed: Option<LifecyclePhase>,
    /// Transient-buffer child permissively disabled for the rest of
    /// the observation.
    tbb_disabled: bool,
    finished: bool,
    last_result: ResultCode,
}

impl ActiveObservation {
    /// Creates the machine in `Initial` for a validated descriptor.
    pub fn new(descriptor: ObservationDescriptor) -> Self {
        let key = descriptor.key();
        Self {
            descriptor,
            key,
            current: ObsState::Initial,
            requested: ObsState::Initial,
            phase: None,
            ready: HashMap::new(),
            sequence: Vec::new(),
            started: Vec::new(),
            down: HashSet::new(),
            completed: None,
            tbb_disabled: false,
            finished: false,
            last_result: ResultCode::NoError,
        }
    }

    /// Canonical observation key.
    pub fn key(&self) -> &ObsKey {
        &self.key
    }

    /// The observation's descriptor.
    pub fn descriptor(&self) -> &ObservationDescriptor {
        &self.descriptor
    }

    /// Mutable descriptor access, for recording the hardware-corrected
    /// receiver selection.
    pub fn descriptor_mut(&mut self) -> &mut ObservationDescriptor {
        &mut self.descriptor
    }

    /// Current lifecycle state.
    pub fn current(&self) -> ObsState {
        self.current
    }

    /// Requested lifecycle state.
    pub fn requested(&self) -> ObsState {
        self.requested
    }

    /// True once every child has confirmed shutdown (or the guard
    /// forced it). The owner is responsible for destruction.
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Result of the last completed or aborted transition.
    pub fn last_result(&self) -> ResultCode {
        self.last_result
    }

    /// Consumes the phase whose transition settled most recently.
    ///
    /// Returns `None` once taken, so a settled phase is reported
    /// upward exactly once however many late acknowledgements arrive.
    pub fn take_completed(&mut self) -> Option<LifecyclePhase> {
        self.completed.take()
    }

    /// Child controller types this observation needs right now.
    ///
    /// Calibration and beam always; transient-buffer when requested and
    /// not permissively disabled.
    fn enabled_types(&self) -> Vec<ChildType> {
        let mut types = vec![ChildType::Calibration, ChildType::Beam];
        if self.descriptor.transient_buffer && !self.tbb_disabled {
            types.push(ChildType::TransientBuffer);
        }
        types
    }

    fn child_name(&self, ctype: ChildType) -> ChildName {
        ChildName::new(
            ctype,
            self.descriptor.instance_nr,
            self.descriptor.obs_id.clone(),
        )
    }

    /// Starts the observation: `Initial → Starting`, child controllers
    /// launched, guard armed.
    pub fn start(&mut self) -> Vec<Action> {
        debug_assert_eq!(self.current, ObsState::Initial);
        self.current = ObsState::Starting;
        self.requested = ObsState::Connected;
        self.phase = Some(LifecyclePhase::Connect);

        let mut actions = Vec::new();
        let mut participants = Vec::new();
        for ctype in self.enabled_types() {
            let name = self.child_name(ctype);
            self.started.push(name.clone());
            participants.push(name);
            actions.push(Action::StartChild { ctype });
        }
        self.reset_ready(participants);
        actions.push(Action::ArmGuard);
        actions
    }

    /// Handles a lifecycle request from the parent side.
    pub fn handle_request(&mut self, phase: LifecyclePhase) -> Vec<Action> {
        if phase == LifecyclePhase::Quit {
            return self.quit(ResultCode::NoError);
        }
        if self.finished || self.current == ObsState::Stopping {
            debug!(obs = %self.key, %phase, "Ignoring request while stopping");
            return Vec::new();
        }
        if !phase.valid_from().contains(&self.current) {
            warn!(
                obs = %self.key,
                %phase,
                state = %self.current,
                "Request not valid in current state, ignored"
            );
            return Vec::new();
        }
        if self.phase.is_some() {
            warn!(obs = %self.key, %phase, "A transition is already in flight, ignored");
            return Vec::new();
        }

        self.phase = Some(phase);
        self.requested = phase.target_state();

        let participants: Vec<ChildName> = self
            .enabled_types()
            .into_iter()
            .map(|ctype| self.child_name(ctype))
            .collect();
        self.reset_ready(participants.clone());

        let mut actions = Vec::new();
        match phase {
            LifecyclePhase::Claim | LifecyclePhase::Suspend | LifecyclePhase::Resume => {
                self.sequence.clear();
                for name in participants {
                    actions.push(Action::RequestChild { name, phase });
                }
            }
            LifecyclePhase::Prepare => {
                // Later stages depend on the earlier ones succeeding.
                self.sequence = participants;
                let first = self.sequence.remove(0);
                actions.push(Action::RequestChild { name: first, phase });
            }
            LifecyclePhase::Release => {
                self.sequence = self.release_order(&participants);
                let first = self.sequence.remove(0);
                actions.push(Action::RequestChild { name: first, phase });
            }
            LifecyclePhase::Connect | LifecyclePhase::Quit => unreachable!("handled above"),
        }
        actions.push(Action::ArmGuard);
        actions
    }

    /// Release undoes prepare in reverse: beam first, then calibration,
    /// then transient-buffer.
    fn release_order(&self, participants: &[ChildName]) -> Vec<ChildName> {
        let mut order = Vec::with_capacity(participants.len());
        for ctype in [
            ChildType::Beam,
            ChildType::Calibration,
            ChildType::TransientBuffer,
        ] {
            if let Some(name) = participants.iter().find(|name| name.ctype() == ctype) {
                order.push(name.clone());
            }
        }
        order
    }

    /// Handles a child controller's connect outcome.
    pub fn handle_child_connected(&mut self, name: &ChildName, result: ResultCode) -> Vec<Action> {
        if self.phase != Some(LifecyclePhase::Connect) {
            debug!(obs = %self.key, child = %name, "Stale connect event, ignored");
            return Vec::new();
        }
        if !result.is_ok() {
            warn!(obs = %self.key, child = %name, %result, "Child failed to connect, aborting");
            return self.quit(result);
        }
        self.mark_ready(name)
    }

    /// Handles a lifecycle acknowledgement from a child controller.
    pub fn handle_child_ack(
        &mut self,
        name: &ChildName,
        phase: LifecyclePhase,
        result: ResultCode,
    ) -> Vec<Action> {
        if phase == LifecyclePhase::Quit {
            return self.handle_child_down(name, result);
        }
        if self.finished || self.current == ObsState::Stopping {
            return Vec::new();
        }
        if self.phase != Some(phase) {
            debug!(obs = %self.key, child = %name, %phase, "Stale acknowledgement, ignored");
            return Vec::new();
        }

        if result.is_ok() {
            return self.advance_phase(name, phase);
        }

        // Transient-buffer capture is optional: a prepare failure is
        // tolerated and the child is disabled for the remaining
        // lifetime of the observation.
        if name.ctype() == ChildType::TransientBuffer && phase == LifecyclePhase::Prepare {
            warn!(
                obs = %self.key,
                child = %name,
                %result,
                "Transient-buffer prepare failed, continuing without it"
            );
            self.tbb_disabled = true;
            self.ready.remove(name);
            self.sequence.retain(|queued| queued != name);
            if self.all_ready() {
                return self.complete_phase();
            }
            return Vec::new();
        }

        warn!(obs = %self.key, child = %name, %phase, %result, "Child failed, aborting");
        self.quit(result)
    }

    /// A successful acknowledgement: mark the child ready, feed the
    /// sequential pipeline, complete the phase when everyone answered.
    fn advance_phase(&mut self, name: &ChildName, phase: LifecyclePhase) -> Vec<Action> {
        match self.ready.get(name) {
            None => {
                debug!(obs = %self.key, child = %name, "Ack from non-participant, ignored");
                return Vec::new();
            }
            Some(true) => {
                // Re-delivered acknowledgement; flags are monotonic
                // within a phase.
                debug!(obs = %self.key, child = %name, "Duplicate acknowledgement, ignored");
                return Vec::new();
            }
            Some(false) => {}
        }
        let mut actions = self.mark_ready(name);
        if !self.sequence.is_empty() && !self.finished && self.current != ObsState::Stopping {
            let next = self.sequence.remove(0);
            actions.push(Action::RequestChild { name: next, phase });
            // Each sequential step gets a fresh guard window.
            actions.push(Action::ArmGuard);
        }
        actions
    }

    /// A child confirmed shutdown, or died unsolicited.
    fn handle_child_down(&mut self, name: &ChildName, result: ResultCode) -> Vec<Action> {
        self.down.insert(name.clone());

        if self.current != ObsState::Stopping {
            warn!(obs = %self.key, child = %name, %result, "Unsolicited child death, aborting");
            let reason = if result.is_ok() {
                ResultCode::LostConnection
            } else {
                result
            };
            return self.quit(reason);
        }

        if self.finished {
            return Vec::new();
        }
        if let Some(flag) = self.ready.get_mut(name) {
            *flag = true;
        }
        if self.all_ready() {
            self.finished = true;
            debug!(obs = %self.key, "All children down, observation finished");
            return vec![Action::CancelGuard];
        }
        Vec::new()
    }

    /// Forces the observation into `Stopping`, quitting every child
    /// that was started. Accepted from any state.
    pub fn quit(&mut self, reason: ResultCode) -> Vec<Action> {
        if self.finished {
            return Vec::new();
        }
        if self.current == ObsState::Stopping {
            debug!(obs = %self.key, "Already stopping");
            return Vec::new();
        }
        if !reason.is_ok() {
            self.last_result = reason;
        }
        self.current = ObsState::Stopping;
        self.requested = ObsState::Stopping;
        self.phase = Some(LifecyclePhase::Quit);
        self.sequence.clear();

        if self.started.is_empty() {
            self.finished = true;
            return vec![Action::CancelGuard];
        }

        // Every started child is quit, the already-down ones counting
        // as immediately confirmed.
        self.reset_ready(self.started.clone());
        let mut actions = Vec::new();
        for name in self.started.clone() {
            if self.down.contains(&name) {
                if let Some(flag) = self.ready.get_mut(&name) {
                    *flag = true;
                }
            } else {
                actions.push(Action::RequestChild {
                    name,
                    phase: LifecyclePhase::Quit,
                });
            }
        }
        if self.all_ready() {
            self.finished = true;
            actions.push(Action::CancelGuard);
        } else {
            actions.push(Action::ArmGuard);
        }
        actions
    }

    /// Guard timer expired while awaiting acknowledgements.
    ///
    /// During `Stopping` this is the forced, logged abort; in any other
    /// state it is treated identically to an explicit failure.
    pub fn handle_guard_expired(&mut self) -> Vec<Action> {
        if self.finished {
            return Vec::new();
        }
        if self.current == ObsState::Stopping {
            warn!(obs = %self.key, "Guard expired during shutdown, forcing finish");
            if self.last_result.is_ok() {
                self.last_result = ResultCode::Timeout;
            }
            self.finished = true;
            return Vec::new();
        }
        warn!(
            obs = %self.key,
            state = %self.current,
            "Guard expired awaiting acknowledgements, aborting"
        );
        self.quit(ResultCode::Timeout)
    }

    fn reset_ready(&mut self, participants: Vec<ChildName>) {
        self.ready.clear();
        for name in participants {
            self.ready.insert(name, false);
        }
    }

    fn mark_ready(&mut self, name: &ChildName) -> Vec<Action> {
        match self.ready.get_mut(name) {
            Some(flag) => *flag = true,
            None => {
                debug!(obs = %self.key, child = %name, "Readiness for unknown child, ignored");
                return Vec::new();
            }
        }
        if self.all_ready() {
            self.complete_phase()
        } else {
            Vec::new()
        }
    }

    fn all_ready(&self) -> bool {
        !self.ready.is_empty() && self.ready.values().all(|ready| *ready)
    }

    fn complete_phase(&mut self) -> Vec<Action> {
        self.current = self.requested;
        self.completed = self.phase.take();
        self.sequence.clear();
        debug!(obs = %self.key, state = %self.current, "Phase complete");
        vec![Action::CancelGuard]
    }
}

impl std::fmt::Debug for ActiveObservation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActiveObservation")
            .field("key", &self.key)
            .field("current", &self.current)
            .field("requested", &self.requested)
            .field("phase", &self.phase)
            .field("finished", &self.finished)
            .finish_non_exhaustive()
    }
}
