//! Event handling for the station controller.
//!
//! Every event entering the run loop is demultiplexed here: start
//! requests are validated against the parameter store and the resource
//! arbiter, lifecycle events are forwarded into the per-observation
//! state machines, and the returned actions are executed against the
//! child and clock facades.

use super::claim::{ClaimSequence, ClaimStep};
use super::core::StationController;
use super::event::{ObservationSnapshot, StartResult, StationEvent};
use super::telemetry::TelemetryEvent;
use crate::observation::{
    Action, ActiveObservation, LifecyclePhase, ObsKey, ObservationDescriptor, ObservationId,
    ResultCode,
};
use crate::resources::ResourceNeeds;
use tokio::sync::oneshot;
use tracing::{debug, info, warn};

/// A configuration acknowledgement with the station value actually in
/// effect, for matching against the claim step in flight.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum ConfigAck {
    Clock(u32),
    Splitters(bool),
    BitMode(u8),
}

impl ConfigAck {
    fn matches(self, step: ClaimStep) -> bool {
        matches!(
            (self, step),
            (Self::Clock(_), ClaimStep::Clock(_))
                | (Self::Splitters(_), ClaimStep::Splitters(_))
                | (Self::BitMode(_), ClaimStep::BitMode(_))
        )
    }
}

impl StationController {
    /// Demultiplexes one station event.
    pub(crate) fn handle_event(&mut self, event: StationEvent) {
        match event {
            StationEvent::StartObservation {
                obs_id,
                instance_nr,
                reply,
            } => {
                let result = self.handle_start_observation(obs_id, instance_nr);
                if let Some(reply) = reply {
                    let _ = reply.send(result);
                }
            }
            StationEvent::Request { key, phase } => self.handle_request(key, phase),
            StationEvent::ChildConnected { name, result } => {
                let key = name.obs_key();
                self.forward(&key, |obs| obs.handle_child_connected(&name, result));
                self.report_if_idle(&key, LifecyclePhase::Connect);
            }
            StationEvent::ChildAck {
                name,
                phase,
                result,
            } => {
                let key = name.obs_key();
                self.forward(&key, |obs| obs.handle_child_ack(&name, phase, result));
                self.report_if_idle(&key, phase);
            }
            StationEvent::ClockAck { clock_mhz, result } => {
                self.handle_config_ack(ConfigAck::Clock(clock_mhz), result)
            }
            StationEvent::SplittersAck { on, result } => {
                self.handle_config_ack(ConfigAck::Splitters(on), result)
            }
            StationEvent::BitModeAck { bit_mode, result } => {
                self.handle_config_ack(ConfigAck::BitMode(bit_mode), result)
            }
            StationEvent::Abort { key, reason } => {
                warn!(obs = %key, %reason, "Abort requested");
                self.forward(&key, |obs| obs.quit(reason));
            }
            StationEvent::Snapshot { reply } => self.handle_snapshot(reply),
        }
    }

    /// Validates and registers a new observation.
    fn handle_start_observation(
        &mut self,
        obs_id: ObservationId,
        instance_nr: u32,
    ) -> StartResult {
        let key = ObsKey::new(instance_nr, obs_id.clone());

        if self.finishing {
            warn!(obs = %key, "Start refused, controller is finishing");
            return StartResult::Unspecified;
        }
        if self.observations.contains_key(&key) {
            warn!(obs = %key, "Start refused, observation already registered");
            return StartResult::AlreadyRegistered;
        }

        let parset = match self.parsets.load(&obs_id) {
            Ok(parset) => parset,
            Err(err) => {
                warn!(obs = %key, error = %err, "Start refused, no parameter set");
                return StartResult::NoParameterSet;
            }
        };
        let descriptor = match ObservationDescriptor::from_parset(obs_id, instance_nr, &parset) {
            Ok(descriptor) => descriptor,
            Err(err) => {
                warn!(obs = %key, error = %err, "Start refused, invalid parameter set");
                return StartResult::NoParameterSet;
            }
        };

        // An observation whose window overlaps a running one must agree
        // with it on the station-wide settings; the hardware has only
        // one value of each.
        let conflict = self.observations.values().any(|other| {
            !other.is_finished()
                && descriptor.overlaps(other.descriptor())
                && (other.descriptor().sample_clock_mhz != descriptor.sample_clock_mhz
                    || other.descriptor().bit_mode != descriptor.bit_mode)
        });
        if conflict {
            warn!(
                obs = %key,
                clock_mhz = descriptor.sample_clock_mhz,
                bit_mode = descriptor.bit_mode,
                "Start refused, conflicts with a running observation"
            );
            return StartResult::ResourceConflict;
        }

        let mut observation = ActiveObservation::new(descriptor);
        self.telemetry
            .emit(TelemetryEvent::ObservationRegistered { key: key.clone() });

        let before = observation.current();
        let actions = observation.start();
        let after = observation.current();
        self.observations.insert(key.clone(), observation);
        self.execute_actions(&key, actions);
        self.telemetry.emit(TelemetryEvent::StateChanged {
            key: key.clone(),
            from: before,
            to: after,
        });

        info!(obs = %key, "Observation registered and starting");
        StartResult::NoError
    }

    /// Handles a lifecycle request from the parent side.
    ///
    /// Requests for an observation whose pre-claim sequence is still
    /// pending are postponed and replayed once the claim settles; a
    /// quit always acts immediately.
    fn handle_request(&mut self, key: ObsKey, phase: LifecyclePhase) {
        if phase == LifecyclePhase::Claim {
            self.handle_claim_request(key);
            return;
        }
        if phase != LifecyclePhase::Quit && self.claim_pending_for(&key) {
            debug!(obs = %key, %phase, "Pre-claim sequence pending, request postponed");
            self.postponed.push((key, phase));
            return;
        }
        self.forward(&key, |obs| obs.handle_request(phase));
        self.report_if_idle(&key, phase);
    }

    /// True while a pre-claim configuration sequence for this
    /// observation is in flight or deferred.
    fn claim_pending_for(&self, key: &ObsKey) -> bool {
        self.claim_active.as_ref().map_or(false, |s| s.key() == key)
            || self.claim_queue.contains(key)
    }

    /// Replays the oldest postponed request for an observation.
    ///
    /// Called after one of its transitions settled; one request per
    /// settle keeps the remaining postponed requests in arrival order.
    fn replay_postponed(&mut self, key: &ObsKey) {
        if self.claim_pending_for(key) {
            return;
        }
        if let Some(pos) = self.postponed.iter().position(|(queued, _)| queued == key) {
            let (key, phase) = self.postponed.remove(pos);
            debug!(obs = %key, %phase, "Replaying postponed request");
            self.handle_request(key, phase);
        }
    }

    /// A claim first brings the station hardware to the observation's
    /// required settings, then reaches the children.
    fn handle_claim_request(&mut self, key: ObsKey) {
        let Some(observation) = self.observations.get(&key) else {
            debug!(obs = %key, "Claim for unknown observation, ignored");
            return;
        };
        let clock_mhz = observation.descriptor().sample_clock_mhz;
        let bit_mode = observation.descriptor().bit_mode;

        let legal = self.resources.can_change_clock(clock_mhz, key.obs_id())
            && self.resources.can_change_bit_mode(bit_mode, key.obs_id());
        if !legal {
            warn!(
                obs = %key,
                clock_mhz,
                bit_mode,
                "Claim refused, settings are in use by other observations"
            );
            self.telemetry.emit(TelemetryEvent::PhaseReported {
                key: key.clone(),
                phase: LifecyclePhase::Claim,
                result: ResultCode::ResourceConflict,
            });
            self.forward(&key, |obs| obs.quit(ResultCode::ResourceConflict));
            return;
        }

        if self.claim_active.is_some() {
            debug!(obs = %key, "Configuration sequence in flight, claim deferred");
            if !self.claim_queue.contains(&key) {
                self.claim_queue.push_back(key);
            }
            return;
        }

        self.begin_claim(key);
    }

    /// Builds and starts the pre-claim configuration sequence.
    fn begin_claim(&mut self, key: ObsKey) {
        let Some(observation) = self.observations.get(&key) else {
            return;
        };
        let sequence = ClaimSequence::build(observation.descriptor(), &self.resources);
        if sequence.is_complete() {
            // Station already at the required settings.
            self.finish_claim(key);
            return;
        }
        debug!(obs = %key, "Starting station configuration for claim");
        self.claim_active = Some(sequence);
        self.issue_claim_step();
    }

    /// Fires the current step of the active sequence at the clock
    /// controller.
    fn issue_claim_step(&mut self) {
        let Some(step) = self.claim_active.as_ref().and_then(ClaimSequence::current) else {
            return;
        };
        match step {
            ClaimStep::Clock(clock_mhz) => self.clock.set_clock(clock_mhz),
            ClaimStep::Splitters(on) => self.clock.set_splitters(on),
            ClaimStep::BitMode(bit_mode) => self.clock.set_bit_mode(bit_mode),
        }
    }

    /// Handles a configuration acknowledgement from the clock controller.
    ///
    /// An acknowledgement with no sequence in flight is an out-of-band
    /// change report from the hardware monitor: the station state is
    /// updated and observations depending on the old value are aborted.
    fn handle_config_ack(&mut self, ack: ConfigAck, result: ResultCode) {
        if self.claim_active.is_none() {
            if result.is_ok() {
                warn!(?ack, "Station setting changed out of band");
                self.apply_setting(ack);
                self.abort_drifted_users();
            } else {
                warn!(?ack, %result, "Failed configuration ack with no sequence in flight, ignored");
            }
            return;
        }
        let (step, key) = match &self.claim_active {
            Some(sequence) => match sequence.current() {
                Some(step) => (step, sequence.key().clone()),
                None => return,
            },
            None => return,
        };
        if !ack.matches(step) {
            warn!(?ack, ?step, "Configuration ack does not match the step in flight, ignored");
            return;
        }

        if !result.is_ok() {
            warn!(obs = %key, ?step, %result, "Station configuration failed, aborting claim");
            self.claim_active = None;
            self.telemetry.emit(TelemetryEvent::PhaseReported {
                key: key.clone(),
                phase: LifecyclePhase::Claim,
                result,
            });
            self.forward(&key, |obs| obs.quit(result));
            self.next_queued_claim();
            return;
        }

        // The ack carries the value the hardware actually applied.
        self.apply_setting(ack);
        self.abort_drifted_users();

        let complete = match self.claim_active.as_mut() {
            Some(sequence) => {
                sequence.advance();
                sequence.is_complete()
            }
            None => return,
        };
        if complete {
            self.claim_active = None;
            self.finish_claim(key);
            self.next_queued_claim();
        } else {
            self.issue_claim_step();
        }
    }

    /// Records a station setting reported by the clock controller and
    /// publishes the change.
    fn apply_setting(&mut self, ack: ConfigAck) {
        match ack {
            ConfigAck::Clock(clock_mhz) => {
                self.resources.set_clock(clock_mhz);
                self.telemetry
                    .emit(TelemetryEvent::ClockChanged { clock_mhz });
            }
            ConfigAck::Splitters(on) => {
                self.resources.set_splitters(on);
                self.telemetry.emit(TelemetryEvent::SplittersChanged { on });
            }
            ConfigAck::BitMode(bit_mode) => {
                self.resources.set_bit_mode(bit_mode);
                self.telemetry
                    .emit(TelemetryEvent::BitModeChanged { bit_mode });
            }
        }
    }

    /// The station is at the required settings: register the dependency
    /// and let the claim reach the children.
    fn finish_claim(&mut self, key: ObsKey) {
        let Some(observation) = self.observations.get(&key) else {
            return;
        };
        let needs = ResourceNeeds {
            clock_mhz: observation.descriptor().sample_clock_mhz,
            bit_mode: observation.descriptor().bit_mode,
        };
        self.resources.register_user(key.obs_id().clone(), needs);

        self.forward(&key, |obs| obs.handle_request(LifecyclePhase::Claim));
        self.report_if_idle(&key, LifecyclePhase::Claim);
    }

    /// Starts the next deferred claim, if any.
    pub(crate) fn next_queued_claim(&mut self) {
        while self.claim_active.is_none() {
            let Some(key) = self.claim_queue.pop_front() else {
                break;
            };
            if !self.observations.contains_key(&key) {
                continue;
            }
            self.handle_claim_request(key);
        }
    }

    /// Aborts every registered observation whose required settings no
    /// longer match the station's actual values.
    fn abort_drifted_users(&mut self) {
        for obs_id in self.resources.drifted_users() {
            self.resources.deregister_user(&obs_id);
            let keys: Vec<ObsKey> = self
                .observations
                .iter()
                .filter(|(key, obs)| *key.obs_id() == obs_id && !obs.is_finished())
                .map(|(key, _)| key.clone())
                .collect();
            for key in keys {
                warn!(obs = %key, "Station settings changed out from under observation, aborting");
                self.forward(&key, |obs| obs.quit(ResultCode::ResourceConflict));
            }
        }
    }

    /// A guard timer fired for one observation.
    pub(crate) fn handle_guard_expired(&mut self, key: ObsKey) {
        self.guard_keys.remove(&key);
        self.telemetry
            .emit(TelemetryEvent::GuardExpired { key: key.clone() });
        self.forward(&key, |obs| obs.handle_guard_expired());
    }

    /// Answers a snapshot query.
    fn handle_snapshot(&mut self, reply: oneshot::Sender<Vec<ObservationSnapshot>>) {
        let snapshot = self
            .observations
            .values()
            .map(|obs| ObservationSnapshot {
                key: obs.key().clone(),
                current: obs.current(),
                requested: obs.requested(),
                finished: obs.is_finished(),
            })
            .collect();
        let _ = reply.send(snapshot);
    }

    /// Quits every observation; the run loop exits once they are gone.
    pub(crate) fn begin_finishing(&mut self) {
        if self.finishing {
            return;
        }
        self.finishing = true;
        info!(
            observations = self.observations.len(),
            "Shutdown requested, quitting all observations"
        );
        self.telemetry.emit(TelemetryEvent::ControllerFinishing);
        self.claim_active = None;
        self.claim_queue.clear();
        self.postponed.clear();

        let keys: Vec<ObsKey> = self.observations.keys().cloned().collect();
        for key in keys {
            self.forward(&key, |obs| obs.quit(ResultCode::NoError));
        }
    }

    /// Removes observations that have fully shut down, releasing their
    /// guard, resource registration and any deferred claim.
    pub(crate) fn reap_finished(&mut self) {
        loop {
            let finished: Vec<ObsKey> = self
                .observations
                .iter()
                .filter(|(_, obs)| obs.is_finished())
                .map(|(key, _)| key.clone())
                .collect();
            for key in &finished {
                self.remove_observation(key);
            }
            if self.claim_active.is_none() {
                self.next_queued_claim();
            }
            // A freshly started claim can abort an observation; keep
            // reaping until the set is stable.
            if !self.observations.values().any(|obs| obs.is_finished()) {
                break;
            }
        }
    }

    fn remove_observation(&mut self, key: &ObsKey) {
        let Some(observation) = self.observations.remove(key) else {
            return;
        };
        self.cancel_guard(key);
        self.resources.deregister_user(key.obs_id());
        if self.claim_active.as_ref().map_or(false, |s| s.key() == key) {
            self.claim_active = None;
        }
        self.claim_queue.retain(|queued| queued != key);
        self.postponed.retain(|(queued, _)| queued != key);

        info!(obs = %key, result = %observation.last_result(), "Observation finished");
        self.telemetry.emit(TelemetryEvent::ObservationFinished {
            key: key.clone(),
            result: observation.last_result(),
        });
    }

    /// Runs one state machine handler and executes the actions it
    /// returns, publishing the state change if one happened.
    fn forward<F>(&mut self, key: &ObsKey, handler: F)
    where
        F: FnOnce(&mut ActiveObservation) -> Vec<Action>,
    {
        let Some(observation) = self.observations.get_mut(key) else {
            debug!(obs = %key, "Event for unknown observation, ignored");
            return;
        };
        let before = observation.current();
        let actions = handler(observation);
        let after = observation.current();

        self.execute_actions(key, actions);
        if before != after {
            self.telemetry.emit(TelemetryEvent::StateChanged {
                key: key.clone(),
                from: before,
                to: after,
            });
        }
    }

    fn execute_actions(&mut self, key: &ObsKey, actions: Vec<Action>) {
        for action in actions {
            match action {
                Action::StartChild { ctype } => {
                    self.children.start_child(
                        ctype,
                        key.obs_id(),
                        key.instance_nr(),
                        self.config.host_for(ctype),
                    );
                }
                Action::RequestChild { name, phase } => {
                    self.children.request_state(phase, &name);
                }
                Action::ArmGuard => self.arm_guard(key),
                Action::CancelGuard => self.cancel_guard(key),
            }
        }
    }

    /// Reports the phase result upward once the transition has settled
    /// and no requests are outstanding, then replays a postponed
    /// request if one is waiting.
    ///
    /// The settled phase is consumed from the observation, so late or
    /// re-delivered acknowledgements never duplicate a report.
    fn report_if_idle(&mut self, key: &ObsKey, phase: LifecyclePhase) {
        let Some(observation) = self.observations.get_mut(key) else {
            return;
        };
        if observation.is_finished() || observation.current() != observation.requested() {
            return;
        }
        let outstanding = self
            .children
            .pending_requests(key.obs_id())
            .iter()
            .any(|request| request.is_outstanding());
        if outstanding {
            return;
        }
        if observation.take_completed() != Some(phase) {
            return;
        }
        let result = observation.last_result();
        self.telemetry.emit(TelemetryEvent::PhaseReported {
            key: key.clone(),
            phase,
            result,
        });
        self.replay_postponed(key);
    }
}
