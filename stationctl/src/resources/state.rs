//! Station-wide resource state and arbitration.
//!
//! The sample clock, bit mode and antenna splitters have exactly one
//! value for the whole station. The arbiter tracks those values plus
//! the observations depending on them, and decides whether a requested
//! change is currently legal. It is owned and mutated exclusively by
//! the station controller, inside the pre-claim sequence; mutual
//! exclusion is a structural property of the single event loop.

use crate::observation::ObservationId;
use std::collections::HashMap;

/// Default station sample clock in MHz.
pub const DEFAULT_SAMPLE_CLOCK_MHZ: u32 = 200;

/// Default station bit mode.
pub const DEFAULT_BIT_MODE: u8 = 16;

/// Resource values one observation depends on.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ResourceNeeds {
    /// Required sample clock in MHz.
    pub clock_mhz: u32,
    /// Required bit mode.
    pub bit_mode: u8,
}

/// Current station-wide hardware settings and their users.
#[derive(Debug)]
pub struct StationResources {
    clock_mhz: u32,
    bit_mode: u8,
    splitters_on: bool,
    users: HashMap<ObservationId, ResourceNeeds>,
}

impl Default for StationResources {
    fn default() -> Self {
        Self {
            clock_mhz: DEFAULT_SAMPLE_CLOCK_MHZ,
            bit_mode: DEFAULT_BIT_MODE,
            splitters_on: false,
            users: HashMap::new(),
        }
    }
}

impl StationResources {
    /// Creates the arbiter with station defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Current sample clock in MHz.
    pub fn clock_mhz(&self) -> u32 {
        self.clock_mhz
    }

    /// Current bit mode.
    pub fn bit_mode(&self) -> u8 {
        self.bit_mode
    }

    /// Current splitter state.
    pub fn splitters_on(&self) -> bool {
        self.splitters_on
    }

    /// Number of observations currently depending on the station values.
    pub fn user_count(&self) -> usize {
        self.users.len()
    }

    /// Registers an observation as a user of the current station values.
    pub fn register_user(&mut self, obs_id: ObservationId, needs: ResourceNeeds) {
        self.users.insert(obs_id, needs);
    }

    /// Removes an observation's resource registration.
    pub fn deregister_user(&mut self, obs_id: &ObservationId) {
        self.users.remove(obs_id);
    }

    /// Decides whether the sample clock may be changed for `requester`.
    ///
    /// A change to the value already in effect is always legal. An
    /// actual change is legal only when no observation other than the
    /// requester depends on the current value: running observations
    /// have a hard dependency on the clock in effect when they started.
    pub fn can_change_clock(&self, new_clock_mhz: u32, requester: &ObservationId) -> bool {
        if new_clock_mhz == self.clock_mhz {
            return true;
        }
        self.users.keys().all(|user| user == requester)
    }

    /// Decides whether the bit mode may be changed for `requester`.
    ///
    /// Same policy as [`can_change_clock`](Self::can_change_clock).
    pub fn can_change_bit_mode(&self, new_bit_mode: u8, requester: &ObservationId) -> bool {
        if new_bit_mode == self.bit_mode {
            return true;
        }
        self.users.keys().all(|user| user == requester)
    }

    /// Records a completed clock change.
    pub fn set_clock(&mut self, clock_mhz: u32) {
        self.clock_mhz = clock_mhz;
    }

    /// Records a completed bit mode change.
    pub fn set_bit_mode(&mut self, bit_mode: u8) {
        self.bit_mode = bit_mode;
    }

    /// Records a completed splitter change.
    pub fn set_splitters(&mut self, on: bool) {
        self.splitters_on = on;
    }

    /// Observations whose required clock or bit mode no longer matches
    /// the station's actual values.
    ///
    /// Such observations must be proactively aborted: their resource
    /// value changed out from under them.
    pub fn drifted_users(&self) -> Vec<ObservationId> {
        self.users
            .iter()
            .filter(|(_, needs)| {
                needs.clock_mhz != self.clock_mhz || needs.bit_mode != self.bit_mode
            })
            .map(|(obs_id, _)| obs_id.clone())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn needs(clock: u32, bits: u8) -> ResourceNeeds {
        ResourceNeeds {
            clock_mhz: clock,
            bit_mode: bits,
        }
    }

    #[test]
    fn test_defaults() {
        let resources = StationResources::new();
        assert_eq!(resources.clock_mhz(), 200);
        assert_eq!(resources.bit_mode(), 16);
        assert!(!resources.splitters_on());
        assert_eq!(resources.user_count(), 0);
    }

    #[test]
    fn test_same_value_change_is_always_legal() {
        let mut resources = StationResources::new();
        resources.register_user(ObservationId::new("1"), needs(200, 16));
        resources.register_user(ObservationId::new("2"), needs(200, 16));

        assert!(resources.can_change_clock(200, &ObservationId::new("3")));
        assert!(resources.can_change_bit_mode(16, &ObservationId::new("3")));
    }

    #[test]
    fn test_change_legal_only_for_sole_user() {
        let mut resources = StationResources::new();
        let a = ObservationId::new("a");
        let b = ObservationId::new("b");

        // No users at all: anyone may change.
        assert!(resources.can_change_clock(160, &a));

        resources.register_user(a.clone(), needs(200, 16));
        assert!(resources.can_change_clock(160, &a));
        assert!(!resources.can_change_clock(160, &b));

        resources.register_user(b.clone(), needs(200, 16));
        assert!(!resources.can_change_clock(160, &a));
        assert!(!resources.can_change_bit_mode(8, &a));
    }

    #[test]
    fn test_deregister_releases_the_dependency() {
        let mut resources = StationResources::new();
        let a = ObservationId::new("a");
        let b = ObservationId::new("b");
        resources.register_user(a.clone(), needs(200, 16));
        resources.register_user(b.clone(), needs(200, 16));

        resources.deregister_user(&a);
        assert!(resources.can_change_clock(160, &b));
    }

    #[test]
    fn test_drifted_users_detected_after_out_of_band_change() {
        let mut resources = StationResources::new();
        let a = ObservationId::new("a");
        resources.register_user(a.clone(), needs(200, 16));
        assert!(resources.drifted_users().is_empty());

        resources.set_clock(160);
        assert_eq!(resources.drifted_users(), vec![a]);
    }
}
