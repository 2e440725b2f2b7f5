//! Parameter set storage.
//!
//! The station controller loads observation descriptors from an
//! external parameter store keyed by observation id. The store itself
//! is an external collaborator; this module defines the seam and two
//! in-process implementations (directory-backed and in-memory).

use super::{ParameterSet, ParsetError};
use crate::observation::ObservationId;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::PathBuf;

/// Source of observation parameter sets, keyed by observation id.
pub trait ParsetStore: Send + Sync {
    /// Load the parameter set for one observation.
    ///
    /// # Errors
    ///
    /// Returns [`ParsetError::NotFound`] when no parameter set exists
    /// for the observation, or a parse error when the set is malformed.
    fn load(&self, obs_id: &ObservationId) -> Result<ParameterSet, ParsetError>;
}

/// Directory-backed parameter store.
///
/// Looks for `Observation{id}.parset` files in a single directory.
#[derive(Debug, Clone)]
pub struct DirParsetStore {
    dir: PathBuf,
}

impl DirParsetStore {
    /// Create a store rooted at the given directory.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Path of the parameter file for one observation.
    pub fn path_for(&self, obs_id: &ObservationId) -> PathBuf {
        self.dir.join(format!("Observation{}.parset", obs_id))
    }
}

impl ParsetStore for DirParsetStore {
    fn load(&self, obs_id: &ObservationId) -> Result<ParameterSet, ParsetError> {
        let path = self.path_for(obs_id);
        if !path.exists() {
            return Err(ParsetError::NotFound(obs_id.to_string()));
        }
        ParameterSet::from_file(&path)
    }
}

/// In-memory parameter store for simulation and tests.
#[derive(Default)]
pub struct MemParsetStore {
    sets: Mutex<HashMap<ObservationId, ParameterSet>>,
}

impl MemParsetStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace the parameter set for an observation.
    pub fn insert(&self, obs_id: ObservationId, parset: ParameterSet) {
        self.sets.lock().insert(obs_id, parset);
    }
}

impl ParsetStore for MemParsetStore {
    fn load(&self, obs_id: &ObservationId) -> Result<ParameterSet, ParsetError> {
        self.sets
            .lock()
            .get(obs_id)
            .cloned()
            .ok_or_else(|| ParsetError::NotFound(obs_id.to_string()))
    }
}
