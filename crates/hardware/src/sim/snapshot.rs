//! Serializable simulation snapshots.

use serde::{Deserialize, Serialize};

use crate::common::error::SimError;
use crate::config::SimulationConfig;
use crate::core::CpuState;

/// Configuration plus complete core state at one tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    /// Configuration the simulation was built from.
    pub config: SimulationConfig,
    /// Core state.
    pub state: CpuState,
}

impl Snapshot {
    /// Serializes the snapshot as JSON.
    ///
    /// # Errors
    ///
    /// `SimError::Json` if serialization fails.
    pub fn to_json(&self) -> Result<String, SimError> {
        Ok(serde_json::to_string(self)?)
    }

    /// Parses a snapshot from JSON.
    ///
    /// # Errors
    ///
    /// `SimError::Json` for malformed input.
    pub fn from_json(json: &str) -> Result<Self, SimError> {
        Ok(serde_json::from_str(json)?)
    }
}
