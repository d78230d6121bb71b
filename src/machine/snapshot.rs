//! Serializable diagnostic view of a machine.
//!
//! Snapshots are for debug dumps and logs. They are not a persistence format
//! and cannot be loaded back into a machine.

use super::machine::MachineId;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MachineSnapshot {
    pub id: MachineId,
    pub name: String,
    pub started: bool,
    /// Name of the current state (`none` before start).
    pub current: String,
    pub states: Vec<StateSummary>,
    pub transitions: Vec<TransitionSummary>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StateSummary {
    pub name: String,
    pub active: bool,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TransitionSummary {
    pub name: String,
    /// Source names; the wildcard appears as `*`.
    pub sources: Vec<String>,
    pub target: String,
    pub vetoes: usize,
}

impl MachineSnapshot {
    /// Pretty-printed JSON rendering.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    pub fn active_state(&self) -> Option<&StateSummary> {
        self.states.iter().find(|s| s.active)
    }
}
