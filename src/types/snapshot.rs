//! Outbound wire messages (JSON contract v1.0, frozen)
//!
//! Field names and order are part of the contract; serde emits struct
//! fields in declaration order, so do not reorder them.

use serde::{Deserialize, Serialize};

use crate::types::{ChangeSource, OutputState};

/// Retained status snapshot, published on `.../status`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusSnapshot {
    /// Always "status"
    #[serde(rename = "type")]
    pub kind: String,
    pub prop_id: String,
    pub name: String,
    pub online: bool,
    pub solved: bool,
    pub last_change_source: ChangeSource,
    #[serde(rename = "override")]
    pub override_active: bool,
    /// Device uptime (ms)
    pub timestamp: u64,
    pub details: StatusDetails,
}

/// Per-sensor and per-output detail block
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct StatusDetails {
    pub sensors: Vec<SensorDetail>,
    /// Omitted entirely for props without outputs
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub outputs: Vec<OutputDetail>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SensorDetail {
    pub sensor_id: String,
    pub triggered: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutputDetail {
    pub output_id: String,
    pub state: OutputState,
}

/// One-shot event notification, published on `.../event` (not retained)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventMessage {
    /// Always "event"
    #[serde(rename = "type")]
    pub kind: String,
    pub prop_id: String,
    pub action: String,
    pub source: ChangeSource,
    pub timestamp: u64,
}

impl EventMessage {
    pub fn new(prop_id: &str, action: &str, source: ChangeSource, timestamp: u64) -> Self {
        Self {
            kind: "event".to_string(),
            prop_id: prop_id.to_string(),
            action: action.to_string(),
            source,
            timestamp,
        }
    }
}

/// Online/offline presence, published on `.../lwt` (retained).
/// The offline form is registered as the last will.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PresenceMessage {
    pub prop_id: String,
    pub online: bool,
}
