//! Lock/relay output definitions and lifecycle state

use serde::{Deserialize, Serialize};

use crate::hal::Level;

/// Immutable output declaration (maglock, relay, ...)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutputDefinition {
    pub id: String,
    pub pin: u8,
    /// Energized (locking) level is LOW
    #[serde(default)]
    pub active_low: bool,
}

impl OutputDefinition {
    pub fn new(id: impl Into<String>, pin: u8, active_low: bool) -> Self {
        Self { id: id.into(), pin, active_low }
    }

    /// Pin level for the requested energized state, polarity applied
    pub fn level(&self, energized: bool) -> Level {
        Level::from(energized != self.active_low)
    }
}

/// Output lifecycle
///
/// ```text
/// INACTIVE ──arm/reset──▶ ARMED ──release──▶ RELEASED
///                           ▲                    │
///                           └───────reset────────┘
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputState {
    /// Boot / power-loss default: de-energized, lock open
    #[default]
    Inactive,
    /// Energized: lock closed
    Armed,
    /// De-energized after a solve
    Released,
}

impl OutputState {
    /// Whether the physical output is energized in this state
    pub fn energized(self) -> bool {
        self == OutputState::Armed
    }

    pub fn as_str(self) -> &'static str {
        match self {
            OutputState::Inactive => "inactive",
            OutputState::Armed => "armed",
            OutputState::Released => "released",
        }
    }
}

impl std::fmt::Display for OutputState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
