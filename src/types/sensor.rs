//! Sensor definitions and per-sensor runtime state

use serde::{Deserialize, Serialize};

use crate::hal::Level;
use crate::types::Debouncer;

/// Which pin level means "object present"
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PresentWhen {
    /// Present when the pin reads HIGH
    HighMeansPresent,
    /// Present when the pin reads LOW (e.g. reed switch to GND)
    LowMeansPresent,
}

/// Puzzle-wide solve rule
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SolveMode {
    /// Solved when any sensor is present
    #[default]
    Any,
    /// Solved when every sensor is present (and at least one exists)
    All,
}

impl SolveMode {
    /// Evaluate the rule over current presence values
    pub fn evaluate<I>(self, present: I) -> bool
    where
        I: IntoIterator<Item = bool>,
    {
        let mut iter = present.into_iter();
        match self {
            SolveMode::Any => iter.any(|p| p),
            SolveMode::All => {
                let mut seen = false;
                for p in iter {
                    if !p {
                        return false;
                    }
                    seen = true;
                }
                seen
            }
        }
    }
}

/// Immutable sensor declaration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SensorDefinition {
    /// Stable identifier, e.g. "rfid1"
    pub id: String,
    /// GPIO pin
    pub pin: u8,
    /// Polarity rule
    pub present_when: PresentWhen,
    /// Event action published on first presence, e.g. "rfid_present"
    pub action: String,
    /// Must observe "not present" before "present" counts
    #[serde(default)]
    pub needs_arming: bool,
}

impl SensorDefinition {
    pub fn new(
        id: impl Into<String>,
        pin: u8,
        present_when: PresentWhen,
        action: impl Into<String>,
        needs_arming: bool,
    ) -> Self {
        Self {
            id: id.into(),
            pin,
            present_when,
            action: action.into(),
            needs_arming,
        }
    }

    /// Apply the polarity rule to a pin level
    pub fn is_present(&self, level: Level) -> bool {
        match self.present_when {
            PresentWhen::HighMeansPresent => level == Level::High,
            PresentWhen::LowMeansPresent => level == Level::Low,
        }
    }

    /// Pin level that reads as present (used by the simulator)
    pub fn present_level(&self, present: bool) -> Level {
        match self.present_when {
            PresentWhen::HighMeansPresent => Level::from(present),
            PresentWhen::LowMeansPresent => Level::from(!present),
        }
    }
}

/// Mutable state for one sensor, owned by the SensorEngine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SensorState {
    /// Arming satisfied (always true when arming is not required)
    pub armed: bool,
    /// Debounced, polarity-applied presence
    pub present: bool,
    /// Event already emitted this session
    pub event_sent: bool,
    /// Forced by the game master; physical reads ignored until reset
    pub force_locked: bool,
    /// Raw presence tracking for debounce
    pub debounce: Debouncer,
}

impl SensorState {
    pub fn fresh(def: &SensorDefinition, debounce: Debouncer) -> Self {
        Self {
            armed: !def.needs_arming,
            present: false,
            event_sent: false,
            force_locked: false,
            debounce,
        }
    }

    pub fn last_raw(&self) -> bool {
        self.debounce.last_raw()
    }
}
