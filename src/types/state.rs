//! Prop-level state definitions

use serde::{Deserialize, Serialize};

use crate::types::{Millis, TimedWindow};

/// Who caused the last change of the solved state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeSource {
    /// Physical sensors
    Player,
    /// Game master console
    Gm,
    /// The prop itself (boot, reset)
    #[default]
    Device,
}

impl ChangeSource {
    pub fn as_str(self) -> &'static str {
        match self {
            ChangeSource::Player => "player",
            ChangeSource::Gm => "gm",
            ChangeSource::Device => "device",
        }
    }

    /// Parse a wire value; unknown strings yield `None`
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "player" => Some(ChangeSource::Player),
            "gm" => Some(ChangeSource::Gm),
            "device" => Some(ChangeSource::Device),
            _ => None,
        }
    }
}

impl std::fmt::Display for ChangeSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Observable phase of the prop state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PropPhase {
    /// Unsolved, sensors live (unless inside the ignore window)
    Idle,
    /// Fast blink after a reset, sensor processing suspended
    ResetFeedback,
    /// Solved latch set
    Solved,
}

impl PropPhase {
    /// Get ANSI color code for terminal display
    pub fn color_code(&self) -> &'static str {
        match self {
            PropPhase::Idle => "\x1b[90m",          // Gray
            PropPhase::ResetFeedback => "\x1b[33m", // Yellow
            PropPhase::Solved => "\x1b[32m",        // Green
        }
    }

    /// Reset ANSI color
    pub fn color_reset() -> &'static str {
        "\x1b[0m"
    }

    /// Get emoji for phase
    pub fn emoji(&self) -> &'static str {
        match self {
            PropPhase::Idle => "🔒",
            PropPhase::ResetFeedback => "🔄",
            PropPhase::Solved => "🔓",
        }
    }
}

impl std::fmt::Display for PropPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            PropPhase::Idle => "IDLE",
            PropPhase::ResetFeedback => "RESET_FEEDBACK",
            PropPhase::Solved => "SOLVED",
        };
        write!(f, "{}", name)
    }
}

/// Singleton prop state, owned by the PropController
#[derive(Debug, Clone, Default)]
pub struct PropState {
    /// Monotonic within a session; only a reset clears it
    pub solved_latched: bool,
    pub last_change_source: ChangeSource,
    /// Game master forced the solve
    pub override_active: bool,
    /// Post-reset window during which sensors are not evaluated
    pub ignoring_sensors: TimedWindow,
    /// Post-reset fast-blink window
    pub reset_feedback: TimedWindow,
}

impl PropState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn phase(&self, now: Millis) -> PropPhase {
        if self.reset_feedback.is_active(now) {
            PropPhase::ResetFeedback
        } else if self.solved_latched {
            PropPhase::Solved
        } else {
            PropPhase::Idle
        }
    }
}
