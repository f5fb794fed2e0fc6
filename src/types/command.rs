//! Inbound commands from the game master console

use crate::types::ChangeSource;

/// A parsed command payload
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Start a new session
    Reset,
    /// Force the solved state. Only `solved == true` has an effect.
    ForceSolved { solved: bool, source: ChangeSource },
    /// Lock the outputs
    Arm,
    /// Force-trigger a sensor by id
    SetOutput { sensor_id: String, source: ChangeSource },
    /// Unparseable or unrecognized; dropped
    Unknown,
}

impl Command {
    /// Name used in diagnostics
    pub fn name(&self) -> &'static str {
        match self {
            Command::Reset => "reset",
            Command::ForceSolved { .. } => "force_solved",
            Command::Arm => "arm",
            Command::SetOutput { .. } => "set_output",
            Command::Unknown => "unknown",
        }
    }

    pub fn is_unknown(&self) -> bool {
        matches!(self, Command::Unknown)
    }
}

impl std::fmt::Display for Command {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Command::ForceSolved { solved, source } => {
                write!(f, "force_solved({}) from {}", solved, source)
            }
            Command::SetOutput { sensor_id, source } => {
                write!(f, "set_output sensorId={} from {}", sensor_id, source)
            }
            other => f.write_str(other.name()),
        }
    }
}
