//! Core types for the prop runtime

mod command;
mod output;
mod reason;
mod sensor;
mod snapshot;
mod state;
mod time;

pub use command::Command;
pub use output::{OutputDefinition, OutputState};
pub use reason::ReasonCode;
pub use sensor::{PresentWhen, SensorDefinition, SensorState, SolveMode};
pub use snapshot::{EventMessage, OutputDetail, PresenceMessage, SensorDetail, StatusDetails, StatusSnapshot};
pub use state::{ChangeSource, PropPhase, PropState};
pub use time::{Debouncer, Millis, RetryTimer, TimedWindow};
