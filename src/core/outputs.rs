//! Output controller: fail-safe lock/relay lifecycle
//!
//! State transitions:
//! - boot → INACTIVE (de-energized, lock open)
//! - any → ARMED: arm
//! - ARMED → RELEASED: release
//! - any → ARMED: reset
//!
//! Every write goes through [`OutputController::drive`] so the polarity
//! inversion is applied in one place and the pin always matches the state.

use tracing::info;

use crate::hal::{DigitalIo, PinMode};
use crate::types::{OutputDefinition, OutputState, ReasonCode};

#[derive(Debug)]
pub struct OutputController {
    definitions: Vec<OutputDefinition>,
    states: Vec<OutputState>,
}

impl OutputController {
    pub fn new(definitions: Vec<OutputDefinition>) -> Self {
        let states = vec![OutputState::Inactive; definitions.len()];
        Self { definitions, states }
    }

    /// Power-on fail-safe: every output INACTIVE and de-energized
    pub fn begin(&mut self, io: &mut impl DigitalIo) {
        for index in 0..self.definitions.len() {
            io.configure(self.definitions[index].pin, PinMode::Output);
            self.drive(io, index, OutputState::Inactive);
            info!(output = %self.definitions[index].id, pin = self.definitions[index].pin, "→ INACTIVE");
        }
    }

    /// Lock every output, including ones already released
    pub fn arm(&mut self, io: &mut impl DigitalIo) {
        for index in 0..self.definitions.len() {
            if self.states[index] == OutputState::Released {
                info!(
                    output = %self.definitions[index].id,
                    reason = %ReasonCode::C002_ARM_WHILE_RELEASED,
                    "re-locking released output"
                );
            }
            self.drive(io, index, OutputState::Armed);
            info!(output = %self.definitions[index].id, "→ ARMED");
        }
    }

    /// Unlock every armed output. Inactive outputs are already open.
    pub fn release(&mut self, io: &mut impl DigitalIo) {
        for index in 0..self.definitions.len() {
            let next = match self.states[index] {
                OutputState::Inactive => OutputState::Inactive,
                OutputState::Armed | OutputState::Released => OutputState::Released,
            };
            self.drive(io, index, next);
            info!(output = %self.definitions[index].id, "→ {}", next.as_str().to_uppercase());
        }
    }

    /// Re-lock for the next session
    pub fn reset(&mut self, io: &mut impl DigitalIo) {
        for index in 0..self.definitions.len() {
            self.drive(io, index, OutputState::Armed);
            info!(output = %self.definitions[index].id, "→ ARMED (reset)");
        }
    }

    pub fn state(&self, index: usize) -> Option<OutputState> {
        self.states.get(index).copied()
    }

    pub fn count(&self) -> usize {
        self.definitions.len()
    }

    pub fn definitions(&self) -> &[OutputDefinition] {
        &self.definitions
    }

    /// Definitions paired with their state
    pub fn iter(&self) -> impl Iterator<Item = (&OutputDefinition, OutputState)> {
        self.definitions.iter().zip(self.states.iter().copied())
    }

    fn drive(&mut self, io: &mut impl DigitalIo, index: usize, state: OutputState) {
        let def = &self.definitions[index];
        io.write(def.pin, def.level(state.energized()));
        self.states[index] = state;
    }
}
