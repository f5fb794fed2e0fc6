//! Sensor engine: debounce, arming, one-shot events, solve evaluation
//!
//! Per sensor, per tick:
//! - force-locked → skipped (GM trigger holds until reset)
//! - raw changed → debounce window restarts, nothing else this tick
//! - raw unstable (< debounce window) → previous presence kept
//! - needs arming and not armed → arms on a stable "absent", presence ignored
//! - otherwise presence follows the stable reading; a rising edge emits the
//!   sensor's event once per session
//!
//! Events are queued and drained by the controller with [`SensorEngine::take_events`].

use tracing::{debug, info, warn};

use crate::hal::{DigitalIo, PinMode};
use crate::types::{
    ChangeSource, Debouncer, Millis, ReasonCode, SensorDefinition, SensorState, SolveMode,
};

/// An event action to publish
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SensorEvent {
    pub sensor_id: String,
    pub action: String,
    pub source: ChangeSource,
}

/// Owns every sensor's runtime state
#[derive(Debug)]
pub struct SensorEngine {
    definitions: Vec<SensorDefinition>,
    states: Vec<SensorState>,
    solve_mode: SolveMode,
    debounce_ms: u32,
    events: Vec<SensorEvent>,
}

impl SensorEngine {
    /// Create the engine. Call [`begin`](Self::begin) before ticking.
    pub fn new(definitions: Vec<SensorDefinition>, solve_mode: SolveMode, debounce_ms: u32) -> Self {
        let states = definitions
            .iter()
            .map(|def| SensorState::fresh(def, Debouncer::new(false, Millis::ZERO)))
            .collect();
        Self {
            definitions,
            states,
            solve_mode,
            debounce_ms,
            events: Vec::new(),
        }
    }

    /// Configure inputs and seed state from a live read
    pub fn begin(&mut self, io: &mut impl DigitalIo, now: Millis) {
        for def in &self.definitions {
            io.configure(def.pin, PinMode::InputPullUp);
        }
        self.reinitialize(io, now);
    }

    /// Poll every sensor once; returns the solve condition afterwards
    pub fn tick(&mut self, io: &mut impl DigitalIo, now: Millis) -> bool {
        for (def, state) in self.definitions.iter().zip(self.states.iter_mut()) {
            if state.force_locked {
                continue;
            }

            let raw = def.is_present(io.read(def.pin));
            let Some(stable) = state.debounce.observe(raw, now, self.debounce_ms) else {
                continue;
            };

            if !state.armed {
                if !stable {
                    state.armed = true;
                    info!(sensor = %def.id, "armed");
                }
                // presence before arming never counts
                continue;
            }

            let was_present = state.present;
            state.present = stable;

            if stable && !was_present {
                info!(sensor = %def.id, "-> PRESENT");
                if !state.event_sent {
                    state.event_sent = true;
                    self.events.push(SensorEvent {
                        sensor_id: def.id.clone(),
                        action: def.action.clone(),
                        source: ChangeSource::Player,
                    });
                }
            } else if !stable && was_present {
                debug!(sensor = %def.id, "-> ABSENT");
            }
        }

        self.is_solved()
    }

    /// Start a new session: same state as `begin`, re-reading inputs live
    pub fn reset(&mut self, io: &mut impl DigitalIo, now: Millis) {
        self.reinitialize(io, now);
        info!(count = self.definitions.len(), "all sensors reset");
    }

    /// GM trigger: mark a sensor present, bypassing debounce and arming.
    /// The event is always attributed to the game master.
    ///
    /// Returns whether `sensor_id` is known.
    pub fn force_trigger(&mut self, sensor_id: &str) -> bool {
        let Some(index) = self.index_of(sensor_id) else {
            warn!(sensor = sensor_id, reason = %ReasonCode::C002_SENSOR_UNKNOWN, "force trigger rejected");
            return false;
        };

        let def = &self.definitions[index];
        let state = &mut self.states[index];
        state.armed = true;
        state.present = true;
        state.force_locked = true;
        info!(sensor = %def.id, "-> FORCE TRIGGERED");

        if !state.event_sent {
            state.event_sent = true;
            self.events.push(SensorEvent {
                sensor_id: def.id.clone(),
                action: def.action.clone(),
                source: ChangeSource::Gm,
            });
        }
        true
    }

    /// Solve rule over current presence, no side effects
    pub fn is_solved(&self) -> bool {
        self.solve_mode.evaluate(self.states.iter().map(|s| s.present))
    }

    /// Read one sensor's pin with its polarity rule applied
    pub fn read_present(&self, index: usize, io: &mut impl DigitalIo) -> Option<bool> {
        let def = self.definitions.get(index)?;
        Some(def.is_present(io.read(def.pin)))
    }

    /// Drain events raised since the last call
    pub fn take_events(&mut self) -> Vec<SensorEvent> {
        std::mem::take(&mut self.events)
    }

    pub fn state(&self, index: usize) -> Option<&SensorState> {
        self.states.get(index)
    }

    pub fn state_by_id(&self, sensor_id: &str) -> Option<&SensorState> {
        self.index_of(sensor_id).and_then(|i| self.states.get(i))
    }

    pub fn definition(&self, index: usize) -> Option<&SensorDefinition> {
        self.definitions.get(index)
    }

    pub fn definitions(&self) -> &[SensorDefinition] {
        &self.definitions
    }

    pub fn count(&self) -> usize {
        self.definitions.len()
    }

    pub fn solve_mode(&self) -> SolveMode {
        self.solve_mode
    }

    /// Definitions paired with their state
    pub fn iter(&self) -> impl Iterator<Item = (&SensorDefinition, &SensorState)> {
        self.definitions.iter().zip(self.states.iter())
    }

    fn index_of(&self, sensor_id: &str) -> Option<usize> {
        self.definitions.iter().position(|d| d.id == sensor_id)
    }

    fn reinitialize(&mut self, io: &mut impl DigitalIo, now: Millis) {
        for (def, state) in self.definitions.iter().zip(self.states.iter_mut()) {
            let raw = def.is_present(io.read(def.pin));
            *state = SensorState::fresh(def, Debouncer::new(raw, now));
        }
        self.events.clear();
    }
}

// =============================================================================
// TESTS
// =============================================================================
