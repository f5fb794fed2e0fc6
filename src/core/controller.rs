//! Prop controller: the top-level state machine and control loop
//!
//! One `tick()` runs, in order:
//! 1. indicator update (mirror sensor, or solved blink)
//! 2. network service, with received commands dispatched to completion
//! 3. status announcement owed by a new broker session
//! 4. reset button long-press detection
//! 5. reset-feedback blink; while active nothing below runs
//! 6. sensor tick and solve latch, unless inside the post-reset ignore window
//!
//! Nothing blocks. Every wait is a deadline compared against the board clock.

use tracing::{debug, info, warn};

use crate::config::PropConfig;
use crate::core::bridge::NetworkBridge;
use crate::core::outputs::OutputController;
use crate::core::sensors::SensorEngine;
use crate::core::status::StatusPublisher;
use crate::error::ConfigError;
use crate::hal::{Board, DigitalIo, Level, PinMode, SimBoard, Transport};
use crate::types::{
    ChangeSource, Command, Debouncer, Millis, PropPhase, PropState, ReasonCode, StatusSnapshot,
};

/// Onboard indicator light
#[derive(Debug)]
struct Indicator {
    pin: u8,
    active_low: bool,
    lit: bool,
    last_toggle: Millis,
    /// Sensor index mirrored on the light, with its own debouncer
    mirror: Option<(usize, Debouncer)>,
}

impl Indicator {
    fn set(&mut self, io: &mut impl DigitalIo, on: bool) {
        self.lit = on;
        io.write(self.pin, Level::from(on != self.active_low));
    }

    fn blink(&mut self, io: &mut impl DigitalIo, now: Millis, period_ms: u32) {
        if now.elapsed_since(self.last_toggle) >= period_ms {
            self.last_toggle = now;
            let next = !self.lit;
            self.set(io, next);
        }
    }
}

/// Active-low long-press detector
#[derive(Debug, Default)]
struct ResetButton {
    pressed_at: Option<Millis>,
    fired: bool,
}

impl ResetButton {
    /// True on the single tick where the hold time is reached
    fn update(&mut self, pressed: bool, now: Millis, hold_ms: u32) -> bool {
        if !pressed {
            self.pressed_at = None;
            self.fired = false;
            return false;
        }
        let since = *self.pressed_at.get_or_insert(now);
        if !self.fired && now.elapsed_since(since) >= hold_ms {
            self.fired = true;
            return true;
        }
        false
    }
}

pub struct PropController<B: Board, T: Transport> {
    config: PropConfig,
    board: B,
    sensors: SensorEngine,
    outputs: OutputController,
    bridge: NetworkBridge<T>,
    publisher: StatusPublisher,
    state: PropState,
    indicator: Indicator,
    button: ResetButton,
}

impl<B: Board, T: Transport> PropController<B, T> {
    pub fn new(config: PropConfig, board: B, transport: T) -> Result<Self, ConfigError> {
        config.validate()?;

        let sensors = SensorEngine::new(config.sensors.clone(), config.solve_mode, config.timing.debounce_ms);
        let outputs = OutputController::new(config.outputs.clone());
        let bridge = NetworkBridge::new(&config, transport);
        let publisher = StatusPublisher::from_config(&config);
        let indicator = Indicator {
            pin: config.pins.indicator,
            active_low: config.pins.indicator_active_low,
            lit: false,
            last_toggle: Millis::ZERO,
            mirror: config.mirror_sensor.map(|index| (index, Debouncer::new(false, Millis::ZERO))),
        };

        Ok(Self {
            config,
            board,
            sensors,
            outputs,
            bridge,
            publisher,
            state: PropState::new(),
            indicator,
            button: ResetButton::default(),
        })
    }

    /// Configure hardware, seed sensor state and start networking
    pub fn begin(&mut self) {
        let now = self.board.now();
        info!(
            device = %self.config.identity.device_id,
            sensors = self.sensors.count(),
            outputs = self.outputs.count(),
            solve_mode = ?self.sensors.solve_mode(),
            "prop starting"
        );

        self.board.configure(self.config.pins.indicator, PinMode::Output);
        self.board.configure(self.config.pins.reset_button, PinMode::InputPullUp);
        self.indicator.set(&mut self.board, false);
        self.indicator.last_toggle = now;

        self.sensors.begin(&mut self.board, now);
        self.outputs.begin(&mut self.board);

        if let Some((index, _)) = self.indicator.mirror {
            let raw = self.sensors.read_present(index, &mut self.board).unwrap_or(false);
            self.indicator.mirror = Some((index, Debouncer::new(raw, now)));
        }

        self.bridge.begin(now);
        self.announce(now);
    }

    /// One pass of the control loop
    pub fn tick(&mut self) {
        let now = self.board.now();

        self.update_indicator(now);

        for command in self.bridge.tick(now) {
            self.dispatch(command);
        }

        self.announce(now);

        let pressed = self.board.read(self.config.pins.reset_button) == Level::Low;
        if self.button.update(pressed, now, self.config.timing.reset_hold_ms) {
            info!("reset button held");
            self.reset();
        }

        if self.state.reset_feedback.poll(now) {
            self.indicator.blink(&mut self.board, now, self.config.timing.reset_feedback_blink_ms);
            return;
        }

        if self.state.ignoring_sensors.poll(now) {
            return;
        }

        let solved = self.sensors.tick(&mut self.board, now);
        self.flush_sensor_events(now);

        if solved && !self.state.solved_latched {
            self.state.solved_latched = true;
            self.state.last_change_source = ChangeSource::Player;
            info!("SOLVED by player");
            self.outputs.release(&mut self.board);
            self.publish_status(now);
        }
    }

    /// Execute one command to completion
    pub fn dispatch(&mut self, command: Command) {
        info!(command = %command, "command");
        match command {
            Command::Reset => self.reset(),
            Command::ForceSolved { solved, source } => self.force_solved(solved, source),
            Command::Arm => self.arm(),
            Command::SetOutput { sensor_id, source } => self.set_output(&sensor_id, source),
            Command::Unknown => debug!(reason = %ReasonCode::C001_COMMAND_UNKNOWN, "ignored"),
        }
    }

    /// Start a new session
    pub fn reset(&mut self) {
        let now = self.board.now();

        self.state.solved_latched = false;
        self.state.override_active = false;
        self.state.last_change_source = ChangeSource::Device;

        self.sensors.reset(&mut self.board, now);
        self.outputs.reset(&mut self.board);

        self.state.ignoring_sensors.start(now, self.config.timing.ignore_sensors_ms);
        self.state.reset_feedback.start(now, self.config.timing.reset_feedback_ms);
        self.indicator.last_toggle = now;
        self.indicator.set(&mut self.board, false);

        self.publish_status(now);
        info!("reset complete");
    }

    /// Lock outputs; solved and override are untouched
    pub fn arm(&mut self) {
        let now = self.board.now();
        self.outputs.arm(&mut self.board);
        self.publish_status(now);
    }

    /// Force the puzzle forward. `solved == false` is ignored: only a reset
    /// goes back.
    pub fn force_solved(&mut self, solved: bool, source: ChangeSource) {
        if !solved {
            warn!(%source, reason = %ReasonCode::C002_UNSOLVE_IGNORED, "force unsolve ignored");
            return;
        }
        let now = self.board.now();

        self.state.last_change_source = source;
        if source == ChangeSource::Gm {
            self.state.override_active = true;
        }
        self.state.solved_latched = true;
        info!(%source, override_active = self.state.override_active, "SOLVED (forced)");

        self.outputs.release(&mut self.board);
        self.publisher.publish_event(&mut self.bridge, "force_solved", source, now);
        self.publish_status(now);
    }

    /// Force-trigger a sensor. The latch is left to the next sensor tick.
    pub fn set_output(&mut self, sensor_id: &str, source: ChangeSource) {
        let now = self.board.now();
        info!(sensor = sensor_id, %source, "set_output");
        if self.sensors.force_trigger(sensor_id) {
            self.flush_sensor_events(now);
        }
    }

    pub fn state(&self) -> &PropState {
        &self.state
    }

    pub fn phase(&self) -> PropPhase {
        self.state.phase(self.board.now())
    }

    pub fn is_solved(&self) -> bool {
        self.state.solved_latched
    }

    pub fn snapshot(&self) -> StatusSnapshot {
        self.publisher.snapshot(
            &self.state,
            &self.sensors,
            &self.outputs,
            self.board.now(),
            self.bridge.is_connected(),
        )
    }

    pub fn indicator_lit(&self) -> bool {
        self.indicator.lit
    }

    pub fn config(&self) -> &PropConfig {
        &self.config
    }

    pub fn sensors(&self) -> &SensorEngine {
        &self.sensors
    }

    pub fn outputs(&self) -> &OutputController {
        &self.outputs
    }

    pub fn bridge(&self) -> &NetworkBridge<T> {
        &self.bridge
    }

    pub fn publisher(&self) -> &StatusPublisher {
        &self.publisher
    }

    pub fn board(&self) -> &B {
        &self.board
    }

    pub fn board_mut(&mut self) -> &mut B {
        &mut self.board
    }

    pub fn transport(&self) -> &T {
        self.bridge.transport()
    }

    pub fn transport_mut(&mut self) -> &mut T {
        self.bridge.transport_mut()
    }

    fn update_indicator(&mut self, now: Millis) {
        if self.state.reset_feedback.is_active(now) {
            return;
        }
        match self.indicator.mirror.as_mut() {
            Some((index, debounce)) => {
                let Some(raw) = self.sensors.read_present(*index, &mut self.board) else {
                    return;
                };
                if let Some(present) = debounce.observe(raw, now, self.config.timing.debounce_ms) {
                    if present != self.indicator.lit {
                        self.indicator.set(&mut self.board, present);
                    }
                }
            }
            None if self.state.solved_latched => {
                self.indicator.blink(&mut self.board, now, self.config.timing.solved_blink_ms);
            }
            None => {
                if self.indicator.lit {
                    self.indicator.set(&mut self.board, false);
                }
            }
        }
    }

    fn announce(&mut self, now: Millis) {
        if self.bridge.is_connected() && self.bridge.take_announce_pending() {
            debug!("announcing status for new session");
            self.publish_status(now);
        }
    }

    fn publish_status(&mut self, now: Millis) {
        self.publisher
            .publish_status(&mut self.bridge, &self.state, &self.sensors, &self.outputs, now);
    }

    fn flush_sensor_events(&mut self, now: Millis) {
        for event in self.sensors.take_events() {
            self.publisher.publish_event(&mut self.bridge, &event.action, event.source, now);
        }
    }
}

impl<T: Transport> PropController<SimBoard, T> {
    /// Advance simulated time in fixed ticks
    pub fn run_for(&mut self, ms: u32) {
        for _ in 0..(ms / crate::SIM_TICK_MS) {
            self.board.advance(crate::SIM_TICK_MS);
            self.tick();
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================
