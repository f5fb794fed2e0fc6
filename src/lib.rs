//! Prop runtime: reactive core of a single-board escape-room prop controller
//!
//! Noisy digital sensor reads → debounced presence → latched "solved" state,
//! fail-safe lock outputs, and a JSON publish/subscribe bridge to the game
//! master console. Everything runs from one non-blocking `tick()`.

pub mod config;
pub mod core;
pub mod error;
pub mod hal;
pub mod types;

// =============================================================================
// BEHAVIOR TUNING - defaults for PropConfig timing
// =============================================================================

/// Raw input must be stable this long before a transition is accepted
pub const DEBOUNCE_MS: u32 = 20;

/// Reset button hold time before a reset fires
pub const RESET_HOLD_MS: u32 = 1000;

/// Fast-blink feedback window after a reset
pub const RESET_FEEDBACK_MS: u32 = 1500;

/// Indicator toggle period during reset feedback
pub const RESET_FEEDBACK_BLINK_MS: u32 = 100;

/// Sensors are not evaluated for this long after a reset
/// Longer than the feedback window so a held object cannot re-solve instantly
pub const IGNORE_SENSORS_MS: u32 = 2000;

/// Indicator toggle period while solved (only used without a mirror sensor)
pub const SOLVED_BLINK_MS: u32 = 300;

/// Tick period of the simulated control loop (CLI, bench server, tests)
pub const SIM_TICK_MS: u32 = 5;

// =============================================================================
// NETWORK
// =============================================================================

/// Minimum spacing between link-layer (Wi-Fi) connection attempts
pub const LINK_RETRY_MS: u32 = 5000;

/// Minimum spacing between broker session attempts
pub const SESSION_RETRY_MS: u32 = 3000;

/// Largest inbound command payload accepted (bytes)
pub const MAX_COMMAND_BYTES: usize = 255;

/// Topic namespace root
pub const TOPIC_NAMESPACE: &str = "ey";

// =============================================================================
// VERSION
// =============================================================================

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// JSON contract version spoken on the wire (frozen)
pub const CONTRACT_VERSION: &str = "1.0";
