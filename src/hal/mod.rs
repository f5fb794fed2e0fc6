//! Hardware and transport seams
//!
//! The runtime never touches a pin or socket directly. A board support
//! crate (or [`sim`] in tests) implements these traits; the core only sees
//! levels, a wrapping millisecond clock, and a non-blocking pub/sub client.

pub mod sim;

use crate::error::TransportError;
use crate::types::Millis;

pub use sim::{PublishedMessage, SimBoard, SimTransport};

/// Digital pin level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Level {
    Low,
    High,
}

impl From<bool> for Level {
    fn from(high: bool) -> Self {
        if high {
            Level::High
        } else {
            Level::Low
        }
    }
}

/// Pin direction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PinMode {
    InputPullUp,
    Output,
}

/// Monotonic millisecond clock (wraps)
pub trait Clock {
    fn now(&self) -> Millis;
}

/// Digital GPIO access
pub trait DigitalIo {
    fn configure(&mut self, pin: u8, mode: PinMode);
    fn read(&mut self, pin: u8) -> Level;
    fn write(&mut self, pin: u8, level: Level);
}

/// Everything the runtime needs from the board
pub trait Board: Clock + DigitalIo {}

impl<T: Clock + DigitalIo> Board for T {}

/// Link-layer (Wi-Fi) connectivity
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkState {
    Down,
    /// Attempt in progress; do not restart it
    Connecting,
    Up,
}

/// Delivery guarantee for the last will
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QoS {
    AtLeastOnce,
}

/// Message the broker publishes for us if we vanish
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LastWill {
    pub topic: String,
    pub payload: Vec<u8>,
    pub qos: QoS,
    pub retain: bool,
}

/// A message received on a subscribed topic
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    pub topic: String,
    pub payload: Vec<u8>,
}

/// Non-blocking publish/subscribe client.
///
/// Every method must return promptly; connection attempts report their
/// outcome through `link_state` / `session_connected` on later calls or
/// through the returned result.
pub trait Transport {
    fn link_state(&self) -> LinkState;

    /// Begin a link-layer connection attempt
    fn start_link(&mut self);

    fn session_connected(&self) -> bool;

    /// Open a broker session registering `will`
    fn connect_session(&mut self, client_id: &str, will: &LastWill) -> Result<(), TransportError>;

    fn subscribe(&mut self, topic: &str) -> Result<(), TransportError>;

    fn publish(&mut self, topic: &str, payload: &[u8], retain: bool) -> Result<(), TransportError>;

    /// Service one iteration of the client loop, returning delivered messages
    fn poll(&mut self) -> Vec<InboundMessage>;
}
