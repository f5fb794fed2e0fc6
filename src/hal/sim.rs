//! Simulated board and broker
//!
//! Used by the integration tests, the interactive CLI and the bench server.
//! Time only moves when `advance` is called, so every run is deterministic.

use std::collections::{HashMap, VecDeque};

use serde::Serialize;

use crate::error::TransportError;
use crate::hal::{
    Clock, DigitalIo, InboundMessage, LastWill, Level, LinkState, PinMode, Transport,
};
use crate::types::Millis;

/// Simulated GPIO bank with a manual clock
#[derive(Debug, Default)]
pub struct SimBoard {
    now: Millis,
    modes: HashMap<u8, PinMode>,
    /// Externally driven input levels
    inputs: HashMap<u8, Level>,
    /// Last level written to each output
    outputs: HashMap<u8, Level>,
    /// Number of level changes seen per output pin
    toggles: HashMap<u8, usize>,
}

impl SimBoard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn starting_at(now: Millis) -> Self {
        Self { now, ..Self::default() }
    }

    pub fn advance(&mut self, ms: u32) {
        self.now = self.now.wrapping_add(ms);
    }

    /// Drive an input pin
    pub fn set_level(&mut self, pin: u8, level: Level) {
        self.inputs.insert(pin, level);
    }

    /// Let an input float back to its pull-up / default level
    pub fn release(&mut self, pin: u8) {
        self.inputs.remove(&pin);
    }

    pub fn output_level(&self, pin: u8) -> Option<Level> {
        self.outputs.get(&pin).copied()
    }

    pub fn mode(&self, pin: u8) -> Option<PinMode> {
        self.modes.get(&pin).copied()
    }

    pub fn toggle_count(&self, pin: u8) -> usize {
        self.toggles.get(&pin).copied().unwrap_or(0)
    }
}

impl Clock for SimBoard {
    fn now(&self) -> Millis {
        self.now
    }
}

impl DigitalIo for SimBoard {
    fn configure(&mut self, pin: u8, mode: PinMode) {
        self.modes.insert(pin, mode);
    }

    fn read(&mut self, pin: u8) -> Level {
        if let Some(level) = self.inputs.get(&pin) {
            return *level;
        }
        match self.modes.get(&pin) {
            Some(PinMode::InputPullUp) => Level::High,
            _ => Level::Low,
        }
    }

    fn write(&mut self, pin: u8, level: Level) {
        let previous = self.outputs.insert(pin, level);
        if previous != Some(level) {
            *self.toggles.entry(pin).or_insert(0) += 1;
        }
    }
}

/// A message seen by the simulated broker
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PublishedMessage {
    pub topic: String,
    pub payload: String,
    pub retain: bool,
    /// Published by the broker on our behalf (last will)
    pub from_will: bool,
}

impl PublishedMessage {
    pub fn json(&self) -> Option<serde_json::Value> {
        serde_json::from_str(&self.payload).ok()
    }
}

/// In-memory broker + client
#[derive(Debug)]
pub struct SimTransport {
    link_available: bool,
    broker_available: bool,
    reject_publish: bool,
    link: LinkState,
    session: bool,
    will: Option<LastWill>,
    client_id: Option<String>,
    subscriptions: Vec<String>,
    inbox: VecDeque<InboundMessage>,
    published: Vec<PublishedMessage>,
    link_attempts: usize,
    session_attempts: usize,
}

impl Default for SimTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl SimTransport {
    /// Link and broker both reachable
    pub fn new() -> Self {
        Self {
            link_available: true,
            broker_available: true,
            reject_publish: false,
            link: LinkState::Down,
            session: false,
            will: None,
            client_id: None,
            subscriptions: Vec::new(),
            inbox: VecDeque::new(),
            published: Vec::new(),
            link_attempts: 0,
            session_attempts: 0,
        }
    }

    /// Nothing reachable until toggled on
    pub fn offline() -> Self {
        Self { link_available: false, broker_available: false, ..Self::new() }
    }

    /// Make the link reachable or drop it (dropping also kills the session)
    pub fn set_link_available(&mut self, available: bool) {
        self.link_available = available;
        if !available {
            self.link = LinkState::Down;
            self.drop_session();
        }
    }

    pub fn set_broker_available(&mut self, available: bool) {
        self.broker_available = available;
        if !available {
            self.drop_session();
        }
    }

    /// Refuse publishes while the session stays up
    pub fn set_reject_publish(&mut self, reject: bool) {
        self.reject_publish = reject;
    }

    /// Put the link in the in-progress state
    pub fn set_link_connecting(&mut self) {
        self.link = LinkState::Connecting;
    }

    /// Broker loses us: session closed and last will published
    pub fn drop_session(&mut self) {
        if !self.session {
            return;
        }
        self.session = false;
        self.subscriptions.clear();
        if let Some(will) = &self.will {
            self.published.push(PublishedMessage {
                topic: will.topic.clone(),
                payload: String::from_utf8_lossy(&will.payload).into_owned(),
                retain: will.retain,
                from_will: true,
            });
        }
    }

    /// Queue a message as if another client published it
    pub fn inject(&mut self, topic: impl Into<String>, payload: impl Into<Vec<u8>>) {
        self.inbox.push_back(InboundMessage { topic: topic.into(), payload: payload.into() });
    }

    pub fn published(&self) -> &[PublishedMessage] {
        &self.published
    }

    pub fn published_on<'a>(&'a self, topic: &'a str) -> impl Iterator<Item = &'a PublishedMessage> {
        self.published.iter().filter(move |m| m.topic == topic)
    }

    pub fn take_published(&mut self) -> Vec<PublishedMessage> {
        std::mem::take(&mut self.published)
    }

    pub fn clear_published(&mut self) {
        self.published.clear();
    }

    pub fn subscriptions(&self) -> &[String] {
        &self.subscriptions
    }

    pub fn will(&self) -> Option<&LastWill> {
        self.will.as_ref()
    }

    pub fn client_id(&self) -> Option<&str> {
        self.client_id.as_deref()
    }

    pub fn link_attempts(&self) -> usize {
        self.link_attempts
    }

    pub fn session_attempts(&self) -> usize {
        self.session_attempts
    }
}

impl Transport for SimTransport {
    fn link_state(&self) -> LinkState {
        self.link
    }

    fn start_link(&mut self) {
        self.link_attempts += 1;
        self.link = if self.link_available { LinkState::Up } else { LinkState::Down };
    }

    fn session_connected(&self) -> bool {
        self.session
    }

    fn connect_session(&mut self, client_id: &str, will: &LastWill) -> Result<(), TransportError> {
        self.session_attempts += 1;
        if self.link != LinkState::Up {
            return Err(TransportError::NotConnected);
        }
        if !self.broker_available {
            // PubSubClient reports -2 for a failed network connect
            return Err(TransportError::Refused(-2));
        }
        self.session = true;
        self.client_id = Some(client_id.to_string());
        self.will = Some(will.clone());
        Ok(())
    }

    fn subscribe(&mut self, topic: &str) -> Result<(), TransportError> {
        if !self.session {
            return Err(TransportError::SubscribeFailed { topic: topic.to_string() });
        }
        if !self.subscriptions.iter().any(|t| t == topic) {
            self.subscriptions.push(topic.to_string());
        }
        Ok(())
    }

    fn publish(&mut self, topic: &str, payload: &[u8], retain: bool) -> Result<(), TransportError> {
        if !self.session {
            return Err(TransportError::NotConnected);
        }
        if self.reject_publish {
            return Err(TransportError::PublishFailed { topic: topic.to_string() });
        }
        self.published.push(PublishedMessage {
            topic: topic.to_string(),
            payload: String::from_utf8_lossy(payload).into_owned(),
            retain,
            from_will: false,
        });
        Ok(())
    }

    fn poll(&mut self) -> Vec<InboundMessage> {
        if !self.session {
            return Vec::new();
        }
        let subscriptions = &self.subscriptions;
        self.inbox
            .drain(..)
            .filter(|m| subscriptions.iter().any(|t| *t == m.topic))
            .collect()
    }
}
