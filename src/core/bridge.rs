//! Network bridge: best-effort broker connectivity and command intake
//!
//! Two independent reconnect loops, each gated by its own retry interval:
//! - link layer (Wi-Fi): restarted only when Down, never while Connecting
//! - broker session: attempted only while the link is Up
//!
//! On a new session the bridge registers an offline last will on `.../lwt`,
//! subscribes to the device and broadcast command topics, announces
//! `online: true` (retained) and flags that a status snapshot is owed.
//!
//! Nothing here blocks or queues. A publish while disconnected is dropped;
//! the next reconnect announcement re-synchronizes subscribers.

use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::config::PropConfig;
use crate::hal::{LastWill, LinkState, QoS, Transport};
use crate::types::{ChangeSource, Command, Millis, PresenceMessage, ReasonCode, RetryTimer};

/// Topic set for one prop: `{ns}/{site}/{room}/prop/{deviceId}/...`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Topics {
    pub status: String,
    pub event: String,
    pub cmd: String,
    pub lwt: String,
    /// `{ns}/{site}/{room}/all/cmd`
    pub broadcast_cmd: String,
}

impl Topics {
    pub fn new(namespace: &str, site: &str, room: &str, device_id: &str) -> Self {
        let room_base = format!("{}/{}/{}", namespace, site, room);
        let base = format!("{}/prop/{}", room_base, device_id);
        Self {
            status: format!("{}/status", base),
            event: format!("{}/event", base),
            cmd: format!("{}/cmd", base),
            lwt: format!("{}/lwt", base),
            broadcast_cmd: format!("{}/all/cmd", room_base),
        }
    }

    pub fn from_config(config: &PropConfig) -> Self {
        let id = &config.identity;
        Self::new(&id.namespace, &id.site, &id.room, &id.device_id)
    }

    pub fn topic(&self, channel: Channel) -> &str {
        match channel {
            Channel::Status => &self.status,
            Channel::Event => &self.event,
            Channel::Presence => &self.lwt,
        }
    }
}

/// Outbound message class
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Channel {
    /// Retained snapshot
    Status,
    /// Transient notification
    Event,
    /// Retained online/offline
    Presence,
}

impl Channel {
    pub fn retained(self) -> bool {
        !matches!(self, Channel::Event)
    }
}

pub struct NetworkBridge<T: Transport> {
    transport: T,
    topics: Topics,
    client_id: String,
    prop_id: String,
    link_retry: RetryTimer,
    session_retry: RetryTimer,
    link_up: bool,
    session_up: bool,
    announce_pending: bool,
}

impl<T: Transport> NetworkBridge<T> {
    pub fn new(config: &PropConfig, transport: T) -> Self {
        Self {
            transport,
            topics: Topics::from_config(config),
            client_id: config.client_id(),
            prop_id: config.identity.device_id.clone(),
            link_retry: RetryTimer::new(config.network.link_retry_ms),
            session_retry: RetryTimer::new(config.network.session_retry_ms),
            link_up: false,
            session_up: false,
            announce_pending: false,
        }
    }

    /// First connection attempts (non-blocking)
    pub fn begin(&mut self, now: Millis) {
        self.service_link(now);
        self.service_session(now);
    }

    /// Maintain link and session, then run one client-loop iteration.
    ///
    /// Returns the recognized commands delivered in this iteration, in
    /// arrival order. Unknown payloads are dropped here.
    pub fn tick(&mut self, now: Millis) -> Vec<Command> {
        self.service_link(now);
        self.service_session(now);

        if !self.transport.session_connected() {
            return Vec::new();
        }

        self.transport
            .poll()
            .into_iter()
            .map(|msg| {
                let cmd = parse_command(&msg.payload);
                debug!(topic = %msg.topic, command = %cmd, "inbound");
                cmd
            })
            .filter(|cmd| !cmd.is_unknown())
            .collect()
    }

    pub fn is_connected(&self) -> bool {
        self.transport.session_connected()
    }

    /// True once per established session, until taken
    pub fn take_announce_pending(&mut self) -> bool {
        std::mem::take(&mut self.announce_pending)
    }

    /// Serialize and publish. Returns whether the transport accepted it.
    pub fn publish<M: Serialize>(&mut self, channel: Channel, message: &M) -> bool {
        if !self.transport.session_connected() {
            debug!(?channel, reason = %ReasonCode::P001_PUBLISH_OFFLINE, "publish dropped");
            return false;
        }
        let payload = match serde_json::to_vec(message) {
            Ok(p) => p,
            Err(e) => {
                warn!(?channel, error = %e, "serialize failed");
                return false;
            }
        };
        let topic = self.topics.topic(channel);
        match self.transport.publish(topic, &payload, channel.retained()) {
            Ok(()) => true,
            Err(e) => {
                warn!(topic, error = %e, reason = %ReasonCode::P001_PUBLISH_FAILED, "publish failed");
                false
            }
        }
    }

    pub fn topics(&self) -> &Topics {
        &self.topics
    }

    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    fn service_link(&mut self, now: Millis) {
        match self.transport.link_state() {
            LinkState::Up => {
                if !self.link_up {
                    self.link_up = true;
                    info!(reason = %ReasonCode::N001_LINK_UP, "link ok");
                }
            }
            LinkState::Connecting => {}
            LinkState::Down => {
                if self.link_up {
                    self.link_up = false;
                    warn!(reason = %ReasonCode::N001_LINK_LOST, "link lost");
                }
                if self.link_retry.try_attempt(now) {
                    debug!(reason = %ReasonCode::N001_LINK_ATTEMPT, "link attempt");
                    self.transport.start_link();
                }
            }
        }
    }

    fn service_session(&mut self, now: Millis) {
        if self.transport.session_connected() {
            return;
        }
        if self.session_up {
            self.session_up = false;
            warn!(reason = %ReasonCode::N002_SESSION_LOST, "broker session lost");
        }
        if self.transport.link_state() != LinkState::Up {
            return;
        }
        if !self.session_retry.try_attempt(now) {
            return;
        }

        debug!(client_id = %self.client_id, reason = %ReasonCode::N002_SESSION_ATTEMPT, "broker attempt");
        let will = self.last_will();
        match self.transport.connect_session(&self.client_id, &will) {
            Ok(()) => self.on_session_established(),
            Err(e) => warn!(error = %e, reason = %ReasonCode::N002_SESSION_FAILED, "broker connect failed"),
        }
    }

    fn on_session_established(&mut self) {
        for topic in [self.topics.cmd.clone(), self.topics.broadcast_cmd.clone()] {
            if let Err(e) = self.transport.subscribe(&topic) {
                warn!(topic = %topic, error = %e, reason = %ReasonCode::N002_SUBSCRIBE_FAILED, "subscribe failed");
            }
        }

        self.session_up = true;
        self.announce_pending = true;

        let online = PresenceMessage { prop_id: self.prop_id.clone(), online: true };
        self.publish(Channel::Presence, &online);
        info!(reason = %ReasonCode::N002_SESSION_UP, "broker ok, subscribed");
    }

    fn last_will(&self) -> LastWill {
        let offline = PresenceMessage { prop_id: self.prop_id.clone(), online: false };
        LastWill {
            topic: self.topics.lwt.clone(),
            payload: serde_json::to_vec(&offline).unwrap_or_default(),
            qos: QoS::AtLeastOnce,
            retain: true,
        }
    }
}

// =============================================================================
// COMMAND PARSING
// =============================================================================

/// Parse an inbound command payload.
///
/// Accepted shapes:
/// - legacy: `reset`, `{"type":"reset"}`, `{"type":"setSolved","value":bool}`
/// - contract: `{"type":"cmd","command":"reset"|"force_solved"|"arm"|"set_output",
///   "sensorId"?, "source"?}`
///
/// Anything else is [`Command::Unknown`]. `source` defaults to gm.
pub fn parse_command(payload: &[u8]) -> Command {
    if payload.len() > crate::MAX_COMMAND_BYTES {
        debug!(len = payload.len(), reason = %ReasonCode::C001_PAYLOAD_TOO_LARGE, "command dropped");
        return Command::Unknown;
    }
    let Ok(text) = std::str::from_utf8(payload) else {
        debug!(reason = %ReasonCode::C001_PAYLOAD_UNPARSEABLE, "command dropped");
        return Command::Unknown;
    };
    let text = text.trim();

    if text == "reset" {
        return Command::Reset;
    }

    let doc: Value = match serde_json::from_str(text) {
        Ok(doc) => doc,
        Err(_) => {
            debug!(payload = text, reason = %ReasonCode::C001_PAYLOAD_UNPARSEABLE, "command dropped");
            return Command::Unknown;
        }
    };

    let source = parse_source(doc.get("source").and_then(Value::as_str));

    match doc.get("type").and_then(Value::as_str) {
        Some("cmd") => parse_contract_command(&doc, source),
        Some("reset") => Command::Reset,
        Some("setSolved") => Command::ForceSolved {
            solved: doc.get("value").and_then(Value::as_bool).unwrap_or(false),
            source,
        },
        other => {
            debug!(kind = ?other, reason = %ReasonCode::C001_COMMAND_UNKNOWN, "command dropped");
            Command::Unknown
        }
    }
}

fn parse_contract_command(doc: &Value, source: ChangeSource) -> Command {
    match doc.get("command").and_then(Value::as_str) {
        Some("reset") => Command::Reset,
        Some("force_solved") => Command::ForceSolved { solved: true, source },
        Some("arm") => Command::Arm,
        Some("set_output") => match doc.get("sensorId").and_then(Value::as_str) {
            Some(sensor_id) => Command::SetOutput { sensor_id: sensor_id.to_string(), source },
            None => {
                debug!(reason = %ReasonCode::C001_SENSOR_ID_MISSING, "command dropped");
                Command::Unknown
            }
        },
        other => {
            debug!(command = ?other, reason = %ReasonCode::C001_COMMAND_UNKNOWN, "command dropped");
            Command::Unknown
        }
    }
}

/// Missing or empty → gm. Unrecognized names are still attributed to gm:
/// only the operator console sends commands.
fn parse_source(raw: Option<&str>) -> ChangeSource {
    match raw {
        None | Some("") => ChangeSource::Gm,
        Some(s) => ChangeSource::parse(s).unwrap_or_else(|| {
            debug!(source = s, "unrecognized source, attributing to gm");
            ChangeSource::Gm
        }),
    }
}
