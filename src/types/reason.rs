//! Reason codes attached to diagnostics
//!
//! Nothing in the tick path fails loudly; every degraded outcome is logged
//! with one of these codes instead.

use serde::{Deserialize, Serialize};

/// Reason codes for connectivity, command handling and state decisions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[allow(non_camel_case_types)]
pub enum ReasonCode {
    // =========================================================================
    // N001: Link layer
    // =========================================================================
    /// Link down, attempt started
    N001_LINK_ATTEMPT,
    /// Link came up
    N001_LINK_UP,
    /// Link lost
    N001_LINK_LOST,

    // =========================================================================
    // N002: Broker session
    // =========================================================================
    /// Session attempt started
    N002_SESSION_ATTEMPT,
    /// Session established, subscribed, online announced
    N002_SESSION_UP,
    /// Broker refused or unreachable
    N002_SESSION_FAILED,
    /// Session lost
    N002_SESSION_LOST,
    /// Subscribe failed after connect
    N002_SUBSCRIBE_FAILED,

    // =========================================================================
    // C001: Command payloads
    // =========================================================================
    /// Not JSON and not a legacy literal
    C001_PAYLOAD_UNPARSEABLE,
    /// Larger than the command buffer
    C001_PAYLOAD_TOO_LARGE,
    /// JSON without a recognized type/command
    C001_COMMAND_UNKNOWN,
    /// set_output without sensorId
    C001_SENSOR_ID_MISSING,

    // =========================================================================
    // C002: Command effects
    // =========================================================================
    /// set_output named a sensor that does not exist
    C002_SENSOR_UNKNOWN,
    /// force_solved(false) ignored; only reset un-solves
    C002_UNSOLVE_IGNORED,
    /// arm re-locked a released output
    C002_ARM_WHILE_RELEASED,

    // =========================================================================
    // P001: Publishing
    // =========================================================================
    /// Publish while disconnected (dropped, never queued)
    P001_PUBLISH_OFFLINE,
    /// Transport rejected the publish
    P001_PUBLISH_FAILED,
}

impl ReasonCode {
    /// Get the code string (for logging)
    pub fn code(&self) -> &'static str {
        match self {
            Self::N001_LINK_ATTEMPT => "N001_LINK_ATTEMPT",
            Self::N001_LINK_UP => "N001_LINK_UP",
            Self::N001_LINK_LOST => "N001_LINK_LOST",
            Self::N002_SESSION_ATTEMPT => "N002_SESSION_ATTEMPT",
            Self::N002_SESSION_UP => "N002_SESSION_UP",
            Self::N002_SESSION_FAILED => "N002_SESSION_FAILED",
            Self::N002_SESSION_LOST => "N002_SESSION_LOST",
            Self::N002_SUBSCRIBE_FAILED => "N002_SUBSCRIBE_FAILED",
            Self::C001_PAYLOAD_UNPARSEABLE => "C001_PAYLOAD_UNPARSEABLE",
            Self::C001_PAYLOAD_TOO_LARGE => "C001_PAYLOAD_TOO_LARGE",
            Self::C001_COMMAND_UNKNOWN => "C001_COMMAND_UNKNOWN",
            Self::C001_SENSOR_ID_MISSING => "C001_SENSOR_ID_MISSING",
            Self::C002_SENSOR_UNKNOWN => "C002_SENSOR_UNKNOWN",
            Self::C002_UNSOLVE_IGNORED => "C002_UNSOLVE_IGNORED",
            Self::C002_ARM_WHILE_RELEASED => "C002_ARM_WHILE_RELEASED",
            Self::P001_PUBLISH_OFFLINE => "P001_PUBLISH_OFFLINE",
            Self::P001_PUBLISH_FAILED => "P001_PUBLISH_FAILED",
        }
    }

    /// Get human-readable description
    pub fn description(&self) -> &'static str {
        match self {
            Self::N001_LINK_ATTEMPT => "Link down, connecting",
            Self::N001_LINK_UP => "Link up",
            Self::N001_LINK_LOST => "Link lost",
            Self::N002_SESSION_ATTEMPT => "Broker session attempt",
            Self::N002_SESSION_UP => "Broker session established",
            Self::N002_SESSION_FAILED => "Broker session failed",
            Self::N002_SESSION_LOST => "Broker session lost",
            Self::N002_SUBSCRIBE_FAILED => "Command subscription failed",
            Self::C001_PAYLOAD_UNPARSEABLE => "Payload is not a command",
            Self::C001_PAYLOAD_TOO_LARGE => "Payload exceeds command buffer",
            Self::C001_COMMAND_UNKNOWN => "Unrecognized command",
            Self::C001_SENSOR_ID_MISSING => "set_output without sensorId",
            Self::C002_SENSOR_UNKNOWN => "Unknown sensor id",
            Self::C002_UNSOLVE_IGNORED => "Un-solve ignored, use reset",
            Self::C002_ARM_WHILE_RELEASED => "Arm re-locked a released output",
            Self::P001_PUBLISH_OFFLINE => "Not connected, publish dropped",
            Self::P001_PUBLISH_FAILED => "Publish rejected by transport",
        }
    }
}

impl std::fmt::Display for ReasonCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.code(), self.description())
    }
}
