//! Error types

use thiserror::Error;

/// Errors loading or validating a prop configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{kind} id must not be empty")]
    EmptyId { kind: &'static str },

    #[error("duplicate {kind} id `{id}`")]
    DuplicateId { kind: &'static str, id: String },

    #[error("{kind} id `{id}` contains a topic separator or wildcard")]
    InvalidIdChars { kind: &'static str, id: String },

    #[error("mirror sensor index {index} out of range ({count} sensors)")]
    MirrorOutOfRange { index: usize, count: usize },

    #[error("timing value `{field}` must be greater than zero")]
    ZeroTiming { field: &'static str },
}

/// Errors reported by a publish/subscribe transport
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("not connected")]
    NotConnected,

    #[error("broker refused connection (rc={0})")]
    Refused(i32),

    #[error("publish to {topic} failed")]
    PublishFailed { topic: String },

    #[error("subscribe to {topic} failed")]
    SubscribeFailed { topic: String },
}
