//! Messenger errors.

use thiserror::Error;

use super::TransportError;

/// Failures of a correlated frame call.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum MessengerError {
    /// No matching callback arrived in time.
    #[error("Timeout for message {description}")]
    Timeout { description: String },

    /// The handshake never succeeded, the host is unreachable.
    #[error("Not connected to the host frame")]
    NotConnected,

    /// Every generated correlation id collided with an outstanding one.
    #[error("No free correlation id after {attempts} attempts")]
    CorrelationExhausted { attempts: u32 },

    /// The pending entry was dropped without an answer.
    #[error("Callback channel closed")]
    ChannelClosed,

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for MessengerError {
    fn from(e: serde_json::Error) -> Self {
        MessengerError::Serialization(e.to_string())
    }
}
