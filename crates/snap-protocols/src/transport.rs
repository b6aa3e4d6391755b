//! Seams to the embedding environment.
//!
//! The messenger talks to the host through a [`FrameTransport`]: an untyped,
//! fire-and-forget channel equivalent to `postMessage`. Inbound messages are
//! delivered separately as a stream of [`WindowMessage`]s.

use serde_json::Value;

use crate::error::TransportError;

/// A message received from another frame.
#[derive(Debug, Clone, PartialEq)]
pub struct WindowMessage {
    /// Origin of the sending frame.
    pub origin: String,
    /// Raw message data.
    pub data: Value,
}

impl WindowMessage {
    pub fn new(origin: impl Into<String>, data: Value) -> Self {
        Self {
            origin: origin.into(),
            data,
        }
    }
}

/// Outbound half of the cross-frame channel.
pub trait FrameTransport: Send + Sync {
    /// Post `data` to the host frame. Never waits for an answer.
    fn post_message(&self, data: Value, target_origin: &str) -> Result<(), TransportError>;

    /// Whether the page runs embedded in a host frame. A top-level page skips
    /// the handshake entirely.
    fn is_embedded(&self) -> bool;
}

/// Window-level operations used by fallback handlers.
pub trait HostWindow: Send + Sync {
    /// Reload the current view.
    fn reload(&self);

    /// Navigate the current view to `url`.
    fn navigate(&self, url: &str);
}
