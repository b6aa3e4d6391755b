//! Top-level bridge error type.

use thiserror::Error;

use super::{ActionError, ButtonError, ChangeStreamError, MessengerError, TransportError};

/// Top-level error type; also the failure type of bus handlers.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum BridgeError {
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Messenger error: {0}")]
    Messenger(#[from] MessengerError),

    #[error("Action error: {0}")]
    Action(#[from] ActionError),

    #[error("Button error: {0}")]
    Button(#[from] ButtonError),

    #[error("Change stream error: {0}")]
    ChangeStream(#[from] ChangeStreamError),

    #[error("Event handler for '{event}' failed: {message}")]
    Handler { event: String, message: String },

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for BridgeError {
    fn from(e: serde_json::Error) -> Self {
        BridgeError::Serialization(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_action_error_from() {
        let err = BridgeError::from(ActionError::MissingPreviewId);
        assert!(err.to_string().contains("Action error"));
    }

    #[test]
    fn test_handler_error_display() {
        let err = BridgeError::Handler {
            event: "tpp-status-change".to_string(),
            message: "boom".to_string(),
        };
        let display = err.to_string();
        assert!(display.contains("tpp-status-change"));
        assert!(display.contains("boom"));
    }

    #[test]
    fn test_button_error_from() {
        let err = BridgeError::from(ButtonError::new("edit", "execute", "dialog closed"));
        assert!(err.to_string().contains("edit"));
        assert!(err.to_string().contains("execute"));
    }
}
