//! Action dispatcher errors.

use thiserror::Error;

use super::MessengerError;

/// Failures surfaced by remote operations.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ActionError {
    #[error("Missing PreviewId!")]
    MissingPreviewId,

    /// Page creation with a forced uid hit an existing element.
    #[error("{message}")]
    DuplicatePage {
        message: String,
        preview_id: Option<String>,
    },

    #[error("{0}")]
    StartNodeNotFound(String),

    #[error("Invalid response for {action}: {message}")]
    InvalidResponse { action: String, message: String },

    #[error("Messenger error: {0}")]
    Messenger(#[from] MessengerError),
}

impl ActionError {
    /// Conflicting preview id carried by a duplicate-page failure.
    pub fn conflicting_preview_id(&self) -> Option<&str> {
        match self {
            ActionError::DuplicatePage { preview_id, .. } => preview_id.as_deref(),
            _ => None,
        }
    }
}
