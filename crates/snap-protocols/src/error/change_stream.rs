//! Change-stream errors.

use thiserror::Error;

/// Failures while waiting on the CaaS change stream.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ChangeStreamError {
    #[error("Waiting for CaaS document {operation} cancelled. The provided preview id can't be empty.")]
    MissingPreviewId { operation: &'static str },

    #[error("Waiting for CaaS document update timed out. Document was not updated in CaaS within {timeout_ms} milliseconds.")]
    Timeout { timeout_ms: u64 },

    #[error("No locale known for language '{0}'")]
    UnknownLocale(String),

    #[error("Invalid collection URL: {0}")]
    InvalidUrl(String),

    #[error("Secure token request failed: {0}")]
    SecureToken(String),

    #[error("HTTP error: {0}")]
    Http(String),

    #[error("Socket error: {0}")]
    Socket(String),

    #[error("Failed to connect to WebSocket after {attempts} attempts.")]
    RetriesExhausted { attempts: u32 },

    /// The adapter shut down while a wait was pending.
    #[error("Change stream closed")]
    Closed,
}
