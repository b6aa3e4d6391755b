//! Transport errors.

use thiserror::Error;

/// Failures of the underlying frame channel.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransportError {
    #[error("Transport closed")]
    Closed,

    #[error("Post failed: {0}")]
    PostFailed(String),
}
