//! Button hook errors.

use thiserror::Error;

/// A failing button hook. Isolated per button, never fatal to the overlay.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("Button '{button}' failed in {hook}: {message}")]
pub struct ButtonError {
    pub button: String,
    pub hook: &'static str,
    pub message: String,
}

impl ButtonError {
    pub fn new(button: impl Into<String>, hook: &'static str, message: impl Into<String>) -> Self {
        Self {
            button: button.into(),
            hook,
            message: message.into(),
        }
    }
}
