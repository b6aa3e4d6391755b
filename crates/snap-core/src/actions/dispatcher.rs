//! Action dispatcher.

use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::{Map, Value};
use tracing::trace;

use snap_protocols::{Action, ActionError};

use crate::messenger::Messenger;

/// Sends actions through the messenger, injecting the current preview
/// language unless the caller set one.
#[derive(Clone)]
pub struct Dispatcher {
    messenger: Messenger,
    language: Arc<Mutex<Option<String>>>,
}

impl Dispatcher {
    pub fn new(messenger: Messenger) -> Self {
        Self {
            messenger,
            language: Arc::new(Mutex::new(None)),
        }
    }

    pub fn messenger(&self) -> &Messenger {
        &self.messenger
    }

    pub fn language(&self) -> Option<String> {
        self.language.lock().clone()
    }

    pub fn set_language(&self, language: Option<String>) {
        *self.language.lock() = language;
    }

    /// Set the language only if none is set yet.
    pub fn adopt_language(&self, language: &str) {
        let mut current = self.language.lock();
        if current.is_none() {
            *current = Some(language.to_string());
        }
    }

    pub async fn send_action(
        &self,
        action: Action,
        mut params: Map<String, Value>,
        result: bool,
    ) -> Result<Value, ActionError> {
        let has_language = params
            .get("previewLanguage")
            .is_some_and(|lang| !lang.is_null() && lang.as_str() != Some(""));
        if !has_language {
            if let Some(language) = self.language() {
                params.insert("previewLanguage".to_string(), Value::String(language));
            }
        }
        trace!(action = %action, "dispatch");
        Ok(self.messenger.send_action(action, params, result).await?)
    }
}

/// Unwrap a `json!` object literal into a parameter map.
pub(crate) fn object(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}
