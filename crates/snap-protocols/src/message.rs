//! Frame message envelope.
//!
//! Outbound messages are plain objects wrapped under the namespace key,
//! optionally tagged with a `_callbackId`. Inbound messages carry a
//! `_messageType` of either `CALLBACK` (answer to a correlated call) or
//! `EVENT` (host notification).

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use crate::action::Action;
use crate::consts::MODULE_ENDPOINT;

/// Target of an `execute` message.
#[derive(Debug, Clone, PartialEq)]
pub enum ExecuteTarget {
    /// Named remote endpoint, e.g. the module endpoint.
    Endpoint(String),
    /// Script source evaluated by the host.
    Source(String),
}

/// Message sent to the host frame.
#[derive(Debug, Clone, PartialEq)]
pub enum OutboundMessage {
    /// Handshake probe.
    Ping,
    /// Sent once after a successful handshake.
    ConnectApi,
    /// Remote procedure call.
    Execute { target: ExecuteTarget, params: Value },
    /// Topic message, `{ topic: payload }`.
    Subject { topic: String, payload: Value },
    /// Preview element notification.
    SetPreviewElement { preview_id: Option<String> },
}

impl OutboundMessage {
    /// Build an action call on the module endpoint, folding the action
    /// name into the parameters.
    pub fn action(action: Action, mut params: Map<String, Value>) -> Self {
        params.insert("action".to_string(), json!(action.as_str()));
        OutboundMessage::Execute {
            target: ExecuteTarget::Endpoint(MODULE_ENDPOINT.to_string()),
            params: Value::Object(params),
        }
    }

    /// Returns true for the handshake probe, which never waits for the handshake.
    pub fn is_ping(&self) -> bool {
        matches!(self, OutboundMessage::Ping)
    }

    /// Serialize into the object placed under the namespace key.
    pub fn to_payload(&self, callback_id: Option<&str>) -> Value {
        let mut object = match self {
            OutboundMessage::Ping => json_object(json!({ "ping": true })),
            OutboundMessage::ConnectApi => json_object(json!({ "connectApi": true })),
            OutboundMessage::Execute { target, params } => {
                let execute = match target {
                    ExecuteTarget::Endpoint(endpoint) => json!(endpoint),
                    ExecuteTarget::Source(source) => json!({ "source": source }),
                };
                json_object(json!({ "execute": execute, "params": params }))
            }
            OutboundMessage::Subject { topic, payload } => {
                let mut map = Map::new();
                map.insert(topic.clone(), payload.clone());
                map
            }
            OutboundMessage::SetPreviewElement { preview_id } => {
                json_object(json!({ "setPreviewElement": true, "previewId": preview_id }))
            }
        };
        if let Some(id) = callback_id {
            object.insert("_callbackId".to_string(), json!(id));
        }
        Value::Object(object)
    }

    /// Short human readable form used in timeout errors and logs.
    pub fn describe(&self) -> String {
        self.to_payload(None).to_string()
    }
}

fn json_object(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}

/// Kind of an inbound message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum MessageType {
    Ping,
    Execute,
    Event,
    Callback,
    #[serde(other)]
    Unknown,
}

/// Namespaced inbound message.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct InboundMessage {
    #[serde(rename = "_messageType", default)]
    pub message_type: Option<MessageType>,
    #[serde(rename = "_callbackId", default)]
    pub callback_id: Option<Value>,
    #[serde(rename = "_eventId", default)]
    pub event_id: Option<String>,
    #[serde(rename = "_response", default)]
    pub response: Value,
    #[serde(rename = "_payload", default)]
    pub payload: Value,
}

impl InboundMessage {
    /// Extract the namespaced message from raw window message data.
    ///
    /// Returns `None` when the data is not an object or lacks the namespace key.
    pub fn from_window_data(data: &Value, namespace: &str) -> Option<Self> {
        let inner = data.as_object()?.get(namespace)?;
        serde_json::from_value(inner.clone()).ok()
    }

    /// Correlation id as a string key; hosts may echo it as a number.
    pub fn callback_key(&self) -> Option<String> {
        match self.callback_id.as_ref()? {
            Value::String(s) => Some(s.clone()),
            Value::Null => None,
            other => Some(other.to_string()),
        }
    }
}

/// Host answer to the handshake ping.
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
pub struct HandshakeReceipt {
    #[serde(default)]
    pub version: Option<String>,
    #[serde(rename = "isLegacyCC", default)]
    pub is_legacy_cc: bool,
}

/// Parse a string payload that looks like JSON text; anything else, including
/// text that fails to parse, is returned unchanged.
pub fn parse_if_json(payload: Value) -> Value {
    if let Value::String(text) = &payload {
        let looks_like_json = matches!(text.trim_start().chars().next(), Some('[' | '{' | '"'));
        if looks_like_json {
            if let Ok(parsed) = serde_json::from_str::<Value>(text) {
                return parsed;
            }
        }
    }
    payload
}

/// Normalize a host response or event payload.
///
/// Unwraps the `{error, object}` envelope: `error: true` yields null,
/// otherwise `object` is unwrapped and parsed again.
pub fn validate_response(payload: Value) -> Value {
    let payload = parse_if_json(payload);
    if let Value::Object(map) = &payload {
        if map.contains_key("error") && map.contains_key("object") {
            if map.get("error") == Some(&Value::Bool(true)) {
                return Value::Null;
            }
            let object = map.get("object").cloned().unwrap_or(Value::Null);
            return parse_if_json(object);
        }
    }
    payload
}

#[cfg(test)]
#[path = "message_tests.rs"]
mod tests;
