//! Element status model and preview ids.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::consts::{CUSTOM_PREVIEW_ID_PREFIX, NESTED_COMPONENT_PREVIEW_ID_PREFIX, UNKNOWN_STATUS_NAME};

/// Identifier referencing a content element.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PreviewId {
    /// Plain element id as issued by the host.
    Element(String),
    /// Nested-component segment (`#index` or `#name`), prefix stripped.
    Nested(String),
    /// Locally synthesized id (`custom:` prefix), prefix stripped.
    Custom(String),
}

impl PreviewId {
    /// Classify a raw attribute value.
    pub fn parse(raw: &str) -> Self {
        if let Some(rest) = raw.strip_prefix(CUSTOM_PREVIEW_ID_PREFIX) {
            PreviewId::Custom(rest.to_string())
        } else if let Some(rest) = raw.strip_prefix(NESTED_COMPONENT_PREVIEW_ID_PREFIX) {
            PreviewId::Nested(rest.to_string())
        } else {
            PreviewId::Element(raw.to_string())
        }
    }

    pub fn is_custom(&self) -> bool {
        matches!(self, PreviewId::Custom(_))
    }

    pub fn is_nested(&self) -> bool {
        matches!(self, PreviewId::Nested(_))
    }

    /// Nested segment that is a component index (`#0`, `#1`, ...).
    pub fn nested_index(&self) -> Option<usize> {
        match self {
            PreviewId::Nested(segment) => segment.parse().ok(),
            _ => None,
        }
    }
}

impl fmt::Display for PreviewId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PreviewId::Element(id) => f.write_str(id),
            PreviewId::Nested(segment) => write!(f, "{}{}", NESTED_COMPONENT_PREVIEW_ID_PREFIX, segment),
            PreviewId::Custom(rest) => write!(f, "{}{}", CUSTOM_PREVIEW_ID_PREFIX, rest),
        }
    }
}

/// How a cached status came to be.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum StatusState {
    /// The host resolved the element.
    Resolved,
    /// The host answered without a usable name (null or `"unknown"`).
    #[default]
    Unknown,
    /// Synthesized locally from a `custom:` id.
    Custom,
}

/// Metadata of a content element as reported by the host.
///
/// Typed accessors cover the fields the bridge itself reads; everything else
/// the host sends is preserved in `extra`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ElementStatus {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub element_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    #[serde(default)]
    pub custom: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub parts: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub component_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub component_path: Option<Vec<String>>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
    #[serde(skip)]
    pub state: StatusState,
}

impl ElementStatus {
    /// Synthesize the status of a custom id from its suffix.
    pub fn custom(suffix: &str) -> Self {
        Self {
            custom: Some(suffix.to_string()),
            parts: suffix.split(':').map(str::to_string).collect(),
            state: StatusState::Custom,
            ..Default::default()
        }
    }

    /// Build a status from a host response. A null or non-object response
    /// yields an empty, unknown status.
    pub fn from_response(value: Value) -> Result<Self, serde_json::Error> {
        let mut status: ElementStatus = match value {
            Value::Object(_) => serde_json::from_value(value)?,
            _ => ElementStatus::default(),
        };
        status.state = match status.name.as_deref() {
            Some(name) if name != UNKNOWN_STATUS_NAME => StatusState::Resolved,
            _ => StatusState::Unknown,
        };
        if status.state == StatusState::Resolved {
            status.custom = None;
        }
        Ok(status)
    }

    pub fn is_resolved(&self) -> bool {
        self.state == StatusState::Resolved
    }

    /// Element id as a string, whatever JSON type the host used.
    pub fn id_string(&self) -> Option<String> {
        match self.id.as_ref()? {
            Value::String(s) => Some(s.clone()),
            Value::Null => None,
            other => Some(other.to_string()),
        }
    }

    /// Whether the element type is any of `expected`; every `Dataset*`
    /// type matches `"Dataset"`.
    pub fn type_matches(&self, expected: &[&str]) -> bool {
        match self.element_type.as_deref() {
            Some(kind) if kind.starts_with("Dataset") => expected.contains(&"Dataset"),
            Some(kind) => expected.contains(&kind),
            None => false,
        }
    }

    /// Elements whose deletion changes the navigation.
    pub fn is_in_navigation(&self) -> bool {
        self.type_matches(&["Page", "PageRef", "PageRefFolder", "Dataset"])
    }

    /// Raw extra field lookup.
    pub fn field(&self, key: &str) -> Option<&Value> {
        self.extra.get(key)
    }
}

#[cfg(test)]
#[path = "status_tests.rs"]
mod tests;
