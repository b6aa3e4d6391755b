//! Overlay buttons.
//!
//! A [`Button`] is a set of async hooks evaluated against a [`ButtonScope`]
//! whenever a decoration becomes visible. Every hook has a default, so an
//! implementation only overrides what it needs.

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;

use snap_protocols::{ButtonError, ElementStatus};

use crate::actions::Actions;
use crate::dom::{Document, NodeId};

/// Default icon class for buttons without css.
pub const DEFAULT_ICON_CLASS: &str = "tpp-icon-action";

/// Entry of a button's drop-down list.
#[derive(Debug, Clone, PartialEq)]
pub struct ButtonItem {
    pub label: String,
    pub value: Value,
}

impl ButtonItem {
    pub fn new(label: impl Into<String>, value: Value) -> Self {
        Self {
            label: label.into(),
            value,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ButtonIcon {
    /// Class added to the button.
    Class(String),
    /// Background image url.
    Image(String),
}

/// Everything a hook may look at.
#[derive(Clone)]
pub struct ButtonScope {
    pub document: Document,
    /// Decorated node.
    pub node: NodeId,
    pub preview_id: String,
    /// The decoration's own copy of the status.
    pub status: Arc<ElementStatus>,
    pub language: Option<String>,
    /// The rendered button node.
    pub button: NodeId,
    pub actions: Actions,
}

#[async_trait]
pub trait Button: Send + Sync {
    /// Name used by [`ButtonRegistry::override_default_button`].
    fn name(&self) -> &str {
        "custom"
    }

    fn css(&self) -> Option<&str> {
        None
    }

    /// Whether the button is offered on nested components.
    fn supports_component_path(&self) -> bool {
        false
    }

    /// Whether the button is offered on inline-editable components.
    fn supports_inedit(&self) -> bool {
        false
    }

    async fn is_visible(&self, _scope: &ButtonScope) -> Result<bool, ButtonError> {
        Ok(true)
    }

    async fn is_enabled(&self, _scope: &ButtonScope) -> Result<bool, ButtonError> {
        Ok(false)
    }

    async fn icon(&self, _scope: &ButtonScope) -> ButtonIcon {
        ButtonIcon::Class(self.css().unwrap_or(DEFAULT_ICON_CLASS).to_string())
    }

    async fn label(&self, _scope: &ButtonScope) -> Option<String> {
        None
    }

    async fn items(&self, _scope: &ButtonScope) -> Vec<ButtonItem> {
        Vec::new()
    }

    async fn before_execute(&self, _scope: &ButtonScope, _item: Option<&ButtonItem>) {}

    async fn execute(&self, _scope: &ButtonScope, _item: Option<&ButtonItem>) -> Result<Value, ButtonError> {
        Ok(Value::Null)
    }

    /// Called after `execute` with its result, or with its error.
    async fn after_execute(
        &self,
        _scope: &ButtonScope,
        _item: Option<&ButtonItem>,
        _result: Option<&Value>,
        _error: Option<&ButtonError>,
    ) {
    }
}

/// Ordered button list shared by every decoration.
#[derive(Clone, Default)]
pub struct ButtonRegistry {
    buttons: Arc<Mutex<Vec<Arc<dyn Button>>>>,
}

impl ButtonRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert `button` at `index`, or append it for `None`.
    pub fn register(&self, button: Arc<dyn Button>, index: Option<usize>) {
        let mut buttons = self.buttons.lock();
        let index = index.map_or(buttons.len(), |i| i.min(buttons.len()));
        buttons.insert(index, button);
    }

    /// Replace the first button named `name`, or remove every button of that
    /// name for `None`. Returns whether anything changed.
    pub fn override_default_button(&self, name: &str, button: Option<Arc<dyn Button>>) -> bool {
        let mut buttons = self.buttons.lock();
        match button {
            Some(replacement) => match buttons.iter().position(|b| b.name() == name) {
                Some(index) => {
                    buttons[index] = replacement;
                    true
                }
                None => false,
            },
            None => {
                let before = buttons.len();
                buttons.retain(|b| b.name() != name);
                before != buttons.len()
            }
        }
    }

    /// Snapshot in render order.
    pub fn buttons(&self) -> Vec<Arc<dyn Button>> {
        self.buttons.lock().clone()
    }

    pub fn names(&self) -> Vec<String> {
        self.buttons.lock().iter().map(|b| b.name().to_string()).collect()
    }

    pub fn len(&self) -> usize {
        self.buttons.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.buttons.lock().is_empty()
    }
}
