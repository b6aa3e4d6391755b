//! Move buttons that turn a decoration into a drag handle.

use std::sync::Weak;

use async_trait::async_trait;

use snap_protocols::{ButtonError, PreviewId};

use super::{DndInner, DragAndDrop};
use crate::decoration::{Button, ButtonIcon, ButtonScope, PreviewTarget};

pub const MOVE_ICON_CLASS: &str = "tpp-icon-move";
const SEPARATOR_CLASS: &str = "tpp-separator";

fn prepare_handle(dnd: Option<DragAndDrop>, scope: &ButtonScope) -> ButtonIcon {
    scope.document.add_class(scope.button, SEPARATOR_CLASS);
    scope.document.set_style(scope.button, "cursor:crosshair");
    if let Some(dnd) = dnd {
        dnd.make_transferable(scope.button, scope.node);
    }
    ButtonIcon::Class(MOVE_ICON_CLASS.to_string())
}

/// Drag handle for sections.
pub struct MoveButton {
    dnd: Weak<DndInner>,
}

impl MoveButton {
    pub(super) fn new(dnd: &DragAndDrop) -> Self {
        Self { dnd: dnd.downgrade() }
    }
}

#[async_trait]
impl Button for MoveButton {
    fn name(&self) -> &str {
        "move"
    }

    async fn is_visible(&self, scope: &ButtonScope) -> Result<bool, ButtonError> {
        Ok(scope.status.type_matches(&["Section"]))
    }

    async fn is_enabled(&self, scope: &ButtonScope) -> Result<bool, ButtonError> {
        let Some(dnd) = DragAndDrop::from_weak(&self.dnd) else {
            return Ok(false);
        };
        dnd.allowed_section_targets(PreviewTarget::Node(scope.node))
            .await
            .map(|targets| !targets.is_empty())
            .map_err(|e| ButtonError::new(self.name(), "isEnabled", e.to_string()))
    }

    async fn icon(&self, scope: &ButtonScope) -> ButtonIcon {
        prepare_handle(DragAndDrop::from_weak(&self.dnd), scope)
    }
}

/// Drag handle for indexed nested components.
pub struct NestedMoveButton {
    dnd: Weak<DndInner>,
}

impl NestedMoveButton {
    pub(super) fn new(dnd: &DragAndDrop) -> Self {
        Self { dnd: dnd.downgrade() }
    }
}

#[async_trait]
impl Button for NestedMoveButton {
    fn name(&self) -> &str {
        "nested-component-move"
    }

    fn supports_component_path(&self) -> bool {
        true
    }

    async fn is_visible(&self, scope: &ButtonScope) -> Result<bool, ButtonError> {
        Ok(PreviewId::parse(&scope.preview_id).nested_index().is_some())
    }

    async fn is_enabled(&self, scope: &ButtonScope) -> Result<bool, ButtonError> {
        let Some(dnd) = DragAndDrop::from_weak(&self.dnd) else {
            return Ok(false);
        };
        dnd.allowed_nested_targets(PreviewTarget::Node(scope.node))
            .await
            .map(|targets| !targets.is_empty())
            .map_err(|e| ButtonError::new(self.name(), "isEnabled", e.to_string()))
    }

    async fn icon(&self, scope: &ButtonScope) -> ButtonIcon {
        prepare_handle(DragAndDrop::from_weak(&self.dnd), scope)
    }
}
