//! Drag and drop of sections and nested components.
//!
//! A drag starts either from a node made transferable with
//! [`DragAndDrop::make_transferable`] (a local MOVE) or from the host through
//! `TPP_DRAG_ACTION` (a COPY of the given preview id). While a
//! [`DragOperation`] is active the body carries `tpp-invisible` and every
//! allowed target is registered with the operation's zone strategies. A drop
//! that resolves to exactly one target emits `tpp-drop-element`, whose
//! handler asks the host to move the element.

mod buttons;
mod zones;

pub use buttons::{MoveButton, NestedMoveButton};
pub use zones::{AutoScroll, DropBorder, Hit, Orientation, ZoneStrategy, DROP_TARGET_CLASS};

use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use serde_json::{json, Value};
use tracing::{debug, warn};

use snap_protocols::consts::DND_ORIENT_ATTRIBUTE;
use snap_protocols::{ActionError, BridgeEvent};

use crate::actions::{Actions, TransferMode, TransferOptions, TransferPosition};
use crate::decoration::{DecorationController, PreviewNode, PreviewTarget};
use crate::dom::{Document, DomEvent, EventTarget, NodeId};
use crate::events::first_arg;

/// Class on the body while a drag is in progress.
pub const DRAGGING_CLASS: &str = "tpp-invisible";
/// Class on the dragged node.
pub const DISABLED_NODE_CLASS: &str = "tpp-disabled-node";

/// Payload of `tpp-drop-element`.
#[derive(Debug, Clone, PartialEq)]
pub struct DropRequest {
    pub source: PreviewTarget,
    pub target: NodeId,
    pub mode: TransferMode,
    pub position: TransferPosition,
}

impl DropRequest {
    pub fn to_value(&self) -> Value {
        let source = match &self.source {
            PreviewTarget::Node(node) => json!({ "node": node.index() }),
            PreviewTarget::Id(id) => json!({ "previewId": id }),
        };
        json!({
            "source": source,
            "target": self.target.index(),
            "mode": self.mode.as_str(),
            "position": self.position.as_str(),
        })
    }

    pub fn from_value(document: &Document, value: &Value) -> Option<Self> {
        let source = &value["source"];
        let source = match source["previewId"].as_str() {
            Some(id) => PreviewTarget::Id(id.to_string()),
            None => PreviewTarget::Node(node_at(document, &source["node"])?),
        };
        Some(Self {
            source,
            target: node_at(document, &value["target"])?,
            mode: match value["mode"].as_str() {
                Some("COPY") => TransferMode::Copy,
                _ => TransferMode::Move,
            },
            position: match value["position"].as_str() {
                Some("BEFORE") => TransferPosition::Before,
                _ => TransferPosition::After,
            },
        })
    }
}

fn node_at(document: &Document, value: &Value) -> Option<NodeId> {
    let index = usize::try_from(value.as_u64()?).ok()?;
    document.node_at(index)
}

/// One drag in progress.
#[derive(Debug)]
pub struct DragOperation {
    document: Document,
    source: PreviewTarget,
    mode: TransferMode,
    strategies: Vec<ZoneStrategy>,
}

impl DragOperation {
    pub fn new(document: &Document, source: PreviewTarget, mode: TransferMode, autoscroll: bool, vertical: bool) -> Self {
        document.add_class(document.body(), DRAGGING_CLASS);
        let mut strategies = Vec::new();
        if autoscroll {
            strategies.push(ZoneStrategy::auto_scroll());
        }
        strategies.push(if vertical {
            ZoneStrategy::vertical(document)
        } else {
            ZoneStrategy::horizontal(document)
        });
        Self {
            document: document.clone(),
            source,
            mode,
            strategies,
        }
    }

    pub fn source(&self) -> &PreviewTarget {
        &self.source
    }

    pub fn mode(&self) -> TransferMode {
        self.mode
    }

    pub fn strategies(&self) -> &[ZoneStrategy] {
        &self.strategies
    }

    pub fn add_targets(&mut self, targets: &[PreviewNode]) {
        for target in targets {
            for strategy in &mut self.strategies {
                strategy.add_target(&self.document, target);
            }
        }
    }

    pub fn on_drag(&mut self, x: f64, y: f64) {
        for strategy in &mut self.strategies {
            strategy.hit_target(&self.document, x, y);
        }
    }

    /// The drop request when exactly one strategy reports a hit.
    pub fn on_drop(&mut self, x: f64, y: f64) -> Option<DropRequest> {
        let mut hits: Vec<Hit> = self
            .strategies
            .iter_mut()
            .filter_map(|strategy| strategy.hit_target(&self.document, x, y))
            .collect();
        if hits.len() != 1 {
            return None;
        }
        let hit = hits.remove(0);
        Some(DropRequest {
            source: self.source.clone(),
            target: hit.node,
            mode: self.mode,
            position: hit.position,
        })
    }

    pub fn destroy(&mut self) {
        self.document.remove_class(self.document.body(), DRAGGING_CLASS);
        for strategy in &mut self.strategies {
            strategy.destroy(&self.document);
        }
    }
}

#[derive(Default)]
struct DragState {
    operation: Option<DragOperation>,
    generation: u64,
}

struct DndInner {
    decoration: DecorationController,
    state: Mutex<DragState>,
}

/// Drag-and-drop controller. Cloning yields another handle to the same
/// state.
#[derive(Clone)]
pub struct DragAndDrop {
    inner: Arc<DndInner>,
}

impl DragAndDrop {
    /// Wire the drag and drop handlers and register the move buttons first
    /// in the button list.
    pub fn new(decoration: DecorationController) -> Self {
        let dnd = Self {
            inner: Arc::new(DndInner {
                decoration,
                state: Mutex::new(DragState::default()),
            }),
        };
        dnd.wire();

        let buttons = dnd.inner.decoration.buttons();
        buttons.register(Arc::new(MoveButton::new(&dnd)), Some(0));
        buttons.register(Arc::new(NestedMoveButton::new(&dnd)), Some(0));
        dnd
    }

    fn from_weak(weak: &Weak<DndInner>) -> Option<Self> {
        weak.upgrade().map(|inner| Self { inner })
    }

    fn downgrade(&self) -> Weak<DndInner> {
        Arc::downgrade(&self.inner)
    }

    fn wire(&self) {
        let bus = self.actions().bus().clone();

        let weak = self.downgrade();
        bus.on(BridgeEvent::DragElement, move |args| {
            let dnd = Self::from_weak(&weak);
            async move {
                let Some(dnd) = dnd else {
                    return Ok(());
                };
                let payload = first_arg(&args);
                let x = payload["x"].as_f64().unwrap_or_default();
                let y = payload["y"].as_f64().unwrap_or_default();
                match payload["phase"].as_str() {
                    Some("start") => {
                        let preview_id = payload["previewId"].as_str().unwrap_or_default().to_string();
                        if let Err(e) = dnd.drag_start(PreviewTarget::Id(preview_id)).await {
                            warn!(error = %e, "Host drag could not start");
                        }
                    }
                    Some("drag") => dnd.drag_move(x, y),
                    Some("drop") => dnd.drop_at(x, y).await,
                    _ => dnd.drag_end(),
                }
                Ok(())
            }
        });

        let weak = self.downgrade();
        bus.on(BridgeEvent::DropElement, move |args| {
            let dnd = Self::from_weak(&weak);
            async move {
                let Some(dnd) = dnd else {
                    return Ok(());
                };
                let payload = first_arg(&args);
                let Some(request) = DropRequest::from_value(dnd.document(), &payload) else {
                    warn!(payload = %payload, "Ignoring malformed drop request");
                    return Ok(());
                };
                dnd.handle_drop(request).await?;
                Ok(())
            }
        });
    }

    pub fn document(&self) -> &Document {
        self.inner.decoration.document()
    }

    pub fn actions(&self) -> &Actions {
        self.inner.decoration.actions()
    }

    pub fn is_dragging(&self) -> bool {
        self.inner.state.lock().operation.is_some()
    }

    /// Run `f` against the active operation, if any.
    pub fn with_operation<R>(&self, f: impl FnOnce(&DragOperation) -> R) -> Option<R> {
        self.inner.state.lock().operation.as_ref().map(f)
    }

    /// Make `draggable` start a MOVE of `node` when dragged.
    pub fn make_transferable(&self, draggable: NodeId, node: NodeId) {
        let document = self.document();
        document.set_attribute(draggable, "draggable", "true");
        if !document.has_attribute(node, self.inner.decoration.attribute()) {
            return;
        }

        let weak = self.downgrade();
        document.add_listener(EventTarget::Node(draggable), DomEvent::DragStart, move |_| {
            let Some(dnd) = Self::from_weak(&weak) else {
                return;
            };
            dnd.document().add_class(node, DISABLED_NODE_CLASS);
            let Ok(handle) = tokio::runtime::Handle::try_current() else {
                return;
            };
            handle.spawn(async move {
                if let Err(e) = dnd.drag_start(PreviewTarget::Node(node)).await {
                    warn!(node = %node, error = %e, "Drag could not start");
                }
            });
        });

        let weak = self.downgrade();
        document.add_listener(EventTarget::Node(draggable), DomEvent::DragEnd, move |_| {
            if let Some(dnd) = Self::from_weak(&weak) {
                dnd.document().remove_class(node, DISABLED_NODE_CLASS);
                dnd.drag_end();
            }
        });
    }

    // ========================================================================
    // Allowed targets
    // ========================================================================

    /// Targets a section may be moved to: the body, other sections and pages
    /// with a single body, as far as the host allows.
    pub async fn allowed_section_targets(&self, source: PreviewTarget) -> Result<Vec<PreviewNode>, ActionError> {
        let skip = match &source {
            PreviewTarget::Node(node) => Some(*node),
            PreviewTarget::Id(_) => None,
        };
        let source = self.inner.decoration.preview_element_node(source).await?;
        if source.element_type() != Some("Section") {
            return Ok(Vec::new());
        }

        let candidates: Vec<PreviewNode> = self
            .inner
            .decoration
            .preview_element_nodes()
            .await?
            .into_iter()
            .filter(|target| target.component_path().is_none())
            .filter(|target| match target.element_type() {
                Some("Body") => true,
                Some("Section") => skip.is_none() || target.node != skip,
                Some("Page") => child_count(target) == 1,
                _ => false,
            })
            .collect();
        if candidates.is_empty() {
            return Ok(candidates);
        }

        let mut target_ids: Vec<Value> = Vec::new();
        for id in candidates.iter().filter_map(|target| target.status.id.clone()) {
            if !target_ids.contains(&id) {
                target_ids.push(id);
            }
        }
        let section_id = source.status.id.clone().unwrap_or(Value::Null);
        let allowed = self
            .actions()
            .transfer_section_allowed(&section_id, &target_ids)
            .await?;

        Ok(candidates
            .into_iter()
            .filter(|target| target.status.id.as_ref().is_some_and(|id| allowed.contains(id)))
            .collect())
    }

    /// Siblings of a nested component: every other nested component whose
    /// path differs from the source's in the last segment only.
    pub async fn allowed_nested_targets(&self, source: PreviewTarget) -> Result<Vec<PreviewNode>, ActionError> {
        let source = self.inner.decoration.preview_element_node(source).await?;
        let Some(path) = source.component_path() else {
            return Ok(Vec::new());
        };
        Ok(self
            .inner
            .decoration
            .preview_element_nodes()
            .await?
            .into_iter()
            .filter(|target| {
                target
                    .component_path()
                    .is_some_and(|other| sibling_paths(path, other))
                    && target.node != source.node
            })
            .collect())
    }

    // ========================================================================
    // Drag lifecycle
    // ========================================================================

    /// Start a drag, replacing any drag in progress.
    pub async fn drag_start(&self, source: PreviewTarget) -> Result<(), ActionError> {
        self.drag_end();

        let document = self.document();
        let operation = match &source {
            PreviewTarget::Node(node) => {
                let vertical = self
                    .orientation_container(*node)
                    .and_then(|container| document.attribute(container, DND_ORIENT_ATTRIBUTE))
                    .is_none_or(|orient| orient == "vertical");
                DragOperation::new(document, source.clone(), TransferMode::Move, false, vertical)
            }
            PreviewTarget::Id(_) => DragOperation::new(document, source.clone(), TransferMode::Copy, true, true),
        };
        let generation = {
            let mut state = self.inner.state.lock();
            state.generation += 1;
            state.operation = Some(operation);
            state.generation
        };

        let node = self.inner.decoration.preview_element_node(source.clone()).await?;
        let targets = if node.component_path().is_some() {
            self.allowed_nested_targets(source).await?
        } else if node.element_type() == Some("Section") {
            self.allowed_section_targets(source).await?
        } else {
            Vec::new()
        };
        debug!(targets = targets.len(), "Drag started");

        let mut state = self.inner.state.lock();
        if state.generation == generation {
            if let Some(operation) = state.operation.as_mut() {
                operation.add_targets(&targets);
            }
        }
        Ok(())
    }

    /// Closest inclusive ancestor carrying an orientation or a preview id.
    fn orientation_container(&self, node: NodeId) -> Option<NodeId> {
        let document = self.document();
        let attribute = self.inner.decoration.attribute();
        let mut current = Some(node);
        while let Some(candidate) = current {
            if document.has_attribute(candidate, DND_ORIENT_ATTRIBUTE) || document.has_attribute(candidate, attribute) {
                return Some(candidate);
            }
            current = document.parent(candidate);
        }
        None
    }

    pub fn drag_move(&self, x: f64, y: f64) {
        if let Some(operation) = self.inner.state.lock().operation.as_mut() {
            operation.on_drag(x, y);
        }
    }

    /// Resolve the drop position and emit `tpp-drop-element` for a single hit.
    pub async fn drop_at(&self, x: f64, y: f64) {
        let request = self
            .inner
            .state
            .lock()
            .operation
            .as_mut()
            .and_then(|operation| operation.on_drop(x, y));
        let Some(request) = request else {
            return;
        };
        if let Err(e) = self
            .actions()
            .bus()
            .emit(BridgeEvent::DropElement, vec![request.to_value()])
            .await
        {
            warn!(error = %e, "Drop handler failed");
        }
    }

    pub fn drag_end(&self) {
        let operation = self.inner.state.lock().operation.take();
        if let Some(mut operation) = operation {
            operation.destroy();
        }
    }

    // ========================================================================
    // Drop
    // ========================================================================

    /// Carry out a drop: move a nested component within its parent, or
    /// transfer a section.
    pub async fn handle_drop(&self, request: DropRequest) -> Result<(), ActionError> {
        let decoration = &self.inner.decoration;
        let source = decoration.preview_element_node(request.source.clone()).await?;
        let same_node = source.node == Some(request.target);

        if let Some(path) = source.component_path().filter(|path| !path.is_empty()) {
            if same_node {
                return Ok(());
            }
            let target = decoration.preview_element_node(PreviewTarget::Node(request.target)).await?;
            let current = last_index(Some(path));
            let target_index = last_index(target.component_path());
            let (Some(current), Some(mut index)) = (current, target_index) else {
                debug!(path = ?path, "Nested component index is not numeric");
                return Ok(());
            };
            match request.position {
                TransferPosition::Before if current < index => index -= 1,
                TransferPosition::After if current > index => index += 1,
                _ => {}
            }
            let parent = source.parent_preview_id.clone().unwrap_or_default();
            return self.actions().move_nested_component(&parent, path, index).await;
        }

        if source.element_type() != Some("Section") || same_node {
            return Ok(());
        }
        let target = decoration.preview_element_node(PreviewTarget::Node(request.target)).await?;
        let source_id = source.status.id.clone().unwrap_or(Value::Null);
        let target_id = target.status.id.clone().unwrap_or(Value::Null);
        let mut options = TransferOptions {
            position: request.position,
            mode: request.mode,
            skip_rerender: false,
        };

        let local_move = request.mode == TransferMode::Move && target.element_type() == Some("Section");
        let source_node = match source.node {
            Some(node) if local_move => node,
            _ => {
                self.actions().transfer_section(&source_id, &target_id, options).await?;
                return Ok(());
            }
        };

        // The page can be reordered locally; no rerender needed.
        options.skip_rerender = true;
        let document = self.document();
        match request.position {
            TransferPosition::Before => {
                if document.next_sibling(source_node) == Some(request.target) {
                    return Ok(());
                }
                if self.actions().transfer_section(&source_id, &target_id, options).await? {
                    if let Some(parent) = document.parent(request.target) {
                        document.insert_before(parent, source_node, Some(request.target));
                    }
                }
            }
            TransferPosition::After => {
                if document.previous_sibling(source_node) == Some(request.target) {
                    return Ok(());
                }
                if self.actions().transfer_section(&source_id, &target_id, options).await? {
                    document.insert_after(request.target, source_node);
                }
            }
        }
        Ok(())
    }
}

fn child_count(target: &PreviewNode) -> usize {
    target
        .status
        .field("children")
        .and_then(Value::as_array)
        .map_or(0, Vec::len)
}

/// Same length and equal in every segment but the last.
fn sibling_paths(first: &[String], second: &[String]) -> bool {
    first.len() == second.len() && first.iter().zip(second).rev().skip(1).all(|(a, b)| a == b)
}

fn last_index(path: Option<&[String]>) -> Option<usize> {
    path?.last()?.parse().ok()
}

#[cfg(test)]
#[path = "dnd_tests.rs"]
mod tests;
