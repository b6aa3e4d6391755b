//! Document model.
//!
//! An arena of element nodes standing in for the page DOM: attributes,
//! classes, inline style, bounding boxes and event listeners. Structural and
//! attribute changes are queued as [`MutationRecord`]s for every
//! [`DomObserver`] whose root contains the change.
//!
//! Nodes are never freed; a removed node keeps its subtree and can be
//! inserted again.

mod nested;
mod observer;

pub use nested::{nested_component_path, NestedPath};
pub use observer::DomObserver;

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use tokio::sync::Notify;

/// Handle of a node in a [`Document`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

impl NodeId {
    /// Arena index, stable for the lifetime of the document.
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Viewport-relative bounding box.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Rect {
    pub top: f64,
    pub left: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub fn new(top: f64, left: f64, width: f64, height: f64) -> Self {
        Self { top, left, width, height }
    }

    pub fn bottom(&self) -> f64 {
        self.top + self.height
    }

    pub fn right(&self) -> f64 {
        self.left + self.width
    }

    pub fn contains(&self, x: f64, y: f64) -> bool {
        x >= self.left && x <= self.right() && y >= self.top && y <= self.bottom()
    }
}

/// One observed change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MutationRecord {
    ChildList {
        target: NodeId,
        added: Vec<NodeId>,
        removed: Vec<NodeId>,
    },
    Attributes {
        target: NodeId,
        name: String,
    },
}

impl MutationRecord {
    fn target(&self) -> NodeId {
        match self {
            MutationRecord::ChildList { target, .. } | MutationRecord::Attributes { target, .. } => {
                *target
            }
        }
    }
}

/// Where a listener is attached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventTarget {
    Window,
    Node(NodeId),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DomEvent {
    MouseEnter,
    MouseLeave,
    FocusIn,
    FocusOut,
    Click,
    Scroll,
    Resize,
    DragStart,
    DragEnd,
}

pub type Listener = Arc<dyn Fn(DomEvent) + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

/// Records queued for one observer.
pub(crate) struct MutationQueue {
    root: NodeId,
    attribute: String,
    records: Mutex<Vec<MutationRecord>>,
    notify: Notify,
}

impl MutationQueue {
    pub(crate) fn take(&self) -> Vec<MutationRecord> {
        std::mem::take(&mut *self.records.lock())
    }

    pub(crate) async fn notified(&self) {
        self.notify.notified().await;
    }
}

#[derive(Debug, Clone, Default)]
struct NodeData {
    tag: String,
    attributes: BTreeMap<String, String>,
    classes: Vec<String>,
    style: String,
    text: String,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    rect: Rect,
}

struct DocumentInner {
    nodes: Vec<NodeData>,
    root: NodeId,
    body: NodeId,
    queues: Vec<Weak<MutationQueue>>,
    listeners: HashMap<(EventTarget, DomEvent), Vec<(ListenerId, Listener)>>,
    next_listener: u64,
    viewport: Rect,
}

impl DocumentInner {
    fn node(&self, id: NodeId) -> &NodeData {
        &self.nodes[id.0]
    }

    fn node_mut(&mut self, id: NodeId) -> &mut NodeData {
        &mut self.nodes[id.0]
    }

    fn create(&mut self, tag: &str) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(NodeData {
            tag: tag.to_string(),
            ..Default::default()
        });
        id
    }

    fn contains(&self, ancestor: NodeId, node: NodeId) -> bool {
        let mut current = Some(node);
        while let Some(id) = current {
            if id == ancestor {
                return true;
            }
            current = self.node(id).parent;
        }
        false
    }

    fn detach(&mut self, node: NodeId) -> Option<NodeId> {
        let parent = self.node(node).parent?;
        self.node_mut(parent).children.retain(|child| *child != node);
        self.node_mut(node).parent = None;
        Some(parent)
    }

    fn record(&mut self, record: MutationRecord) {
        self.queues.retain(|queue| queue.strong_count() > 0);
        let target = record.target();
        let attribute_name = match &record {
            MutationRecord::Attributes { name, .. } => Some(name.clone()),
            MutationRecord::ChildList { .. } => None,
        };
        for queue in self.queues.iter().filter_map(Weak::upgrade) {
            if !self.contains(queue.root, target) {
                continue;
            }
            if attribute_name.as_ref().is_some_and(|name| *name != queue.attribute) {
                continue;
            }
            queue.records.lock().push(record.clone());
            queue.notify.notify_one();
        }
    }

    fn descendants(&self, node: NodeId, out: &mut Vec<NodeId>) {
        for &child in &self.node(node).children {
            out.push(child);
            self.descendants(child, out);
        }
    }
}

/// Shared handle to the page document.
#[derive(Clone)]
pub struct Document {
    inner: Arc<Mutex<DocumentInner>>,
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Document {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.lock();
        f.debug_struct("Document")
            .field("nodes", &inner.nodes.len())
            .field("viewport", &inner.viewport)
            .finish_non_exhaustive()
    }
}

impl Document {
    /// Empty document with an `html` root and a `body`.
    pub fn new() -> Self {
        let mut inner = DocumentInner {
            nodes: Vec::new(),
            root: NodeId(0),
            body: NodeId(0),
            queues: Vec::new(),
            listeners: HashMap::new(),
            next_listener: 0,
            viewport: Rect::new(0.0, 0.0, 1280.0, 800.0),
        };
        let root = inner.create("html");
        let body = inner.create("body");
        inner.node_mut(body).parent = Some(root);
        inner.node_mut(root).children.push(body);
        inner.root = root;
        inner.body = body;
        Self {
            inner: Arc::new(Mutex::new(inner)),
        }
    }

    pub fn document_element(&self) -> NodeId {
        self.inner.lock().root
    }

    pub fn body(&self) -> NodeId {
        self.inner.lock().body
    }

    /// Node with the given arena index, if it exists.
    pub fn node_at(&self, index: usize) -> Option<NodeId> {
        (index < self.inner.lock().nodes.len()).then_some(NodeId(index))
    }

    pub fn create_element(&self, tag: &str) -> NodeId {
        self.inner.lock().create(tag)
    }

    /// Create an element with a class list and attributes in one go.
    pub fn build(&self, tag: &str, classes: &[&str], attributes: &[(&str, &str)]) -> NodeId {
        let mut inner = self.inner.lock();
        let id = inner.create(tag);
        let node = inner.node_mut(id);
        node.classes = classes.iter().map(|c| c.to_string()).collect();
        for (name, value) in attributes {
            node.attributes.insert(name.to_string(), value.to_string());
        }
        id
    }

    // ========================================================================
    // Structure
    // ========================================================================

    pub fn append_child(&self, parent: NodeId, child: NodeId) {
        self.insert_before(parent, child, None);
    }

    /// Insert `child` into `parent` before `reference`, or last for `None`.
    /// The child is detached from its current parent first.
    pub fn insert_before(&self, parent: NodeId, child: NodeId, reference: Option<NodeId>) {
        let mut inner = self.inner.lock();
        if inner.contains(child, parent) {
            return;
        }
        if let Some(old_parent) = inner.detach(child) {
            inner.record(MutationRecord::ChildList {
                target: old_parent,
                added: Vec::new(),
                removed: vec![child],
            });
        }
        let position = reference
            .and_then(|r| inner.node(parent).children.iter().position(|c| *c == r))
            .unwrap_or(inner.node(parent).children.len());
        inner.node_mut(parent).children.insert(position, child);
        inner.node_mut(child).parent = Some(parent);
        inner.record(MutationRecord::ChildList {
            target: parent,
            added: vec![child],
            removed: Vec::new(),
        });
    }

    /// Insert `node` right after `reference` in the same parent.
    pub fn insert_after(&self, reference: NodeId, node: NodeId) {
        let Some(parent) = self.parent(reference) else {
            return;
        };
        let next = self.next_sibling(reference);
        self.insert_before(parent, node, next);
    }

    /// Detach `node` from its parent. Returns the former parent.
    pub fn remove(&self, node: NodeId) -> Option<NodeId> {
        let mut inner = self.inner.lock();
        let parent = inner.detach(node)?;
        inner.record(MutationRecord::ChildList {
            target: parent,
            added: Vec::new(),
            removed: vec![node],
        });
        Some(parent)
    }

    /// Detach every child of `node`.
    pub fn clear_children(&self, node: NodeId) {
        for child in self.children(node) {
            self.remove(child);
        }
    }

    pub fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.inner.lock().node(node).parent
    }

    pub fn children(&self, node: NodeId) -> Vec<NodeId> {
        self.inner.lock().node(node).children.clone()
    }

    pub fn next_sibling(&self, node: NodeId) -> Option<NodeId> {
        let inner = self.inner.lock();
        let parent = inner.node(node).parent?;
        let siblings = &inner.node(parent).children;
        let index = siblings.iter().position(|c| *c == node)?;
        siblings.get(index + 1).copied()
    }

    pub fn previous_sibling(&self, node: NodeId) -> Option<NodeId> {
        let inner = self.inner.lock();
        let parent = inner.node(node).parent?;
        let siblings = &inner.node(parent).children;
        let index = siblings.iter().position(|c| *c == node)?;
        index.checked_sub(1).and_then(|i| siblings.get(i).copied())
    }

    /// Whether `node` is attached to the document.
    pub fn is_connected(&self, node: NodeId) -> bool {
        let inner = self.inner.lock();
        inner.contains(inner.root, node)
    }

    /// Whether `node` is `ancestor` or below it.
    pub fn contains(&self, ancestor: NodeId, node: NodeId) -> bool {
        self.inner.lock().contains(ancestor, node)
    }

    /// Every node below `node` in document order, `node` excluded.
    pub fn descendants(&self, node: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        self.inner.lock().descendants(node, &mut out);
        out
    }

    // ========================================================================
    // Attributes, classes, style
    // ========================================================================

    pub fn tag(&self, node: NodeId) -> String {
        self.inner.lock().node(node).tag.clone()
    }

    pub fn attribute(&self, node: NodeId, name: &str) -> Option<String> {
        self.inner.lock().node(node).attributes.get(name).cloned()
    }

    pub fn has_attribute(&self, node: NodeId, name: &str) -> bool {
        self.inner.lock().node(node).attributes.contains_key(name)
    }

    pub fn set_attribute(&self, node: NodeId, name: &str, value: &str) {
        let mut inner = self.inner.lock();
        inner
            .node_mut(node)
            .attributes
            .insert(name.to_string(), value.to_string());
        inner.record(MutationRecord::Attributes {
            target: node,
            name: name.to_string(),
        });
    }

    pub fn remove_attribute(&self, node: NodeId, name: &str) {
        let mut inner = self.inner.lock();
        if inner.node_mut(node).attributes.remove(name).is_some() {
            inner.record(MutationRecord::Attributes {
                target: node,
                name: name.to_string(),
            });
        }
    }

    pub fn classes(&self, node: NodeId) -> Vec<String> {
        self.inner.lock().node(node).classes.clone()
    }

    pub fn has_class(&self, node: NodeId, class: &str) -> bool {
        self.inner.lock().node(node).classes.iter().any(|c| c == class)
    }

    pub fn add_class(&self, node: NodeId, class: &str) {
        let mut inner = self.inner.lock();
        let classes = &mut inner.node_mut(node).classes;
        if !classes.iter().any(|c| c == class) {
            classes.push(class.to_string());
        }
    }

    pub fn remove_class(&self, node: NodeId, class: &str) {
        self.inner.lock().node_mut(node).classes.retain(|c| c != class);
    }

    pub fn style(&self, node: NodeId) -> String {
        self.inner.lock().node(node).style.clone()
    }

    pub fn set_style(&self, node: NodeId, css: &str) {
        self.inner.lock().node_mut(node).style = css.to_string();
    }

    pub fn text(&self, node: NodeId) -> String {
        self.inner.lock().node(node).text.clone()
    }

    pub fn set_text(&self, node: NodeId, text: &str) {
        self.inner.lock().node_mut(node).text = text.to_string();
    }

    // ========================================================================
    // Queries
    // ========================================================================

    /// Whether `node` carries `name`, with `value` if given.
    pub fn matches(&self, node: NodeId, name: &str, value: Option<&str>) -> bool {
        let inner = self.inner.lock();
        match (inner.node(node).attributes.get(name), value) {
            (Some(actual), Some(expected)) => actual == expected,
            (Some(_), None) => true,
            (None, _) => false,
        }
    }

    /// Nodes below `scope` carrying `name` (with `value` if given), in
    /// document order.
    pub fn select(&self, scope: NodeId, name: &str, value: Option<&str>) -> Vec<NodeId> {
        self.descendants(scope)
            .into_iter()
            .filter(|node| self.matches(*node, name, value))
            .collect()
    }

    /// Like [`select`](Self::select) over the whole document.
    pub fn select_all(&self, name: &str, value: Option<&str>) -> Vec<NodeId> {
        let root = self.document_element();
        self.select(root, name, value)
    }

    /// Nearest inclusive ancestor carrying `name`.
    pub fn closest_with_attribute(&self, node: NodeId, name: &str) -> Option<NodeId> {
        let inner = self.inner.lock();
        let mut current = Some(node);
        while let Some(id) = current {
            if inner.node(id).attributes.contains_key(name) {
                return Some(id);
            }
            current = inner.node(id).parent;
        }
        None
    }

    // ========================================================================
    // Geometry
    // ========================================================================

    pub fn bounding_rect(&self, node: NodeId) -> Rect {
        self.inner.lock().node(node).rect
    }

    /// Set the box of `node`; a changed size fires `Resize` on it.
    pub fn set_bounding_rect(&self, node: NodeId, rect: Rect) {
        let resized = {
            let mut inner = self.inner.lock();
            let old = std::mem::replace(&mut inner.node_mut(node).rect, rect);
            old.width != rect.width || old.height != rect.height
        };
        if resized {
            self.dispatch(EventTarget::Node(node), DomEvent::Resize);
        }
    }

    pub fn viewport(&self) -> Rect {
        self.inner.lock().viewport
    }

    /// Scroll the window by `dy`, shifting every box, and fire `Scroll`.
    pub fn scroll_by(&self, dy: f64) {
        {
            let mut inner = self.inner.lock();
            inner.viewport.top += dy;
            for node in inner.nodes.iter_mut() {
                node.rect.top -= dy;
            }
        }
        self.dispatch(EventTarget::Window, DomEvent::Scroll);
    }

    /// Resize the viewport and fire `Resize` on the window.
    pub fn resize_viewport(&self, width: f64, height: f64) {
        {
            let mut inner = self.inner.lock();
            inner.viewport.width = width;
            inner.viewport.height = height;
        }
        self.dispatch(EventTarget::Window, DomEvent::Resize);
    }

    // ========================================================================
    // Events
    // ========================================================================

    pub fn add_listener<F>(&self, target: EventTarget, event: DomEvent, listener: F) -> ListenerId
    where
        F: Fn(DomEvent) + Send + Sync + 'static,
    {
        let mut inner = self.inner.lock();
        inner.next_listener += 1;
        let id = ListenerId(inner.next_listener);
        inner
            .listeners
            .entry((target, event))
            .or_default()
            .push((id, Arc::new(listener)));
        id
    }

    pub fn remove_listener(&self, id: ListenerId) {
        let mut inner = self.inner.lock();
        for listeners in inner.listeners.values_mut() {
            listeners.retain(|(listener_id, _)| *listener_id != id);
        }
    }

    pub fn listener_count(&self, target: EventTarget, event: DomEvent) -> usize {
        self.inner
            .lock()
            .listeners
            .get(&(target, event))
            .map_or(0, Vec::len)
    }

    /// Invoke the listeners of `event` on `target`.
    pub fn dispatch(&self, target: EventTarget, event: DomEvent) {
        let listeners: Vec<Listener> = self
            .inner
            .lock()
            .listeners
            .get(&(target, event))
            .map(|entries| entries.iter().map(|(_, l)| l.clone()).collect())
            .unwrap_or_default();
        for listener in listeners {
            listener(event);
        }
    }

    // ========================================================================
    // Observation
    // ========================================================================

    /// Start queueing child-list changes below `root` and changes of
    /// `attribute`.
    pub(crate) fn observe(&self, root: NodeId, attribute: &str) -> Arc<MutationQueue> {
        let queue = Arc::new(MutationQueue {
            root,
            attribute: attribute.to_string(),
            records: Mutex::new(Vec::new()),
            notify: Notify::new(),
        });
        self.inner.lock().queues.push(Arc::downgrade(&queue));
        queue
    }
}

#[cfg(test)]
#[path = "dom_tests.rs"]
mod tests;
