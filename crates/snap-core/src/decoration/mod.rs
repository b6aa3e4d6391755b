//! Hover overlays for annotated nodes.
//!
//! The [`DecorationController`] watches the body for nodes carrying the
//! preview attribute. Each such node gets a border overlay inside the shared
//! `.tpp-borders-container` holding one span per visible [`Button`]. The
//! overlay is shown on hover or focus and hidden shortly after the pointer
//! leaves both the node and its buttons.

mod button;
mod lookup;

pub use button::{Button, ButtonIcon, ButtonItem, ButtonRegistry, ButtonScope, DEFAULT_ICON_CLASS};
pub use lookup::{find_preview_nodes, preview_element_node, preview_element_nodes, PreviewNode, PreviewTarget};

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Weak};

use futures::future::join_all;
use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, error, warn};

use snap_config::DecorationConfig;
use snap_protocols::{ActionError, BridgeEvent, ElementStatus, PreviewId};

use crate::actions::Actions;
use crate::dom::{nested_component_path, Document, DomEvent, DomObserver, EventTarget, ListenerId, NodeId};
use crate::events::first_arg;

pub const CONTAINER_CLASS: &str = "tpp-borders-container";
pub const BORDERS_CLASS: &str = "tpp-borders";
pub const BUTTONS_CLASS: &str = "tpp-buttons";
pub const BUTTON_CLASS: &str = "tpp-button";
pub const INLINE_EDIT_CLASS: &str = "tpp-buttons-inline-edit";
const MEDIA_CLASS: &str = "bottom";
const HIDDEN_STYLE: &str = "transition: all 0s";

#[derive(Default)]
struct DecorationState {
    visible: bool,
    /// Bumped by every show and hide; renders of an older generation are dropped.
    generation: u64,
    status: Option<Arc<ElementStatus>>,
    /// Preview id the cached status belongs to.
    status_preview_id: Option<String>,
    linger: Option<JoinHandle<()>>,
    hover_listeners: Vec<ListenerId>,
    /// Window and resize listeners, only while visible.
    geometry_listeners: Vec<ListenerId>,
    button_listeners: Vec<ListenerId>,
}

struct Decoration {
    node: NodeId,
    borders: NodeId,
    buttons: NodeId,
    state: Mutex<DecorationState>,
}

impl Decoration {
    fn is_current(&self, generation: u64) -> bool {
        let state = self.state.lock();
        state.visible && state.generation == generation
    }
}

struct ControllerInner {
    document: Document,
    actions: Actions,
    buttons: ButtonRegistry,
    config: DecorationConfig,
    container: Mutex<Option<NodeId>>,
    decorations: Mutex<HashMap<NodeId, Arc<Decoration>>>,
    observer: Mutex<Option<DomObserver>>,
}

/// Decorates every annotated node of a document. Cloning yields another
/// handle to the same controller.
#[derive(Clone)]
pub struct DecorationController {
    inner: Arc<ControllerInner>,
}

impl DecorationController {
    /// Create the controller. Decoration starts on a successful `Initialized`
    /// or on an explicit [`start`](Self::start).
    pub fn new(document: Document, actions: Actions, buttons: ButtonRegistry, config: DecorationConfig) -> Self {
        let inner = Arc::new(ControllerInner {
            document,
            actions,
            buttons,
            config,
            container: Mutex::new(None),
            decorations: Mutex::new(HashMap::new()),
            observer: Mutex::new(None),
        });

        let bus = inner.actions.bus().clone();
        let weak = Arc::downgrade(&inner);
        bus.on(BridgeEvent::Initialized, move |args| {
            let connected = first_arg(&args).as_bool().unwrap_or(false);
            if let Some(inner) = weak.upgrade().filter(|_| connected) {
                inner.start();
            }
            async { Ok(()) }
        });

        let weak = Arc::downgrade(&inner);
        bus.on(BridgeEvent::StatusChange, move |args| {
            if let Some(inner) = weak.upgrade() {
                inner.apply_status_change(&first_arg(&args));
            }
            async { Ok(()) }
        });

        Self { inner }
    }

    /// Create the overlay container and start observing the body. Calling it
    /// again has no effect.
    pub fn start(&self) {
        self.inner.start();
    }

    pub fn document(&self) -> &Document {
        &self.inner.document
    }

    pub fn actions(&self) -> &Actions {
        &self.inner.actions
    }

    pub fn buttons(&self) -> &ButtonRegistry {
        &self.inner.buttons
    }

    pub fn attribute(&self) -> &str {
        &self.inner.config.attribute
    }

    pub fn container(&self) -> Option<NodeId> {
        *self.inner.container.lock()
    }

    /// Process pending document changes now.
    pub fn flush(&self) {
        if let Some(observer) = self.inner.observer.lock().as_ref() {
            observer.flush();
        }
    }

    pub fn is_decorated(&self, node: NodeId) -> bool {
        self.inner.decorations.lock().contains_key(&node)
    }

    pub fn decoration_count(&self) -> usize {
        self.inner.decorations.lock().len()
    }

    pub fn is_visible(&self, node: NodeId) -> bool {
        self.inner
            .decoration(node)
            .is_some_and(|decoration| decoration.state.lock().visible)
    }

    /// Border overlay of `node`.
    pub fn borders(&self, node: NodeId) -> Option<NodeId> {
        self.inner.decoration(node).map(|decoration| decoration.borders)
    }

    /// Button bar of `node`.
    pub fn button_bar(&self, node: NodeId) -> Option<NodeId> {
        self.inner.decoration(node).map(|decoration| decoration.buttons)
    }

    /// Show the overlay of `node` and render its buttons.
    pub async fn show(&self, node: NodeId) {
        self.inner.clone().show(node).await;
    }

    pub fn hide(&self, node: NodeId) {
        self.inner.hide(node);
    }

    pub fn find_preview_nodes(&self, preview_id: &str) -> Vec<NodeId> {
        find_preview_nodes(&self.inner.document, &self.inner.config.attribute, preview_id)
    }

    pub async fn preview_element_node(&self, target: PreviewTarget) -> Result<PreviewNode, ActionError> {
        preview_element_node(&self.inner.document, &self.inner.actions, &self.inner.config.attribute, target).await
    }

    pub async fn preview_element_nodes(&self) -> Result<Vec<PreviewNode>, ActionError> {
        preview_element_nodes(&self.inner.document, &self.inner.actions, &self.inner.config.attribute).await
    }
}

impl ControllerInner {
    fn decoration(&self, node: NodeId) -> Option<Arc<Decoration>> {
        self.decorations.lock().get(&node).cloned()
    }

    fn start(self: &Arc<Self>) {
        {
            let mut container = self.container.lock();
            if container.is_some() {
                return;
            }
            let node = self.document.build("div", &[CONTAINER_CLASS], &[]);
            self.document.append_child(self.document.body(), node);
            *container = Some(node);
        }

        let on_insert = Arc::downgrade(self);
        let on_remove = Arc::downgrade(self);
        let observer = DomObserver::observe(
            &self.document,
            self.document.body(),
            &self.config.attribute,
            move |node| {
                if let Some(inner) = on_insert.upgrade() {
                    inner.decorate(node);
                }
            },
            move |node| {
                if let Some(inner) = on_remove.upgrade() {
                    inner.undecorate(node);
                }
            },
        );
        *self.observer.lock() = Some(observer);
        debug!("Decoration started");
    }

    fn decorate(self: &Arc<Self>, node: NodeId) {
        if self.decorations.lock().contains_key(&node) {
            return;
        }
        let Some(container) = *self.container.lock() else {
            return;
        };

        let document = &self.document;
        let borders = document.build("div", &[BORDERS_CLASS], &[]);
        let buttons = document.build("div", &[BUTTONS_CLASS], &[]);
        document.append_child(borders, buttons);
        document.append_child(container, borders);

        let mut listeners = Vec::new();
        for target in [EventTarget::Node(node), EventTarget::Node(buttons)] {
            for event in [DomEvent::MouseEnter, DomEvent::FocusIn] {
                let weak = Arc::downgrade(self);
                listeners.push(document.add_listener(target, event, move |_| {
                    if let Some(inner) = weak.upgrade() {
                        inner.on_enter(node);
                    }
                }));
            }
            for event in [DomEvent::MouseLeave, DomEvent::FocusOut] {
                let weak = Arc::downgrade(self);
                listeners.push(document.add_listener(target, event, move |_| {
                    if let Some(inner) = weak.upgrade() {
                        inner.on_leave(node);
                    }
                }));
            }
        }

        let decoration = Arc::new(Decoration {
            node,
            borders,
            buttons,
            state: Mutex::new(DecorationState {
                hover_listeners: listeners,
                ..DecorationState::default()
            }),
        });
        self.decorations.lock().insert(node, decoration.clone());

        let inner = self.clone();
        spawn(async move {
            if let Ok(status) = inner.element_status(&decoration).await {
                if status.type_matches(&["Media"]) {
                    inner.document.add_class(decoration.buttons, MEDIA_CLASS);
                }
            }
        });
    }

    fn undecorate(&self, node: NodeId) {
        let Some(decoration) = self.decorations.lock().remove(&node) else {
            return;
        };
        let listeners: Vec<ListenerId> = {
            let mut guard = decoration.state.lock();
            let state = &mut *guard;
            if let Some(linger) = state.linger.take() {
                linger.abort();
            }
            state.visible = false;
            state.generation += 1;
            state
                .hover_listeners
                .drain(..)
                .chain(state.geometry_listeners.drain(..))
                .chain(state.button_listeners.drain(..))
                .collect()
        };
        for id in listeners {
            self.document.remove_listener(id);
        }
        self.document.remove(decoration.borders);
    }

    fn on_enter(self: &Arc<Self>, node: NodeId) {
        let Some(decoration) = self.decoration(node) else {
            return;
        };
        if let Some(linger) = decoration.state.lock().linger.take() {
            linger.abort();
        }
        spawn(self.clone().show(node));
    }

    fn on_leave(self: &Arc<Self>, node: NodeId) {
        let Some(decoration) = self.decoration(node) else {
            return;
        };
        let weak = Arc::downgrade(self);
        let linger = self.config.linger();
        let handle = spawn(async move {
            tokio::time::sleep(linger).await;
            if let Some(inner) = weak.upgrade() {
                inner.hide(node);
            }
        });
        let previous = std::mem::replace(&mut decoration.state.lock().linger, handle);
        if let Some(previous) = previous {
            previous.abort();
        }
    }

    fn place(&self, decoration: &Decoration) {
        let rect = self.document.bounding_rect(decoration.node);
        let height = rect.height.max(self.config.min_border_height);
        self.document.set_style(
            decoration.borders,
            &format!(
                "opacity:1;top:{}px;left:{}px;width:{}px;height:{}px",
                rect.top, rect.left, rect.width, height
            ),
        );
    }

    fn replace(&self, node: NodeId) {
        if let Some(decoration) = self.decoration(node) {
            if decoration.state.lock().visible {
                self.place(&decoration);
            }
        }
    }

    fn watch_geometry(self: &Arc<Self>, decoration: &Decoration) {
        let node = decoration.node;
        let targets = [
            (EventTarget::Window, DomEvent::Scroll),
            (EventTarget::Window, DomEvent::Resize),
            (EventTarget::Node(node), DomEvent::Resize),
        ];
        let ids: Vec<ListenerId> = targets
            .into_iter()
            .map(|(target, event)| {
                let weak: Weak<Self> = Arc::downgrade(self);
                self.document.add_listener(target, event, move |_| {
                    if let Some(inner) = weak.upgrade() {
                        inner.replace(node);
                    }
                })
            })
            .collect();
        decoration.state.lock().geometry_listeners.extend(ids);
    }

    fn hide(&self, node: NodeId) {
        self.hide_generation(node, None);
    }

    /// Hide `node`, but only while its current show is `generation` when one
    /// is given.
    fn hide_generation(&self, node: NodeId, generation: Option<u64>) {
        let Some(decoration) = self.decoration(node) else {
            return;
        };
        let listeners: Vec<ListenerId> = {
            let mut state = decoration.state.lock();
            if !state.visible || generation.is_some_and(|g| g != state.generation) {
                return;
            }
            state.visible = false;
            state.generation += 1;
            state.geometry_listeners.drain(..).collect()
        };
        for id in listeners {
            self.document.remove_listener(id);
        }
        self.document.set_style(decoration.borders, HIDDEN_STYLE);
    }

    async fn show(self: Arc<Self>, node: NodeId) {
        let Some(decoration) = self.decoration(node) else {
            return;
        };
        self.place(&decoration);

        let (generation, stale_buttons) = {
            let mut state = decoration.state.lock();
            if state.visible {
                return;
            }
            state.visible = true;
            state.generation += 1;
            (state.generation, std::mem::take(&mut state.button_listeners))
        };
        for id in stale_buttons {
            self.document.remove_listener(id);
        }
        self.watch_geometry(&decoration);
        self.document.clear_children(decoration.buttons);

        let status = match self.element_status(&decoration).await {
            Ok(status) => status,
            Err(e) => {
                warn!(node = %node, error = %e, "Could not resolve status for decoration");
                self.hide_generation(node, Some(generation));
                return;
            }
        };
        if !decoration.is_current(generation) {
            return;
        }

        let scope = ButtonScope {
            document: self.document.clone(),
            node,
            preview_id: self
                .document
                .attribute(node, &self.config.attribute)
                .unwrap_or_default(),
            status,
            language: self.actions.preview_language(),
            button: decoration.buttons,
            actions: self.actions.clone(),
        };

        if !self.render_buttons(&decoration, scope, generation).await {
            self.hide_generation(node, Some(generation));
        }
    }

    /// Render every registered button. Returns whether any is visible.
    async fn render_buttons(
        self: &Arc<Self>,
        decoration: &Arc<Decoration>,
        scope: ButtonScope,
        generation: u64,
    ) -> bool {
        let nested = PreviewId::parse(&scope.preview_id).is_nested();
        let renders = self
            .buttons
            .buttons()
            .into_iter()
            .map(|button| self.render_button(decoration, button, scope.clone(), nested, generation));
        join_all(renders).await.into_iter().any(|visible| visible)
    }

    async fn render_button(
        self: &Arc<Self>,
        decoration: &Arc<Decoration>,
        button: Arc<dyn Button>,
        mut scope: ButtonScope,
        nested: bool,
        generation: u64,
    ) -> bool {
        let document = &self.document;
        // Appended before the visibility check so buttons keep registry order.
        let node = document.build("span", &[BUTTON_CLASS], &[("disabled", ""), ("tabindex", "0")]);
        document.append_child(decoration.buttons, node);
        scope.button = node;

        let visible = match button.is_visible(&scope).await {
            Ok(visible) => visible,
            Err(e) => {
                warn!(button = button.name(), error = %e, "Button visibility check failed");
                false
            }
        };
        let allowed = visible
            && (!nested || button.supports_component_path() || button.supports_inedit())
            && (scope.status.component_type.is_none() || button.supports_inedit());
        if !allowed || !decoration.is_current(generation) {
            document.remove(node);
            return false;
        }
        if button.supports_inedit() {
            document.add_class(decoration.buttons, INLINE_EDIT_CLASS);
        }

        let weak = Arc::downgrade(self);
        let click_button = button.clone();
        let click_scope = scope.clone();
        let click = document.add_listener(EventTarget::Node(node), DomEvent::Click, move |_| {
            if let Some(inner) = weak.upgrade() {
                spawn(inner.execute(click_button.clone(), click_scope.clone(), None));
            }
        });
        decoration.state.lock().button_listeners.push(click);

        spawn(self.clone().adorn(decoration.clone(), button, scope));
        true
    }

    /// Apply icon, enabled state, label and items of a rendered button.
    async fn adorn(self: Arc<Self>, decoration: Arc<Decoration>, button: Arc<dyn Button>, scope: ButtonScope) {
        let document = &self.document;
        let node = scope.button;

        let icon = async {
            match button.icon(&scope).await {
                ButtonIcon::Class(class) => document.add_class(node, &class),
                ButtonIcon::Image(url) => document.set_style(node, &format!("background-image:url({})", url)),
            }
        };

        let enabled = async {
            match button.is_enabled(&scope).await {
                Ok(true) => document.remove_attribute(node, "disabled"),
                Ok(false) => {}
                Err(e) => warn!(button = button.name(), error = %e, "Button enabled check failed"),
            }
        };

        let label = async {
            if let Some(label) = button.label(&scope).await.filter(|label| !label.is_empty()) {
                document.set_attribute(node, "title", &label);
            }
        };

        let items = async {
            let items = button.items(&scope).await;
            if items.is_empty() {
                return;
            }
            let list = document.create_element("ul");
            document.append_child(node, list);
            for item in items {
                let entry = document.create_element("li");
                document.set_text(entry, &item.label);
                document.append_child(list, entry);

                let weak = Arc::downgrade(&self);
                let item_button = button.clone();
                let item_scope = scope.clone();
                let click = document.add_listener(EventTarget::Node(entry), DomEvent::Click, move |_| {
                    if let Some(inner) = weak.upgrade() {
                        spawn(inner.execute(item_button.clone(), item_scope.clone(), Some(item.clone())));
                    }
                });
                decoration.state.lock().button_listeners.push(click);
            }
        };

        tokio::join!(icon, enabled, label, items);
    }

    async fn execute(self: Arc<Self>, button: Arc<dyn Button>, scope: ButtonScope, item: Option<ButtonItem>) {
        self.hide(scope.node);
        let item = item.as_ref();
        button.before_execute(&scope, item).await;
        match button.execute(&scope, item).await {
            Ok(result) => button.after_execute(&scope, item, Some(&result), None).await,
            Err(e) => {
                error!(button = button.name(), preview_id = %scope.preview_id, error = %e, "Button execution failed");
                button.after_execute(&scope, item, None, Some(&e)).await;
            }
        }
    }

    /// Status of the decorated node, fetched once per preview id.
    ///
    /// Nested components get a copy of the parent's status carrying their
    /// component path and field type.
    async fn element_status(&self, decoration: &Decoration) -> Result<Arc<ElementStatus>, ActionError> {
        let current = self.document.attribute(decoration.node, &self.config.attribute);
        {
            let state = decoration.state.lock();
            if let Some(status) = &state.status {
                if state.status_preview_id == current {
                    return Ok(status.clone());
                }
            }
        }
        let Some(preview_id) = current.clone() else {
            return Err(ActionError::MissingPreviewId);
        };

        let status = if PreviewId::parse(&preview_id).is_nested() {
            let nested = nested_component_path(&self.document, decoration.node, &self.config.attribute)
                .ok_or(ActionError::MissingPreviewId)?;
            let mut status = (*self.actions.element_status(&nested.parent_preview_id, false).await?).clone();
            let component_type = self
                .actions
                .field_component_type(&nested.parent_preview_id, &nested.path)
                .await?;
            status.component_type = component_type.as_str().map(str::to_string);
            status.component_path = Some(nested.path);
            status
        } else {
            (*self.actions.element_status(&preview_id, false).await?).clone()
        };

        let status = Arc::new(status);
        let mut state = decoration.state.lock();
        state.status = Some(status.clone());
        state.status_preview_id = current;
        Ok(status)
    }

    /// Replace the status of every decoration showing the changed id and
    /// re-render visible ones.
    fn apply_status_change(self: &Arc<Self>, payload: &serde_json::Value) {
        let Some(preview_id) = payload["previewId"].as_str() else {
            return;
        };
        let status = match ElementStatus::from_response(payload["status"].clone()) {
            Ok(status) => Arc::new(status),
            Err(e) => {
                warn!(preview_id, error = %e, "Ignoring malformed status change");
                return;
            }
        };

        for node in find_preview_nodes(&self.document, &self.config.attribute, preview_id) {
            let Some(decoration) = self.decoration(node) else {
                continue;
            };
            let visible = {
                let mut state = decoration.state.lock();
                state.status = Some(status.clone());
                state.status_preview_id = Some(preview_id.to_string());
                state.visible
            };
            if visible {
                self.hide(node);
                spawn(self.clone().show(node));
            }
        }
    }
}

fn spawn<F>(future: F) -> Option<JoinHandle<()>>
where
    F: Future<Output = ()> + Send + 'static,
{
    match tokio::runtime::Handle::try_current() {
        Ok(handle) => Some(handle.spawn(future)),
        Err(_) => {
            warn!("No runtime available for decoration task");
            None
        }
    }
}

#[cfg(test)]
#[path = "decoration_tests.rs"]
mod tests;
