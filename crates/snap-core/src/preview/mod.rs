//! The preview facade.
//!
//! [`Preview`] owns one connection to the host and everything built on it:
//! the [`Actions`], the [`DecorationController`] and [`DragAndDrop`]. It
//! translates bus events into calls of the typed listeners registered by
//! the page and runs the built-in fallbacks when the page registered none.

mod legacy;
mod listeners;

pub use legacy::{UpdateHandler, UpdateHandlers};
pub use listeners::{ContentChange, Listener, ListenerEvent, ListenerKind, Listeners};

use std::future::Future;
use std::sync::{Arc, Weak};

use futures::future::join_all;
use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use snap_config::{Config, DecorationConfig};
use snap_protocols::{
    ActionError, BridgeEvent, DocumentWaiter, ElementStatus, FrameTransport, HostWindow, WindowMessage,
};

use crate::actions::{Actions, TransferOptions};
use crate::decoration::{Button, ButtonRegistry, DecorationController, PreviewNode, PreviewTarget};
use crate::dnd::DragAndDrop;
use crate::dom::{Document, NodeId};
use crate::events::{first_arg, EventBus};
use crate::messenger::Messenger;

use legacy::FallbackContext;

/// Language assumed for CaaS documents while no preview element set one.
const DEFAULT_CAAS_LANGUAGE: &str = "EN";

struct PreviewInner {
    actions: Actions,
    decoration: DecorationController,
    dnd: DragAndDrop,
    listeners: Listeners,
    update_handlers: UpdateHandlers,
    caas: Mutex<Option<Arc<dyn DocumentWaiter>>>,
}

/// Entry point for an embedded page. Cloning yields another handle to the
/// same preview.
#[derive(Clone)]
pub struct Preview {
    inner: Arc<PreviewInner>,
}

impl Preview {
    /// Build a preview over a fresh messenger and start the handshake.
    ///
    /// Everything is wired before the handshake task gets to run, so the
    /// `Initialized` emit is never missed.
    pub fn connect(
        config: &Config,
        transport: Arc<dyn FrameTransport>,
        inbound: mpsc::UnboundedReceiver<WindowMessage>,
        document: Document,
        window: Arc<dyn HostWindow>,
    ) -> Self {
        let messenger = Messenger::new(config.messenger.clone(), transport, EventBus::new());
        let preview = Self::new(messenger, document, window, config.decoration.clone());
        preview.messenger().attach_inbound(inbound);
        preview
    }

    /// Build a preview over an existing messenger. If its handshake already
    /// succeeded, decoration starts right away.
    pub fn new(
        messenger: Messenger,
        document: Document,
        window: Arc<dyn HostWindow>,
        config: DecorationConfig,
    ) -> Self {
        let already_connected = messenger.handshake_state().is_connected();
        let actions = Actions::new(messenger);
        let decoration = DecorationController::new(document, actions.clone(), ButtonRegistry::new(), config);
        let dnd = DragAndDrop::new(decoration.clone());

        let update_handlers = UpdateHandlers::new();
        let listeners = Listeners::new();
        install_fallbacks(
            &listeners,
            FallbackContext {
                document: decoration.document().clone(),
                attribute: decoration.attribute().to_string(),
                actions: actions.clone(),
                window: window.clone(),
                handlers: update_handlers.clone(),
            },
            window,
        );

        let preview = Self {
            inner: Arc::new(PreviewInner {
                actions,
                decoration,
                dnd,
                listeners,
                update_handlers,
                caas: Mutex::new(None),
            }),
        };
        preview.wire();
        if already_connected {
            preview.inner.decoration.start();
        }
        preview
    }

    fn from_weak(weak: &Weak<PreviewInner>) -> Option<Self> {
        weak.upgrade().map(|inner| Self { inner })
    }

    fn wire(&self) {
        let bus = self.bus().clone();

        let weak = Arc::downgrade(&self.inner);
        bus.on(BridgeEvent::ElementChange, move |args| {
            let preview = Self::from_weak(&weak);
            async move {
                let Some(preview) = preview else {
                    return Ok(());
                };
                let payload = first_arg(&args);
                let preview_id = payload["previewId"].as_str().unwrap_or_default().to_string();
                let content = match payload.get("content") {
                    Some(content) => content.clone(),
                    None => preview.render_missing_content(&preview_id).await,
                };
                if !preview.dispatch_content_change(&preview_id, content).await {
                    preview.bus().emit(BridgeEvent::RerenderView, vec![]).await?;
                }
                Ok(())
            }
        });

        let weak = Arc::downgrade(&self.inner);
        bus.on(BridgeEvent::RerenderView, move |_| {
            let preview = Self::from_weak(&weak);
            async move {
                if let Some(preview) = preview {
                    preview.rerender_view().await;
                }
                Ok(())
            }
        });

        let weak = Arc::downgrade(&self.inner);
        bus.on(BridgeEvent::PreviewRequest, move |args| {
            let preview = Self::from_weak(&weak);
            async move {
                let Some(preview) = preview else {
                    return Ok(());
                };
                let preview_id = first_arg(&args).as_str().unwrap_or_default().to_string();
                preview.request_preview_element(preview_id).await;
                Ok(())
            }
        });

        let weak = Arc::downgrade(&self.inner);
        bus.on(BridgeEvent::NavigationChange, move |args| {
            let preview = Self::from_weak(&weak);
            async move {
                if let Some(preview) = preview {
                    let preview_id = first_arg(&args).as_str().map(str::to_string);
                    preview
                        .inner
                        .listeners
                        .trigger(ListenerKind::NavigationChange, ListenerEvent::NavigationChange(preview_id))
                        .await;
                }
                Ok(())
            }
        });

        let weak = Arc::downgrade(&self.inner);
        bus.on(BridgeEvent::MppChange, move |args| {
            let preview = Self::from_weak(&weak);
            async move {
                let Some(preview) = preview else {
                    return Ok(());
                };
                let payload = first_arg(&args);
                let name = payload["type"].as_str().unwrap_or_default();
                match ListenerKind::from_name(name) {
                    Some((kind, false)) => {
                        let result = payload.get("result").cloned().unwrap_or(Value::Null);
                        preview.inner.listeners.trigger(kind, ListenerEvent::Mpp(result)).await;
                    }
                    _ => warn!(kind = name, "Ignoring unknown MPP change"),
                }
                Ok(())
            }
        });
    }

    async fn render_missing_content(&self, preview_id: &str) -> Value {
        let target = (!preview_id.is_empty()).then_some(preview_id);
        self.inner.actions.render_element(target).await.unwrap_or_else(|e| {
            debug!(preview_id, error = %e, "Render for element change failed");
            Value::Null
        })
    }

    /// Offer the change to the listeners once per node showing
    /// `preview_id`, or once without a node if there is none. Returns
    /// whether any listener captured it.
    async fn dispatch_content_change(&self, preview_id: &str, content: Value) -> bool {
        let nodes = self.inner.decoration.find_preview_nodes(preview_id);
        let targets: Vec<Option<NodeId>> = if nodes.is_empty() {
            vec![None]
        } else {
            nodes.into_iter().map(Some).collect()
        };

        let changes = targets.into_iter().map(|node| {
            let event = ListenerEvent::ContentChange(ContentChange {
                node,
                preview_id: preview_id.to_string(),
                content: content.clone(),
            });
            self.inner.listeners.trigger(ListenerKind::ContentChange, event)
        });
        join_all(changes).await.into_iter().flatten().any(|capture| capture.is_some())
    }

    async fn rerender_view(&self) {
        let waiter = self.caas_waiter();
        let preview_element = self.inner.actions.preview_element();
        let (Some(waiter), Some(preview_element)) = (waiter, preview_element) else {
            self.inner
                .listeners
                .trigger(ListenerKind::RerenderView, ListenerEvent::RerenderView)
                .await;
            return;
        };

        let language = self.caas_language();
        let listeners = self.inner.listeners.clone();
        tokio::spawn(async move {
            if let Err(e) = waiter.wait_for_document_update(&preview_element, &language).await {
                error!(preview_id = %preview_element, error = %e, "CaaS update did not arrive");
            }
            listeners
                .trigger(ListenerKind::RerenderView, ListenerEvent::RerenderView)
                .await;
        });
    }

    async fn request_preview_element(&self, preview_id: String) {
        let waiter = match self.caas_waiter() {
            Some(waiter) => self.is_page_ref(&preview_id).await.then_some(waiter),
            None => None,
        };
        let Some(waiter) = waiter else {
            self.inner
                .listeners
                .trigger(ListenerKind::RequestPreviewElement, ListenerEvent::RequestPreviewElement(preview_id))
                .await;
            return;
        };

        let language = self.caas_language();
        let listeners = self.inner.listeners.clone();
        tokio::spawn(async move {
            if let Err(e) = waiter.wait_for_document_insert(&preview_id, &language).await {
                error!(preview_id = %preview_id, error = %e, "CaaS insert did not arrive");
            }
            listeners
                .trigger(ListenerKind::RequestPreviewElement, ListenerEvent::RequestPreviewElement(preview_id))
                .await;
        });
    }

    async fn is_page_ref(&self, preview_id: &str) -> bool {
        match self.inner.actions.element_status(preview_id, false).await {
            Ok(status) => status.type_matches(&["PageRef"]),
            Err(e) => {
                warn!(preview_id, error = %e, "Status lookup for preview request failed");
                false
            }
        }
    }

    fn caas_waiter(&self) -> Option<Arc<dyn DocumentWaiter>> {
        self.inner.caas.lock().clone()
    }

    fn caas_language(&self) -> String {
        self.inner
            .actions
            .preview_language()
            .unwrap_or_else(|| DEFAULT_CAAS_LANGUAGE.to_string())
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    pub fn actions(&self) -> &Actions {
        &self.inner.actions
    }

    pub fn messenger(&self) -> &Messenger {
        self.inner.actions.messenger()
    }

    pub fn bus(&self) -> &EventBus {
        self.inner.actions.bus()
    }

    pub fn decoration(&self) -> &DecorationController {
        &self.inner.decoration
    }

    pub fn drag_and_drop(&self) -> &DragAndDrop {
        &self.inner.dnd
    }

    pub fn document(&self) -> &Document {
        self.inner.decoration.document()
    }

    /// Raw listener registry, also holding the fallbacks.
    pub fn listeners(&self) -> &Listeners {
        &self.inner.listeners
    }

    /// Handlers that nodes name in their `data-on-tpp-update` attribute.
    pub fn update_handlers(&self) -> &UpdateHandlers {
        &self.inner.update_handlers
    }

    // ========================================================================
    // Connection
    // ========================================================================

    /// Run `handler` with `(connected, is_legacy_cc)` once the handshake has
    /// settled, immediately if it already has.
    pub fn on_init<F>(&self, handler: F)
    where
        F: Fn(bool, bool) + Send + Sync + 'static,
    {
        let state = self.messenger().handshake_state();
        if state.is_settled() {
            handler(state.is_connected(), state.is_legacy_cc());
            return;
        }
        self.bus().on(BridgeEvent::Initialized, move |args| {
            let connected = args.first().and_then(Value::as_bool).unwrap_or(false);
            let is_legacy_cc = args.get(1).and_then(Value::as_bool).unwrap_or(false);
            handler(connected, is_legacy_cc);
            async { Ok(()) }
        });
    }

    /// Whether the handshake succeeded, waiting a short grace period for a
    /// pending one.
    pub async fn is_connected(&self) -> bool {
        let messenger = self.messenger();
        tokio::time::timeout(messenger.config().connect_wait(), messenger.wait_settled())
            .await
            .map(|state| state.is_connected())
            .unwrap_or(false)
    }

    pub fn is_legacy_cc(&self) -> bool {
        self.messenger().is_legacy_cc()
    }

    /// Delay rerender and preview requests until CaaS reflects the change.
    pub fn enable_caas_mode(&self, waiter: Arc<dyn DocumentWaiter>) {
        info!("CaaS mode enabled");
        *self.inner.caas.lock() = Some(waiter);
    }

    pub fn is_caas_mode(&self) -> bool {
        self.inner.caas.lock().is_some()
    }

    // ========================================================================
    // Listeners
    // ========================================================================

    /// Listen for content changes. Returning `Some` captures the change;
    /// if no listener captures it the whole view is rerendered.
    pub fn on_content_change<F, Fut>(&self, listener: F)
    where
        F: Fn(ContentChange) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Option<Value>> + Send + 'static,
    {
        self.inner.listeners.add(ListenerKind::ContentChange, false, move |event| {
            let capture = match event {
                ListenerEvent::ContentChange(change) => Some(listener(change)),
                _ => None,
            };
            async move {
                match capture {
                    Some(capture) => capture.await,
                    None => None,
                }
            }
        });
    }

    /// Listen for full rerender requests. Replaces the default reload.
    pub fn on_rerender_view<F, Fut>(&self, listener: F)
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.inner.listeners.add(ListenerKind::RerenderView, false, move |_| {
            let rerender = listener();
            async move {
                rerender.await;
                None
            }
        });
    }

    pub fn on_navigation_change<F, Fut>(&self, listener: F)
    where
        F: Fn(Option<String>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.inner.listeners.add(ListenerKind::NavigationChange, false, move |event| {
            let navigation = match event {
                ListenerEvent::NavigationChange(preview_id) => Some(listener(preview_id)),
                _ => None,
            };
            async move {
                if let Some(navigation) = navigation {
                    navigation.await;
                }
                None
            }
        });
    }

    /// Listen for the host asking the page to show another element.
    pub fn on_request_preview_element<F, Fut>(&self, listener: F)
    where
        F: Fn(String) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.inner.listeners.add(ListenerKind::RequestPreviewElement, false, move |event| {
            let request = match event {
                ListenerEvent::RequestPreviewElement(preview_id) => Some(listener(preview_id)),
                _ => None,
            };
            async move {
                if let Some(request) = request {
                    request.await;
                }
                None
            }
        });
    }

    /// Listen for one kind of multi-perspective preview change.
    pub fn on_mpp_change<F, Fut>(&self, kind: ListenerKind, listener: F)
    where
        F: Fn(Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.inner.listeners.add(kind, false, move |event| {
            let change = match event {
                ListenerEvent::Mpp(result) => Some(listener(result)),
                _ => None,
            };
            async move {
                if let Some(change) = change {
                    change.await;
                }
                None
            }
        });
    }

    // ========================================================================
    // Buttons
    // ========================================================================

    /// Insert `button` at `index`, or append it for `None`.
    pub fn register_button(&self, button: Arc<dyn Button>, index: Option<usize>) {
        self.inner.decoration.buttons().register(button, index);
    }

    /// Replace the button named `name`, or remove it for `None`.
    pub fn override_default_button(&self, name: &str, button: Option<Arc<dyn Button>>) -> bool {
        self.inner.decoration.buttons().override_default_button(name, button)
    }

    // ========================================================================
    // Operations
    // ========================================================================

    pub async fn set_preview_element(&self, preview_id: Option<&str>) -> Result<(), ActionError> {
        self.inner.actions.set_preview_element(preview_id).await
    }

    pub fn preview_element(&self) -> Option<String> {
        self.inner.actions.preview_element()
    }

    pub async fn element_status(&self, preview_id: &str, refresh: bool) -> Result<Arc<ElementStatus>, ActionError> {
        self.inner.actions.element_status(preview_id, refresh).await
    }

    pub async fn preview_element_node(&self, target: PreviewTarget) -> Result<PreviewNode, ActionError> {
        self.inner.decoration.preview_element_node(target).await
    }

    pub async fn trigger_change(&self, preview_id: &str, content: Option<Value>) -> Result<(), ActionError> {
        self.inner.actions.trigger_change(preview_id, content).await
    }

    pub async fn trigger_rerender_view(&self) {
        self.inner.actions.trigger_rerender_view().await
    }

    /// Move or copy the section `source` next to `target`.
    ///
    /// Returns `Ok(false)` without contacting the host when `source` is not
    /// a section or `target` is neither a page, a body nor a section.
    pub async fn move_section(&self, source: &str, target: &str, options: TransferOptions) -> Result<bool, ActionError> {
        let source_status = self.element_status(source, false).await?;
        if !source_status.type_matches(&["Section"]) {
            error!(preview_id = source, "Given source must be a Section");
            return Ok(false);
        }
        let target_status = self.element_status(target, false).await?;
        if !target_status.type_matches(&["Page", "Body", "Section"]) {
            error!(preview_id = target, "Given target must be a Page, Body or Section");
            return Ok(false);
        }

        let source_id = source_status.id.clone().unwrap_or(Value::Null);
        let target_id = target_status.id.clone().unwrap_or(Value::Null);
        self.inner.actions.transfer_section(&source_id, &target_id, options).await
    }
}

fn install_fallbacks(listeners: &Listeners, context: FallbackContext, window: Arc<dyn HostWindow>) {
    let context = Arc::new(context);
    listeners.add(ListenerKind::ContentChange, true, move |event| {
        let context = context.clone();
        async move {
            match event {
                ListenerEvent::ContentChange(change) => context.apply(change).await,
                _ => None,
            }
        }
    });

    listeners.add(ListenerKind::RerenderView, true, move |_| {
        window.reload();
        async { None }
    });
}

#[cfg(test)]
#[path = "preview_tests.rs"]
mod tests;
