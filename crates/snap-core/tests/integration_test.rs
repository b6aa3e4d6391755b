//! End-to-end tests through the public API.
//!
//! Every test runs against a scripted host behind an in-memory transport,
//! with time paused so handshake retries and timeouts are deterministic.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{json, Value};

use snap_config::{Config, MessengerConfig};
use snap_core::actions::status_change;
use snap_core::decoration::{ButtonItem, ButtonScope, PreviewTarget};
use snap_core::dom::{DomEvent, EventTarget, Rect};
use snap_core::testing::{callback_for, EventLog, MemoryTransport, RecordingWindow, ScriptedHost};
use snap_core::{Actions, Button, ContentChange, Document, EventBus, Messenger, NodeId, Preview};
use snap_protocols::{Action, BridgeEvent, ButtonError, StatusState};

const ATTR: &str = "data-preview-id";

// ============================================================================
// Test Helpers
// ============================================================================

async fn settle() {
    tokio::time::sleep(Duration::from_millis(1)).await;
}

fn page_host() -> ScriptedHost {
    let host = ScriptedHost::new();
    host.on_action(Action::Status, |params| match params["previewId"].as_str() {
        Some("1.EN") => json!({ "id": 1, "name": "home", "elementType": "Page", "language": "EN", "children": [{ "name": "body" }] }),
        Some(id) if id.ends_with(".EN") => {
            let number: u64 = id.trim_end_matches(".EN").parse().unwrap_or(0);
            json!({ "id": number, "name": format!("section {}", number), "elementType": "Section" })
        }
        _ => Value::Null,
    });
    host.on_action(Action::TransferSectionAllowed, |params| params["targetIds"].clone());
    host.on_action(Action::TransferSection, |_| json!(true));
    host
}

fn connect(host: &ScriptedHost) -> (Preview, Arc<MemoryTransport>, Arc<RecordingWindow>) {
    let (transport, rx) = MemoryTransport::new(true);
    host.install(&transport);
    let window = RecordingWindow::new();
    let preview = Preview::connect(&Config::default(), transport.clone(), rx, Document::new(), window.clone());
    (preview, transport, window)
}

fn annotated(document: &Document, parent: NodeId, id: &str) -> NodeId {
    let node = document.build("div", &[], &[(ATTR, id)]);
    document.append_child(parent, node);
    node
}

/// Button that pushes new markup for its element.
struct UpdateButton;

#[async_trait]
impl Button for UpdateButton {
    fn name(&self) -> &str {
        "update"
    }

    async fn is_enabled(&self, _scope: &ButtonScope) -> Result<bool, ButtonError> {
        Ok(true)
    }

    async fn label(&self, _scope: &ButtonScope) -> Option<String> {
        Some("Update".to_string())
    }

    async fn execute(&self, scope: &ButtonScope, _item: Option<&ButtonItem>) -> Result<Value, ButtonError> {
        scope
            .actions
            .trigger_change(&scope.preview_id, Some(json!("<p>updated</p>")))
            .await
            .map_err(|e| ButtonError::new(self.name(), "execute", e.to_string()))?;
        Ok(Value::Null)
    }
}

// ============================================================================
// Messenger scenarios
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_handshake_succeeds_on_fourth_ping() {
    let host = ScriptedHost::new();
    host.ignore_pings(3);
    let (transport, rx) = MemoryTransport::new(true);
    host.install(&transport);

    let bus = EventBus::new();
    let log = EventLog::attach(&bus, &[BridgeEvent::Initialized]);
    let messenger = Messenger::new(MessengerConfig::default(), transport.clone(), bus);
    messenger.attach_inbound(rx);

    assert!(messenger.wait_settled().await.is_connected());
    settle().await;
    assert_eq!(transport.ping_count(), 4);
    assert_eq!(log.payloads(BridgeEvent::Initialized), vec![json!(true)]);
    assert_eq!(log.count(BridgeEvent::Initialized), 1);
}

#[tokio::test(start_paused = true)]
async fn test_overlapping_status_requests_share_one_fetch() {
    let host = page_host();
    let (preview, transport, _) = connect(&host);
    assert!(preview.is_connected().await);

    let (first, second) = tokio::join!(
        preview.element_status("7.EN", false),
        preview.element_status("7.EN", false)
    );
    let (first, second) = (first.unwrap(), second.unwrap());
    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(first.name.as_deref(), Some("section 7"));
    assert_eq!(transport.action_params(Action::Status).len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_unknown_correlation_id_changes_nothing() {
    let host = page_host();
    let (preview, transport, _) = connect(&host);
    assert!(preview.is_connected().await);
    let messenger = preview.messenger().clone();

    transport.inject(callback_for(&json!({ "_callbackId": "Z999" }), json!("stray")));
    settle().await;
    assert_eq!(messenger.pending_count(), 0);

    let status = preview.element_status("3.EN", false).await.unwrap();
    assert_eq!(status.name.as_deref(), Some("section 3"));
    assert_eq!(messenger.pending_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_custom_preview_id_resolves_locally() {
    let host = page_host();
    let (preview, transport, _) = connect(&host);
    assert!(preview.is_connected().await);

    let status = preview
        .element_status("custom:create-page:path:name", false)
        .await
        .unwrap();
    assert_eq!(status.custom.as_deref(), Some("create-page:path:name"));
    assert_eq!(status.parts, vec!["create-page", "path", "name"]);
    assert_eq!(status.state, StatusState::Custom);
    assert!(transport.action_params(Action::Status).is_empty());
}

// ============================================================================
// Decoration flows
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_annotated_nodes_follow_the_document() {
    let host = page_host();
    let (preview, _, _) = connect(&host);
    let document = preview.document().clone();
    let existing = annotated(&document, document.body(), "2.EN");

    assert!(preview.is_connected().await);
    settle().await;
    let decoration = preview.decoration().clone();
    assert!(decoration.is_decorated(existing));

    let added = annotated(&document, document.body(), "3.EN");
    decoration.flush();
    assert!(decoration.is_decorated(added));

    document.remove_attribute(added, ATTR);
    decoration.flush();
    assert!(!decoration.is_decorated(added));

    document.set_attribute(added, ATTR, "4.EN");
    decoration.flush();
    assert!(decoration.is_decorated(added));
    assert_eq!(decoration.decoration_count(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_button_click_updates_content() {
    let host = page_host();
    let (preview, _, window) = connect(&host);
    preview.register_button(Arc::new(UpdateButton), None);
    let changes: Arc<Mutex<Vec<ContentChange>>> = Arc::default();
    let sink = changes.clone();
    preview.on_content_change(move |change| {
        sink.lock().push(change);
        async { Some(json!(true)) }
    });

    assert!(preview.is_connected().await);
    settle().await;
    let document = preview.document().clone();
    let section = annotated(&document, document.body(), "2.EN");
    preview.decoration().flush();

    document.dispatch(EventTarget::Node(section), DomEvent::MouseEnter);
    settle().await;
    assert!(preview.decoration().is_visible(section));

    let bar = preview.decoration().button_bar(section).unwrap();
    let update = document
        .children(bar)
        .into_iter()
        .find(|button| document.attribute(*button, "title").as_deref() == Some("Update"))
        .unwrap();
    document.dispatch(EventTarget::Node(update), DomEvent::Click);
    settle().await;

    assert!(!preview.decoration().is_visible(section));
    assert_eq!(
        *changes.lock(),
        vec![ContentChange {
            node: Some(section),
            preview_id: "2.EN".to_string(),
            content: json!("<p>updated</p>"),
        }]
    );
    assert_eq!(window.reloads(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_pushed_status_reaches_decorations() {
    let host = page_host();
    let (preview, _, _) = connect(&host);
    assert!(preview.is_connected().await);
    settle().await;
    let document = preview.document().clone();
    let section = annotated(&document, document.body(), "2.EN");
    preview.decoration().flush();

    let node = preview.preview_element_node(PreviewTarget::Node(section)).await.unwrap();
    assert_eq!(node.status.name.as_deref(), Some("section 2"));

    let mut renamed = node.status.clone();
    renamed.name = Some("renamed".to_string());
    preview
        .bus()
        .emit(BridgeEvent::StatusChange, vec![status_change("2.EN", &renamed)])
        .await
        .unwrap();
    assert!(preview.decoration().is_decorated(section));
}

// ============================================================================
// Drag and drop
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_host_drag_reorders_sections() {
    let host = page_host();
    let (preview, transport, window) = connect(&host);
    assert!(preview.is_connected().await);
    settle().await;

    let document = preview.document().clone();
    let page = annotated(&document, document.body(), "1.EN");
    let sections: Vec<NodeId> = (0..3)
        .map(|i| {
            let section = annotated(&document, page, &format!("{}.EN", 10 + i));
            document.set_bounding_rect(section, Rect::new(100.0 * i as f64, 0.0, 400.0, 50.0));
            section
        })
        .collect();

    let bus = preview.bus().clone();
    let log = EventLog::attach(&bus, &[BridgeEvent::DropElement]);
    bus.emit(
        BridgeEvent::DragElement,
        vec![json!({ "phase": "start", "previewId": "10.EN" })],
    )
    .await
    .unwrap();
    assert!(preview.drag_and_drop().is_dragging());

    bus.emit(BridgeEvent::DragElement, vec![json!({ "phase": "drop", "x": 300.0, "y": 220.0 })])
        .await
        .unwrap();
    assert_eq!(log.count(BridgeEvent::DropElement), 1);

    let transfer = &transport.action_params(Action::TransferSection)[0];
    assert_eq!(transfer["sectionId"], 10);
    assert_eq!(transfer["targetId"], 12);
    assert_eq!(transfer["mode"], "COPY");
    assert_eq!(transfer["position"], "AFTER");
    assert_eq!(document.children(page), sections);
    assert_eq!(window.reloads(), 1);

    bus.emit(BridgeEvent::DragElement, vec![json!({ "phase": "end" })])
        .await
        .unwrap();
    assert!(!preview.drag_and_drop().is_dragging());
}

#[tokio::test(start_paused = true)]
async fn test_actions_fail_fast_when_top_level() {
    let (transport, rx) = MemoryTransport::new(false);
    let messenger = Messenger::new(MessengerConfig::default(), transport.clone(), EventBus::new());
    messenger.attach_inbound(rx);
    let actions = Actions::new(messenger);

    assert!(actions.element_status("1.EN", false).await.is_err());
    assert!(transport.sent().is_empty());
}
