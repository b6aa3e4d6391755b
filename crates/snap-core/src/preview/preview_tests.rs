use super::*;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;
use tokio::time::sleep;

use snap_protocols::consts::{LEGACY_UPDATE_ATTRIBUTE, VERSION};
use snap_protocols::{Action, ChangeStreamError};

use crate::actions::{element_change, TransferMode, TransferPosition};
use crate::testing::{connected, EventLog, MemoryTransport, RecordingWindow, ScriptedHost};

const ATTR: &str = "data-preview-id";

struct Fixture {
    preview: Preview,
    transport: Arc<MemoryTransport>,
    window: Arc<RecordingWindow>,
    log: EventLog,
}

fn host() -> ScriptedHost {
    let host = ScriptedHost::new();
    host.on_action(Action::Status, |params| match params["previewId"].as_str() {
        Some("5.EN") => json!({ "id": 5, "name": "start", "elementType": "Page", "language": "EN" }),
        Some("6.EN") => json!({ "id": 6, "name": "news", "elementType": "PageRef" }),
        Some("8.EN") => json!({ "id": 8, "name": "logo", "elementType": "Media" }),
        Some("10.EN") => json!({ "id": 10, "name": "home", "elementType": "Page" }),
        Some(id) => {
            let number: u64 = id.trim_end_matches(".EN").parse().unwrap_or(0);
            json!({ "id": number, "name": format!("section {}", number), "elementType": "Section" })
        }
        None => Value::Null,
    });
    host.on_action(Action::Render, |_| json!("<div>rendered</div>"));
    host.on_action(Action::ProjectInfo, |_| json!({ "previewUrl": "https://site.example/start" }));
    host.on_action(Action::TransferSection, |_| json!(true));
    host
}

async fn setup(host: &ScriptedHost) -> Fixture {
    let bus = EventBus::new();
    let log = EventLog::attach(&bus, &[BridgeEvent::RerenderView]);
    let (messenger, transport) = connected(host, bus).await;
    let window = RecordingWindow::new();
    let preview = Preview::new(messenger, Document::new(), window.clone(), DecorationConfig::default());
    Fixture {
        preview,
        transport,
        window,
        log,
    }
}

fn annotated(document: &Document, parent: NodeId, id: &str) -> NodeId {
    let node = document.build("div", &[], &[(ATTR, id)]);
    document.append_child(parent, node);
    node
}

async fn change(preview: &Preview, preview_id: &str, content: Value) {
    preview
        .bus()
        .emit(BridgeEvent::ElementChange, vec![element_change(preview_id, content)])
        .await
        .unwrap();
}

fn record_changes(preview: &Preview, capture: bool) -> Arc<Mutex<Vec<ContentChange>>> {
    let changes = Arc::new(Mutex::new(Vec::new()));
    let sink = changes.clone();
    preview.on_content_change(move |change| {
        sink.lock().push(change);
        async move { capture.then(|| json!(true)) }
    });
    changes
}

#[derive(Default)]
struct FakeWaiter {
    delay: Duration,
    fail: bool,
    calls: Mutex<Vec<String>>,
}

impl FakeWaiter {
    fn delayed(delay: Duration, fail: bool) -> Arc<Self> {
        Arc::new(Self {
            delay,
            fail,
            calls: Mutex::new(Vec::new()),
        })
    }

    fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }

    async fn wait(&self, call: String) -> Result<(), ChangeStreamError> {
        self.calls.lock().push(call);
        sleep(self.delay).await;
        if self.fail {
            Err(ChangeStreamError::Timeout { timeout_ms: 5000 })
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl DocumentWaiter for FakeWaiter {
    async fn wait_for_document_update(&self, preview_id: &str, language: &str) -> Result<(), ChangeStreamError> {
        self.wait(format!("update:{}:{}", preview_id, language)).await
    }

    async fn wait_for_document_insert(&self, preview_id: &str, language: &str) -> Result<(), ChangeStreamError> {
        self.wait(format!("insert:{}:{}", preview_id, language)).await
    }
}

// ============================================================================
// Content changes
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_captured_change_skips_rerender() {
    let fixture = setup(&host()).await;
    let document = fixture.preview.document().clone();
    let node = annotated(&document, document.body(), "1.EN");
    let changes = record_changes(&fixture.preview, true);

    change(&fixture.preview, "1.EN", json!("<p>new</p>")).await;

    assert_eq!(
        *changes.lock(),
        vec![ContentChange {
            node: Some(node),
            preview_id: "1.EN".to_string(),
            content: json!("<p>new</p>"),
        }]
    );
    assert_eq!(fixture.log.count(BridgeEvent::RerenderView), 0);
    assert_eq!(fixture.window.reloads(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_uncaptured_change_reloads_window() {
    let fixture = setup(&host()).await;
    let document = fixture.preview.document().clone();
    annotated(&document, document.body(), "1.EN");

    change(&fixture.preview, "1.EN", json!("<p>new</p>")).await;

    assert_eq!(fixture.log.count(BridgeEvent::RerenderView), 1);
    assert_eq!(fixture.window.reloads(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_change_offered_once_per_node() {
    let fixture = setup(&host()).await;
    let document = fixture.preview.document().clone();
    let first = annotated(&document, document.body(), "1.EN");
    let second = annotated(&document, document.body(), "1.EN");
    let changes = record_changes(&fixture.preview, false);

    change(&fixture.preview, "1.EN", json!("x")).await;
    change(&fixture.preview, "9.EN", json!("y")).await;

    let nodes: Vec<Option<NodeId>> = changes.lock().iter().map(|change| change.node).collect();
    assert_eq!(nodes, vec![Some(first), Some(second), None]);
    assert_eq!(fixture.log.count(BridgeEvent::RerenderView), 2);
}

#[tokio::test(start_paused = true)]
async fn test_missing_content_is_rendered() {
    let fixture = setup(&host()).await;
    let changes = record_changes(&fixture.preview, true);

    fixture
        .preview
        .bus()
        .emit(BridgeEvent::ElementChange, vec![json!({ "previewId": "1.EN" })])
        .await
        .unwrap();

    assert_eq!(fixture.transport.action_params(Action::Render)[0]["previewId"], "1.EN");
    assert_eq!(changes.lock()[0].content, json!("<div>rendered</div>"));
}

#[tokio::test(start_paused = true)]
async fn test_deleted_node_removed() {
    let fixture = setup(&host()).await;
    let document = fixture.preview.document().clone();
    let list = document.create_element("ul");
    document.append_child(document.body(), list);
    let first = annotated(&document, list, "2.EN");
    let second = annotated(&document, list, "3.EN");

    change(&fixture.preview, "2.EN", Value::Null).await;
    assert!(!document.is_connected(first));
    assert_eq!(document.children(list), vec![second]);
    assert_eq!(fixture.log.count(BridgeEvent::RerenderView), 0);

    change(&fixture.preview, "3.EN", Value::Null).await;
    assert!(document.children(list).is_empty());
    assert_eq!(fixture.log.count(BridgeEvent::RerenderView), 1);
}

#[tokio::test(start_paused = true)]
async fn test_deleting_preview_element_navigates() {
    let fixture = setup(&host()).await;
    let document = fixture.preview.document().clone();
    let page = annotated(&document, document.body(), "5.EN");
    fixture.preview.set_preview_element(Some("5.EN")).await.unwrap();

    change(&fixture.preview, "5.EN", Value::Null).await;

    assert_eq!(fixture.window.navigations(), vec!["https://site.example/start"]);
    assert!(document.is_connected(page));
    assert_eq!(fixture.log.count(BridgeEvent::RerenderView), 0);
}

#[tokio::test(start_paused = true)]
async fn test_named_update_handler() {
    let fixture = setup(&host()).await;
    let document = fixture.preview.document().clone();
    let teaser = annotated(&document, document.body(), "1.EN");
    document.set_attribute(teaser, LEGACY_UPDATE_ATTRIBUTE, "refreshTeaser");
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = calls.clone();
    fixture.preview.update_handlers().register("refreshTeaser", move |change| {
        counter.fetch_add(1, Ordering::SeqCst);
        async move { Some(change.content) }
    });

    change(&fixture.preview, "1.EN", Value::Null).await;
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert!(document.is_connected(teaser));
    assert_eq!(fixture.log.count(BridgeEvent::RerenderView), 0);
}

#[tokio::test(start_paused = true)]
async fn test_unknown_update_handler_rerenders() {
    let fixture = setup(&host()).await;
    let document = fixture.preview.document().clone();
    let teaser = annotated(&document, document.body(), "1.EN");
    document.set_attribute(teaser, LEGACY_UPDATE_ATTRIBUTE, "missing");

    change(&fixture.preview, "1.EN", json!("<p/>")).await;
    assert_eq!(fixture.window.reloads(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_markup_content_rerenders_without_splicing() {
    let fixture = setup(&host()).await;
    let document = fixture.preview.document().clone();
    let teaser = annotated(&document, document.body(), "3.EN");
    document.set_text(teaser, "old");

    change(&fixture.preview, "3.EN", json!("<div data-preview-id=\"3.EN\">new</div>")).await;

    assert_eq!(fixture.log.count(BridgeEvent::RerenderView), 1);
    assert_eq!(fixture.window.reloads(), 1);
    assert!(document.is_connected(teaser));
    assert_eq!(document.select_all(ATTR, Some("3.EN")), vec![teaser]);
    assert_eq!(document.text(teaser), "old");
}

#[tokio::test(start_paused = true)]
async fn test_primary_listener_suppresses_fallback() {
    let fixture = setup(&host()).await;
    let document = fixture.preview.document().clone();
    annotated(&document, document.body(), "2.EN");
    let changes = record_changes(&fixture.preview, false);

    change(&fixture.preview, "2.EN", Value::Null).await;

    assert_eq!(changes.lock().len(), 1);
    assert_eq!(document.select_all(ATTR, Some("2.EN")).len(), 1);
}

// ============================================================================
// Other listeners
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_rerender_listener_replaces_reload() {
    let fixture = setup(&host()).await;
    let rerenders = Arc::new(AtomicUsize::new(0));
    let counter = rerenders.clone();
    fixture.preview.on_rerender_view(move || {
        counter.fetch_add(1, Ordering::SeqCst);
        async {}
    });

    fixture.preview.trigger_rerender_view().await;
    assert_eq!(rerenders.load(Ordering::SeqCst), 1);
    assert_eq!(fixture.window.reloads(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_navigation_and_preview_requests() {
    let fixture = setup(&host()).await;
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    fixture.preview.on_navigation_change(move |preview_id| {
        sink.lock().push(format!("navigation:{}", preview_id.unwrap_or_default()));
        async {}
    });
    let sink = seen.clone();
    fixture.preview.on_request_preview_element(move |preview_id| {
        sink.lock().push(format!("request:{}", preview_id));
        async {}
    });

    let bus = fixture.preview.bus().clone();
    bus.emit(BridgeEvent::NavigationChange, vec![json!("3.EN")]).await.unwrap();
    bus.emit(BridgeEvent::NavigationChange, vec![]).await.unwrap();
    bus.emit(BridgeEvent::PreviewRequest, vec![json!("6.EN")]).await.unwrap();

    assert_eq!(*seen.lock(), vec!["navigation:3.EN", "navigation:", "request:6.EN"]);
}

#[tokio::test(start_paused = true)]
async fn test_mpp_changes_routed_by_type() {
    let fixture = setup(&host()).await;
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    fixture.preview.on_mpp_change(ListenerKind::MppParameter, move |result| {
        sink.lock().push(result);
        async {}
    });

    let bus = fixture.preview.bus().clone();
    bus.emit(
        BridgeEvent::MppChange,
        vec![json!({ "type": "onMppParameterChange", "result": { "country": "de" } })],
    )
    .await
    .unwrap();
    bus.emit(
        BridgeEvent::MppChange,
        vec![json!({ "type": "onMppTimeParameterChange", "result": 0 })],
    )
    .await
    .unwrap();

    assert_eq!(*seen.lock(), vec![json!({ "country": "de" })]);
}

// ============================================================================
// CaaS mode
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_caas_rerender_waits_for_update() {
    let fixture = setup(&host()).await;
    let waiter = FakeWaiter::delayed(Duration::from_millis(100), false);
    fixture.preview.enable_caas_mode(waiter.clone());
    fixture.preview.set_preview_element(Some("5.EN")).await.unwrap();
    let rerenders = Arc::new(AtomicUsize::new(0));
    let counter = rerenders.clone();
    fixture.preview.on_rerender_view(move || {
        counter.fetch_add(1, Ordering::SeqCst);
        async {}
    });

    fixture.preview.trigger_rerender_view().await;
    sleep(Duration::from_millis(50)).await;
    assert_eq!(rerenders.load(Ordering::SeqCst), 0);

    sleep(Duration::from_millis(100)).await;
    assert_eq!(rerenders.load(Ordering::SeqCst), 1);
    assert_eq!(waiter.calls(), vec!["update:5.EN:EN"]);
}

#[tokio::test(start_paused = true)]
async fn test_caas_failed_wait_still_rerenders() {
    let fixture = setup(&host()).await;
    let waiter = FakeWaiter::delayed(Duration::from_millis(10), true);
    fixture.preview.enable_caas_mode(waiter);
    fixture.preview.set_preview_element(Some("5.EN")).await.unwrap();

    fixture.preview.trigger_rerender_view().await;
    assert_eq!(fixture.window.reloads(), 0);
    sleep(Duration::from_millis(20)).await;
    assert_eq!(fixture.window.reloads(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_caas_rerender_without_preview_element_is_immediate() {
    let fixture = setup(&host()).await;
    let waiter = FakeWaiter::delayed(Duration::from_millis(100), false);
    fixture.preview.enable_caas_mode(waiter.clone());

    fixture.preview.trigger_rerender_view().await;
    assert_eq!(fixture.window.reloads(), 1);
    assert!(waiter.calls().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_caas_preview_request_waits_for_page_ref_insert() {
    let fixture = setup(&host()).await;
    let waiter = FakeWaiter::delayed(Duration::from_millis(100), false);
    fixture.preview.enable_caas_mode(waiter.clone());
    let requests = Arc::new(Mutex::new(Vec::new()));
    let sink = requests.clone();
    fixture.preview.on_request_preview_element(move |preview_id| {
        sink.lock().push(preview_id);
        async {}
    });

    let bus = fixture.preview.bus().clone();
    bus.emit(BridgeEvent::PreviewRequest, vec![json!("6.EN")]).await.unwrap();
    bus.emit(BridgeEvent::PreviewRequest, vec![json!("7.EN")]).await.unwrap();
    assert_eq!(*requests.lock(), vec!["7.EN"]);

    sleep(Duration::from_millis(150)).await;
    assert_eq!(*requests.lock(), vec!["7.EN", "6.EN"]);
    assert_eq!(waiter.calls(), vec!["insert:6.EN:EN"]);
}

// ============================================================================
// Operations
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_move_section_checks_types() {
    let fixture = setup(&host()).await;
    let options = TransferOptions {
        position: TransferPosition::Before,
        mode: TransferMode::Copy,
        skip_rerender: true,
    };

    assert!(!fixture.preview.move_section("10.EN", "1.EN", options).await.unwrap());
    assert!(!fixture.preview.move_section("1.EN", "8.EN", options).await.unwrap());
    assert!(fixture.transport.action_params(Action::TransferSection).is_empty());

    assert!(fixture.preview.move_section("1.EN", "10.EN", options).await.unwrap());
    let transfer = &fixture.transport.action_params(Action::TransferSection)[0];
    assert_eq!(transfer["sectionId"], 1);
    assert_eq!(transfer["targetId"], 10);
    assert_eq!(transfer["position"], "BEFORE");
    assert_eq!(transfer["mode"], "COPY");
    assert_eq!(fixture.log.count(BridgeEvent::RerenderView), 0);
}

#[tokio::test(start_paused = true)]
async fn test_button_registration() {
    struct Named(&'static str);

    #[async_trait]
    impl Button for Named {
        fn name(&self) -> &str {
            self.0
        }
    }

    let fixture = setup(&host()).await;
    fixture.preview.register_button(Arc::new(Named("edit")), None);
    fixture.preview.register_button(Arc::new(Named("first")), Some(0));
    assert_eq!(
        fixture.preview.decoration().buttons().names(),
        vec!["first", "nested-component-move", "move", "edit"]
    );

    assert!(fixture.preview.override_default_button("edit", Some(Arc::new(Named("custom-edit")))));
    assert!(fixture.preview.override_default_button("move", None));
    assert!(!fixture.preview.override_default_button("missing", None));
    assert_eq!(
        fixture.preview.decoration().buttons().names(),
        vec!["first", "nested-component-move", "custom-edit"]
    );
}

// ============================================================================
// Connection
// ============================================================================

fn record_init(preview: &Preview) -> Arc<Mutex<Vec<(bool, bool)>>> {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    preview.on_init(move |connected, is_legacy_cc| sink.lock().push((connected, is_legacy_cc)));
    seen
}

#[tokio::test(start_paused = true)]
async fn test_on_init_after_settled_runs_immediately() {
    let fixture = setup(&host()).await;
    let seen = record_init(&fixture.preview);
    assert_eq!(*seen.lock(), vec![(true, false)]);
    assert!(fixture.preview.is_connected().await);
    assert!(fixture.preview.decoration().container().is_some());
}

#[tokio::test(start_paused = true)]
async fn test_connect_wires_before_handshake() {
    let (transport, rx) = MemoryTransport::new(true);
    let host = host();
    host.receipt(json!({ "version": VERSION, "isLegacyCC": true }));
    host.install(&transport);

    let preview = Preview::connect(&Config::default(), transport, rx, Document::new(), RecordingWindow::new());
    let seen = record_init(&preview);
    assert!(seen.lock().is_empty());

    assert!(preview.is_connected().await);
    sleep(Duration::from_millis(1)).await;
    assert_eq!(*seen.lock(), vec![(true, true)]);
    assert!(preview.is_legacy_cc());
    assert!(preview.decoration().container().is_some());
}

#[tokio::test(start_paused = true)]
async fn test_top_level_page_stays_disconnected() {
    let (transport, rx) = MemoryTransport::new(false);
    let preview = Preview::connect(&Config::default(), transport.clone(), rx, Document::new(), RecordingWindow::new());
    let seen = record_init(&preview);

    assert!(!preview.is_connected().await);
    sleep(Duration::from_millis(1)).await;
    assert_eq!(*seen.lock(), vec![(false, false)]);
    assert!(preview.decoration().container().is_none());
    assert_eq!(transport.ping_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_is_connected_gives_up_after_grace_period() {
    let (transport, rx) = MemoryTransport::new(true);
    let host = host();
    host.ignore_pings(100);
    host.install(&transport);

    let preview = Preview::connect(&Config::default(), transport, rx, Document::new(), RecordingWindow::new());
    let started = tokio::time::Instant::now();
    assert!(!preview.is_connected().await);
    assert!(started.elapsed() >= Duration::from_millis(800));
}
