use super::*;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};
use snap_protocols::{Action, ButtonError};

use crate::actions::status_change;
use crate::dom::Rect;
use crate::events::EventBus;
use crate::testing::{callback_for, connected, MemoryTransport, ScriptedHost};

const ATTR: &str = "data-preview-id";

type Log = Arc<Mutex<Vec<String>>>;

#[derive(Default)]
struct StubButton {
    name: &'static str,
    hidden: bool,
    broken_visibility: bool,
    enabled: bool,
    label: Option<&'static str>,
    component_path: bool,
    inedit: bool,
    failing: bool,
    items: Vec<ButtonItem>,
    log: Log,
}

#[async_trait]
impl Button for StubButton {
    fn name(&self) -> &str {
        self.name
    }

    fn supports_component_path(&self) -> bool {
        self.component_path
    }

    fn supports_inedit(&self) -> bool {
        self.inedit
    }

    async fn is_visible(&self, scope: &ButtonScope) -> Result<bool, ButtonError> {
        let name = scope.status.name.clone().unwrap_or_default();
        self.log.lock().push(format!("visible:{}", name));
        if self.broken_visibility {
            return Err(ButtonError::new(self.name, "isVisible", "boom"));
        }
        Ok(!self.hidden)
    }

    async fn is_enabled(&self, _scope: &ButtonScope) -> Result<bool, ButtonError> {
        Ok(self.enabled)
    }

    async fn label(&self, _scope: &ButtonScope) -> Option<String> {
        self.label.map(str::to_string)
    }

    async fn items(&self, _scope: &ButtonScope) -> Vec<ButtonItem> {
        self.items.clone()
    }

    async fn before_execute(&self, _scope: &ButtonScope, _item: Option<&ButtonItem>) {
        self.log.lock().push("before".to_string());
    }

    async fn execute(&self, _scope: &ButtonScope, item: Option<&ButtonItem>) -> Result<Value, ButtonError> {
        let label = item.map_or("-", |item| item.label.as_str());
        self.log.lock().push(format!("execute:{}", label));
        if self.failing {
            return Err(ButtonError::new(self.name, "execute", "refused"));
        }
        Ok(json!("done"))
    }

    async fn after_execute(
        &self,
        _scope: &ButtonScope,
        _item: Option<&ButtonItem>,
        result: Option<&Value>,
        error: Option<&ButtonError>,
    ) {
        self.log
            .lock()
            .push(format!("after:{}:{}", result.is_some(), error.is_some()));
    }
}

fn registry(buttons: Vec<StubButton>) -> ButtonRegistry {
    let registry = ButtonRegistry::new();
    for button in buttons {
        registry.register(Arc::new(button), None);
    }
    registry
}

async fn setup(host: &ScriptedHost, buttons: ButtonRegistry) -> (DecorationController, Document, Arc<MemoryTransport>) {
    let (messenger, transport) = connected(host, EventBus::new()).await;
    let document = Document::new();
    let controller = DecorationController::new(
        document.clone(),
        Actions::new(messenger),
        buttons,
        DecorationConfig::default(),
    );
    (controller, document, transport)
}

fn annotated(document: &Document, parent: NodeId, id: &str) -> NodeId {
    let node = document.build("div", &[], &[(ATTR, id)]);
    document.append_child(parent, node);
    node
}

fn home_host() -> ScriptedHost {
    let host = ScriptedHost::new();
    host.on_action(Action::Status, |_| json!({ "id": 1, "name": "home", "elementType": "Page" }));
    host
}

async fn settle() {
    tokio::time::sleep(Duration::from_millis(1)).await;
}

#[tokio::test(start_paused = true)]
async fn test_start_decorates_existing_and_new_nodes() {
    let host = home_host();
    let (controller, document, _) = setup(&host, ButtonRegistry::new()).await;
    let existing = annotated(&document, document.body(), "1.EN");

    controller.start();
    controller.start();
    let container = controller.container().unwrap();
    assert_eq!(document.children(document.body()), vec![existing, container]);
    assert!(document.has_class(container, CONTAINER_CLASS));
    assert!(controller.is_decorated(existing));

    let added = annotated(&document, document.body(), "2.EN");
    controller.flush();
    assert!(controller.is_decorated(added));
    assert_eq!(document.children(container).len(), 2);

    let borders = controller.borders(added).unwrap();
    document.remove(added);
    controller.flush();
    assert!(!controller.is_decorated(added));
    assert!(!document.is_connected(borders));
    assert_eq!(controller.decoration_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_initialized_event_starts_decoration() {
    let host = home_host();
    let (controller, document, _) = setup(&host, ButtonRegistry::new()).await;
    let node = annotated(&document, document.body(), "1.EN");

    controller
        .actions()
        .bus()
        .emit(BridgeEvent::Initialized, vec![json!(true), json!(false)])
        .await
        .unwrap();
    assert!(controller.is_decorated(node));
}

#[tokio::test(start_paused = true)]
async fn test_show_renders_visible_buttons_in_order() {
    let host = home_host();
    let first = StubButton {
        name: "edit",
        enabled: true,
        label: Some("Edit"),
        ..Default::default()
    };
    let hidden = StubButton {
        name: "delete",
        hidden: true,
        ..Default::default()
    };
    let broken = StubButton {
        name: "broken",
        broken_visibility: true,
        ..Default::default()
    };
    let last = StubButton {
        name: "info",
        ..Default::default()
    };
    let (controller, document, _) = setup(&host, registry(vec![first, hidden, broken, last])).await;
    let node = annotated(&document, document.body(), "1.EN");
    controller.start();

    controller.show(node).await;
    settle().await;

    assert!(controller.is_visible(node));
    let rendered = document.children(controller.button_bar(node).unwrap());
    assert_eq!(rendered.len(), 2);

    let edit = rendered[0];
    assert!(document.has_class(edit, BUTTON_CLASS));
    assert!(document.has_class(edit, DEFAULT_ICON_CLASS));
    assert!(!document.has_attribute(edit, "disabled"));
    assert_eq!(document.attribute(edit, "title").as_deref(), Some("Edit"));
    assert_eq!(document.attribute(edit, "tabindex").as_deref(), Some("0"));

    let info = rendered[1];
    assert!(document.has_attribute(info, "disabled"));
    assert_eq!(document.attribute(info, "title"), None);
}

#[tokio::test(start_paused = true)]
async fn test_no_visible_button_hides_overlay() {
    let host = home_host();
    let hidden = StubButton {
        hidden: true,
        ..Default::default()
    };
    let (controller, document, _) = setup(&host, registry(vec![hidden])).await;
    let node = annotated(&document, document.body(), "1.EN");
    controller.start();

    controller.show(node).await;
    assert!(!controller.is_visible(node));
    let borders = controller.borders(node).unwrap();
    assert_eq!(document.style(borders), "transition: all 0s");
}

#[tokio::test(start_paused = true)]
async fn test_hover_lingers_before_hiding() {
    let host = home_host();
    let (controller, document, _) = setup(&host, registry(vec![StubButton::default()])).await;
    let node = annotated(&document, document.body(), "1.EN");
    controller.start();
    let bar = controller.button_bar(node).unwrap();

    document.dispatch(EventTarget::Node(node), DomEvent::MouseEnter);
    settle().await;
    assert!(controller.is_visible(node));

    document.dispatch(EventTarget::Node(node), DomEvent::MouseLeave);
    tokio::time::sleep(Duration::from_millis(5)).await;
    assert!(controller.is_visible(node));

    document.dispatch(EventTarget::Node(bar), DomEvent::MouseEnter);
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert!(controller.is_visible(node));

    document.dispatch(EventTarget::Node(bar), DomEvent::FocusOut);
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert!(!controller.is_visible(node));
}

#[tokio::test(start_paused = true)]
async fn test_overlapping_shows_render_each_button_once() {
    let host = ScriptedHost::new();
    host.silence(Action::Status);
    let (controller, document, transport) = setup(&host, registry(vec![StubButton::default()])).await;
    let node = annotated(&document, document.body(), "1.EN");
    controller.start();

    let first = controller.clone();
    tokio::spawn(async move { first.show(node).await });
    settle().await;
    controller.hide(node);
    let second = controller.clone();
    tokio::spawn(async move { second.show(node).await });
    settle().await;

    let request = transport
        .sent()
        .into_iter()
        .find(|m| m["params"]["action"] == json!(Action::Status.as_str()))
        .unwrap();
    transport.inject(callback_for(
        &request,
        json!({ "id": 1, "name": "home", "elementType": "Page" }),
    ));
    settle().await;

    assert!(controller.is_visible(node));
    assert_eq!(document.children(controller.button_bar(node).unwrap()).len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_overlay_follows_geometry_while_visible() {
    let host = home_host();
    let (controller, document, _) = setup(&host, registry(vec![StubButton::default()])).await;
    let node = annotated(&document, document.body(), "1.EN");
    document.set_bounding_rect(node, Rect::new(100.0, 20.0, 300.0, 10.0));
    controller.start();
    let borders = controller.borders(node).unwrap();

    controller.show(node).await;
    assert_eq!(
        document.style(borders),
        "opacity:1;top:100px;left:20px;width:300px;height:27px"
    );

    document.scroll_by(40.0);
    assert_eq!(
        document.style(borders),
        "opacity:1;top:60px;left:20px;width:300px;height:27px"
    );

    controller.hide(node);
    document.scroll_by(40.0);
    assert_eq!(document.style(borders), "transition: all 0s");
    assert_eq!(document.listener_count(EventTarget::Window, DomEvent::Scroll), 0);
}

#[tokio::test(start_paused = true)]
async fn test_click_runs_hooks_in_order() {
    let host = home_host();
    let log = Log::default();
    let button = StubButton {
        name: "edit",
        log: log.clone(),
        ..Default::default()
    };
    let (controller, document, _) = setup(&host, registry(vec![button])).await;
    let node = annotated(&document, document.body(), "1.EN");
    controller.start();

    controller.show(node).await;
    let rendered = document.children(controller.button_bar(node).unwrap())[0];
    document.dispatch(EventTarget::Node(rendered), DomEvent::Click);
    settle().await;

    assert_eq!(
        *log.lock(),
        vec!["visible:home", "before", "execute:-", "after:true:false"]
    );
    assert!(!controller.is_visible(node));
}

#[tokio::test(start_paused = true)]
async fn test_failed_execute_reaches_after_execute() {
    let host = home_host();
    let log = Log::default();
    let button = StubButton {
        failing: true,
        items: vec![ButtonItem::new("Original", json!("ORIGINAL"))],
        log: log.clone(),
        ..Default::default()
    };
    let (controller, document, _) = setup(&host, registry(vec![button])).await;
    let node = annotated(&document, document.body(), "1.EN");
    controller.start();

    controller.show(node).await;
    settle().await;
    let rendered = document.children(controller.button_bar(node).unwrap())[0];
    let list = document.children(rendered)[0];
    let entry = document.children(list)[0];
    assert_eq!(document.text(entry), "Original");

    document.dispatch(EventTarget::Node(entry), DomEvent::Click);
    settle().await;
    assert_eq!(
        log.lock()[1..],
        ["before", "execute:Original", "after:false:true"]
    );
}

#[tokio::test(start_paused = true)]
async fn test_nested_component_needs_component_path_support() {
    let host = home_host();
    let plain = StubButton {
        name: "plain",
        ..Default::default()
    };
    let log = Log::default();
    let nested = StubButton {
        name: "nested",
        component_path: true,
        log: log.clone(),
        ..Default::default()
    };
    let (controller, document, transport) = setup(&host, registry(vec![plain, nested])).await;
    let section = annotated(&document, document.body(), "4711.EN");
    let list = annotated(&document, section, "#st_items");
    controller.start();

    controller.show(list).await;
    let rendered = document.children(controller.button_bar(list).unwrap());
    assert_eq!(rendered.len(), 1);
    assert_eq!(log.lock().len(), 1);

    let lookups = transport.action_params(Action::FieldComponentType);
    assert_eq!(lookups[0]["previewId"], "4711.EN");
    assert_eq!(lookups[0]["nestedComponentPath"], json!(["st_items"]));
}

#[tokio::test(start_paused = true)]
async fn test_inline_editable_component_offers_inedit_buttons() {
    let host = home_host();
    host.on_action(Action::FieldComponentType, |_| json!("FS_TEXT"));
    let path_only = StubButton {
        component_path: true,
        ..Default::default()
    };
    let inedit = StubButton {
        inedit: true,
        ..Default::default()
    };
    let (controller, document, _) = setup(&host, registry(vec![path_only, inedit])).await;
    let section = annotated(&document, document.body(), "4711.EN");
    let headline = annotated(&document, section, "#st_headline");
    controller.start();

    controller.show(headline).await;
    let bar = controller.button_bar(headline).unwrap();
    assert_eq!(document.children(bar).len(), 1);
    assert!(document.has_class(bar, INLINE_EDIT_CLASS));
}

#[tokio::test(start_paused = true)]
async fn test_status_change_rerenders_visible_decoration() {
    let host = home_host();
    let log = Log::default();
    let button = StubButton {
        log: log.clone(),
        ..Default::default()
    };
    let (controller, document, _) = setup(&host, registry(vec![button])).await;
    let node = annotated(&document, document.body(), "1.EN");
    controller.start();
    controller.show(node).await;

    let changed = ElementStatus {
        name: Some("renamed".to_string()),
        ..Default::default()
    };
    controller
        .actions()
        .bus()
        .emit(BridgeEvent::StatusChange, vec![status_change("1.EN", &changed)])
        .await
        .unwrap();
    settle().await;

    assert_eq!(*log.lock(), vec!["visible:home", "visible:renamed"]);
    assert!(controller.is_visible(node));
}

#[tokio::test(start_paused = true)]
async fn test_media_buttons_move_to_bottom() {
    let host = ScriptedHost::new();
    host.on_action(Action::Status, |_| json!({ "id": 3, "name": "logo", "elementType": "Media" }));
    let (controller, document, _) = setup(&host, ButtonRegistry::new()).await;
    let node = annotated(&document, document.body(), "3.EN");
    controller.start();
    settle().await;

    assert!(document.has_class(controller.button_bar(node).unwrap(), "bottom"));
}

#[tokio::test(start_paused = true)]
async fn test_preview_element_node_resolves_nested_parent() {
    let host = home_host();
    let (controller, document, _) = setup(&host, ButtonRegistry::new()).await;
    let section = annotated(&document, document.body(), "4711.EN");
    annotated(&document, section, "#st_items");

    let resolved = controller
        .preview_element_node(PreviewTarget::Id("#st_items".to_string()))
        .await
        .unwrap();
    assert_eq!(resolved.parent_preview_id.as_deref(), Some("4711.EN"));
    assert_eq!(resolved.component_path(), Some(&["st_items".to_string()][..]));
    assert_eq!(resolved.element_type(), Some("Page"));

    let all = controller.preview_element_nodes().await.unwrap();
    assert_eq!(all.len(), 2);

    let missing = controller
        .preview_element_node(PreviewTarget::Node(document.body()))
        .await
        .unwrap_err();
    assert_eq!(missing, ActionError::MissingPreviewId);
}

#[test]
fn test_override_default_button() {
    let registry = registry(vec![
        StubButton {
            name: "edit",
            ..Default::default()
        },
        StubButton {
            name: "delete",
            ..Default::default()
        },
    ]);
    let replacement: Arc<dyn Button> = Arc::new(StubButton {
        name: "edit-v2",
        ..Default::default()
    });
    assert!(registry.override_default_button("edit", Some(replacement)));
    assert!(!registry.override_default_button("missing", None));
    assert!(registry.override_default_button("delete", None));
    assert_eq!(registry.names(), vec!["edit-v2"]);

    registry.register(
        Arc::new(StubButton {
            name: "first",
            ..Default::default()
        }),
        Some(0),
    );
    assert_eq!(registry.names(), vec!["first", "edit-v2"]);
}
