//! In-memory doubles for the frame transport and the host.
//!
//! [`MemoryTransport`] records every posted frame and feeds replies back
//! through the inbound channel. [`ScriptedHost`] plugs into it and answers
//! pings and actions.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::{json, Map, Value};
use tokio::sync::mpsc;

use snap_config::MessengerConfig;
use snap_protocols::consts::{MODULE_ENDPOINT, POST_MESSAGE_NAMESPACE, VERSION};
use snap_protocols::{
    Action, BridgeEvent, FrameTransport, HostWindow, TransportError, WindowMessage,
};

use crate::events::EventBus;
use crate::messenger::Messenger;

/// Produces the reply to a posted message, if any.
pub type Responder = Arc<dyn Fn(&Value) -> Option<Value> + Send + Sync>;

/// Origin used for injected host messages.
pub const HOST_ORIGIN: &str = "https://host.example";

/// Recording transport.
pub struct MemoryTransport {
    embedded: bool,
    sent: Mutex<Vec<(Value, String)>>,
    inbound: mpsc::UnboundedSender<WindowMessage>,
    responder: Mutex<Option<Responder>>,
}

impl MemoryTransport {
    /// Create a transport and the inbound receiver to hand to the messenger.
    pub fn new(embedded: bool) -> (Arc<Self>, mpsc::UnboundedReceiver<WindowMessage>) {
        let (inbound, rx) = mpsc::unbounded_channel();
        let transport = Arc::new(Self {
            embedded,
            sent: Mutex::new(Vec::new()),
            inbound,
            responder: Mutex::new(None),
        });
        (transport, rx)
    }

    pub fn set_responder<F>(&self, responder: F)
    where
        F: Fn(&Value) -> Option<Value> + Send + Sync + 'static,
    {
        *self.responder.lock() = Some(Arc::new(responder));
    }

    /// Deliver a namespaced host message.
    pub fn inject(&self, message: Value) {
        let mut data = Map::new();
        data.insert(POST_MESSAGE_NAMESPACE.to_string(), message);
        self.inject_raw(Value::Object(data));
    }

    /// Deliver raw window data.
    pub fn inject_raw(&self, data: Value) {
        let _ = self.inbound.send(WindowMessage::new(HOST_ORIGIN, data));
    }

    /// Posted messages, namespace key stripped.
    pub fn sent(&self) -> Vec<Value> {
        self.sent
            .lock()
            .iter()
            .map(|(data, _)| data.get(POST_MESSAGE_NAMESPACE).cloned().unwrap_or(Value::Null))
            .collect()
    }

    /// Target origins of every posted message, in order.
    pub fn origins(&self) -> Vec<String> {
        self.sent.lock().iter().map(|(_, origin)| origin.clone()).collect()
    }

    pub fn ping_count(&self) -> usize {
        self.sent().iter().filter(|m| m.get("ping").is_some()).count()
    }

    /// Parameters of every posted `action` call.
    pub fn action_params(&self, action: Action) -> Vec<Value> {
        self.sent()
            .into_iter()
            .filter(|m| m["params"]["action"] == json!(action.as_str()))
            .map(|m| m["params"].clone())
            .collect()
    }

    /// Posted messages carrying the key `topic`.
    pub fn subjects(&self, topic: &str) -> Vec<Value> {
        self.sent()
            .into_iter()
            .filter_map(|m| m.get(topic).cloned())
            .collect()
    }
}

impl FrameTransport for MemoryTransport {
    fn post_message(&self, data: Value, target_origin: &str) -> Result<(), TransportError> {
        let inner = data.get(POST_MESSAGE_NAMESPACE).cloned().unwrap_or(Value::Null);
        self.sent.lock().push((data, target_origin.to_string()));

        let responder = self.responder.lock().clone();
        if let Some(reply) = responder.and_then(|respond| respond(&inner)) {
            self.inject(reply);
        }
        Ok(())
    }

    fn is_embedded(&self) -> bool {
        self.embedded
    }
}

/// `CALLBACK` answering `message`.
pub fn callback_for(message: &Value, response: Value) -> Value {
    json!({
        "_messageType": "CALLBACK",
        "_callbackId": message.get("_callbackId").cloned().unwrap_or(Value::Null),
        "_response": response,
    })
}

/// Host `EVENT` notification.
pub fn event(event_id: &str, payload: Value) -> Value {
    json!({ "_messageType": "EVENT", "_eventId": event_id, "_payload": payload })
}

type ActionHandler = Arc<dyn Fn(&Value) -> Value + Send + Sync>;

struct HostScript {
    ignore_pings: usize,
    pings_seen: usize,
    receipt: Value,
    actions: HashMap<&'static str, ActionHandler>,
    silent: HashSet<&'static str>,
}

/// Host that answers pings and actions from a script.
///
/// Unscripted calls that expect a result are answered with `null`.
#[derive(Clone)]
pub struct ScriptedHost {
    script: Arc<Mutex<HostScript>>,
}

impl Default for ScriptedHost {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptedHost {
    pub fn new() -> Self {
        Self {
            script: Arc::new(Mutex::new(HostScript {
                ignore_pings: 0,
                pings_seen: 0,
                receipt: json!({ "version": VERSION, "isLegacyCC": false }),
                actions: HashMap::new(),
                silent: HashSet::new(),
            })),
        }
    }

    /// Leave the first `count` pings unanswered.
    pub fn ignore_pings(&self, count: usize) -> &Self {
        self.script.lock().ignore_pings = count;
        self
    }

    /// Answer a ping with `receipt`.
    pub fn receipt(&self, receipt: Value) -> &Self {
        self.script.lock().receipt = receipt;
        self
    }

    /// Answer `action` with whatever `handler` returns for its params.
    pub fn on_action<F>(&self, action: Action, handler: F) -> &Self
    where
        F: Fn(&Value) -> Value + Send + Sync + 'static,
    {
        self.script.lock().actions.insert(action.as_str(), Arc::new(handler));
        self
    }

    /// Never answer `action`.
    pub fn silence(&self, action: Action) -> &Self {
        self.script.lock().silent.insert(action.as_str());
        self
    }

    pub fn pings_seen(&self) -> usize {
        self.script.lock().pings_seen
    }

    pub fn install(&self, transport: &MemoryTransport) {
        let host = self.clone();
        transport.set_responder(move |message| host.respond(message));
    }

    fn respond(&self, message: &Value) -> Option<Value> {
        let expects_result = message.get("_callbackId").is_some();

        if message.get("ping").is_some() {
            let mut script = self.script.lock();
            script.pings_seen += 1;
            if script.pings_seen <= script.ignore_pings {
                return None;
            }
            return Some(callback_for(message, script.receipt.clone()));
        }

        if !expects_result {
            return None;
        }

        if message["execute"] == json!(MODULE_ENDPOINT) {
            let params = &message["params"];
            let name = params["action"].as_str().unwrap_or_default();
            let handler = {
                let script = self.script.lock();
                if script.silent.contains(name) {
                    return None;
                }
                script.actions.get(name).cloned()
            };
            let response = handler.map_or(Value::Null, |handler| handler(params));
            return Some(callback_for(message, response));
        }

        Some(callback_for(message, Value::Null))
    }
}

/// Messenger connected to `host` over a fresh embedded [`MemoryTransport`],
/// handshake already settled.
pub async fn connected(host: &ScriptedHost, bus: EventBus) -> (Messenger, Arc<MemoryTransport>) {
    let (transport, rx) = MemoryTransport::new(true);
    host.install(&transport);
    let messenger = Messenger::new(MessengerConfig::default(), transport.clone(), bus);
    messenger.attach_inbound(rx);
    messenger.wait_settled().await;
    (messenger, transport)
}

/// Records emits of selected bus events, in order.
#[derive(Clone, Default)]
pub struct EventLog {
    entries: Arc<Mutex<Vec<(BridgeEvent, Vec<Value>)>>>,
}

impl EventLog {
    pub fn attach(bus: &EventBus, events: &[BridgeEvent]) -> Self {
        let log = Self::default();
        for &event in events {
            let entries = log.entries.clone();
            bus.on(event, move |args| {
                let entries = entries.clone();
                async move {
                    entries.lock().push((event, args.to_vec()));
                    Ok(())
                }
            });
        }
        log
    }

    pub fn events(&self) -> Vec<BridgeEvent> {
        self.entries.lock().iter().map(|(event, _)| *event).collect()
    }

    /// First argument of every emit of `event`.
    pub fn payloads(&self, event: BridgeEvent) -> Vec<Value> {
        self.entries
            .lock()
            .iter()
            .filter(|(e, _)| *e == event)
            .map(|(_, args)| args.first().cloned().unwrap_or(Value::Null))
            .collect()
    }

    pub fn count(&self, event: BridgeEvent) -> usize {
        self.payloads(event).len()
    }

    pub fn clear(&self) {
        self.entries.lock().clear();
    }
}

/// Records reloads and navigations.
#[derive(Default)]
pub struct RecordingWindow {
    reloads: Mutex<usize>,
    navigations: Mutex<Vec<String>>,
}

impl RecordingWindow {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn reloads(&self) -> usize {
        *self.reloads.lock()
    }

    pub fn navigations(&self) -> Vec<String> {
        self.navigations.lock().clone()
    }
}

impl HostWindow for RecordingWindow {
    fn reload(&self) {
        *self.reloads.lock() += 1;
    }

    fn navigate(&self, url: &str) {
        self.navigations.lock().push(url.to_string());
    }
}
