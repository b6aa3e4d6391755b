//! Cross-frame messenger.
//!
//! Wraps a fire-and-forget [`FrameTransport`] into correlated calls: every
//! call expecting a result is tagged with a fresh `_callbackId` and resolved
//! by the matching `CALLBACK` message from the host. `EVENT` messages are
//! re-emitted on the [`EventBus`].
//!
//! On construction a handshake pings the host until it answers or the
//! attempts are used up. Every call except the ping waits for the handshake
//! to settle. After a failed handshake calls fail with
//! [`MessengerError::NotConnected`].

mod callbacks;

pub use callbacks::{CallbackRegistry, IdSource};

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde_json::{json, Map, Value};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, trace, warn};
use uuid::Uuid;

use snap_config::MessengerConfig;
use snap_protocols::consts::VERSION;
use snap_protocols::{
    validate_response, Action, BridgeEvent, ExecuteTarget, FrameTransport, HandshakeReceipt,
    InboundMessage, MessageType, MessengerError, OutboundMessage, WindowMessage,
};

use crate::events::EventBus;

/// Connection state established by the handshake.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HandshakeState {
    Pending,
    Connected {
        version: Option<String>,
        is_legacy_cc: bool,
    },
    Disconnected,
}

impl HandshakeState {
    pub fn is_settled(&self) -> bool {
        !matches!(self, HandshakeState::Pending)
    }

    pub fn is_connected(&self) -> bool {
        matches!(self, HandshakeState::Connected { .. })
    }

    pub fn is_legacy_cc(&self) -> bool {
        matches!(self, HandshakeState::Connected { is_legacy_cc: true, .. })
    }
}

/// How a message is sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SendOptions {
    /// Wait for a correlated answer.
    pub result: bool,
    /// Give up waiting after this long.
    pub timeout: Option<Duration>,
}

impl Default for SendOptions {
    fn default() -> Self {
        Self {
            result: true,
            timeout: None,
        }
    }
}

impl SendOptions {
    pub fn fire_and_forget() -> Self {
        Self {
            result: false,
            timeout: None,
        }
    }

    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            result: true,
            timeout: Some(timeout),
        }
    }

    pub fn result(result: bool) -> Self {
        Self {
            result,
            timeout: None,
        }
    }
}

struct Inner {
    config: MessengerConfig,
    transport: Arc<dyn FrameTransport>,
    bus: EventBus,
    callbacks: CallbackRegistry,
    target_origin: Mutex<String>,
    handshake: watch::Sender<HandshakeState>,
    /// Host events, emitted one after another in arrival order.
    events: mpsc::UnboundedSender<(String, Value)>,
}

/// Forgets a pending callback when its call finishes or is dropped.
struct PendingGuard<'a> {
    callbacks: &'a CallbackRegistry,
    id: &'a str,
}

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        self.callbacks.discard(self.id);
    }
}

/// Messenger handle. Cloning yields another handle to the same channel.
#[derive(Clone)]
pub struct Messenger {
    inner: Arc<Inner>,
}

impl Messenger {
    /// Create a messenger and start the handshake. Must be called inside a
    /// tokio runtime.
    pub fn new(config: MessengerConfig, transport: Arc<dyn FrameTransport>, bus: EventBus) -> Self {
        Self::with_id_source(
            config,
            transport,
            bus,
            Arc::new(|| Uuid::new_v4().to_string()),
        )
    }

    /// Like [`new`](Self::new) with a custom correlation id generator.
    pub fn with_id_source(
        config: MessengerConfig,
        transport: Arc<dyn FrameTransport>,
        bus: EventBus,
        id_source: IdSource,
    ) -> Self {
        let (handshake, _) = watch::channel(HandshakeState::Pending);
        let (events, events_rx) = mpsc::unbounded_channel();
        tokio::spawn(emit_events(bus.clone(), events_rx));
        let messenger = Self {
            inner: Arc::new(Inner {
                callbacks: CallbackRegistry::new(id_source, config.max_correlation_attempts),
                target_origin: Mutex::new(config.target_origin.clone()),
                config,
                transport,
                bus,
                handshake,
                events,
            }),
        };
        messenger.start_handshake();
        messenger
    }

    pub fn bus(&self) -> &EventBus {
        &self.inner.bus
    }

    pub fn config(&self) -> &MessengerConfig {
        &self.inner.config
    }

    pub fn handshake_state(&self) -> HandshakeState {
        self.inner.handshake.borrow().clone()
    }

    pub fn is_legacy_cc(&self) -> bool {
        self.inner.handshake.borrow().is_legacy_cc()
    }

    /// Number of calls still waiting for an answer.
    pub fn pending_count(&self) -> usize {
        self.inner.callbacks.len()
    }

    /// Origin messages are currently posted to.
    pub fn target_origin(&self) -> String {
        self.inner.target_origin.lock().clone()
    }

    /// Wait until the handshake has settled and return its outcome.
    pub async fn wait_settled(&self) -> HandshakeState {
        let mut rx = self.inner.handshake.subscribe();
        let settled = rx
            .wait_for(HandshakeState::is_settled)
            .await
            .map(|state| (*state).clone());
        // The sender lives as long as `self`.
        settled.unwrap_or(HandshakeState::Disconnected)
    }

    // ========================================================================
    // Sending
    // ========================================================================

    /// Send `message`. With `options.result` the call resolves with the
    /// host's answer, otherwise with `Null` right after posting.
    pub async fn send_message(
        &self,
        message: OutboundMessage,
        options: SendOptions,
    ) -> Result<Value, MessengerError> {
        if !message.is_ping() {
            self.await_handshake().await?;
        }

        if !options.result {
            self.post(&message, None)?;
            return Ok(Value::Null);
        }

        let (id, mut rx) = self.inner.callbacks.register()?;
        let _pending = PendingGuard {
            callbacks: &self.inner.callbacks,
            id: &id,
        };
        self.post(&message, Some(&id))?;

        let Some(timeout) = options.timeout else {
            return rx.await.map_err(|_| MessengerError::ChannelClosed);
        };

        match tokio::time::timeout(timeout, &mut rx).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(_)) => Err(MessengerError::ChannelClosed),
            Err(_) => {
                if self.inner.callbacks.discard(&id) {
                    Err(MessengerError::Timeout {
                        description: message.describe(),
                    })
                } else {
                    // Answered between the deadline and the discard.
                    rx.try_recv().map_err(|_| MessengerError::ChannelClosed)
                }
            }
        }
    }

    /// Call an action on the host module endpoint.
    pub async fn send_action(
        &self,
        action: Action,
        params: Map<String, Value>,
        result: bool,
    ) -> Result<Value, MessengerError> {
        self.send_message(OutboundMessage::action(action, params), SendOptions::result(result))
            .await
    }

    /// Send `{topic: payload}`.
    pub async fn send_subject(
        &self,
        topic: impl Into<String>,
        payload: Value,
        result: bool,
    ) -> Result<Value, MessengerError> {
        let message = OutboundMessage::Subject {
            topic: topic.into(),
            payload,
        };
        self.send_message(message, SendOptions::result(result)).await
    }

    /// Execute an arbitrary identifier or source snippet on the host.
    pub async fn execute(
        &self,
        target: ExecuteTarget,
        params: Value,
        result: bool,
    ) -> Result<Value, MessengerError> {
        let message = OutboundMessage::Execute { target, params };
        self.send_message(message, SendOptions::result(result)).await
    }

    fn post(&self, message: &OutboundMessage, callback_id: Option<&str>) -> Result<(), MessengerError> {
        let mut envelope = Map::new();
        envelope.insert(
            self.inner.config.namespace.clone(),
            message.to_payload(callback_id),
        );
        let data = Value::Object(envelope);
        let origin = self.target_origin();
        trace!(origin = %origin, "→ {}", data);
        self.inner.transport.post_message(data, &origin)?;
        Ok(())
    }

    async fn await_handshake(&self) -> Result<(), MessengerError> {
        if self.wait_settled().await.is_connected() {
            Ok(())
        } else {
            Err(MessengerError::NotConnected)
        }
    }

    // ========================================================================
    // Handshake
    // ========================================================================

    fn start_handshake(&self) {
        if !self.inner.transport.is_embedded() && !self.inner.config.test_mode {
            debug!("Not embedded in a host frame, skipping handshake");
            self.inner.handshake.send_replace(HandshakeState::Disconnected);
            let bus = self.inner.bus.clone();
            tokio::spawn(async move { emit_initialized(&bus, false, false).await });
            return;
        }

        let messenger = self.clone();
        tokio::spawn(async move { messenger.run_handshake().await });
    }

    async fn run_handshake(&self) {
        let attempts = self.inner.config.handshake_attempts.max(1);
        let options = SendOptions::with_timeout(self.inner.config.handshake_timeout());

        for attempt in 1..=attempts {
            match self.send_message(OutboundMessage::Ping, options).await {
                Ok(response) => {
                    let receipt: HandshakeReceipt =
                        serde_json::from_value(response).unwrap_or_default();
                    self.on_connected(receipt).await;
                    return;
                }
                Err(e) => debug!(attempt, error = %e, "Handshake attempt failed"),
            }
        }

        debug!(attempts, "Handshake failed, continuing disconnected");
        self.inner.handshake.send_replace(HandshakeState::Disconnected);
        emit_initialized(&self.inner.bus, false, false).await;
    }

    async fn on_connected(&self, receipt: HandshakeReceipt) {
        if receipt.version.as_deref() != Some(VERSION) {
            warn!(
                "Version mismatch! Please update your resources, unexpected errors may occur: snap-bridge@{} != host@{}",
                VERSION,
                receipt.version.as_deref().unwrap_or("unknown")
            );
        }

        let is_legacy_cc = receipt.is_legacy_cc;
        self.inner.handshake.send_replace(HandshakeState::Connected {
            version: receipt.version,
            is_legacy_cc,
        });
        debug!(is_legacy_cc, "Connected to host frame");

        if let Err(e) = self
            .send_message(OutboundMessage::ConnectApi, SendOptions::fire_and_forget())
            .await
        {
            warn!(error = %e, "Failed to send connectApi");
        }

        emit_initialized(&self.inner.bus, true, is_legacy_cc).await;
    }

    // ========================================================================
    // Inbound routing
    // ========================================================================

    /// Consume inbound window messages until the channel closes.
    pub fn attach_inbound(&self, mut rx: mpsc::UnboundedReceiver<WindowMessage>) -> JoinHandle<()> {
        let messenger = self.clone();
        tokio::spawn(async move {
            while let Some(message) = rx.recv().await {
                messenger.handle_incoming(message);
            }
            debug!("Inbound channel closed");
        })
    }

    /// Route one inbound window message.
    pub fn handle_incoming(&self, message: WindowMessage) {
        let namespace = &self.inner.config.namespace;
        if message.data.get(namespace).is_none() {
            return;
        }

        {
            let mut origin = self.inner.target_origin.lock();
            if *origin == "*" {
                debug!(origin = %message.origin, "Adopting target origin");
                *origin = message.origin.clone();
            }
        }

        let Some(inbound) = InboundMessage::from_window_data(&message.data, namespace) else {
            warn!("Malformed {} message: {}", namespace, message.data);
            return;
        };

        match inbound.message_type {
            Some(MessageType::Callback) => {
                let key = inbound.callback_key();
                let response = validate_response(inbound.response);
                debug!("← {}", response);
                match key {
                    Some(key) => {
                        if !self.inner.callbacks.resolve(&key, response) {
                            warn!("Unknown callbackId '{}'", key);
                        }
                    }
                    None => warn!("Callback without callbackId"),
                }
            }
            Some(MessageType::Event) => {
                let Some(event_id) = inbound.event_id else {
                    warn!("Event without eventId");
                    return;
                };
                let payload = validate_response(inbound.payload);
                debug!("⇠ {} {}", event_id, payload);
                // The emit task only stops once the messenger is gone.
                let _ = self.inner.events.send((event_id, payload));
            }
            other => trace!(message_type = ?other, "Ignoring inbound message"),
        }
    }
}

/// Emit host events on `bus` until every messenger handle is dropped.
async fn emit_events(bus: EventBus, mut rx: mpsc::UnboundedReceiver<(String, Value)>) {
    while let Some((event_id, payload)) = rx.recv().await {
        if let Err(e) = bus.emit(&event_id, vec![payload]).await {
            warn!(event = %event_id, error = %e, "Event handler failed");
        }
    }
}

async fn emit_initialized(bus: &EventBus, connected: bool, is_legacy_cc: bool) {
    if let Err(e) = bus
        .emit(BridgeEvent::Initialized, vec![json!(connected), json!(is_legacy_cc)])
        .await
    {
        warn!(error = %e, "Initialized handler failed");
    }
}

#[cfg(test)]
#[path = "messenger_tests.rs"]
mod tests;
