//! Event bus.
//!
//! Handlers for one event run strictly one after another in registration
//! order, each awaited before the next starts. A failing handler aborts the
//! remaining dispatch of that emit and its error is returned to the emitter.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use futures::future::BoxFuture;
use futures::FutureExt;
use parking_lot::Mutex;
use serde_json::Value;
use tracing::trace;

use snap_protocols::BridgeError;

/// Arguments of one emit, shared by every handler of that emit.
pub type EventArgs = Arc<Vec<Value>>;

/// Boxed event handler.
pub type EventHandler =
    Arc<dyn Fn(EventArgs) -> BoxFuture<'static, Result<(), BridgeError>> + Send + Sync>;

/// Handle returned by [`EventBus::on`], used to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

#[derive(Default)]
struct BusInner {
    next_id: u64,
    handlers: HashMap<String, Vec<(SubscriptionId, EventHandler)>>,
}

/// Ordered publish/subscribe bus. Cloning yields another handle to the same
/// bus.
#[derive(Clone, Default)]
pub struct EventBus {
    inner: Arc<Mutex<BusInner>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler` for `name`.
    pub fn on<F, Fut>(&self, name: impl AsRef<str>, handler: F) -> SubscriptionId
    where
        F: Fn(EventArgs) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), BridgeError>> + Send + 'static,
    {
        self.on_handler(name, Arc::new(move |args| handler(args).boxed()))
    }

    /// Register an already boxed handler.
    pub fn on_handler(&self, name: impl AsRef<str>, handler: EventHandler) -> SubscriptionId {
        let mut inner = self.inner.lock();
        inner.next_id += 1;
        let id = SubscriptionId(inner.next_id);
        inner
            .handlers
            .entry(name.as_ref().to_string())
            .or_default()
            .push((id, handler));
        id
    }

    /// Remove a handler. Returns whether it was registered.
    ///
    /// An emit already in progress keeps its dispatch list.
    pub fn off(&self, name: impl AsRef<str>, id: SubscriptionId) -> bool {
        let mut inner = self.inner.lock();
        let Some(handlers) = inner.handlers.get_mut(name.as_ref()) else {
            return false;
        };
        let before = handlers.len();
        handlers.retain(|(handler_id, _)| *handler_id != id);
        before != handlers.len()
    }

    pub fn handler_count(&self, name: impl AsRef<str>) -> usize {
        self.inner
            .lock()
            .handlers
            .get(name.as_ref())
            .map_or(0, Vec::len)
    }

    /// Invoke every handler registered for `name`, sequentially.
    pub async fn emit(&self, name: impl AsRef<str>, args: Vec<Value>) -> Result<(), BridgeError> {
        let name = name.as_ref();
        let dispatch: Vec<EventHandler> = self
            .inner
            .lock()
            .handlers
            .get(name)
            .map(|handlers| handlers.iter().map(|(_, handler)| handler.clone()).collect())
            .unwrap_or_default();

        trace!(event = name, handlers = dispatch.len(), "emit");

        let args: EventArgs = Arc::new(args);
        for handler in dispatch {
            handler(args.clone()).await?;
        }
        Ok(())
    }
}

/// First argument of an emit, or `Null`.
pub fn first_arg(args: &EventArgs) -> Value {
    args.first().cloned().unwrap_or(Value::Null)
}

#[cfg(test)]
#[path = "events_tests.rs"]
mod tests;
