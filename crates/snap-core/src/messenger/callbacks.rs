//! Pending correlated calls.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::oneshot;

use snap_protocols::MessengerError;

/// Generates correlation ids.
pub type IdSource = Arc<dyn Fn() -> String + Send + Sync>;

/// Call waiting for its callback.
struct PendingCall {
    tx: oneshot::Sender<Value>,
}

/// Outstanding calls keyed by correlation id. An entry is removed exactly
/// once: by its answer or by its caller giving up.
pub struct CallbackRegistry {
    pending: Mutex<HashMap<String, PendingCall>>,
    id_source: IdSource,
    max_attempts: u32,
}

impl CallbackRegistry {
    pub fn new(id_source: IdSource, max_attempts: u32) -> Self {
        Self {
            pending: Mutex::new(HashMap::new()),
            id_source,
            max_attempts: max_attempts.max(1),
        }
    }

    /// Reserve a fresh correlation id. Ids colliding with an outstanding call
    /// are regenerated, at most `max_attempts` times.
    pub fn register(&self) -> Result<(String, oneshot::Receiver<Value>), MessengerError> {
        let mut pending = self.pending.lock();
        for _ in 0..self.max_attempts {
            let id = (self.id_source)();
            if pending.contains_key(&id) {
                continue;
            }
            let (tx, rx) = oneshot::channel();
            pending.insert(id.clone(), PendingCall { tx });
            return Ok((id, rx));
        }
        Err(MessengerError::CorrelationExhausted {
            attempts: self.max_attempts,
        })
    }

    /// Deliver `value` to the call registered under `id`. Returns `false` for
    /// an unknown id.
    pub fn resolve(&self, id: &str, value: Value) -> bool {
        let call = self.pending.lock().remove(id);
        match call {
            Some(call) => {
                // The caller may have stopped listening; nothing to do then.
                let _ = call.tx.send(value);
                true
            }
            None => false,
        }
    }

    /// Drop the call registered under `id`. Returns whether it was pending.
    pub fn discard(&self, id: &str) -> bool {
        self.pending.lock().remove(id).is_some()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.pending.lock().contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.pending.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.lock().is_empty()
    }
}
