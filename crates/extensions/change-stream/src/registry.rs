//! Pending waits and the change events that resolve them.

use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use serde::Deserialize;
use tokio::sync::oneshot;
use tracing::trace;

/// `operationType` of a change event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeType {
    Insert,
    Replace,
    Update,
    Delete,
    #[serde(other)]
    Other,
}

/// Change types that count as "the document now holds new content".
pub const UPDATE_CHANGE_TYPES: &[ChangeType] = &[ChangeType::Insert, ChangeType::Replace];

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct DocumentKey {
    #[serde(rename = "_id")]
    pub id: String,
}

/// One message of the CRUD change stream.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeEvent {
    pub document_key: DocumentKey,
    pub operation_type: ChangeType,
}

struct PendingWait {
    id: u64,
    document_id: String,
    change_types: &'static [ChangeType],
    tx: oneshot::Sender<()>,
}

/// Callers waiting for a change of a document, in registration order.
#[derive(Default)]
pub struct PendingWaits {
    next_id: AtomicU64,
    waits: Mutex<Vec<PendingWait>>,
}

impl PendingWaits {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a wait. The receiver fires once a matching event arrives.
    pub fn register(
        &self,
        document_id: impl Into<String>,
        change_types: &'static [ChangeType],
    ) -> (u64, oneshot::Receiver<()>) {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = oneshot::channel();
        self.waits.lock().push(PendingWait {
            id,
            document_id: document_id.into(),
            change_types,
            tx,
        });
        (id, rx)
    }

    /// Resolve the earliest wait matching `event`. Later duplicates keep
    /// waiting. Returns whether a wait was resolved.
    pub fn resolve(&self, event: &ChangeEvent) -> bool {
        let wait = {
            let mut waits = self.waits.lock();
            let position = waits.iter().position(|wait| {
                wait.document_id == event.document_key.id
                    && wait.change_types.contains(&event.operation_type)
            });
            position.map(|index| waits.remove(index))
        };
        match wait {
            Some(wait) => {
                trace!(document_id = %wait.document_id, wait = wait.id, "Resolved pending wait");
                let _ = wait.tx.send(());
                true
            }
            None => false,
        }
    }

    /// Drop the wait `id`. Returns false if it was already resolved.
    pub fn cancel(&self, id: u64) -> bool {
        let mut waits = self.waits.lock();
        let before = waits.len();
        waits.retain(|wait| wait.id != id);
        waits.len() != before
    }

    pub fn len(&self) -> usize {
        self.waits.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
#[path = "registry_tests.rs"]
mod tests;
