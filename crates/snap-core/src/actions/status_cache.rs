//! Element status cache.
//!
//! Each entry is the shared fetch future itself, inserted before anything is
//! awaited, so concurrent lookups of one preview id share a single request.
//! Settled entries, failures included, stay until they are invalidated.

use std::collections::HashMap;
use std::sync::Arc;

use futures::future::{self, BoxFuture, Shared};
use futures::FutureExt;
use parking_lot::Mutex;
use serde_json::json;
use tracing::debug;

use snap_protocols::{Action, ActionError, ElementStatus, PreviewId};

use super::dispatcher::{object, Dispatcher};

type StatusFuture = Shared<BoxFuture<'static, Result<Arc<ElementStatus>, ActionError>>>;

pub struct StatusCache {
    dispatcher: Dispatcher,
    entries: Mutex<HashMap<String, StatusFuture>>,
}

impl StatusCache {
    pub fn new(dispatcher: Dispatcher) -> Self {
        Self {
            dispatcher,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Status of `preview_id`.
    ///
    /// With `refresh` a settled entry is fetched again; an entry still in
    /// flight is shared instead.
    pub async fn get(&self, preview_id: &str, refresh: bool) -> Result<Arc<ElementStatus>, ActionError> {
        if preview_id.is_empty() {
            return Err(ActionError::MissingPreviewId);
        }

        let pending = {
            let mut entries = self.entries.lock();
            match entries.get(preview_id) {
                Some(existing) if !refresh || existing.peek().is_none() => existing.clone(),
                _ => {
                    let fetch = self.fetch(preview_id);
                    entries.insert(preview_id.to_string(), fetch.clone());
                    fetch
                }
            }
        };
        pending.await
    }

    /// Drop one entry, or every entry for `None`. Fetches already in flight
    /// still complete for their current awaiters.
    pub fn invalidate(&self, preview_id: Option<&str>) {
        let mut entries = self.entries.lock();
        match preview_id {
            Some(id) => {
                entries.remove(id);
            }
            None => entries.clear(),
        }
    }

    pub fn contains(&self, preview_id: &str) -> bool {
        self.entries.lock().contains_key(preview_id)
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    fn fetch(&self, preview_id: &str) -> StatusFuture {
        if let PreviewId::Custom(suffix) = PreviewId::parse(preview_id) {
            let status = Arc::new(ElementStatus::custom(&suffix));
            return future::ready(Ok(status)).boxed().shared();
        }

        debug!(preview_id, "Fetching element status");
        let dispatcher = self.dispatcher.clone();
        let params = object(json!({ "previewId": preview_id }));
        async move {
            let response = dispatcher.send_action(Action::Status, params, true).await?;
            let status = ElementStatus::from_response(response).map_err(|e| {
                ActionError::InvalidResponse {
                    action: Action::Status.to_string(),
                    message: e.to_string(),
                }
            })?;
            Ok(Arc::new(status))
        }
        .boxed()
        .shared()
    }
}

#[cfg(test)]
#[path = "status_cache_tests.rs"]
mod tests;
