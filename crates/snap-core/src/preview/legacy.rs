//! Built-in content-change fallback.
//!
//! Nodes may name an update handler in their `data-on-tpp-update`
//! attribute. The name is looked up in [`UpdateHandlers`]; markup never
//! carries code.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use futures::future::BoxFuture;
use futures::FutureExt;
use parking_lot::Mutex;
use serde_json::{json, Value};
use tracing::{debug, warn};

use snap_protocols::consts::LEGACY_UPDATE_ATTRIBUTE;
use snap_protocols::HostWindow;

use super::listeners::ContentChange;
use crate::actions::Actions;
use crate::dom::Document;

pub type UpdateHandler = Arc<dyn Fn(ContentChange) -> BoxFuture<'static, Option<Value>> + Send + Sync>;

/// Update handlers addressable by name from markup.
#[derive(Clone, Default)]
pub struct UpdateHandlers {
    handlers: Arc<Mutex<HashMap<String, UpdateHandler>>>,
}

impl UpdateHandlers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler` under `name`, replacing any previous one.
    pub fn register<F, Fut>(&self, name: impl Into<String>, handler: F)
    where
        F: Fn(ContentChange) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Option<Value>> + Send + 'static,
    {
        let handler: UpdateHandler = Arc::new(move |change| handler(change).boxed());
        self.handlers.lock().insert(name.into(), handler);
    }

    pub fn get(&self, name: &str) -> Option<UpdateHandler> {
        self.handlers.lock().get(name).cloned()
    }
}

/// What the fallback needs to act on a change.
pub(super) struct FallbackContext {
    pub document: Document,
    pub attribute: String,
    pub actions: Actions,
    pub window: Arc<dyn HostWindow>,
    pub handlers: UpdateHandlers,
}

impl FallbackContext {
    /// Apply `change` to the document.
    ///
    /// - a named update handler on the node decides on its own
    /// - deleting the preview element navigates to the preview url
    /// - deleting any other node removes it; the event is captured while
    ///   its parent still holds annotated nodes
    ///
    /// Markup content is never spliced into the document, since nodes carry
    /// no markup model. Such changes stay uncaptured and end up as a rerender.
    pub(super) async fn apply(&self, change: ContentChange) -> Option<Value> {
        let node = change.node?;

        if let Some(name) = self.document.attribute(node, LEGACY_UPDATE_ATTRIBUTE) {
            return match self.handlers.get(&name) {
                Some(handler) => handler(change).await,
                None => {
                    warn!(handler = %name, preview_id = %change.preview_id, "Unknown update handler");
                    None
                }
            };
        }

        if !change.content.is_null() {
            return None;
        }

        if self.actions.preview_element().as_deref() == Some(change.preview_id.as_str()) {
            return match self.actions.preview_url(false).await {
                Ok(Some(url)) => {
                    self.window.navigate(&url);
                    Some(json!(url))
                }
                Ok(None) => None,
                Err(e) => {
                    warn!(error = %e, "Preview url unavailable after deletion");
                    None
                }
            };
        }

        let parent = self.document.parent(node);
        self.document.remove(node);
        debug!(preview_id = %change.preview_id, "Removed deleted node");
        let sibling = parent.and_then(|parent| {
            self.document
                .select(parent, &self.attribute, None)
                .into_iter()
                .next()
        });
        sibling.map(|sibling| json!(sibling.index()))
    }
}
