//! Typed listener registry.
//!
//! Every [`ListenerKind`] holds primary listeners and fallback listeners.
//! Triggering a kind runs all its primary listeners concurrently; only when
//! none is registered do the fallbacks run instead.

use std::future::Future;
use std::sync::Arc;

use futures::future::{join_all, BoxFuture};
use futures::FutureExt;
use parking_lot::Mutex;
use serde_json::Value;
use tracing::trace;

use snap_protocols::consts::{CONTENT_CHANGE_EVENT, EVENT_FALLBACK_SUFFIX};

use crate::dom::NodeId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ListenerKind {
    ContentChange,
    RerenderView,
    NavigationChange,
    RequestPreviewElement,
    MppParameterized,
    MppParameter,
    MppTimeParameter,
}

impl ListenerKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ListenerKind::ContentChange => CONTENT_CHANGE_EVENT,
            ListenerKind::RerenderView => "onRerenderView",
            ListenerKind::NavigationChange => "onNavigationChange",
            ListenerKind::RequestPreviewElement => "onRequestPreviewElement",
            ListenerKind::MppParameterized => "onMppParameterizedChange",
            ListenerKind::MppParameter => "onMppParameterChange",
            ListenerKind::MppTimeParameter => "onMppTimeParameterChange",
        }
    }

    /// Parse a listener name, optionally carrying the fallback suffix.
    /// Returns the kind and whether the name denotes a fallback.
    pub fn from_name(name: &str) -> Option<(Self, bool)> {
        let (base, fallback) = match name.strip_suffix(EVENT_FALLBACK_SUFFIX) {
            Some(base) => (base, true),
            None => (name, false),
        };
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == base)
            .map(|kind| (kind, fallback))
    }

    pub const ALL: [ListenerKind; 7] = [
        ListenerKind::ContentChange,
        ListenerKind::RerenderView,
        ListenerKind::NavigationChange,
        ListenerKind::RequestPreviewElement,
        ListenerKind::MppParameterized,
        ListenerKind::MppParameter,
        ListenerKind::MppTimeParameter,
    ];
}

/// Content of `preview_id` changed. `node` is `None` when the id has no node
/// in the document. Null content means the element was deleted.
#[derive(Debug, Clone, PartialEq)]
pub struct ContentChange {
    pub node: Option<NodeId>,
    pub preview_id: String,
    pub content: Value,
}

/// What a listener is called with.
#[derive(Debug, Clone, PartialEq)]
pub enum ListenerEvent {
    ContentChange(ContentChange),
    RerenderView,
    NavigationChange(Option<String>),
    RequestPreviewElement(String),
    /// Result pushed by the multi-perspective preview.
    Mpp(Value),
}

/// A listener. A `Some` result captures the event; for content changes an
/// uncaptured event leads to a full rerender.
pub type Listener = Arc<dyn Fn(ListenerEvent) -> BoxFuture<'static, Option<Value>> + Send + Sync>;

struct Entry {
    kind: ListenerKind,
    fallback: bool,
    listener: Listener,
}

/// Registered listeners, in registration order. Cloning yields another
/// handle to the same registry.
#[derive(Clone, Default)]
pub struct Listeners {
    entries: Arc<Mutex<Vec<Entry>>>,
}

impl Listeners {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add<F, Fut>(&self, kind: ListenerKind, fallback: bool, listener: F)
    where
        F: Fn(ListenerEvent) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Option<Value>> + Send + 'static,
    {
        let listener: Listener = Arc::new(move |event| listener(event).boxed());
        self.entries.lock().push(Entry {
            kind,
            fallback,
            listener,
        });
    }

    pub fn count(&self, kind: ListenerKind, fallback: bool) -> usize {
        self.entries
            .lock()
            .iter()
            .filter(|entry| entry.kind == kind && entry.fallback == fallback)
            .count()
    }

    fn selected(&self, kind: ListenerKind, fallback: bool) -> Vec<Listener> {
        self.entries
            .lock()
            .iter()
            .filter(|entry| entry.kind == kind && entry.fallback == fallback)
            .map(|entry| entry.listener.clone())
            .collect()
    }

    /// Run the listeners of `kind` and collect their results.
    pub async fn trigger(&self, kind: ListenerKind, event: ListenerEvent) -> Vec<Option<Value>> {
        let mut listeners = self.selected(kind, false);
        let fallback = listeners.is_empty();
        if fallback {
            listeners = self.selected(kind, true);
        }
        trace!(listener = kind.as_str(), fallback, count = listeners.len(), "trigger");
        join_all(listeners.iter().map(|listener| listener(event.clone()))).await
    }
}
