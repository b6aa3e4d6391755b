//! Mutation observer for annotated nodes.
//!
//! Reports every attached node carrying the observed attribute exactly once
//! through `on_insert`, and every reported node that later leaves the tree
//! or loses the attribute exactly once through `on_remove`.

use std::collections::HashSet;
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tracing::trace;

use super::{Document, MutationQueue, MutationRecord, NodeId};

pub type NodeCallback = Box<dyn Fn(NodeId) + Send + Sync>;

struct ObserverInner {
    document: Document,
    root: NodeId,
    attribute: String,
    queue: Arc<MutationQueue>,
    tracked: Mutex<HashSet<NodeId>>,
    on_insert: NodeCallback,
    on_remove: NodeCallback,
}

impl ObserverInner {
    fn matches(&self, node: NodeId) -> bool {
        self.document.has_attribute(node, &self.attribute)
    }

    fn attached(&self, node: NodeId) -> bool {
        self.document.contains(self.root, node)
    }

    /// `node` itself when it matches, then its matching descendants.
    fn matching_subtree(&self, node: NodeId) -> Vec<NodeId> {
        let mut nodes = Vec::new();
        if self.matches(node) {
            nodes.push(node);
        }
        nodes.extend(
            self.document
                .descendants(node)
                .into_iter()
                .filter(|n| self.matches(*n)),
        );
        nodes
    }

    fn insert(&self, node: NodeId) {
        if self.tracked.lock().insert(node) {
            trace!(node = %node, "observer insert");
            (self.on_insert)(node);
        }
    }

    fn remove(&self, node: NodeId) {
        if self.tracked.lock().remove(&node) {
            trace!(node = %node, "observer remove");
            (self.on_remove)(node);
        }
    }

    fn walk_removed(&self, subtree: NodeId) {
        let mut nodes = vec![subtree];
        nodes.extend(self.document.descendants(subtree));
        for node in nodes {
            self.remove(node);
        }
    }

    fn walk_added(&self, subtree: NodeId) {
        if !self.attached(subtree) {
            return;
        }
        for node in self.matching_subtree(subtree) {
            self.insert(node);
        }
    }

    fn process(&self, record: MutationRecord) {
        match record {
            MutationRecord::ChildList { added, removed, .. } => {
                for node in removed {
                    self.walk_removed(node);
                }
                for node in added {
                    self.walk_added(node);
                }
            }
            MutationRecord::Attributes { target, .. } => {
                let tracked = self.tracked.lock().contains(&target);
                let relevant = self.matches(target) && self.attached(target);
                if tracked && !relevant {
                    self.remove(target);
                } else if !tracked && relevant {
                    self.insert(target);
                }
            }
        }
    }

    fn flush(&self) {
        loop {
            let records = self.queue.take();
            if records.is_empty() {
                return;
            }
            for record in records {
                self.process(record);
            }
        }
    }
}

/// Observes the subtree of one root. Dropping the handle stops observation.
pub struct DomObserver {
    inner: Arc<ObserverInner>,
    task: JoinHandle<()>,
}

impl DomObserver {
    /// Observe `root` for nodes carrying `attribute`.
    ///
    /// The existing subtree is reported synchronously before this returns.
    /// Later changes are processed by a background task; [`flush`] handles
    /// pending changes immediately. Must be called inside a tokio runtime.
    ///
    /// [`flush`]: Self::flush
    pub fn observe<I, R>(document: &Document, root: NodeId, attribute: &str, on_insert: I, on_remove: R) -> Self
    where
        I: Fn(NodeId) + Send + Sync + 'static,
        R: Fn(NodeId) + Send + Sync + 'static,
    {
        let inner = Arc::new(ObserverInner {
            document: document.clone(),
            root,
            attribute: attribute.to_string(),
            queue: document.observe(root, attribute),
            tracked: Mutex::new(HashSet::new()),
            on_insert: Box::new(on_insert),
            on_remove: Box::new(on_remove),
        });

        for node in inner.matching_subtree(root) {
            inner.insert(node);
        }

        let weak = Arc::downgrade(&inner);
        let task = tokio::spawn(run(weak));
        Self { inner, task }
    }

    /// Process every queued change now.
    pub fn flush(&self) {
        self.inner.flush();
    }

    pub fn is_tracked(&self, node: NodeId) -> bool {
        self.inner.tracked.lock().contains(&node)
    }

    pub fn tracked_count(&self) -> usize {
        self.inner.tracked.lock().len()
    }
}

impl Drop for DomObserver {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn run(weak: Weak<ObserverInner>) {
    loop {
        let Some(queue) = weak.upgrade().map(|inner| inner.queue.clone()) else {
            return;
        };
        queue.notified().await;
        drop(queue);
        match weak.upgrade() {
            Some(inner) => inner.flush(),
            None => return,
        }
    }
}

#[cfg(test)]
#[path = "observer_tests.rs"]
mod tests;
