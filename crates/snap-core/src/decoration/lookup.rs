//! Preview node lookup.

use futures::future::try_join_all;

use snap_protocols::{ActionError, ElementStatus, PreviewId};

use crate::actions::Actions;
use crate::dom::{nested_component_path, Document, NodeId};

/// What to resolve: a node, or a preview id looked up in the document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PreviewTarget {
    Node(NodeId),
    Id(String),
}

/// A preview id together with its node and status.
///
/// For nested components the status is the parent's, with
/// `component_path` set.
#[derive(Debug, Clone)]
pub struct PreviewNode {
    pub preview_id: String,
    pub node: Option<NodeId>,
    pub parent_preview_id: Option<String>,
    pub status: ElementStatus,
}

impl PreviewNode {
    pub fn element_type(&self) -> Option<&str> {
        self.status.element_type.as_deref()
    }

    pub fn component_path(&self) -> Option<&[String]> {
        self.status.component_path.as_deref()
    }
}

/// Nodes whose `attribute` equals `preview_id`, in document order.
pub fn find_preview_nodes(document: &Document, attribute: &str, preview_id: &str) -> Vec<NodeId> {
    document.select_all(attribute, Some(preview_id))
}

pub async fn preview_element_node(
    document: &Document,
    actions: &Actions,
    attribute: &str,
    target: PreviewTarget,
) -> Result<PreviewNode, ActionError> {
    let (preview_id, node) = match target {
        PreviewTarget::Node(node) => match document.attribute(node, attribute) {
            Some(id) => (id, Some(node)),
            None => return Err(ActionError::MissingPreviewId),
        },
        PreviewTarget::Id(id) => {
            let node = find_preview_nodes(document, attribute, &id).into_iter().next();
            (id, node)
        }
    };

    if PreviewId::parse(&preview_id).is_nested() {
        let nested = node
            .and_then(|node| nested_component_path(document, node, attribute))
            .ok_or(ActionError::MissingPreviewId)?;
        let mut status = (*actions.element_status(&nested.parent_preview_id, false).await?).clone();
        status.component_path = Some(nested.path);
        return Ok(PreviewNode {
            preview_id,
            node,
            parent_preview_id: Some(nested.parent_preview_id),
            status,
        });
    }

    let status = (*actions.element_status(&preview_id, false).await?).clone();
    Ok(PreviewNode {
        preview_id,
        node,
        parent_preview_id: None,
        status,
    })
}

/// Every annotated node of the document, resolved.
pub async fn preview_element_nodes(
    document: &Document,
    actions: &Actions,
    attribute: &str,
) -> Result<Vec<PreviewNode>, ActionError> {
    let nodes = document.select_all(attribute, None);
    try_join_all(
        nodes
            .into_iter()
            .map(|node| preview_element_node(document, actions, attribute, PreviewTarget::Node(node))),
    )
    .await
}
