//! Nested-component path resolution.

use snap_protocols::consts::{NESTED_COMPONENT_PREVIEW_ID_PREFIX, PARENT_PREVIEW_ID_ATTRIBUTE};

use super::{Document, NodeId};

/// Element owning a nested component, and the path to the component.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NestedPath {
    pub parent_preview_id: String,
    /// Segments root first, prefix stripped.
    pub path: Vec<String>,
}

/// Resolve the nested path of `node`.
///
/// An explicit `parent-preview-id` attribute short-circuits the walk.
/// Otherwise ancestors carrying `attribute` are walked while their id is
/// nested, collecting segments. Returns `None` when `node` has no id or no
/// plain ancestor id exists.
pub fn nested_component_path(document: &Document, node: NodeId, attribute: &str) -> Option<NestedPath> {
    let own_id = document.attribute(node, attribute)?;

    if let Some(parent) = document.attribute(node, PARENT_PREVIEW_ID_ATTRIBUTE) {
        let segment = own_id
            .strip_prefix(NESTED_COMPONENT_PREVIEW_ID_PREFIX)
            .unwrap_or(&own_id)
            .to_string();
        return Some(NestedPath {
            parent_preview_id: parent,
            path: vec![segment],
        });
    }

    let mut path = Vec::new();
    let mut current = Some(node);
    while let Some(element) = current {
        let id = document.attribute(element, attribute)?;
        match id.strip_prefix(NESTED_COMPONENT_PREVIEW_ID_PREFIX) {
            Some(segment) => path.insert(0, segment.to_string()),
            None => {
                return Some(NestedPath {
                    parent_preview_id: id,
                    path,
                });
            }
        }
        current = document
            .parent(element)
            .and_then(|parent| document.closest_with_attribute(parent, attribute));
    }
    None
}
