//! Protocol constants and the bus event vocabulary.

use std::fmt;

/// Key under which every frame message is namespaced.
pub const POST_MESSAGE_NAMESPACE: &str = "tpp";

/// Protocol version announced to (and compared with) the host.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Remote endpoint that handles every [`crate::Action`].
pub const MODULE_ENDPOINT: &str = "class:TppApi";

/// Attribute carrying the preview id of a content element.
pub const PREVIEW_ID_ATTRIBUTE: &str = "data-preview-id";

/// Attribute that pins the parent of a nested component explicitly.
pub const PARENT_PREVIEW_ID_ATTRIBUTE: &str = "parent-preview-id";

/// Attribute naming a legacy content-update handler.
pub const LEGACY_UPDATE_ATTRIBUTE: &str = "data-on-tpp-update";

/// Attribute selecting the drop border orientation of a drag container.
pub const DND_ORIENT_ATTRIBUTE: &str = "dnd-orient";

/// Prefix of locally synthesized preview ids.
pub const CUSTOM_PREVIEW_ID_PREFIX: &str = "custom:";

/// Prefix of nested-component preview ids.
pub const NESTED_COMPONENT_PREVIEW_ID_PREFIX: &str = "#";

/// Suffix appended to a listener name to find its fallback.
pub const EVENT_FALLBACK_SUFFIX: &str = "Fallback";

/// Listener name for content changes.
pub const CONTENT_CHANGE_EVENT: &str = "onContentChange";

/// Status name the host reports for elements it cannot resolve.
pub const UNKNOWN_STATUS_NAME: &str = "unknown";

/// Events travelling over the bus.
///
/// The first group is emitted locally, the second is piped from the host
/// and the rest are custom host notifications.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BridgeEvent {
    Initialized,
    ElementChange,
    StatusChange,
    RerenderView,
    DropElement,
    PreviewRequest,
    NavigationChange,
    WorkflowTransition,
    DragElement,
    DisplayChangesRequest,
    ResetDisplayChangesRequest,
    MppChange,
}

impl BridgeEvent {
    /// Every known event.
    pub const ALL: [BridgeEvent; 12] = [
        BridgeEvent::Initialized,
        BridgeEvent::ElementChange,
        BridgeEvent::StatusChange,
        BridgeEvent::RerenderView,
        BridgeEvent::DropElement,
        BridgeEvent::PreviewRequest,
        BridgeEvent::NavigationChange,
        BridgeEvent::WorkflowTransition,
        BridgeEvent::DragElement,
        BridgeEvent::DisplayChangesRequest,
        BridgeEvent::ResetDisplayChangesRequest,
        BridgeEvent::MppChange,
    ];

    /// Wire name of the event.
    pub fn as_str(&self) -> &'static str {
        match self {
            BridgeEvent::Initialized => "tpp-initialized",
            BridgeEvent::ElementChange => "tpp-element-change",
            BridgeEvent::StatusChange => "tpp-status-change",
            BridgeEvent::RerenderView => "tpp-rerender-view",
            BridgeEvent::DropElement => "tpp-drop-element",
            BridgeEvent::PreviewRequest => "TPP_PREVIEW_REQUEST",
            BridgeEvent::NavigationChange => "TPP_NAVIGATION_CHANGED",
            BridgeEvent::WorkflowTransition => "TPP_WORKFLOW_ACTION",
            BridgeEvent::DragElement => "TPP_DRAG_ACTION",
            BridgeEvent::DisplayChangesRequest => "TPP_DISPLAY_CHANGES_REQUEST",
            BridgeEvent::ResetDisplayChangesRequest => "TPP_RESET_DISPLAY_CHANGES_REQUEST",
            BridgeEvent::MppChange => "TPP_MPP_CHANGE",
        }
    }

    /// Look up an event by its wire name.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|event| event.as_str() == name)
    }
}

impl fmt::Display for BridgeEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl AsRef<str> for BridgeEvent {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}
