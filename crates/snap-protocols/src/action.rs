//! Remote operation vocabulary.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Remote operations handled by the host's module endpoint.
///
/// Every action is a request/response pair sent through the action
/// dispatcher; the wire name is the SCREAMING_SNAKE_CASE form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Action {
    Edit,
    EditNestedComponent,
    EditMetaData,
    Status,
    Delete,
    DeleteWorkflow,
    Render,
    RenderStartNode,
    CreatePage,
    CreateSiblingSection,
    CreateChildSection,
    CreateDataset,
    CreateNestedComponent,
    DeleteNestedComponent,
    NestedComponentTemplates,
    WorkflowStart,
    RelatedElements,
    #[serde(rename = "GET_AFFECTED_WORKFLOW_ELEMENTS")]
    AffectedElements,
    WorkflowProcess,
    CropImage,
    ToggleBookmark,
    FsidToPreviewId,
    ProjectInfo,
    Translation,
    TransferSection,
    TransferNestedComponent,
    TransferSectionAllowed,
    RequestChangeSet,
    ShowComparisonDialog,
    ShowCustomDialog,
    FieldComponentType,
    UpdateFieldComponent,
    StartInlineEditing,
}

impl Action {
    /// Wire name of the action.
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Edit => "EDIT",
            Action::EditNestedComponent => "EDIT_NESTED_COMPONENT",
            Action::EditMetaData => "EDIT_META_DATA",
            Action::Status => "STATUS",
            Action::Delete => "DELETE",
            Action::DeleteWorkflow => "DELETE_WORKFLOW",
            Action::Render => "RENDER",
            Action::RenderStartNode => "RENDER_START_NODE",
            Action::CreatePage => "CREATE_PAGE",
            Action::CreateSiblingSection => "CREATE_SIBLING_SECTION",
            Action::CreateChildSection => "CREATE_CHILD_SECTION",
            Action::CreateDataset => "CREATE_DATASET",
            Action::CreateNestedComponent => "CREATE_NESTED_COMPONENT",
            Action::DeleteNestedComponent => "DELETE_NESTED_COMPONENT",
            Action::NestedComponentTemplates => "NESTED_COMPONENT_TEMPLATES",
            Action::WorkflowStart => "WORKFLOW_START",
            Action::RelatedElements => "RELATED_ELEMENTS",
            Action::AffectedElements => "GET_AFFECTED_WORKFLOW_ELEMENTS",
            Action::WorkflowProcess => "WORKFLOW_PROCESS",
            Action::CropImage => "CROP_IMAGE",
            Action::ToggleBookmark => "TOGGLE_BOOKMARK",
            Action::FsidToPreviewId => "FSID_TO_PREVIEW_ID",
            Action::ProjectInfo => "PROJECT_INFO",
            Action::Translation => "TRANSLATION",
            Action::TransferSection => "TRANSFER_SECTION",
            Action::TransferNestedComponent => "TRANSFER_NESTED_COMPONENT",
            Action::TransferSectionAllowed => "TRANSFER_SECTION_ALLOWED",
            Action::RequestChangeSet => "REQUEST_CHANGE_SET",
            Action::ShowComparisonDialog => "SHOW_COMPARISON_DIALOG",
            Action::ShowCustomDialog => "SHOW_CUSTOM_DIALOG",
            Action::FieldComponentType => "FIELD_COMPONENT_TYPE",
            Action::UpdateFieldComponent => "UPDATE_FIELD_COMPONENT",
            Action::StartInlineEditing => "START_INLINE_EDITING",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
