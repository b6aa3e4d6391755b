//! Typed remote operations.
//!
//! [`Actions`] owns the [`Dispatcher`], the [`StatusCache`] and the
//! [`ProjectInfo`] cache. Operations that may change content await the host
//! answer and then propagate it: a null answer refreshes the status and
//! emits `StatusChange`, anything else additionally emits `ElementChange`
//! with the new content.

mod dispatcher;
mod project_info;
mod status_cache;

pub use dispatcher::Dispatcher;
pub use project_info::ProjectInfo;
pub use status_cache::StatusCache;

use std::sync::{Arc, Weak};

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{json, Map, Value};
use tracing::{debug, warn};

use snap_protocols::{
    Action, ActionError, BridgeEvent, ChangeStreamError, ElementStatus, ExecuteTarget, LocaleEntry,
    LocaleLookup, OutboundMessage,
};

use crate::events::{first_arg, EventBus};
use crate::messenger::{Messenger, SendOptions};

use dispatcher::object;

/// Where a new section is placed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SectionPlacement {
    /// At the given index of the target.
    Index(usize),
    /// At the end of a body, or right after a sibling section.
    Last,
}

#[derive(Debug, Clone, Default)]
pub struct CreateSectionOptions {
    pub body: Option<String>,
    pub template: Option<String>,
    pub name: Option<String>,
    pub index: Option<usize>,
    /// Return the host answer instead of propagating the change.
    pub result: bool,
}

#[derive(Debug, Clone)]
pub struct CreatePageOptions {
    pub language: Option<String>,
    pub result: bool,
    pub show_form_dialog: bool,
    /// Fail with [`ActionError::DuplicatePage`] instead of renaming.
    pub force_uid: bool,
}

impl Default for CreatePageOptions {
    fn default() -> Self {
        Self {
            language: None,
            result: false,
            show_form_dialog: true,
            force_uid: false,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct CreateDatasetOptions {
    pub language: Option<String>,
    pub result: bool,
}

/// Placement of a transferred section relative to its target.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TransferPosition {
    Before,
    #[default]
    After,
}

impl TransferPosition {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransferPosition::Before => "BEFORE",
            TransferPosition::After => "AFTER",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TransferMode {
    #[default]
    Move,
    Copy,
}

impl TransferMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransferMode::Move => "MOVE",
            TransferMode::Copy => "COPY",
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct TransferOptions {
    pub position: TransferPosition,
    pub mode: TransferMode,
    /// Do not emit `RerenderView` after a successful transfer.
    pub skip_rerender: bool,
}

/// Bounding box handed to the host when inline editing starts.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Bounds {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

/// Kind of a host message dialog.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum MessageKind {
    #[default]
    Info,
    Error,
}

impl MessageKind {
    /// Parse a kind name, falling back to [`MessageKind::Info`].
    pub fn parse(kind: &str) -> Self {
        match kind {
            "error" => MessageKind::Error,
            _ => MessageKind::Info,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            MessageKind::Info => "info",
            MessageKind::Error => "error",
        }
    }
}

struct ActionsInner {
    dispatcher: Dispatcher,
    cache: StatusCache,
    project: ProjectInfo,
    preview_element: Mutex<Option<String>>,
}

/// Remote operations on top of the messenger. Cloning yields another handle
/// to the same state.
#[derive(Clone)]
pub struct Actions {
    inner: Arc<ActionsInner>,
}

impl Actions {
    /// Create the operations and wire their bus handlers.
    pub fn new(messenger: Messenger) -> Self {
        let dispatcher = Dispatcher::new(messenger);
        let actions = Self {
            inner: Arc::new(ActionsInner {
                cache: StatusCache::new(dispatcher.clone()),
                project: ProjectInfo::new(dispatcher.clone()),
                dispatcher,
                preview_element: Mutex::new(None),
            }),
        };
        actions.wire();
        actions
    }

    fn from_weak(weak: &Weak<ActionsInner>) -> Option<Self> {
        weak.upgrade().map(|inner| Self { inner })
    }

    fn wire(&self) {
        let bus = self.bus();

        let weak = Arc::downgrade(&self.inner);
        bus.on(BridgeEvent::ElementChange, move |_| {
            let actions = Self::from_weak(&weak);
            async move {
                if let Some(actions) = actions {
                    actions.notify_preview_element().await;
                }
                Ok(())
            }
        });

        let weak = Arc::downgrade(&self.inner);
        bus.on(BridgeEvent::WorkflowTransition, move |args| {
            let actions = Self::from_weak(&weak);
            async move {
                let Some(actions) = actions else {
                    return Ok(());
                };
                let payload = first_arg(&args);
                let preview_id = payload["previewId"].as_str().unwrap_or_default().to_string();
                if payload["isDeleted"].as_bool().unwrap_or(false) {
                    actions.bus().emit(BridgeEvent::NavigationChange, vec![]).await?;
                    actions
                        .bus()
                        .emit(BridgeEvent::ElementChange, vec![element_change(&preview_id, Value::Null)])
                        .await
                } else {
                    let status = actions.element_status(&preview_id, false).await?;
                    actions
                        .bus()
                        .emit(BridgeEvent::StatusChange, vec![status_change(&preview_id, &status)])
                        .await
                }
            }
        });
    }

    pub fn messenger(&self) -> &Messenger {
        self.inner.dispatcher.messenger()
    }

    pub fn bus(&self) -> &EventBus {
        self.messenger().bus()
    }

    pub fn status_cache(&self) -> &StatusCache {
        &self.inner.cache
    }

    /// Send an action, injecting the preview language.
    pub async fn send_action(
        &self,
        action: Action,
        params: Map<String, Value>,
        result: bool,
    ) -> Result<Value, ActionError> {
        self.inner.dispatcher.send_action(action, params, result).await
    }

    async fn emit(&self, event: BridgeEvent, args: Vec<Value>) {
        if let Err(e) = self.bus().emit(event, args).await {
            warn!(event = %event, error = %e, "Event handler failed");
        }
    }

    async fn notify_preview_element(&self) {
        let preview_id = self.preview_element();
        let message = OutboundMessage::SetPreviewElement { preview_id };
        if let Err(e) = self
            .messenger()
            .send_message(message, SendOptions::fire_and_forget())
            .await
        {
            debug!(error = %e, "Could not notify preview element");
        }
    }

    // ========================================================================
    // Preview element and language
    // ========================================================================

    pub async fn execute(
        &self,
        target: ExecuteTarget,
        params: Value,
        result: bool,
    ) -> Result<Value, ActionError> {
        Ok(self.messenger().execute(target, params, result).await?)
    }

    pub fn preview_element(&self) -> Option<String> {
        self.inner.preview_element.lock().clone()
    }

    /// Record the preview element, adopt its language and tell the host.
    ///
    /// The status cache is cleared since the language may have changed.
    pub async fn set_preview_element(&self, preview_id: Option<&str>) -> Result<(), ActionError> {
        *self.inner.preview_element.lock() = preview_id.map(str::to_string);
        if let Some(id) = preview_id {
            let status = self.element_status(id, false).await?;
            if let Some(language) = status.language.clone() {
                self.inner.dispatcher.set_language(Some(language));
            }
            self.inner.cache.invalidate(None);
        }
        self.notify_preview_element().await;
        Ok(())
    }

    pub fn preview_language(&self) -> Option<String> {
        self.inner.dispatcher.language()
    }

    // ========================================================================
    // Status
    // ========================================================================

    /// Status of `preview_id`, shared with every concurrent caller.
    pub async fn element_status(
        &self,
        preview_id: &str,
        refresh: bool,
    ) -> Result<Arc<ElementStatus>, ActionError> {
        self.inner.cache.get(preview_id, refresh).await
    }

    pub fn invalidate(&self, preview_id: Option<&str>) {
        self.inner.cache.invalidate(preview_id);
    }

    /// Refetch the status of `preview_id` and emit `StatusChange`.
    pub async fn status_changed(&self, preview_id: &str) -> Result<(), ActionError> {
        self.inner.cache.invalidate(Some(preview_id));
        let status = self.element_status(preview_id, false).await?;
        self.emit(BridgeEvent::StatusChange, vec![status_change(preview_id, &status)])
            .await;
        Ok(())
    }

    // ========================================================================
    // Dialogs
    // ========================================================================

    pub async fn request_change_set(&self, preview_ids: &[String]) -> Result<Value, ActionError> {
        self.send_action(Action::RequestChangeSet, object(json!({ "previewIds": preview_ids })), true)
            .await
    }

    pub async fn show_comparison_dialog(&self, preview_id: &str) -> Result<(), ActionError> {
        let content = self
            .send_action(Action::ShowComparisonDialog, object(json!({ "previewId": preview_id })), true)
            .await?;
        self.may_trigger_change(preview_id, content).await
    }

    pub async fn show_edit_dialog(
        &self,
        preview_id: &str,
        nested_path: Option<&[String]>,
    ) -> Result<(), ActionError> {
        let content = match nested_path {
            Some(path) if !path.is_empty() => {
                let params = object(json!({ "previewId": preview_id, "nestedComponentPath": path }));
                self.send_action(Action::EditNestedComponent, params, true).await?
            }
            _ => {
                self.send_action(Action::Edit, object(json!({ "previewId": preview_id })), true)
                    .await?
            }
        };
        self.may_trigger_change(preview_id, content).await
    }

    pub async fn show_meta_data_dialog(&self, preview_id: &str) -> Result<(), ActionError> {
        let content = self
            .send_action(Action::EditMetaData, object(json!({ "previewId": preview_id })), true)
            .await?;
        self.may_trigger_change(preview_id, content).await
    }

    pub async fn show_translation_dialog(
        &self,
        preview_id: &str,
        source: &str,
        target: &str,
    ) -> Result<(), ActionError> {
        let params = object(json!({ "previewId": preview_id, "source": source, "target": target }));
        let content = self.send_action(Action::Translation, params, true).await?;
        self.may_trigger_change(preview_id, content).await
    }

    /// Show a host message dialog. The preview language is not injected.
    pub async fn show_message(
        &self,
        message: &str,
        kind: MessageKind,
        title: Option<&str>,
    ) -> Result<Value, ActionError> {
        let params = object(json!({ "message": message, "kind": kind.as_str(), "title": title }));
        Ok(self
            .messenger()
            .send_action(Action::ShowCustomDialog, params, true)
            .await?)
    }

    pub async fn show_question(&self, message: &str, title: Option<&str>) -> Result<Value, ActionError> {
        let params = object(json!({ "message": message, "kind": "question", "title": title }));
        Ok(self
            .messenger()
            .send_action(Action::ShowCustomDialog, params, true)
            .await?)
    }

    // ========================================================================
    // Rendering and deletion
    // ========================================================================

    /// Render `preview_id`, or the project start node for `None`.
    pub async fn render_element(&self, preview_id: Option<&str>) -> Result<Value, ActionError> {
        match preview_id {
            None => {
                let result = self.send_action(Action::RenderStartNode, Map::new(), true).await?;
                if result["isException"].as_bool().unwrap_or(false) {
                    return Err(ActionError::StartNodeNotFound(
                        "No start node available! Please check your configuration or use a valid preview ID!"
                            .to_string(),
                    ));
                }
                Ok(result)
            }
            Some(id) => {
                self.send_action(Action::Render, object(json!({ "previewId": id })), true)
                    .await
            }
        }
    }

    pub async fn delete_element(&self, preview_id: &str, show_confirm_dialog: bool) -> Result<(), ActionError> {
        let status = self.element_status(preview_id, false).await?;
        let params = object(json!({ "previewId": preview_id, "showConfirmDialog": show_confirm_dialog }));
        let result = self.send_action(Action::Delete, params, true).await?;
        self.inner.cache.invalidate(None);

        if is_truthy(&result) {
            if status.is_in_navigation() {
                self.emit(BridgeEvent::NavigationChange, vec![status_value(&status)])
                    .await;
            }
            self.emit(BridgeEvent::ElementChange, vec![element_change(preview_id, Value::Null)])
                .await;
        } else {
            let message = format!(
                "Unable to delete {} \"{}\" (id:{})!",
                status.element_type.as_deref().unwrap_or_default(),
                status.display_name.as_deref().unwrap_or_default(),
                status.id_string().unwrap_or_default()
            );
            self.messenger()
                .send_subject("error", json!(message), false)
                .await?;
        }
        Ok(())
    }

    // ========================================================================
    // Nested components
    // ========================================================================

    pub async fn create_nested_component(
        &self,
        preview_id: &str,
        nested_path: &[String],
        template: &str,
    ) -> Result<(), ActionError> {
        let params = object(json!({
            "previewId": preview_id,
            "nestedComponentPath": nested_path,
            "template": template,
        }));
        let content = self.send_action(Action::CreateNestedComponent, params, true).await?;
        self.may_trigger_change(preview_id, content).await
    }

    pub async fn delete_nested_component(
        &self,
        preview_id: &str,
        nested_path: &[String],
        show_confirm_dialog: bool,
    ) -> Result<(), ActionError> {
        let params = object(json!({
            "previewId": preview_id,
            "nestedComponentPath": nested_path,
            "showConfirmDialog": show_confirm_dialog,
        }));
        let content = self.send_action(Action::DeleteNestedComponent, params, true).await?;
        self.may_trigger_change(preview_id, content).await
    }

    /// Move a nested component to `index` within its parent.
    pub async fn move_nested_component(
        &self,
        preview_id: &str,
        nested_path: &[String],
        index: usize,
    ) -> Result<(), ActionError> {
        let params = object(json!({
            "previewId": preview_id,
            "nestedComponentPath": nested_path,
            "index": index,
        }));
        let content = self.send_action(Action::TransferNestedComponent, params, true).await?;
        self.may_trigger_change(preview_id, content).await
    }

    pub async fn available_templates_for_nested_component(
        &self,
        preview_id: &str,
        nested_path: &[String],
    ) -> Result<Value, ActionError> {
        let params = object(json!({ "previewId": preview_id, "nestedComponentPath": nested_path }));
        self.send_action(Action::NestedComponentTemplates, params, true).await
    }

    pub async fn field_component_type(
        &self,
        preview_id: &str,
        nested_path: &[String],
    ) -> Result<Value, ActionError> {
        let params = object(json!({ "previewId": preview_id, "nestedComponentPath": nested_path }));
        self.send_action(Action::FieldComponentType, params, true).await
    }

    pub async fn update_field_component(
        &self,
        preview_id: &str,
        nested_path: &[String],
        value: Value,
    ) -> Result<Value, ActionError> {
        let params = object(json!({
            "previewId": preview_id,
            "nestedComponentPath": nested_path,
            "value": value,
        }));
        self.send_action(Action::UpdateFieldComponent, params, true).await
    }

    pub async fn start_inline_editing(
        &self,
        preview_id: &str,
        nested_path: &[String],
        bounds: Bounds,
    ) -> Result<Value, ActionError> {
        let params = object(json!({
            "previewId": preview_id,
            "nestedComponentPath": nested_path,
            "boundX": bounds.x,
            "boundY": bounds.y,
            "boundWidth": bounds.width,
            "boundHeight": bounds.height,
        }));
        self.send_action(Action::StartInlineEditing, params, true).await
    }

    // ========================================================================
    // Workflows and bookmarks
    // ========================================================================

    pub async fn start_workflow(&self, preview_id: &str, workflow: &str) -> Result<Value, ActionError> {
        self.inner.cache.invalidate(Some(preview_id));
        let params = object(json!({ "previewId": preview_id, "workflowUID": workflow }));
        self.send_action(Action::WorkflowStart, params, true).await
    }

    pub async fn process_workflow(&self, preview_id: &str, transition: &str) -> Result<Value, ActionError> {
        self.inner.cache.invalidate(Some(preview_id));
        let params = object(json!({ "previewId": preview_id, "transitionId": transition }));
        self.send_action(Action::WorkflowProcess, params, true).await
    }

    pub async fn toggle_bookmark(&self, preview_id: &str) -> Result<(), ActionError> {
        self.send_action(Action::ToggleBookmark, object(json!({ "previewId": preview_id })), true)
            .await?;
        self.status_changed(preview_id).await
    }

    // ========================================================================
    // Creation
    // ========================================================================

    /// Create a page below `path`. Returns the host answer with
    /// `options.result`, otherwise emits `RerenderView` and returns `None`.
    pub async fn create_page(
        &self,
        path: &str,
        uid: &str,
        template: &str,
        options: CreatePageOptions,
    ) -> Result<Option<Value>, ActionError> {
        let language = options.language.or_else(|| self.preview_language());
        let params = object(json!({
            "path": path,
            "isUidPath": true,
            "uid": uid,
            "template": template,
            "language": language,
            "showFormDialog": options.show_form_dialog,
            "forceUid": options.force_uid,
        }));
        let content = self.send_action(Action::CreatePage, params, true).await?;

        if options.force_uid && content["isException"].as_bool().unwrap_or(false) {
            return Err(ActionError::DuplicatePage {
                message: format!("Failed to create page due to duplicate element with uid '{}'.", uid),
                preview_id: content["pagePreviewId"].as_str().map(str::to_string),
            });
        }

        self.inner.cache.invalidate(None);
        self.emit(BridgeEvent::NavigationChange, vec![content["previewId"].clone()])
            .await;
        if options.result {
            return Ok(Some(content));
        }
        self.emit(BridgeEvent::RerenderView, vec![]).await;
        Ok(None)
    }

    /// Create a section next to a section or inside a page or body. Other
    /// element types are ignored.
    pub async fn create_section(
        &self,
        preview_id: &str,
        options: CreateSectionOptions,
    ) -> Result<Option<Value>, ActionError> {
        let status = self.element_status(preview_id, false).await?;
        let placement = options
            .index
            .map_or(SectionPlacement::Last, SectionPlacement::Index);
        self.inner.cache.invalidate(None);

        if status.type_matches(&["Section"]) {
            let (position, index) = match placement {
                SectionPlacement::Index(i) => ("INDEX", Some(i.to_string())),
                SectionPlacement::Last => ("AFTER", None),
            };
            let params = object(json!({
                "previewId": preview_id,
                "template": options.template,
                "sectionName": options.name,
                "position": position,
                "positionIndex": index,
            }));
            let content = self.send_action(Action::CreateSiblingSection, params, true).await?;
            if options.result {
                return Ok(Some(content));
            }
            self.emit(BridgeEvent::RerenderView, vec![]).await;
            Ok(None)
        } else if status.type_matches(&["PageRef", "Page", "Body"]) {
            let (position, index) = match placement {
                SectionPlacement::Index(i) => ("INDEX", Some(i.to_string())),
                SectionPlacement::Last => ("LAST", None),
            };
            let params = object(json!({
                "previewId": preview_id,
                "body": options.body,
                "template": options.template,
                "sectionName": options.name,
                "position": position,
                "positionIndex": index,
            }));
            let content = self.send_action(Action::CreateChildSection, params, true).await?;
            if options.result {
                return Ok(Some(content));
            }
            self.may_trigger_change(preview_id, content).await?;
            Ok(None)
        } else {
            debug!(preview_id, element_type = ?status.element_type, "Cannot create a section here");
            Ok(None)
        }
    }

    pub async fn create_dataset(
        &self,
        template: &str,
        options: CreateDatasetOptions,
    ) -> Result<Option<Value>, ActionError> {
        let language = options.language.or_else(|| self.preview_language());
        let params = object(json!({ "template": template, "language": language }));
        let content = self.send_action(Action::CreateDataset, params, true).await?;
        self.inner.cache.invalidate(None);
        if options.result {
            return Ok(Some(content));
        }
        self.emit(BridgeEvent::RerenderView, vec![]).await;
        Ok(None)
    }

    /// Open the crop dialog. A `None` resolution crops the original.
    pub async fn crop_image(
        &self,
        preview_id: &str,
        resolution: Option<&str>,
        result: bool,
    ) -> Result<Option<Value>, ActionError> {
        let params = object(json!({
            "previewId": preview_id,
            "resolution": resolution.unwrap_or("ORIGINAL"),
        }));
        let content = self.send_action(Action::CropImage, params, true).await?;
        if content.is_null() {
            return Ok(None);
        }
        if result {
            return Ok(Some(content));
        }
        self.trigger_change(preview_id, Some(content)).await?;
        Ok(None)
    }

    // ========================================================================
    // Transfers
    // ========================================================================

    /// Move or copy a section relative to `target_id`. Both ids are element
    /// ids, not preview ids. Returns whether the host accepted the transfer.
    pub async fn transfer_section(
        &self,
        section_id: &Value,
        target_id: &Value,
        options: TransferOptions,
    ) -> Result<bool, ActionError> {
        let params = object(json!({
            "sectionId": section_id,
            "targetId": target_id,
            "position": options.position.as_str(),
            "mode": options.mode.as_str(),
        }));
        let success = is_truthy(&self.send_action(Action::TransferSection, params, true).await?);
        if success && !options.skip_rerender {
            self.emit(BridgeEvent::RerenderView, vec![]).await;
        }
        Ok(success)
    }

    /// Subset of `target_ids` the host allows `section_id` to be moved to.
    pub async fn transfer_section_allowed(
        &self,
        section_id: &Value,
        target_ids: &[Value],
    ) -> Result<Vec<Value>, ActionError> {
        let params = object(json!({ "sectionId": section_id, "targetIds": target_ids }));
        match self.send_action(Action::TransferSectionAllowed, params, true).await? {
            Value::Array(allowed) => Ok(allowed),
            Value::Null => Ok(Vec::new()),
            other => Err(ActionError::InvalidResponse {
                action: Action::TransferSectionAllowed.as_str().to_string(),
                message: format!("expected a list of ids, got {}", other),
            }),
        }
    }

    // ========================================================================
    // Project info
    // ========================================================================

    pub async fn languages(&self, invalidate: bool) -> Result<Vec<String>, ActionError> {
        self.inner.project.languages(invalidate).await
    }

    pub async fn locales(&self, invalidate: bool) -> Result<Vec<LocaleEntry>, ActionError> {
        self.inner.project.locales(invalidate).await
    }

    pub async fn preview_url(&self, invalidate: bool) -> Result<Option<String>, ActionError> {
        self.inner.project.preview_url(invalidate).await
    }

    // ========================================================================
    // Change propagation
    // ========================================================================

    /// Refresh the status of `preview_id` and emit `ElementChange`, rendering
    /// the element when no content is given.
    pub async fn trigger_change(&self, preview_id: &str, content: Option<Value>) -> Result<(), ActionError> {
        self.status_changed(preview_id).await?;
        let content = match content {
            Some(content) => content,
            None => self.render_element(Some(preview_id)).await.unwrap_or_else(|e| {
                debug!(preview_id, error = %e, "Render after change failed");
                Value::Null
            }),
        };
        self.emit(BridgeEvent::ElementChange, vec![element_change(preview_id, content)])
            .await;
        Ok(())
    }

    async fn may_trigger_change(&self, preview_id: &str, content: Value) -> Result<(), ActionError> {
        if content.is_null() {
            self.status_changed(preview_id).await
        } else {
            self.trigger_change(preview_id, Some(content)).await
        }
    }

    pub async fn trigger_rerender_view(&self) {
        self.emit(BridgeEvent::RerenderView, vec![]).await;
    }

    // ========================================================================
    // Multi-perspective preview
    // ========================================================================

    async fn mpp(&self, method: &str, args: Vec<Value>) -> Result<Value, ActionError> {
        Ok(self
            .messenger()
            .send_subject("mpp", json!({ "method": method, "args": args }), true)
            .await?)
    }

    pub async fn mpp_get_parameter(&self, name: &str) -> Result<Value, ActionError> {
        self.mpp("getParameter", vec![json!(name)]).await
    }

    pub async fn mpp_get_time_parameter(&self) -> Result<Value, ActionError> {
        self.mpp("getTimeParameter", vec![]).await
    }

    pub async fn mpp_is_parameterized(&self) -> Result<Value, ActionError> {
        self.mpp("isParameterized", vec![]).await
    }

    pub async fn mpp_set_parameter(&self, name: &str, value: Value) -> Result<Value, ActionError> {
        self.mpp("setParameter", vec![json!(name), value]).await
    }

    pub async fn mpp_set_time_parameter(&self, date: Value) -> Result<Value, ActionError> {
        self.mpp("setTimeParameter", vec![date]).await
    }
}

/// Locales as reported by the host project.
#[async_trait]
impl LocaleLookup for Actions {
    async fn locale_for(&self, language: &str) -> Result<String, ChangeStreamError> {
        let locales = self
            .locales(false)
            .await
            .map_err(|e| ChangeStreamError::Http(e.to_string()))?;
        locales
            .into_iter()
            .find(|entry| entry.lang == language)
            .map(|entry| entry.locale)
            .ok_or_else(|| ChangeStreamError::UnknownLocale(language.to_string()))
    }
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|n| n != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

fn status_value(status: &ElementStatus) -> Value {
    serde_json::to_value(status).unwrap_or(Value::Null)
}

/// `ElementChange` payload.
pub fn element_change(preview_id: &str, content: Value) -> Value {
    json!({ "previewId": preview_id, "content": content })
}

/// `StatusChange` payload.
pub fn status_change(preview_id: &str, status: &ElementStatus) -> Value {
    json!({ "previewId": preview_id, "status": status_value(status) })
}

#[cfg(test)]
#[path = "actions_tests.rs"]
mod tests;
