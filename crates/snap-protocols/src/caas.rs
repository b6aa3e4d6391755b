//! Seams between the preview and the CaaS change stream.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::ChangeStreamError;

/// A project language together with its locale.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocaleEntry {
    pub lang: String,
    pub locale: String,
}

/// Maps a preview language to the locale used in CaaS document ids.
#[async_trait]
pub trait LocaleLookup: Send + Sync {
    async fn locale_for(&self, language: &str) -> Result<String, ChangeStreamError>;
}

/// Waits for CaaS documents to reflect a change.
#[async_trait]
pub trait DocumentWaiter: Send + Sync {
    /// Resolve once the document of `preview_id` is inserted or replaced.
    async fn wait_for_document_update(
        &self,
        preview_id: &str,
        language: &str,
    ) -> Result<(), ChangeStreamError>;

    /// Like [`wait_for_document_update`](Self::wait_for_document_update), but
    /// resolves immediately if the document already exists.
    async fn wait_for_document_insert(
        &self,
        preview_id: &str,
        language: &str,
    ) -> Result<(), ChangeStreamError>;
}
