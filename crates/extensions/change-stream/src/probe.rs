//! Existence checks for CaaS documents.

use async_trait::async_trait;
use tracing::trace;

use snap_protocols::ChangeStreamError;

use crate::endpoints::CaasEndpoints;
use crate::token::authorization_header;

/// Checks whether a document is already present in the collection.
#[async_trait]
pub trait DocumentProbe: Send + Sync {
    async fn exists(&self, document_id: &str) -> Result<bool, ChangeStreamError>;
}

/// Probe backed by a GET on the document URL.
pub struct HttpProbe {
    client: reqwest::Client,
    endpoints: CaasEndpoints,
    api_key: String,
}

impl HttpProbe {
    pub fn new(client: reqwest::Client, endpoints: CaasEndpoints, api_key: impl Into<String>) -> Self {
        Self {
            client,
            endpoints,
            api_key: api_key.into(),
        }
    }
}

#[async_trait]
impl DocumentProbe for HttpProbe {
    async fn exists(&self, document_id: &str) -> Result<bool, ChangeStreamError> {
        let response = self
            .client
            .get(self.endpoints.document_url(document_id))
            .header(reqwest::header::AUTHORIZATION, authorization_header(&self.api_key))
            .send()
            .await
            .map_err(|e| ChangeStreamError::Http(e.to_string()))?;
        trace!(document_id, status = %response.status(), "Probed document");
        Ok(response.status().is_success())
    }
}
