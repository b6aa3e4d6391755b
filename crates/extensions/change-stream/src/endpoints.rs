//! URLs derived from the preview collection URL.

use url::{Position, Url};

use snap_protocols::ChangeStreamError;

/// Endpoints of one CaaS preview collection.
///
/// The tenant is always the first path segment of the collection URL.
#[derive(Debug, Clone)]
pub struct CaasEndpoints {
    collection: Url,
    tenant: String,
}

impl CaasEndpoints {
    pub fn parse(collection_url: &str) -> Result<Self, ChangeStreamError> {
        let invalid = |reason: &str| ChangeStreamError::InvalidUrl(format!("{}: {}", collection_url, reason));

        let collection =
            Url::parse(collection_url.trim_end_matches('/')).map_err(|e| invalid(&e.to_string()))?;
        if !matches!(collection.scheme(), "http" | "https") {
            return Err(invalid("scheme must be http or https"));
        }
        if collection.host_str().is_none() {
            return Err(invalid("missing host"));
        }

        let tenant = collection
            .path_segments()
            .and_then(|mut segments| segments.next())
            .filter(|segment| !segment.is_empty())
            .map(str::to_string)
            .ok_or_else(|| invalid("missing tenant path segment"))?;

        Ok(Self { collection, tenant })
    }

    pub fn tenant(&self) -> &str {
        &self.tenant
    }

    pub fn collection_url(&self) -> &str {
        self.collection.as_str()
    }

    /// `host[:port]`
    fn authority(&self) -> &str {
        &self.collection[Position::BeforeHost..Position::AfterPort]
    }

    pub fn secure_token_url(&self) -> String {
        format!(
            "{}://{}/_logic/securetoken?tenant={}",
            self.collection.scheme(),
            self.authority(),
            self.tenant
        )
    }

    pub fn socket_url(&self, secure_token: &str) -> String {
        let scheme = if self.collection.scheme() == "https" { "wss" } else { "ws" };
        format!(
            "{}://{}{}/_streams/crud?securetoken={}",
            scheme,
            self.authority(),
            self.collection.path(),
            secure_token
        )
    }

    pub fn document_url(&self, document_id: &str) -> String {
        format!("{}/{}", self.collection.as_str(), document_id)
    }
}
