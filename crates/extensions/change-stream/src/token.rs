//! Secure token for the change stream socket.

use serde::Deserialize;
use tracing::debug;

use snap_protocols::ChangeStreamError;

use crate::endpoints::CaasEndpoints;

#[derive(Debug, Deserialize)]
struct SecureTokenResponse {
    securetoken: String,
}

/// Value of the `Authorization` header for CaaS requests.
pub fn authorization_header(api_key: &str) -> String {
    format!("apikey=\"{}\"", api_key)
}

/// Exchange the api key for a secure token of the collection's tenant.
pub async fn fetch_secure_token(
    client: &reqwest::Client,
    endpoints: &CaasEndpoints,
    api_key: &str,
) -> Result<String, ChangeStreamError> {
    let url = endpoints.secure_token_url();
    debug!(tenant = %endpoints.tenant(), "Fetching secure token");

    let response = client
        .get(&url)
        .header(reqwest::header::AUTHORIZATION, authorization_header(api_key))
        .send()
        .await
        .map_err(|e| ChangeStreamError::SecureToken(e.to_string()))?;

    if !response.status().is_success() {
        return Err(ChangeStreamError::SecureToken(format!(
            "{} answered {}",
            url,
            response.status()
        )));
    }

    let body: SecureTokenResponse = response
        .json()
        .await
        .map_err(|e| ChangeStreamError::SecureToken(e.to_string()))?;
    Ok(body.securetoken)
}
