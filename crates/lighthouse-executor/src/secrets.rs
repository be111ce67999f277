//! HTTP secret store client.

use async_trait::async_trait;
use lighthouse_core::secret::SecretStore;
use lighthouse_core::{Error, Result};
use reqwest::StatusCode;
use serde::Deserialize;
use tracing::debug;

/// Reads secrets from a key/value service over HTTP.
///
/// `GET {base_url}/secrets/{name}` must answer `{"value": "..."}`, or 404 when
/// the secret does not exist.
pub struct HttpSecretStore {
    client: reqwest::Client,
    base_url: String,
    token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SecretResponse {
    value: String,
}

impl HttpSecretStore {
    pub fn new(base_url: impl Into<String>, token: Option<String>) -> Self {
        Self::with_client(reqwest::Client::new(), base_url, token)
    }

    /// Create with a custom HTTP client.
    pub fn with_client(
        client: reqwest::Client,
        base_url: impl Into<String>,
        token: Option<String>,
    ) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self {
            client,
            base_url,
            token,
        }
    }

    fn secret_url(&self, name: &str) -> String {
        format!("{}/secrets/{}", self.base_url, urlencoding::encode(name))
    }
}

#[async_trait]
impl SecretStore for HttpSecretStore {
    async fn get(&self, name: &str) -> Result<String> {
        debug!(secret = %name, "Looking up secret");

        let mut request = self.client.get(self.secret_url(name));
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let response = request
            .send()
            .await
            .map_err(|e| Error::Internal(format!("secret store request failed: {}", e)))?;

        match response.status() {
            StatusCode::NOT_FOUND => Err(Error::NotFound(format!("secret {}", name))),
            status if !status.is_success() => Err(Error::Internal(format!(
                "secret store returned {} for {}",
                status, name
            ))),
            _ => {
                let body: SecretResponse = response.json().await.map_err(|e| {
                    Error::Internal(format!("invalid secret store response: {}", e))
                })?;
                Ok(body.value)
            }
        }
    }
}
