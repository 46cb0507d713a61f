//! Keystone token handling.

use reqwest::Client;
use serde_json::json;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::config::Credentials;
use crate::error::{AuthError, Result};

/// Header carrying an issued token.
pub const SUBJECT_TOKEN_HEADER: &str = "X-Subject-Token";

/// Header carrying the token on API requests.
pub const AUTH_TOKEN_HEADER: &str = "X-Auth-Token";

/// Issues and caches Keystone v3 tokens.
///
/// A pre-issued `OS_TOKEN` is used as-is and never refreshed.
#[derive(Debug)]
pub struct KeystoneAuth {
    /// HTTP client.
    client: Client,
    /// Keystone endpoint, e.g. `https://identity.example.com/v3`.
    keystone_url: String,
    /// Credentials used for password auth.
    credentials: Credentials,
    /// Cached token.
    token: RwLock<Option<String>>,
}

impl KeystoneAuth {
    /// Creates a token provider.
    #[must_use]
    pub fn new(client: Client, keystone_url: &str, credentials: Credentials) -> Self {
        let token = credentials.token.clone().filter(|t| !t.is_empty());
        Self {
            client,
            keystone_url: keystone_url.trim_end_matches('/').to_string(),
            credentials,
            token: RwLock::new(token),
        }
    }

    /// Returns a valid token, authenticating if none is cached.
    ///
    /// # Errors
    ///
    /// Returns an error if Keystone rejects the credentials or is unreachable.
    pub async fn token(&self) -> Result<String> {
        if let Some(token) = self.token.read().await.as_ref() {
            return Ok(token.clone());
        }

        let mut slot = self.token.write().await;
        if let Some(token) = slot.as_ref() {
            return Ok(token.clone());
        }

        let token = self.authenticate().await?;
        *slot = Some(token.clone());
        Ok(token)
    }

    /// Drops a cached token after the API rejected it.
    pub async fn invalidate(&self) {
        if self.is_static() {
            warn!("Pre-issued token was rejected; it will not be refreshed");
            return;
        }
        *self.token.write().await = None;
    }

    /// Returns true if the token was supplied through the environment.
    #[must_use]
    pub fn is_static(&self) -> bool {
        self.credentials.token.as_deref().is_some_and(|t| !t.is_empty())
    }

    async fn authenticate(&self) -> Result<String> {
        debug!(
            "Requesting Keystone token for {} (tenant {})",
            self.credentials.username, self.credentials.tenant_name
        );

        let body = json!({
            "auth": {
                "identity": {
                    "methods": ["password"],
                    "password": {
                        "user": {
                            "name": self.credentials.username,
                            "domain": { "id": "default" },
                            "password": self.credentials.password,
                        }
                    }
                },
                "scope": { "project": { "id": self.credentials.tenant_id } }
            }
        });

        let response = self
            .client
            .post(format!("{}/auth/tokens", self.keystone_url))
            .json(&body)
            .send()
            .await
            .map_err(|e| AuthError::Transport {
                message: format!("Request failed: {e}"),
            })?;

        let status = response.status();
        if status.as_u16() == 401 || status.as_u16() == 403 {
            return Err(AuthError::Rejected {
                message: format!("HTTP {}", status.as_u16()),
            }
            .into());
        }
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(AuthError::InvalidResponse {
                message: format!("HTTP {}: {text}", status.as_u16()),
            }
            .into());
        }

        response
            .headers()
            .get(SUBJECT_TOKEN_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(String::from)
            .ok_or_else(|| {
                AuthError::InvalidResponse {
                    message: format!("Missing {SUBJECT_TOKEN_HEADER} header"),
                }
                .into()
            })
    }
}
