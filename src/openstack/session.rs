//! Authenticated HTTP session shared by the Heat and Neutron clients.

use reqwest::{Client, Method, header};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::trace;

use crate::error::{OrchestrationError, Result};

use super::auth::{AUTH_TOKEN_HEADER, KeystoneAuth};

/// Default request timeout in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Maximum number of attempts for transport failures.
pub(crate) const MAX_RETRIES: u32 = 3;

/// Delay between retries in milliseconds.
pub(crate) const RETRY_DELAY_MS: u64 = 1000;

/// Outcome of a single request, before it is mapped to an API error.
#[derive(Debug)]
pub(crate) enum Reply {
    /// 2xx, with the parsed body if there was one.
    Ok(Option<Value>),
    /// 401.
    Unauthorized,
    /// Any other non-2xx status.
    Failed {
        /// HTTP status.
        status: u16,
        /// Response body.
        body: String,
    },
    /// 2xx with a body that is not JSON.
    Invalid(String),
    /// The request never produced a response.
    Transport(String),
}

/// HTTP client plus token provider.
#[derive(Debug, Clone)]
pub struct ApiSession {
    client: Client,
    auth: Arc<KeystoneAuth>,
}

/// Builds the HTTP client used by every API client.
///
/// # Errors
///
/// Returns an error if the HTTP client cannot be created.
pub fn http_client(timeout_secs: u64) -> Result<Client> {
    Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| OrchestrationError::transport(format!("Failed to create HTTP client: {e}")).into())
}

impl ApiSession {
    /// Creates a session.
    #[must_use]
    pub const fn new(client: Client, auth: Arc<KeystoneAuth>) -> Self {
        Self { client, auth }
    }

    /// Returns the token provider.
    #[must_use]
    pub fn auth(&self) -> &KeystoneAuth {
        &self.auth
    }

    /// Sends one request with the current token.
    ///
    /// Only token acquisition fails with `Err`; every HTTP outcome is a [`Reply`].
    pub(crate) async fn send(&self, method: Method, url: &str, body: Option<&Value>) -> Result<Reply> {
        let token = self.auth.token().await?;
        trace!("{} {}", method, url);

        let mut request = self
            .client
            .request(method, url)
            .header(AUTH_TOKEN_HEADER, token)
            .header(header::ACCEPT, "application/json");
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = match request.send().await {
            Ok(response) => response,
            Err(e) => return Ok(Reply::Transport(format!("Request failed: {e}"))),
        };

        let status = response.status();
        if status.as_u16() == 401 {
            return Ok(Reply::Unauthorized);
        }

        let text = match response.text().await {
            Ok(text) => text,
            Err(e) => return Ok(Reply::Transport(format!("Failed to read response: {e}"))),
        };

        if !status.is_success() {
            return Ok(Reply::Failed {
                status: status.as_u16(),
                body: text,
            });
        }

        if text.trim().is_empty() {
            return Ok(Reply::Ok(None));
        }

        Ok(serde_json::from_str(&text).map_or_else(
            |e| Reply::Invalid(format!("Failed to parse response: {e}")),
            |value| Reply::Ok(Some(value)),
        ))
    }
}

/// Joins a base URL and a path with exactly one slash.
pub(crate) fn join_url(base: &str, path: &str) -> String {
    format!("{}/{}", base.trim_end_matches('/'), path.trim_start_matches('/'))
}
