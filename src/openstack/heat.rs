//! Heat (orchestration v1) client.
//!
//! The configured heat URL already carries the tenant path, e.g.
//! `https://orchestration.example.com/v1/<tenant>`. Stacks are looked up by
//! id; Heat answers `GET /stacks/{id}` with a redirect to the canonical
//! `/stacks/{name}/{id}` form, which the HTTP client follows.

use async_trait::async_trait;
use reqwest::Method;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use std::time::Duration;
use tracing::debug;

use crate::error::{OrchestrationError, Result, StackfabError};

use super::api::OrchestrationApi;
use super::session::{ApiSession, MAX_RETRIES, RETRY_DELAY_MS, Reply, join_url};
use super::types::{Stack, StackResource};

/// Minutes Heat may spend on one stack operation before failing it.
pub const STACK_TIMEOUT_MINS: u32 = 60;

/// Body of a stack-creation response.
#[derive(Debug, Deserialize)]
struct CreatedStack {
    id: String,
}

/// Heat API client.
#[derive(Debug, Clone)]
pub struct HeatClient {
    session: ApiSession,
    base_url: String,
}

impl HeatClient {
    /// Creates a client for the given heat endpoint.
    #[must_use]
    pub fn new(session: ApiSession, heat_url: &str) -> Self {
        Self {
            session,
            base_url: heat_url.trim_end_matches('/').to_string(),
        }
    }

    fn url(&self, path: &str) -> String {
        join_url(&self.base_url, path)
    }

    async fn request(&self, method: Method, url: &str, body: Option<&Value>) -> Result<Option<Value>> {
        let mut last_error = None;

        for attempt in 0..MAX_RETRIES {
            if attempt > 0 {
                debug!("Retry attempt {attempt} of {MAX_RETRIES}");
                tokio::time::sleep(Duration::from_millis(RETRY_DELAY_MS * u64::from(attempt))).await;
            }

            match self.session.send(method.clone(), url, body).await? {
                Reply::Ok(value) => return Ok(value),
                Reply::Unauthorized => {
                    self.session.auth().invalidate().await;
                    return Err(OrchestrationError::Unauthorized {
                        message: format!("{method} {url} rejected the token"),
                    }
                    .into());
                }
                Reply::Failed { status, body } => {
                    return Err(OrchestrationError::api_error(status, body).into());
                }
                Reply::Invalid(message) => {
                    return Err(OrchestrationError::InvalidResponse { message }.into());
                }
                Reply::Transport(message) => last_error = Some(message),
            }
        }

        Err(OrchestrationError::transport(
            last_error.unwrap_or_else(|| String::from("Max retries exceeded")),
        )
        .into())
    }

    /// Canonical `/stacks/{name}/{id}` path of a stack.
    async fn stack_path(&self, stack_id: &str) -> Result<String> {
        let stack = self.get_stack(stack_id).await?;
        Ok(format!("stacks/{}/{}", stack.stack_name, stack.id))
    }
}

fn field<T: DeserializeOwned>(body: Option<Value>, key: &str) -> Result<T> {
    let value = body
        .and_then(|mut v| v.get_mut(key).map(Value::take))
        .ok_or_else(|| OrchestrationError::InvalidResponse {
            message: format!("Missing '{key}' in response"),
        })?;

    serde_json::from_value(value).map_err(|e| {
        StackfabError::from(OrchestrationError::InvalidResponse {
            message: format!("Malformed '{key}': {e}"),
        })
    })
}

#[async_trait]
impl OrchestrationApi for HeatClient {
    async fn create_stack(&self, name: &str, template: &Value) -> Result<String> {
        let body = json!({
            "stack_name": name,
            "template": template,
            "timeout_mins": STACK_TIMEOUT_MINS,
        });

        let reply = self.request(Method::POST, &self.url("stacks"), Some(&body)).await?;
        let created: CreatedStack = field(reply, "stack")?;
        debug!("Created stack {} ({})", name, created.id);
        Ok(created.id)
    }

    async fn get_stack(&self, stack_id: &str) -> Result<Stack> {
        let reply = self
            .request(Method::GET, &self.url(&format!("stacks/{stack_id}")), None)
            .await?;
        field(reply, "stack")
    }

    async fn list_resources(&self, stack_id: &str) -> Result<Vec<StackResource>> {
        let path = self.stack_path(stack_id).await?;
        let reply = self
            .request(Method::GET, &self.url(&format!("{path}/resources")), None)
            .await?;
        field(reply, "resources")
    }

    async fn update_stack(&self, stack_id: &str, template: &Value) -> Result<()> {
        let path = self.stack_path(stack_id).await?;
        let body = json!({ "template": template, "timeout_mins": STACK_TIMEOUT_MINS });
        self.request(Method::PUT, &self.url(&path), Some(&body)).await?;
        Ok(())
    }

    async fn delete_stack(&self, stack_id: &str) -> Result<()> {
        let path = self.stack_path(stack_id).await?;
        self.request(Method::DELETE, &self.url(&path), None).await?;
        Ok(())
    }
}
