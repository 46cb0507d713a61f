//! Neutron (networking v2.0) client.

use async_trait::async_trait;
use reqwest::Method;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use std::time::Duration;
use tracing::debug;

use crate::error::{NetworkError, Result, StackfabError};

use super::api::NetworkApi;
use super::session::{ApiSession, MAX_RETRIES, RETRY_DELAY_MS, Reply, join_url};
use super::types::{FloatingIp, Port, Subnet};

/// API version path segment.
const API_VERSION: &str = "v2.0";

/// Neutron API client.
#[derive(Debug, Clone)]
pub struct NeutronClient {
    session: ApiSession,
    base_url: String,
}

impl NeutronClient {
    /// Creates a client for the given neutron endpoint, with or without the
    /// version segment.
    #[must_use]
    pub fn new(session: ApiSession, neutron_url: &str) -> Self {
        let trimmed = neutron_url.trim_end_matches('/');
        let base_url = if trimmed.ends_with(API_VERSION) {
            trimmed.to_string()
        } else {
            join_url(trimmed, API_VERSION)
        };
        Self { session, base_url }
    }

    async fn request(&self, method: Method, path: &str, body: Option<&Value>) -> Result<Option<Value>> {
        let url = join_url(&self.base_url, path);
        let mut last_error = None;

        for attempt in 0..MAX_RETRIES {
            if attempt > 0 {
                debug!("Retry attempt {attempt} of {MAX_RETRIES}");
                tokio::time::sleep(Duration::from_millis(RETRY_DELAY_MS * u64::from(attempt))).await;
            }

            match self.session.send(method.clone(), &url, body).await? {
                Reply::Ok(value) => return Ok(value),
                Reply::Unauthorized => {
                    self.session.auth().invalidate().await;
                    return Err(NetworkError::Unauthorized {
                        message: format!("{method} {url} rejected the token"),
                    }
                    .into());
                }
                Reply::Failed { status, body } => {
                    return Err(NetworkError::api_error(status, body).into());
                }
                Reply::Invalid(message) => {
                    return Err(NetworkError::InvalidResponse { message }.into());
                }
                Reply::Transport(message) => last_error = Some(message),
            }
        }

        Err(NetworkError::transport(
            last_error.unwrap_or_else(|| String::from("Max retries exceeded")),
        )
        .into())
    }

    async fn list<T: DeserializeOwned>(&self, collection: &str) -> Result<Vec<T>> {
        let body = self.request(Method::GET, collection, None).await?;
        let value = body
            .and_then(|mut v| v.get_mut(collection).map(Value::take))
            .ok_or_else(|| NetworkError::InvalidResponse {
                message: format!("Missing '{collection}' in response"),
            })?;

        serde_json::from_value(value).map_err(|e| {
            StackfabError::from(NetworkError::InvalidResponse {
                message: format!("Malformed '{collection}': {e}"),
            })
        })
    }
}

#[async_trait]
impl NetworkApi for NeutronClient {
    async fn list_subnets(&self) -> Result<Vec<Subnet>> {
        self.list("subnets").await
    }

    async fn list_floatingips(&self) -> Result<Vec<FloatingIp>> {
        self.list("floatingips").await
    }

    async fn list_ports(&self) -> Result<Vec<Port>> {
        self.list("ports").await
    }

    async fn disassociate_floatingip(&self, floatingip_id: &str) -> Result<()> {
        debug!("Disassociating floating IP {}", floatingip_id);
        let body = json!({ "floatingip": { "port_id": null } });
        self.request(
            Method::PUT,
            &format!("floatingips/{floatingip_id}"),
            Some(&body),
        )
        .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::openstack::auth::KeystoneAuth;
    use crate::openstack::auth::tests::credentials;
    use reqwest::Client;
    use std::sync::Arc;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client(base: &str) -> NeutronClient {
        let auth = KeystoneAuth::new(Client::new(), "http://127.0.0.1:9", credentials(Some("tok")));
        NeutronClient::new(ApiSession::new(Client::new(), Arc::new(auth)), base)
    }

    #[test]
    fn test_version_segment_added_once() {
        assert_eq!(client("http://n:9696").base_url, "http://n:9696/v2.0");
        assert_eq!(client("http://n:9696/v2.0/").base_url, "http://n:9696/v2.0");
    }

    #[tokio::test]
    async fn test_list_ports() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v2.0/ports"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "ports": [{
                    "id": "p-1",
                    "name": "stackfab-port-x",
                    "network_id": "net-manage",
                    "fixed_ips": [{ "subnet_id": "sub-1", "ip_address": "10.0.0.5" }],
                    "admin_state_up": true
                }]
            })))
            .mount(&server)
            .await;

        let ports = client(&server.uri()).list_ports().await.unwrap();
        assert_eq!(ports.len(), 1);
        assert_eq!(ports[0].fixed_ips[0].ip_address, "10.0.0.5");
    }

    #[tokio::test]
    async fn test_disassociate_clears_port() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/v2.0/floatingips/fip-1"))
            .and(body_json(json!({ "floatingip": { "port_id": null } })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "floatingip": { "id": "fip-1", "floating_ip_address": "203.0.113.7" }
            })))
            .expect(1)
            .mount(&server)
            .await;

        client(&server.uri())
            .disassociate_floatingip("fip-1")
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_missing_collection_is_invalid() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "other": [] })))
            .mount(&server)
            .await;

        let err = client(&server.uri()).list_subnets().await.unwrap_err();
        assert!(matches!(
            err,
            StackfabError::Network(NetworkError::InvalidResponse { .. })
        ));
    }
}
