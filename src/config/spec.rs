//! Configuration specification types for the provisioning system.
//!
//! The deployment file is keyed by provider name, and each provider section
//! is keyed by datacenter name, so both levels are kept as raw YAML until
//! the active provider and datacenter are known. [`FabricConfig`] is the
//! fully resolved view consumed by the rest of the crate.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Default Heat API version when `HEAT_API_VERSION` is not set.
pub const DEFAULT_HEAT_API_VERSION: &str = "1";

/// The root structure of a deployment file.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DeployFile {
    /// System-level selection.
    pub system: SystemConfig,
    /// Provider sections (and any unrelated top-level sections).
    #[serde(flatten)]
    pub sections: BTreeMap<String, serde_yaml::Value>,
}

/// Selects which provider section is active.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SystemConfig {
    /// Name of the provider section to use.
    pub provider: String,
}

/// A provider section.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProviderSection {
    /// Default datacenter and zone.
    pub params: ProviderParams,
    /// Instance defaults.
    pub deploy: DeploySettings,
    /// Datacenter sections.
    #[serde(flatten)]
    pub datacenters: BTreeMap<String, serde_yaml::Value>,
}

/// Default placement parameters.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProviderParams {
    /// Datacenter section name.
    pub dc: String,
    /// Availability zone for instances and volumes.
    pub zone: String,
}

/// Per-datacenter networking and endpoints.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub struct DatacenterConfig {
    /// Management network id.
    pub network: String,
    /// External network id used for floating IPs.
    #[serde(default)]
    pub extnet: Option<String>,
    /// Keystone endpoint.
    pub keystone: String,
    /// Neutron endpoint.
    pub neutron: String,
    /// Heat endpoint (including the tenant path).
    pub heat: String,
    /// Host interface carrying the data network.
    #[serde(default = "default_data_iface")]
    pub data_iface: String,
}

/// Instance defaults.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub struct DeploySettings {
    /// Image name or id.
    pub image: String,
    /// Volume holding the agent image, if any.
    #[serde(default)]
    pub image_volume: Option<String>,
    /// Flavor.
    pub personality: String,
    /// Key pair name.
    pub ssh: String,
    /// Login user whose authorized keys are copied to the agent user.
    pub ssh_user: String,
    /// User the workload agent runs as.
    #[serde(default = "default_agent_user")]
    pub agent_user: String,
    /// Command that starts the workload agent.
    #[serde(default = "default_agent_command")]
    pub agent_command: String,
    /// Block device backing the data volume.
    #[serde(default = "default_data_device")]
    pub data_device: String,
    /// Base directory for agent data and keys.
    #[serde(default = "default_base_dir")]
    pub base_dir: String,
}

/// Cloud credentials, read from the environment.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    /// `OS_USERNAME`.
    pub username: String,
    /// `OS_PASSWORD`.
    pub password: String,
    /// `OS_TENANT_ID`.
    pub tenant_id: String,
    /// `OS_TENANT_NAME`.
    pub tenant_name: String,
    /// `OS_TOKEN`, used directly when present.
    pub token: Option<String>,
}

/// Fully resolved configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FabricConfig {
    /// Active provider name.
    pub provider: String,
    /// Active datacenter name.
    pub dc: String,
    /// Availability zone.
    pub zone: String,
    /// Datacenter networking and endpoints.
    pub datacenter: DatacenterConfig,
    /// Instance defaults.
    pub deploy: DeploySettings,
    /// Heat API version.
    pub heat_api_version: String,
    /// Cloud credentials.
    pub credentials: Credentials,
}

fn default_data_iface() -> String {
    String::from("eth1")
}

fn default_agent_user() -> String {
    String::from("stackfab")
}

fn default_agent_command() -> String {
    String::from("stackfab-agent server")
}

fn default_data_device() -> String {
    String::from("/dev/vdb")
}

fn default_base_dir() -> String {
    String::from("/stackfab")
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("tenant_id", &self.tenant_id)
            .field("tenant_name", &self.tenant_name)
            .field("token", &self.token.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

impl FabricConfig {
    /// Returns the external network id, if configured.
    #[must_use]
    pub fn external_network(&self) -> Option<&str> {
        self.datacenter.extnet.as_deref()
    }

    /// Returns the management network id.
    #[must_use]
    pub fn manage_network(&self) -> &str {
        &self.datacenter.network
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_credentials_debug_is_redacted() {
        let creds = Credentials {
            username: String::from("admin"),
            password: String::from("hunter2"),
            tenant_id: String::from("t-1"),
            tenant_name: String::from("demo"),
            token: Some(String::from("secret-token")),
        };
        let rendered = format!("{creds:?}");
        assert!(rendered.contains("admin"));
        assert!(!rendered.contains("hunter2"));
        assert!(!rendered.contains("secret-token"));
    }

    #[test]
    fn test_datacenter_defaults() {
        let yaml = r"
network: net-1
keystone: http://keystone:5000/v3
neutron: http://neutron:9696
heat: http://heat:8004/v1/t-1
";
        let dc: DatacenterConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(dc.data_iface, "eth1");
        assert!(dc.extnet.is_none());
    }
}
