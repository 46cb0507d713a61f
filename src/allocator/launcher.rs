//! Workload hand-off.
//!
//! Once a stack is up, each requested container is passed to a
//! [`WorkloadLauncher`] together with the networking resolved for the
//! instance that will run it.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use tokio::sync::Mutex;
use tracing::debug;

use crate::error::Result;

/// A requested container.
///
/// Only the port fields are interpreted here; everything else is passed
/// through to the launcher untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ContainerInfo {
    /// Port mappings, `"port"` or `"host:container"`.
    #[serde(default, deserialize_with = "port_list")]
    pub ports: Vec<String>,
    /// Exposed ports, `"port"` or `"min-max"`.
    #[serde(default, deserialize_with = "port_list")]
    pub exposed: Vec<String>,
    /// Remaining launcher-specific fields.
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

/// A started container.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerHandle {
    /// Launcher-assigned identifier.
    pub id: String,
    /// Address the container is reachable at.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
}

/// Result of one launch.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LaunchOutcome {
    /// The started container, if the launcher started one.
    pub container: Option<ContainerHandle>,
    /// Volume mounts the container registered.
    pub mounts: BTreeMap<String, Value>,
}

/// Starts containers on provisioned instances.
#[async_trait]
pub trait WorkloadLauncher: Send + Sync {
    /// Starts `container` with the given host networking options.
    async fn execute_docker_containers(
        &self,
        container: &ContainerInfo,
        host_opts: &[String],
        private_ip: Option<&str>,
        public_ip: Option<&str>,
    ) -> Result<LaunchOutcome>;
}

/// Parameters of one launch call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LaunchRecord {
    /// The requested container.
    pub container: ContainerInfo,
    /// Host networking options.
    pub host_opts: Vec<String>,
    /// Private address of the instance.
    pub private_ip: Option<String>,
    /// Floating address of the instance.
    pub public_ip: Option<String>,
}

/// A launcher that records its calls instead of starting anything.
#[derive(Debug, Default)]
pub struct RecordingLauncher {
    calls: Mutex<Vec<LaunchRecord>>,
}

impl RecordingLauncher {
    /// Creates an empty recorder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the recorded calls in order.
    pub async fn calls(&self) -> Vec<LaunchRecord> {
        self.calls.lock().await.clone()
    }
}

#[async_trait]
impl WorkloadLauncher for RecordingLauncher {
    async fn execute_docker_containers(
        &self,
        container: &ContainerInfo,
        host_opts: &[String],
        private_ip: Option<&str>,
        public_ip: Option<&str>,
    ) -> Result<LaunchOutcome> {
        let mut calls = self.calls.lock().await;
        let id = format!("recorded-{}", calls.len());
        debug!(
            "Recording launch {} (private: {:?}, public: {:?})",
            id, private_ip, public_ip
        );

        calls.push(LaunchRecord {
            container: container.clone(),
            host_opts: host_opts.to_vec(),
            private_ip: private_ip.map(String::from),
            public_ip: public_ip.map(String::from),
        });

        Ok(LaunchOutcome {
            container: Some(ContainerHandle {
                id,
                host: public_ip.or(private_ip).map(String::from),
            }),
            mounts: BTreeMap::new(),
        })
    }
}

/// Port entries may be written as numbers or strings.
#[derive(Deserialize)]
#[serde(untagged)]
enum PortEntry {
    Number(u64),
    Text(String),
}

fn port_list<'de, D>(deserializer: D) -> std::result::Result<Vec<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let entries = Vec::<PortEntry>::deserialize(deserializer)?;
    Ok(entries
        .into_iter()
        .map(|entry| match entry {
            PortEntry::Number(n) => n.to_string(),
            PortEntry::Text(s) => s,
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_container_info_from_yaml() {
        let yaml = r#"
- image: ferry/hadoop
  ports: ["8080:80", 22]
  exposed: ["50000-50010"]
  volumes: ["/data"]
- image: ferry/client
"#;
        let containers: Vec<ContainerInfo> = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(containers[0].ports, vec!["8080:80", "22"]);
        assert_eq!(containers[0].exposed, vec!["50000-50010"]);
        assert_eq!(containers[0].extra["image"], "ferry/hadoop");
        assert!(containers[1].ports.is_empty());
    }

    #[tokio::test]
    async fn test_recording_launcher() {
        let launcher = RecordingLauncher::new();
        let outcome = launcher
            .execute_docker_containers(
                &ContainerInfo::default(),
                &[String::from("lxc.network.type = phys")],
                Some("10.0.0.5"),
                None,
            )
            .await
            .unwrap();

        assert_eq!(
            outcome.container.and_then(|c| c.host),
            Some(String::from("10.0.0.5"))
        );
        let calls = launcher.calls().await;
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].host_opts.len(), 1);
    }
}
