//! Registry types.
//!
//! A [`ClusterRecord`] is written when a cluster's stack completes and is
//! removed when the cluster is released.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::planner::StackDescription;

/// Current version of the registry file format.
pub const REGISTRY_VERSION: &str = "1.0";

/// One allocated cluster role.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterRecord {
    /// Cluster identifier.
    pub cluster_uuid: String,
    /// Role tag the stack was built for.
    pub ctype: String,
    /// Heat stack name.
    pub stack_name: String,
    /// Heat stack id.
    pub stack_id: String,
    /// SHA-256 of the submitted template.
    pub template_hash: String,
    /// Enriched description of the stack's resources.
    pub description: StackDescription,
    /// When the stack completed.
    pub created_at: DateTime<Utc>,
}

/// Persisted form of the registry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistrySnapshot {
    /// File format version.
    pub version: String,
    /// Records by cluster id.
    pub clusters: BTreeMap<String, ClusterRecord>,
    /// When the snapshot was written.
    pub last_updated: DateTime<Utc>,
}

impl ClusterRecord {
    /// Returns the number of servers in the stack.
    #[must_use]
    pub fn server_count(&self) -> usize {
        self.description.servers().len()
    }

    /// Returns the floating addresses of the stack's servers, in server order.
    #[must_use]
    pub fn public_ips(&self) -> Vec<&str> {
        self.description
            .servers()
            .into_iter()
            .filter_map(|(_, server)| self.description.public_ip(server))
            .collect()
    }
}

impl RegistrySnapshot {
    /// Creates a snapshot of the given records.
    #[must_use]
    pub fn new(clusters: BTreeMap<String, ClusterRecord>) -> Self {
        Self {
            version: String::from(REGISTRY_VERSION),
            clusters,
            last_updated: Utc::now(),
        }
    }
}

impl Default for RegistrySnapshot {
    fn default() -> Self {
        Self::new(BTreeMap::new())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::planner::{DescriptionEntry, PortRole};

    pub(crate) fn record(cluster_uuid: &str) -> ClusterRecord {
        let mut description = StackDescription::new();
        let mut server = DescriptionEntry::server(0);
        server.ports.push(String::from("port-0"));
        description.insert("inst-0", server).unwrap();

        let mut port = DescriptionEntry::port(PortRole::Manage);
        port.floating_ip = Some(String::from("203.0.113.7"));
        description.insert("port-0", port).unwrap();
        description.record_stack("stackfab-app-BACKEND-c1", "stack-1");

        ClusterRecord {
            cluster_uuid: cluster_uuid.to_string(),
            ctype: String::from("backend"),
            stack_name: String::from("stackfab-app-BACKEND-c1"),
            stack_id: String::from("stack-1"),
            template_hash: String::from("ab12"),
            description,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_record_summaries() {
        let rec = record("c1");
        assert_eq!(rec.server_count(), 1);
        assert_eq!(rec.public_ips(), vec!["203.0.113.7"]);
    }

    #[test]
    fn test_snapshot_json_shape() {
        let mut clusters = BTreeMap::new();
        clusters.insert(String::from("c1"), record("c1"));
        let json = serde_json::to_value(RegistrySnapshot::new(clusters)).unwrap();
        assert_eq!(json["version"], REGISTRY_VERSION);
        assert_eq!(json["clusters"]["c1"]["stack_id"], "stack-1");
    }
}
