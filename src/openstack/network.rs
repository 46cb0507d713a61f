//! Network reconciliation.
//!
//! After a stack completes, its ports exist in Neutron but the description
//! only knows their logical names. The reconciler matches ports by name and
//! records subnet, fixed address and any floating address bound to it.

use std::collections::HashMap;
use tracing::{debug, info};

use crate::error::{NetworkError, Result};
use crate::planner::StackDescription;

use super::api::NetworkApi;
use super::types::SubnetInfo;

/// Enriches descriptions with Neutron addressing.
#[derive(Debug)]
pub struct NetworkReconciler<'a, N: ?Sized> {
    api: &'a N,
}

impl<'a, N: NetworkApi + ?Sized> NetworkReconciler<'a, N> {
    /// Creates a reconciler.
    #[must_use]
    pub const fn new(api: &'a N) -> Self {
        Self { api }
    }

    /// Writes subnet, private address and floating address into every port
    /// entry whose logical name matches a Neutron port name.
    ///
    /// # Errors
    ///
    /// Returns an error if a listing fails.
    pub async fn enrich(&self, mut description: StackDescription) -> Result<StackDescription> {
        let floating: HashMap<String, String> = self
            .api
            .list_floatingips()
            .await?
            .into_iter()
            .filter_map(|fip| {
                fip.fixed_ip_address
                    .map(|fixed| (fixed, fip.floating_ip_address))
            })
            .collect();

        let mut matched = 0usize;
        for port in self.api.list_ports().await? {
            if port.name.is_empty() {
                continue;
            }
            let Some(entry) = description.get_mut(&port.name) else {
                continue;
            };
            let Some(fixed) = port.fixed_ips.into_iter().next() else {
                debug!("Port {} has no fixed address yet", port.name);
                continue;
            };

            entry.floating_ip = floating.get(&fixed.ip_address).cloned();
            entry.subnet = Some(fixed.subnet_id);
            entry.ip_address = Some(fixed.ip_address);
            matched += 1;
        }

        debug!(
            "Reconciled {} ports ({} floating addresses known)",
            matched,
            floating.len()
        );
        Ok(description)
    }

    /// Returns the first subnet on the given network.
    ///
    /// # Errors
    ///
    /// Returns [`NetworkError::SubnetNotFound`] if the network has no subnet.
    pub async fn collect_subnet_info(&self, network_id: &str) -> Result<SubnetInfo> {
        let subnet = self
            .api
            .list_subnets()
            .await?
            .into_iter()
            .find(|s| s.network_id == network_id)
            .ok_or_else(|| NetworkError::SubnetNotFound {
                network_id: network_id.to_string(),
            })?;

        info!(
            "Using subnet {} ({}) on network {}",
            subnet.id, subnet.cidr, network_id
        );
        Ok(subnet.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StackfabError;
    use crate::openstack::api::MockNetworkApi;
    use crate::openstack::types::{FixedIp, FloatingIp, Port, Subnet};
    use crate::planner::{DescriptionEntry, PortRole};

    fn port(name: &str, ip: &str) -> Port {
        Port {
            id: format!("id-{name}"),
            name: name.to_string(),
            network_id: String::from("net-manage"),
            fixed_ips: vec![FixedIp {
                subnet_id: String::from("sub-1"),
                ip_address: ip.to_string(),
            }],
        }
    }

    fn description() -> StackDescription {
        let mut desc = StackDescription::new();
        desc.insert("port-a", DescriptionEntry::port(PortRole::Manage))
            .unwrap();
        desc.insert("port-b", DescriptionEntry::port(PortRole::Manage))
            .unwrap();
        desc
    }

    #[tokio::test]
    async fn test_floating_ip_only_when_mapped() {
        let mut api = MockNetworkApi::new();
        api.expect_list_floatingips().times(1).returning(|| {
            Ok(vec![
                FloatingIp {
                    id: String::from("fip-1"),
                    floating_ip_address: String::from("203.0.113.7"),
                    fixed_ip_address: Some(String::from("10.0.0.5")),
                    port_id: Some(String::from("id-port-a")),
                },
                FloatingIp {
                    id: String::from("fip-2"),
                    floating_ip_address: String::from("203.0.113.8"),
                    fixed_ip_address: None,
                    port_id: None,
                },
            ])
        });
        api.expect_list_ports().times(1).returning(|| {
            Ok(vec![
                port("port-a", "10.0.0.5"),
                port("port-b", "10.0.0.6"),
                port("someone-else", "10.0.0.9"),
            ])
        });

        let desc = NetworkReconciler::new(&api)
            .enrich(description())
            .await
            .unwrap();

        let a = desc.get("port-a").unwrap();
        assert_eq!(a.ip_address.as_deref(), Some("10.0.0.5"));
        assert_eq!(a.subnet.as_deref(), Some("sub-1"));
        assert_eq!(a.floating_ip.as_deref(), Some("203.0.113.7"));

        let b = desc.get("port-b").unwrap();
        assert_eq!(b.ip_address.as_deref(), Some("10.0.0.6"));
        assert_eq!(b.floating_ip, None);

        assert!(!desc.contains("someone-else"));
    }

    #[tokio::test]
    async fn test_listing_failure_propagates() {
        let mut api = MockNetworkApi::new();
        api.expect_list_floatingips()
            .returning(|| Err(NetworkError::transport("reset").into()));
        api.expect_list_ports().never();

        let result = NetworkReconciler::new(&api).enrich(description()).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_subnet_selection() {
        let mut api = MockNetworkApi::new();
        api.expect_list_subnets().returning(|| {
            Ok(vec![
                Subnet {
                    id: String::from("sub-ext"),
                    name: String::new(),
                    network_id: String::from("net-external"),
                    cidr: String::from("203.0.113.0/24"),
                    gateway_ip: None,
                },
                Subnet {
                    id: String::from("sub-1"),
                    name: String::from("manage"),
                    network_id: String::from("net-manage"),
                    cidr: String::from("10.0.0.0/24"),
                    gateway_ip: Some(String::from("10.0.0.1")),
                },
            ])
        });

        let reconciler = NetworkReconciler::new(&api);
        let info = reconciler.collect_subnet_info("net-manage").await.unwrap();
        assert_eq!(info.id, "sub-1");
        assert_eq!(info.gateway.as_deref(), Some("10.0.0.1"));

        let err = reconciler.collect_subnet_info("net-nope").await.unwrap_err();
        assert!(matches!(
            err,
            StackfabError::Network(NetworkError::SubnetNotFound { .. })
        ));
    }
}
