//! In-memory cloud used by allocation tests.
//!
//! Stacks complete (or fail) immediately. Every template resource is
//! realized as `phys-{logical name}`; ports receive sequential addresses on
//! one subnet, and floating IPs are bound to the port their association
//! references.

use async_trait::async_trait;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Mutex;

use crate::error::{OrchestrationError, Result};
use crate::planner::ResourceType;

use super::api::{NetworkApi, OrchestrationApi};
use super::types::{FixedIp, FloatingIp, Port, Stack, StackResource, Subnet};

/// Subnet every fake port lives on.
pub(crate) const FAKE_SUBNET: &str = "sub-manage";

#[derive(Debug, Default)]
struct FakeState {
    stacks: BTreeMap<String, (String, Value)>,
    disassociated: Vec<String>,
    deleted: Vec<String>,
}

/// A cloud that realizes templates in memory.
#[derive(Debug)]
pub(crate) struct FakeCloud {
    manage_network: String,
    final_status: String,
    state: Mutex<FakeState>,
}

impl FakeCloud {
    pub(crate) fn new(manage_network: &str) -> Self {
        Self {
            manage_network: manage_network.to_string(),
            final_status: String::from("CREATE_COMPLETE"),
            state: Mutex::new(FakeState::default()),
        }
    }

    pub(crate) fn failing(manage_network: &str) -> Self {
        Self {
            final_status: String::from("CREATE_FAILED"),
            ..Self::new(manage_network)
        }
    }

    pub(crate) fn stack_count(&self) -> usize {
        self.state.lock().unwrap().stacks.len()
    }

    pub(crate) fn disassociated(&self) -> Vec<String> {
        self.state.lock().unwrap().disassociated.clone()
    }

    pub(crate) fn deleted(&self) -> Vec<String> {
        self.state.lock().unwrap().deleted.clone()
    }

    /// All template resources across stacks, as `(name, type, properties)`.
    fn resources(&self) -> Vec<(String, ResourceType, Value)> {
        let state = self.state.lock().unwrap();
        state
            .stacks
            .values()
            .flat_map(|(_, template)| {
                template["Resources"]
                    .as_object()
                    .into_iter()
                    .flatten()
                    .map(|(name, r)| {
                        let kind = ResourceType::from(r["Type"].as_str().unwrap_or_default().to_string());
                        (name.clone(), kind, r["Properties"].clone())
                    })
                    .collect::<Vec<_>>()
            })
            .collect()
    }

    fn port_addresses(&self) -> BTreeMap<String, String> {
        self.resources()
            .into_iter()
            .filter(|(_, kind, _)| *kind == ResourceType::Port)
            .enumerate()
            .map(|(i, (name, _, _))| (name, format!("10.0.0.{}", i + 10)))
            .collect()
    }
}

#[async_trait]
impl OrchestrationApi for FakeCloud {
    async fn create_stack(&self, name: &str, template: &Value) -> Result<String> {
        let mut state = self.state.lock().unwrap();
        let id = format!("stack-{}", state.stacks.len() + 1);
        state
            .stacks
            .insert(id.clone(), (name.to_string(), template.clone()));
        Ok(id)
    }

    async fn get_stack(&self, stack_id: &str) -> Result<Stack> {
        let state = self.state.lock().unwrap();
        let (name, _) = state
            .stacks
            .get(stack_id)
            .ok_or_else(|| OrchestrationError::api_error(404, stack_id))?;
        Ok(Stack {
            id: stack_id.to_string(),
            stack_name: name.clone(),
            stack_status: self.final_status.clone(),
            stack_status_reason: None,
        })
    }

    async fn list_resources(&self, stack_id: &str) -> Result<Vec<StackResource>> {
        let state = self.state.lock().unwrap();
        let (_, template) = state
            .stacks
            .get(stack_id)
            .ok_or_else(|| OrchestrationError::api_error(404, stack_id))?;
        Ok(template["Resources"]
            .as_object()
            .into_iter()
            .flatten()
            .map(|(name, r)| StackResource {
                logical_resource_id: name.clone(),
                physical_resource_id: format!("phys-{name}"),
                resource_type: ResourceType::from(r["Type"].as_str().unwrap_or_default().to_string()),
            })
            .collect())
    }

    async fn update_stack(&self, stack_id: &str, template: &Value) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        if let Some(entry) = state.stacks.get_mut(stack_id) {
            entry.1 = template.clone();
        }
        Ok(())
    }

    async fn delete_stack(&self, stack_id: &str) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.stacks.remove(stack_id);
        state.deleted.push(stack_id.to_string());
        Ok(())
    }
}

#[async_trait]
impl NetworkApi for FakeCloud {
    async fn list_subnets(&self) -> Result<Vec<Subnet>> {
        Ok(vec![Subnet {
            id: String::from(FAKE_SUBNET),
            name: String::from("manage"),
            network_id: self.manage_network.clone(),
            cidr: String::from("10.0.0.0/24"),
            gateway_ip: Some(String::from("10.0.0.1")),
        }])
    }

    async fn list_floatingips(&self) -> Result<Vec<FloatingIp>> {
        let addresses = self.port_addresses();
        let disassociated = self.disassociated();

        Ok(self
            .resources()
            .into_iter()
            .filter(|(_, kind, _)| *kind == ResourceType::FloatingIpAssociation)
            .enumerate()
            .filter_map(|(i, (_, _, props))| {
                let ip = props["floatingip_id"]["Ref"].as_str()?.to_string();
                let port = props["port_id"]["Ref"].as_str()?;
                let id = format!("phys-{ip}");
                let bound = !disassociated.contains(&id);
                Some(FloatingIp {
                    id,
                    floating_ip_address: format!("203.0.113.{}", i + 10),
                    fixed_ip_address: addresses.get(port).cloned().filter(|_| bound),
                    port_id: bound.then(|| format!("phys-{port}")),
                })
            })
            .collect())
    }

    async fn list_ports(&self) -> Result<Vec<Port>> {
        Ok(self
            .port_addresses()
            .into_iter()
            .map(|(name, ip)| Port {
                id: format!("phys-{name}"),
                name,
                network_id: self.manage_network.clone(),
                fixed_ips: vec![FixedIp {
                    subnet_id: String::from(FAKE_SUBNET),
                    ip_address: ip,
                }],
            })
            .collect())
    }

    async fn disassociate_floatingip(&self, floatingip_id: &str) -> Result<()> {
        self.state
            .lock()
            .unwrap()
            .disassociated
            .push(floatingip_id.to_string());
        Ok(())
    }
}
