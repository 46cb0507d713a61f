//! Stack description side-table.
//!
//! Every logical resource the allocator needs to find again after creation
//! gets an entry here at plan-build time. The entries start out empty and are
//! filled in two later phases: the provisioning driver writes physical ids,
//! and the network reconciler writes subnet, address and floating address.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::collections::btree_map::Entry;

use crate::error::{PlanError, Result};

use super::template::ResourceType;

/// Role of a network port on its instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PortRole {
    /// Management network port.
    Manage,
    /// Data network port.
    Data,
}

/// Post-creation metadata for one logical resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DescriptionEntry {
    /// Resource type.
    #[serde(rename = "type")]
    pub kind: ResourceType,
    /// Physical id assigned by the cloud.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Port role.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<PortRole>,
    /// Instance ordinal within its batch.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index: Option<usize>,
    /// Logical names of the instance's ports.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ports: Vec<String>,
    /// Logical names of the instance's volumes.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub volumes: Vec<String>,
    /// Subnet id of the port's fixed address.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subnet: Option<String>,
    /// Fixed (private) address.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ip_address: Option<String>,
    /// Floating (public) address bound to the fixed address.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub floating_ip: Option<String>,
}

/// Logical name to description entry map.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StackDescription(BTreeMap<String, DescriptionEntry>);

impl DescriptionEntry {
    /// Creates an empty entry of the given type.
    #[must_use]
    pub const fn new(kind: ResourceType) -> Self {
        Self {
            kind,
            id: None,
            role: None,
            index: None,
            ports: Vec::new(),
            volumes: Vec::new(),
            subnet: None,
            ip_address: None,
            floating_ip: None,
        }
    }

    /// Creates a port entry with a role.
    #[must_use]
    pub fn port(role: PortRole) -> Self {
        let mut entry = Self::new(ResourceType::Port);
        entry.role = Some(role);
        entry
    }

    /// Creates a server entry.
    #[must_use]
    pub fn server(index: usize) -> Self {
        let mut entry = Self::new(ResourceType::Server);
        entry.index = Some(index);
        entry
    }

    /// Creates an entry recording a stack's own id.
    #[must_use]
    pub fn stack(id: impl Into<String>) -> Self {
        let mut entry = Self::new(ResourceType::Stack);
        entry.id = Some(id.into());
        entry
    }
}

impl StackDescription {
    /// Creates an empty description.
    #[must_use]
    pub const fn new() -> Self {
        Self(BTreeMap::new())
    }

    /// Inserts an entry, rejecting a logical name that is already present.
    ///
    /// # Errors
    ///
    /// Returns [`PlanError::DuplicateResource`] on a name collision.
    pub fn insert(&mut self, name: impl Into<String>, entry: DescriptionEntry) -> Result<()> {
        match self.0.entry(name.into()) {
            Entry::Occupied(e) => Err(PlanError::DuplicateResource {
                name: e.key().clone(),
            }
            .into()),
            Entry::Vacant(e) => {
                e.insert(entry);
                Ok(())
            }
        }
    }

    /// Unions another description into this one.
    ///
    /// # Errors
    ///
    /// Returns [`PlanError::DuplicateResource`] if any name is already present;
    /// in that case `self` is left unchanged.
    pub fn merge(&mut self, other: Self) -> Result<()> {
        if let Some(name) = other.0.keys().find(|k| self.0.contains_key(*k)) {
            return Err(PlanError::DuplicateResource { name: name.clone() }.into());
        }
        self.0.extend(other.0);
        Ok(())
    }

    /// Records the stack's own id under its name, replacing any previous record.
    pub fn record_stack(&mut self, stack_name: &str, stack_id: &str) {
        self.0
            .insert(stack_name.to_string(), DescriptionEntry::stack(stack_id));
    }

    /// Gets an entry by logical name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&DescriptionEntry> {
        self.0.get(name)
    }

    /// Gets a mutable entry by logical name.
    pub fn get_mut(&mut self, name: &str) -> Option<&mut DescriptionEntry> {
        self.0.get_mut(name)
    }

    /// Returns true if the logical name is present.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    /// Returns the number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns true if there are no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterates entries in logical-name order.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &DescriptionEntry)> {
        self.0.iter()
    }

    /// Returns entries of one type in logical-name order.
    pub fn entries_of(
        &self,
        kind: ResourceType,
    ) -> impl Iterator<Item = (&String, &DescriptionEntry)> + '_ {
        self.0.iter().filter(move |(_, e)| e.kind == kind)
    }

    /// Returns server entries ordered by instance ordinal.
    #[must_use]
    pub fn servers(&self) -> Vec<(&String, &DescriptionEntry)> {
        let mut servers: Vec<_> = self.entries_of(ResourceType::Server).collect();
        servers.sort_by_key(|(name, e)| (e.index.unwrap_or(usize::MAX), (*name).clone()));
        servers
    }

    /// Returns the logical names of all management ports, in server order.
    #[must_use]
    pub fn manage_ports(&self) -> Vec<String> {
        self.servers()
            .into_iter()
            .flat_map(|(_, server)| server.ports.iter())
            .filter(|port| {
                self.get(port)
                    .is_some_and(|e| e.kind == ResourceType::Port && e.role == Some(PortRole::Manage))
            })
            .cloned()
            .collect()
    }

    /// Returns the recorded stack as `(name, id)`, if any.
    #[must_use]
    pub fn stack(&self) -> Option<(&str, &str)> {
        self.entries_of(ResourceType::Stack)
            .find_map(|(name, e)| e.id.as_deref().map(|id| (name.as_str(), id)))
    }

    /// Returns the private address of a server on the given subnet.
    #[must_use]
    pub fn private_ip(&self, server: &DescriptionEntry, subnet_id: &str) -> Option<&str> {
        server
            .ports
            .iter()
            .filter_map(|p| self.get(p))
            .find(|port| port.subnet.as_deref() == Some(subnet_id))
            .and_then(|port| port.ip_address.as_deref())
    }

    /// Returns the first floating address bound to any of a server's ports.
    #[must_use]
    pub fn public_ip(&self, server: &DescriptionEntry) -> Option<&str> {
        server
            .ports
            .iter()
            .filter_map(|p| self.get(p))
            .find_map(|port| port.floating_ip.as_deref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn server_with_port(desc: &mut StackDescription, name: &str, index: usize) {
        let port = format!("port-{name}");
        let mut server = DescriptionEntry::server(index);
        server.ports.push(port.clone());
        desc.insert(name, server).unwrap();
        desc.insert(port, DescriptionEntry::port(PortRole::Manage)).unwrap();
    }

    #[test]
    fn test_servers_sorted_by_ordinal() {
        let mut desc = StackDescription::new();
        for i in [10, 2, 0] {
            server_with_port(&mut desc, &format!("inst-{i}"), i);
        }

        let order: Vec<_> = desc.servers().iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(order, vec!["inst-0", "inst-2", "inst-10"]);
        assert_eq!(
            desc.manage_ports(),
            vec!["port-inst-0", "port-inst-2", "port-inst-10"]
        );
    }

    #[test]
    fn test_address_lookup() {
        let mut desc = StackDescription::new();
        server_with_port(&mut desc, "inst-0", 0);
        let port = desc.get_mut("port-inst-0").unwrap();
        port.subnet = Some(String::from("sub-1"));
        port.ip_address = Some(String::from("10.0.0.4"));

        let server = desc.get("inst-0").unwrap().clone();
        assert_eq!(desc.private_ip(&server, "sub-1"), Some("10.0.0.4"));
        assert_eq!(desc.private_ip(&server, "sub-2"), None);
        assert_eq!(desc.public_ip(&server), None);
    }

    #[test]
    fn test_record_stack() {
        let mut desc = StackDescription::new();
        desc.record_stack("stackfab-app-BACKEND-c1", "stack-42");
        assert_eq!(desc.stack(), Some(("stackfab-app-BACKEND-c1", "stack-42")));
    }

    #[test]
    fn test_serialized_entry_omits_empty_slots() {
        let entry = DescriptionEntry::port(PortRole::Manage);
        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!(json, serde_json::json!({ "type": "OS::Neutron::Port", "role": "manage" }));
    }
}
