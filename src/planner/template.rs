//! Heat template types.
//!
//! A [`StackPlan`] is the versioned envelope submitted to Heat. Resources are
//! kept in ordered maps so the serialized template is byte-stable for a given
//! input, which the template fingerprint relies on.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use std::collections::BTreeMap;
use std::collections::btree_map::Entry;

use crate::error::{PlanError, Result};

/// Template format version emitted in every plan.
pub const TEMPLATE_FORMAT_VERSION: &str = "2010-09-09";

/// Description emitted in every plan.
pub const TEMPLATE_DESCRIPTION: &str = "stackfab generated Heat plan";

/// Resource types this crate emits or recognizes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ResourceType {
    /// `OS::Nova::Server`.
    Server,
    /// `OS::Neutron::Port`.
    Port,
    /// `OS::Neutron::FloatingIP`.
    FloatingIp,
    /// `OS::Neutron::FloatingIPAssociation`.
    FloatingIpAssociation,
    /// `OS::Neutron::SecurityGroup`.
    SecurityGroup,
    /// `OS::Cinder::Volume`.
    Volume,
    /// `OS::Cinder::VolumeAttachment`.
    VolumeAttachment,
    /// `OS::Heat::Stack`.
    Stack,
    /// Any other type reported by Heat.
    Other(String),
}

/// A single template resource.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Resource {
    /// Resource type.
    #[serde(rename = "Type")]
    pub kind: ResourceType,
    /// Resource properties.
    #[serde(rename = "Properties", default)]
    pub properties: Map<String, Value>,
}

/// Logical name to resource map.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResourceFragment(BTreeMap<String, Resource>);

/// The versioned template envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StackPlan {
    /// Template format version.
    #[serde(rename = "AWSTemplateFormatVersion")]
    pub format_version: String,
    /// Human-readable description.
    #[serde(rename = "Description")]
    pub description: String,
    /// Template resources.
    #[serde(rename = "Resources")]
    pub resources: ResourceFragment,
    /// Template outputs.
    #[serde(rename = "Outputs", default, skip_serializing_if = "BTreeMap::is_empty")]
    pub outputs: BTreeMap<String, Value>,
}

/// How a port refers to its network.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NetworkRef<'a> {
    /// A logical resource in the same template.
    Ref(&'a str),
    /// A literal network id.
    Literal(&'a str),
}

/// Builds a `{"Ref": name}` marker resolved by Heat at apply time.
#[must_use]
pub fn reference(name: &str) -> Value {
    json!({ "Ref": name })
}

/// Builds a `{"Fn::GetAtt": [name, attribute]}` marker.
#[must_use]
pub fn get_attr(name: &str, attribute: &str) -> Value {
    json!({ "Fn::GetAtt": [name, attribute] })
}

impl ResourceType {
    /// Returns the Heat type string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Server => "OS::Nova::Server",
            Self::Port => "OS::Neutron::Port",
            Self::FloatingIp => "OS::Neutron::FloatingIP",
            Self::FloatingIpAssociation => "OS::Neutron::FloatingIPAssociation",
            Self::SecurityGroup => "OS::Neutron::SecurityGroup",
            Self::Volume => "OS::Cinder::Volume",
            Self::VolumeAttachment => "OS::Cinder::VolumeAttachment",
            Self::Stack => "OS::Heat::Stack",
            Self::Other(s) => s,
        }
    }
}

impl From<String> for ResourceType {
    fn from(s: String) -> Self {
        match s.as_str() {
            "OS::Nova::Server" => Self::Server,
            "OS::Neutron::Port" => Self::Port,
            "OS::Neutron::FloatingIP" => Self::FloatingIp,
            "OS::Neutron::FloatingIPAssociation" => Self::FloatingIpAssociation,
            "OS::Neutron::SecurityGroup" => Self::SecurityGroup,
            "OS::Cinder::Volume" => Self::Volume,
            "OS::Cinder::VolumeAttachment" => Self::VolumeAttachment,
            "OS::Heat::Stack" => Self::Stack,
            _ => Self::Other(s),
        }
    }
}

impl From<ResourceType> for String {
    fn from(kind: ResourceType) -> Self {
        match kind {
            ResourceType::Other(s) => s,
            known => known.as_str().to_string(),
        }
    }
}

impl std::fmt::Display for ResourceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Resource {
    /// Creates a resource with empty properties.
    #[must_use]
    pub fn new(kind: ResourceType) -> Self {
        Self {
            kind,
            properties: Map::new(),
        }
    }

    /// Sets a property.
    #[must_use]
    pub fn with(mut self, key: &str, value: Value) -> Self {
        self.properties.insert(key.to_string(), value);
        self
    }

    /// Returns a property value.
    #[must_use]
    pub fn property(&self, key: &str) -> Option<&Value> {
        self.properties.get(key)
    }
}

impl ResourceFragment {
    /// Creates an empty fragment.
    #[must_use]
    pub const fn new() -> Self {
        Self(BTreeMap::new())
    }

    /// Inserts a resource, rejecting a logical name that is already present.
    ///
    /// # Errors
    ///
    /// Returns [`PlanError::DuplicateResource`] on a name collision.
    pub fn insert(&mut self, name: impl Into<String>, resource: Resource) -> Result<()> {
        match self.0.entry(name.into()) {
            Entry::Occupied(e) => Err(PlanError::DuplicateResource {
                name: e.key().clone(),
            }
            .into()),
            Entry::Vacant(e) => {
                e.insert(resource);
                Ok(())
            }
        }
    }

    /// Unions another fragment into this one.
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

    /// Gets a resource by logical name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Resource> {
        self.0.get(name)
    }

    /// Returns true if the logical name is present.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    /// Returns the number of resources.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns true if the fragment has no resources.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterates resources in logical-name order.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &Resource)> {
        self.0.iter()
    }

    /// Counts resources of a type.
    #[must_use]
    pub fn count_of(&self, kind: &ResourceType) -> usize {
        self.0.values().filter(|r| &r.kind == kind).count()
    }
}

impl StackPlan {
    /// Creates an empty plan.
    #[must_use]
    pub fn new() -> Self {
        Self {
            format_version: String::from(TEMPLATE_FORMAT_VERSION),
            description: String::from(TEMPLATE_DESCRIPTION),
            resources: ResourceFragment::new(),
            outputs: BTreeMap::new(),
        }
    }

    /// Creates a plan holding the given resources.
    #[must_use]
    pub fn with_resources(resources: ResourceFragment) -> Self {
        Self {
            resources,
            ..Self::new()
        }
    }

    /// Serializes the plan into the JSON document Heat expects.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_json(&self) -> Result<Value> {
        serde_json::to_value(self).map_err(|e| {
            PlanError::Serialization {
                message: e.to_string(),
            }
            .into()
        })
    }
}

impl Default for StackPlan {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StackfabError;

    #[test]
    fn test_resource_type_round_trip_names() {
        let kind = ResourceType::from(String::from("OS::Neutron::FloatingIP"));
        assert_eq!(kind, ResourceType::FloatingIp);

        let other = ResourceType::from(String::from("OS::Swift::Container"));
        assert_eq!(other.as_str(), "OS::Swift::Container");
    }

    #[test]
    fn test_merge_rejects_duplicate_names() {
        let mut a = ResourceFragment::new();
        a.insert("sec", Resource::new(ResourceType::SecurityGroup)).unwrap();
        a.insert("ip", Resource::new(ResourceType::FloatingIp)).unwrap();

        let mut b = ResourceFragment::new();
        b.insert("port", Resource::new(ResourceType::Port)).unwrap();
        b.insert("sec", Resource::new(ResourceType::Port)).unwrap();

        let err = a.merge(b).unwrap_err();
        assert!(matches!(
            err,
            StackfabError::Plan(PlanError::DuplicateResource { ref name }) if name == "sec"
        ));

        // the failed merge left the original untouched
        assert_eq!(a.len(), 2);
        assert_eq!(a.get("sec").map(|r| &r.kind), Some(&ResourceType::SecurityGroup));
        assert!(!a.contains("port"));
    }

    #[test]
    fn test_plan_serializes_heat_envelope() {
        let mut resources = ResourceFragment::new();
        resources
            .insert(
                "p",
                Resource::new(ResourceType::Port).with("network", reference("net")),
            )
            .unwrap();

        let doc = StackPlan::with_resources(resources).to_json().unwrap();
        assert_eq!(doc["AWSTemplateFormatVersion"], "2010-09-09");
        assert_eq!(doc["Resources"]["p"]["Type"], "OS::Neutron::Port");
        assert_eq!(doc["Resources"]["p"]["Properties"]["network"]["Ref"], "net");
        assert!(doc.get("Outputs").is_none());
    }
}
