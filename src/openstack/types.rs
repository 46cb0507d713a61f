//! Heat and Neutron wire types.
//!
//! Only the fields this crate reads are modeled; unknown fields are ignored.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::planner::ResourceType;

/// Coarse stack status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StackStatus {
    /// An operation is still running.
    InProgress,
    /// The last operation completed.
    Complete,
    /// The last operation failed.
    Failed,
}

impl StackStatus {
    /// Parses a Heat status such as `CREATE_IN_PROGRESS` by its suffix.
    ///
    /// Anything not ending in `COMPLETE` or `FAILED` is treated as in
    /// progress.
    #[must_use]
    pub fn from_heat(status: &str) -> Self {
        if status.ends_with("COMPLETE") {
            Self::Complete
        } else if status.ends_with("FAILED") {
            Self::Failed
        } else {
            Self::InProgress
        }
    }

    /// Returns true if the status is final.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Complete | Self::Failed)
    }
}

impl fmt::Display for StackStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InProgress => write!(f, "IN_PROGRESS"),
            Self::Complete => write!(f, "COMPLETE"),
            Self::Failed => write!(f, "FAILED"),
        }
    }
}

/// A Heat stack.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stack {
    /// Stack id.
    pub id: String,
    /// Stack name.
    #[serde(default)]
    pub stack_name: String,
    /// Full status, e.g. `CREATE_COMPLETE`.
    #[serde(default)]
    pub stack_status: String,
    /// Reason attached to the status.
    #[serde(default)]
    pub stack_status_reason: Option<String>,
}

impl Stack {
    /// Returns the coarse status.
    #[must_use]
    pub fn status(&self) -> StackStatus {
        StackStatus::from_heat(&self.stack_status)
    }
}

/// A resource realized by a stack.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StackResource {
    /// Logical name from the template.
    pub logical_resource_id: String,
    /// Physical id assigned by the cloud.
    #[serde(default)]
    pub physical_resource_id: String,
    /// Resource type.
    pub resource_type: ResourceType,
}

/// A Neutron subnet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subnet {
    /// Subnet id.
    pub id: String,
    /// Subnet name.
    #[serde(default)]
    pub name: String,
    /// Owning network.
    pub network_id: String,
    /// Address range in CIDR form.
    pub cidr: String,
    /// Gateway address.
    #[serde(default)]
    pub gateway_ip: Option<String>,
}

/// The management subnet shared by every instance of a deployment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubnetInfo {
    /// Subnet id.
    pub id: String,
    /// Address range in CIDR form.
    pub cidr: String,
    /// Gateway address.
    pub gateway: Option<String>,
}

impl SubnetInfo {
    /// Returns the prefix length of the CIDR, e.g. `24` for `10.0.0.0/24`.
    #[must_use]
    pub fn prefix_len(&self) -> Option<u8> {
        self.cidr.split_once('/').and_then(|(_, p)| p.parse().ok())
    }
}

impl From<Subnet> for SubnetInfo {
    fn from(subnet: Subnet) -> Self {
        Self {
            id: subnet.id,
            cidr: subnet.cidr,
            gateway: subnet.gateway_ip,
        }
    }
}

/// A Neutron floating IP.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FloatingIp {
    /// Floating IP id.
    pub id: String,
    /// Public address.
    pub floating_ip_address: String,
    /// Private address it is bound to.
    #[serde(default)]
    pub fixed_ip_address: Option<String>,
    /// Port it is bound to.
    #[serde(default)]
    pub port_id: Option<String>,
}

/// A fixed address on a port.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FixedIp {
    /// Subnet the address belongs to.
    pub subnet_id: String,
    /// The address.
    pub ip_address: String,
}

/// A Neutron port.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Port {
    /// Port id.
    pub id: String,
    /// Port name.
    #[serde(default)]
    pub name: String,
    /// Owning network.
    #[serde(default)]
    pub network_id: String,
    /// Fixed addresses.
    #[serde(default)]
    pub fixed_ips: Vec<FixedIp>,
}
