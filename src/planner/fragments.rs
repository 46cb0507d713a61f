//! Plan fragment builders.
//!
//! Each builder returns a [`Fragment`]: the template resources it produces
//! plus the description entries the allocator will need after creation.
//! Builders are pure; the only state they read is the instance defaults
//! captured in [`InstanceSettings`].

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::config::FabricConfig;
use crate::error::{PlanError, Result};

use super::description::{DescriptionEntry, PortRole, StackDescription};
use super::template::{NetworkRef, Resource, ResourceFragment, ResourceType, get_attr, reference};

/// Device path block-storage attachments are exposed at.
pub const ATTACHMENT_MOUNT_POINT: &str = "/dev/vdc";

/// Source prefix for the baseline security rules.
const ANY_ADDRESS: &str = "0.0.0.0/0";

/// An inclusive TCP port range opened in a security group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PortRange {
    /// Lowest port.
    pub min: u16,
    /// Highest port.
    pub max: u16,
}

/// Commands run on first boot of every instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BootScript {
    /// Block device formatted and mounted as the data volume.
    pub data_device: String,
    /// Base directory for agent data and keys.
    pub base_dir: String,
    /// Login user whose authorized keys are copied.
    pub ssh_user: String,
    /// User the agent runs as.
    pub agent_user: String,
    /// Command that starts the agent.
    pub agent_command: String,
    /// Interface brought up for the data network.
    pub data_iface: String,
}

/// Instance defaults shared by every builder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstanceSettings {
    /// Image name or id.
    pub image: String,
    /// Flavor.
    pub flavor: String,
    /// Key pair name.
    pub key_name: String,
    /// Availability zone.
    pub zone: String,
    /// External network for floating IPs.
    pub external_network: Option<String>,
    /// First-boot script.
    pub boot: BootScript,
}

/// Template resources plus their description entries.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Fragment {
    /// Template resources.
    pub resources: ResourceFragment,
    /// Description entries.
    pub description: StackDescription,
}

/// Builds plan fragments from instance defaults.
#[derive(Debug, Clone, Copy)]
pub struct FragmentBuilder<'a> {
    settings: &'a InstanceSettings,
}

impl PortRange {
    /// Creates a range.
    #[must_use]
    pub const fn new(min: u16, max: u16) -> Self {
        Self { min, max }
    }

    /// Creates a single-port range.
    #[must_use]
    pub const fn single(port: u16) -> Self {
        Self { min: port, max: port }
    }
}

impl std::fmt::Display for PortRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.min == self.max {
            write!(f, "{}", self.min)
        } else {
            write!(f, "{}-{}", self.min, self.max)
        }
    }
}

impl BootScript {
    /// Builds the script from configuration.
    #[must_use]
    pub fn from_config(config: &FabricConfig) -> Self {
        Self {
            data_device: config.deploy.data_device.clone(),
            base_dir: config.deploy.base_dir.clone(),
            ssh_user: config.deploy.ssh_user.clone(),
            agent_user: config.deploy.agent_user.clone(),
            agent_command: config.deploy.agent_command.clone(),
            data_iface: config.datacenter.data_iface.clone(),
        }
    }

    /// Returns the script lines, each terminated by a newline.
    #[must_use]
    pub fn lines(&self) -> Vec<String> {
        let Self {
            data_device: dev,
            base_dir: base,
            ssh_user,
            agent_user: agent,
            agent_command,
            data_iface,
        } = self;

        vec![
            String::from("#!/bin/bash -v\n"),
            String::from("umount /mnt\n"),
            format!("parted --script {dev} mklabel gpt\n"),
            format!("parted --script {dev} mkpart primary xfs 0% 100%\n"),
            format!("mkfs.xfs {dev}1\n"),
            format!("mkdir -p {base}/data\n"),
            format!("mkdir -p {base}/keys\n"),
            format!("mount -o noatime {dev}1 {base}/data\n"),
            format!("export STACKFAB_SCRATCH={base}/data\n"),
            format!("export STACKFAB_DIR={base}/master\n"),
            String::from("export HOME=/root\n"),
            String::from("export USER=root\n"),
            format!("mkdir -p /home/{agent}/.ssh\n"),
            format!("cp /home/{ssh_user}/.ssh/authorized_keys /home/{agent}/.ssh/\n"),
            format!("chown -R {agent}:{agent} /home/{agent}/.ssh\n"),
            format!("dhclient {data_iface}\n"),
            format!("{agent_command}\n"),
        ]
    }

    /// Renders the script as a Heat `user_data` value.
    #[must_use]
    pub fn user_data(&self) -> Value {
        json!({ "Fn::Base64": { "Fn::Join": ["", self.lines()] } })
    }
}

impl InstanceSettings {
    /// Captures instance defaults from configuration.
    #[must_use]
    pub fn from_config(config: &FabricConfig) -> Self {
        Self {
            image: config.deploy.image.clone(),
            flavor: config.deploy.personality.clone(),
            key_name: config.deploy.ssh.clone(),
            zone: config.zone.clone(),
            external_network: config.datacenter.extnet.clone().filter(|n| !n.is_empty()),
            boot: BootScript::from_config(config),
        }
    }
}

impl Fragment {
    /// Creates an empty fragment.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            resources: ResourceFragment::new(),
            description: StackDescription::new(),
        }
    }

    /// Unions another fragment into this one.
    ///
    /// # Errors
    ///
    /// Returns [`PlanError::DuplicateResource`] on a logical-name collision.
    pub fn merge(&mut self, other: Self) -> Result<()> {
        self.resources.merge(other.resources)?;
        self.description.merge(other.description)
    }
}

impl<'a> FragmentBuilder<'a> {
    /// Creates a builder over the given defaults.
    #[must_use]
    pub const fn new(settings: &'a InstanceSettings) -> Self {
        Self { settings }
    }

    /// Builds a port in a security group.
    ///
    /// # Errors
    ///
    /// Returns an error only on an internal name collision.
    pub fn port(
        &self,
        name: &str,
        network: NetworkRef<'_>,
        sec_group: &str,
        role: PortRole,
    ) -> Result<Fragment> {
        let network = match network {
            NetworkRef::Ref(logical) => reference(logical),
            NetworkRef::Literal(id) => json!(id),
        };

        let resource = Resource::new(ResourceType::Port)
            .with("name", json!(name))
            .with("security_groups", json!([reference(sec_group)]))
            .with("network", network);

        let mut fragment = Fragment::new();
        fragment.resources.insert(name, resource)?;
        fragment.description.insert(name, DescriptionEntry::port(role))?;
        Ok(fragment)
    }

    /// Builds a floating IP and its association with `port`.
    ///
    /// # Errors
    ///
    /// Returns [`PlanError::MissingExternalNetwork`] if no external network is configured.
    pub fn floating_ip(&self, name: &str, port: &str) -> Result<Fragment> {
        let external = self.settings.external_network.as_deref().ok_or_else(|| {
            PlanError::MissingExternalNetwork {
                name: name.to_string(),
            }
        })?;

        let ip = Resource::new(ResourceType::FloatingIp).with("floating_network_id", json!(external));
        let assoc = Resource::new(ResourceType::FloatingIpAssociation)
            .with("floatingip_id", reference(name))
            .with("port_id", reference(port));

        let mut fragment = Fragment::new();
        fragment.resources.insert(name, ip)?;
        fragment
            .resources
            .insert(super::naming::association_name(name), assoc)?;
        fragment
            .description
            .insert(name, DescriptionEntry::new(ResourceType::FloatingIp))?;
        Ok(fragment)
    }

    /// Builds a security group allowing ICMP and SSH from anywhere, plus the
    /// given TCP ranges in order.
    ///
    /// # Errors
    ///
    /// Returns an error only on an internal name collision.
    pub fn security_group(&self, name: &str, ports: &[PortRange]) -> Result<Fragment> {
        let mut rules = vec![
            json!({ "protocol": "icmp", "remote_ip_prefix": ANY_ADDRESS }),
            json!({
                "protocol": "tcp",
                "remote_ip_prefix": ANY_ADDRESS,
                "port_range_min": 22,
                "port_range_max": 22,
            }),
        ];
        rules.extend(ports.iter().map(|range| {
            json!({
                "protocol": "tcp",
                "port_range_min": range.min,
                "port_range_max": range.max,
            })
        }));

        let group = Resource::new(ResourceType::SecurityGroup)
            .with("name", json!(name))
            .with("description", json!("stackfab firewall rules"))
            .with("rules", Value::Array(rules));

        let mut fragment = Fragment::new();
        fragment.resources.insert(name, group)?;
        fragment
            .description
            .insert(name, DescriptionEntry::new(ResourceType::SecurityGroup))?;
        Ok(fragment)
    }

    /// Builds a server with one management port and the first-boot script.
    ///
    /// # Errors
    ///
    /// Returns an error only on an internal name collision.
    pub fn instance(
        &self,
        name: &str,
        index: usize,
        manage_network: &str,
        sec_group: &str,
    ) -> Result<Fragment> {
        let port = super::naming::port_name(name);
        let mut fragment = self.port(&port, NetworkRef::Literal(manage_network), sec_group, PortRole::Manage)?;

        let server = Resource::new(ResourceType::Server)
            .with("name", json!(name))
            .with("image", json!(self.settings.image))
            .with("key_name", json!(self.settings.key_name))
            .with("flavor", json!(self.settings.flavor))
            .with("availability_zone", json!(self.settings.zone))
            .with(
                "networks",
                json!([{ "port": reference(&port), "network": manage_network }]),
            )
            .with("user_data", self.settings.boot.user_data());

        let mut entry = DescriptionEntry::server(index);
        entry.ports.push(port);

        fragment.resources.insert(name, server)?;
        fragment.description.insert(name, entry)?;
        Ok(fragment)
    }

    /// Builds an attachment of an existing volume to an instance.
    ///
    /// # Errors
    ///
    /// Returns an error only on an internal name collision.
    pub fn volume_attachment(&self, name: &str, instance: &str, volume_id: &str) -> Result<Fragment> {
        let attachment = Resource::new(ResourceType::VolumeAttachment)
            .with("instance_uuid", reference(instance))
            .with("mountpoint", json!(ATTACHMENT_MOUNT_POINT))
            .with("volume_id", json!(volume_id));

        let mut fragment = Fragment::new();
        fragment.resources.insert(name, attachment)?;
        fragment
            .description
            .insert(name, DescriptionEntry::new(ResourceType::VolumeAttachment))?;
        Ok(fragment)
    }

    /// Builds a new volume in the configured zone, attached to a server.
    ///
    /// # Errors
    ///
    /// Returns an error only on an internal name collision.
    pub fn storage_volume(&self, volume_name: &str, server_name: &str, size_gb: u32) -> Result<Fragment> {
        let volume = Resource::new(ResourceType::Volume)
            .with("size", json!(size_gb))
            .with("availability_zone", json!(self.settings.zone));
        let attachment = Resource::new(ResourceType::VolumeAttachment)
            .with("volume_id", reference(volume_name))
            .with("instance_uuid", reference(server_name))
            .with("mountpoint", json!(ATTACHMENT_MOUNT_POINT));

        let mut fragment = Fragment::new();
        fragment.resources.insert(volume_name, volume)?;
        fragment
            .resources
            .insert(format!("{volume_name}_attachment"), attachment)?;
        fragment
            .description
            .insert(volume_name, DescriptionEntry::new(ResourceType::Volume))?;
        Ok(fragment)
    }

    /// Builds an output exposing a server's private address.
    #[must_use]
    pub fn instance_output(server_name: &str) -> (String, Value) {
        (
            super::naming::output_name(server_name),
            json!({ "Value": get_attr(server_name, "PrivateIp") }),
        )
    }
}
