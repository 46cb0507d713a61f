//! Plan composition.
//!
//! Combines security-group, instance and floating-IP fragments into the
//! single stack that backs one cluster role.

use serde_json::{Value, json};
use std::collections::BTreeMap;
use tracing::debug;

use crate::error::Result;

use super::description::StackDescription;
use super::fragments::{Fragment, FragmentBuilder, InstanceSettings, PortRange};
use super::naming;
use super::template::{Resource, ResourceFragment, ResourceType, StackPlan};

/// A composed stack ready for submission.
#[derive(Debug, Clone, PartialEq)]
pub struct ComposedStack {
    /// Stack name.
    pub name: String,
    /// Template to submit.
    pub plan: StackPlan,
    /// Description entries for every tracked resource.
    pub description: StackDescription,
}

/// Parameters of one cluster role's stack.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StackRequest<'a> {
    /// Cluster identifier.
    pub cluster_uuid: &'a str,
    /// Role tag.
    pub ctype: &'a str,
    /// Number of instances.
    pub count: usize,
    /// Extra TCP ranges for the security group.
    pub ports: &'a [PortRange],
    /// Whether every instance gets a floating IP.
    pub floating: bool,
}

/// Composes cluster stacks from fragments.
#[derive(Debug, Clone, Copy)]
pub struct PlanComposer<'a> {
    builder: FragmentBuilder<'a>,
    manage_network: &'a str,
}

impl<'a> PlanComposer<'a> {
    /// Creates a composer placing instances on `manage_network`.
    #[must_use]
    pub const fn new(settings: &'a InstanceSettings, manage_network: &'a str) -> Self {
        Self {
            builder: FragmentBuilder::new(settings),
            manage_network,
        }
    }

    /// Returns the underlying fragment builder.
    #[must_use]
    pub const fn builder(&self) -> &FragmentBuilder<'a> {
        &self.builder
    }

    /// Builds the cluster's security group.
    ///
    /// # Errors
    ///
    /// Returns an error on a logical-name collision.
    pub fn security_plan(&self, cluster_uuid: &str, ports: &[PortRange]) -> Result<Fragment> {
        self.builder
            .security_group(&naming::security_group_name(cluster_uuid), ports)
    }

    /// Builds `count` instances, each with one management port.
    ///
    /// # Errors
    ///
    /// Returns an error on a logical-name collision.
    pub fn instance_plan(
        &self,
        cluster_uuid: &str,
        count: usize,
        sec_group: &str,
        ctype: &str,
    ) -> Result<Fragment> {
        let mut fragment = Fragment::new();
        for index in 0..count {
            let name = naming::instance_name(cluster_uuid, ctype, index);
            fragment.merge(
                self.builder
                    .instance(&name, index, self.manage_network, sec_group)?,
            )?;
        }
        Ok(fragment)
    }

    /// Builds one floating IP per listed port, in order.
    ///
    /// # Errors
    ///
    /// Returns an error if no external network is configured.
    pub fn floating_ip_plan(&self, cluster_uuid: &str, ports: &[String]) -> Result<Fragment> {
        let mut fragment = Fragment::new();
        for (index, port) in ports.iter().enumerate() {
            let name = naming::floating_ip_name(cluster_uuid, index);
            fragment.merge(self.builder.floating_ip(&name, port)?)?;
        }
        Ok(fragment)
    }

    /// Builds the complete stack for one cluster role.
    ///
    /// # Errors
    ///
    /// Returns an error on a logical-name collision or when floating IPs are
    /// requested without an external network.
    pub fn app_stack_plan(&self, request: &StackRequest<'_>) -> Result<ComposedStack> {
        let StackRequest {
            cluster_uuid,
            ctype,
            count,
            ports,
            floating,
        } = *request;

        let sec_group = naming::security_group_name(cluster_uuid);
        let mut stack = self.security_plan(cluster_uuid, ports)?;
        let instances = self.instance_plan(cluster_uuid, count, &sec_group, ctype)?;

        let manage_ports = instances.description.manage_ports();
        let outputs: BTreeMap<String, Value> = instances
            .description
            .servers()
            .into_iter()
            .map(|(name, _)| FragmentBuilder::instance_output(name))
            .collect();
        stack.merge(instances)?;

        if floating {
            stack.merge(self.floating_ip_plan(cluster_uuid, &manage_ports)?)?;
        }

        let name = naming::stack_name(ctype, cluster_uuid);
        debug!(
            "Composed stack {} with {} resources ({} instances, floating: {})",
            name,
            stack.resources.len(),
            count,
            floating
        );

        let mut plan = StackPlan::with_resources(stack.resources);
        plan.outputs = outputs;

        Ok(ComposedStack {
            name,
            plan,
            description: stack.description,
        })
    }

    /// Builds a template that clears the named floating-IP associations.
    ///
    /// # Errors
    ///
    /// Returns an error if a name is listed twice.
    pub fn release_ip_plan(associations: &[String]) -> Result<StackPlan> {
        let mut resources = ResourceFragment::new();
        for name in associations {
            resources.insert(
                name.as_str(),
                Resource::new(ResourceType::FloatingIpAssociation),
            )?;
        }
        Ok(StackPlan::with_resources(resources))
    }
}

impl ComposedStack {
    /// Serializes the template for submission.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn template(&self) -> Result<Value> {
        self.plan.to_json()
    }

    /// Returns a short summary of the stack's contents.
    #[must_use]
    pub fn summary(&self) -> Value {
        let resources = &self.plan.resources;
        json!({
            "name": self.name,
            "servers": resources.count_of(&ResourceType::Server),
            "ports": resources.count_of(&ResourceType::Port),
            "floating_ips": resources.count_of(&ResourceType::FloatingIp),
            "resources": resources.len(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{PlanError, StackfabError};
    use crate::planner::description::PortRole;
    use crate::planner::fragments::tests::settings;
    use std::collections::HashSet;

    #[test]
    fn test_instance_plan_counts() {
        let s = settings(None);
        let composer = PlanComposer::new(&s, "net-manage");

        for n in [0usize, 1, 2, 7] {
            let fragment = composer
                .instance_plan("c1", n, "stackfab-sec-c1", "backend")
                .unwrap();
            assert_eq!(fragment.resources.count_of(&ResourceType::Server), n);
            assert_eq!(fragment.resources.count_of(&ResourceType::Port), n);
            assert_eq!(fragment.description.manage_ports().len(), n);

            let names: HashSet<_> = fragment.resources.iter().map(|(k, _)| k.clone()).collect();
            assert_eq!(names.len(), 2 * n);
        }
    }

    #[test]
    fn test_instance_names_are_reproducible() {
        let s = settings(None);
        let composer = PlanComposer::new(&s, "net-manage");

        let first = composer.instance_plan("c1", 3, "sec", "backend").unwrap();
        let second = composer.instance_plan("c1", 3, "sec", "backend").unwrap();
        assert_eq!(first, second);
        assert!(first.resources.contains("stackfab-instance-c1-backend-2"));
    }

    #[test]
    fn test_app_stack_with_floating_ips() {
        let s = settings(Some("ext-net"));
        let composer = PlanComposer::new(&s, "net-manage");
        let ports = [PortRange::single(80)];

        let stack = composer
            .app_stack_plan(&StackRequest {
                cluster_uuid: "c1",
                ctype: "connector",
                count: 2,
                ports: &ports,
                floating: true,
            })
            .unwrap();

        assert_eq!(stack.name, "stackfab-app-CONNECTOR-c1");
        let resources = &stack.plan.resources;
        assert_eq!(resources.count_of(&ResourceType::SecurityGroup), 1);
        assert_eq!(resources.count_of(&ResourceType::Server), 2);
        assert_eq!(resources.count_of(&ResourceType::FloatingIp), 2);
        assert_eq!(resources.count_of(&ResourceType::FloatingIpAssociation), 2);
        assert_eq!(stack.plan.outputs.len(), 2);

        let assoc = resources.get("stackfab-ip-c1-1_assoc").unwrap();
        assert_eq!(
            assoc.property("port_id"),
            Some(&json!({ "Ref": "stackfab-port-stackfab-instance-c1-connector-1" }))
        );

        let port = stack
            .description
            .get("stackfab-port-stackfab-instance-c1-connector-0")
            .unwrap();
        assert_eq!(port.role, Some(PortRole::Manage));

        let summary = stack.summary();
        assert_eq!(summary["servers"], 2);
        assert_eq!(summary["floating_ips"], 2);
    }

    #[test]
    fn test_app_stack_without_floating_ips() {
        let s = settings(None);
        let composer = PlanComposer::new(&s, "net-manage");

        let stack = composer
            .app_stack_plan(&StackRequest {
                cluster_uuid: "c1",
                ctype: "backend",
                count: 1,
                ports: &[],
                floating: false,
            })
            .unwrap();
        assert_eq!(stack.plan.resources.count_of(&ResourceType::FloatingIp), 0);

        let template = stack.template().unwrap();
        assert_eq!(
            template["Outputs"]["stackfab-instance-c1-backend-0-ip"]["Value"]["Fn::GetAtt"][1],
            "PrivateIp"
        );
    }

    #[test]
    fn test_floating_ips_need_external_network() {
        let s = settings(None);
        let composer = PlanComposer::new(&s, "net-manage");

        let err = composer
            .app_stack_plan(&StackRequest {
                cluster_uuid: "c1",
                ctype: "connector",
                count: 1,
                ports: &[],
                floating: true,
            })
            .unwrap_err();
        assert!(matches!(
            err,
            StackfabError::Plan(PlanError::MissingExternalNetwork { .. })
        ));
    }

    #[test]
    fn test_merging_overlapping_fragments_fails() {
        let s = settings(None);
        let composer = PlanComposer::new(&s, "net-manage");

        let mut a = composer.instance_plan("c1", 2, "sec", "backend").unwrap();
        let b = composer.instance_plan("c1", 1, "sec", "backend").unwrap();
        let err = a.merge(b).unwrap_err();
        assert!(matches!(
            err,
            StackfabError::Plan(PlanError::DuplicateResource { .. })
        ));
    }

    #[test]
    fn test_release_ip_plan() {
        let names = vec![String::from("ip-0_assoc"), String::from("ip-1_assoc")];
        let plan = PlanComposer::release_ip_plan(&names).unwrap();
        assert_eq!(plan.resources.count_of(&ResourceType::FloatingIpAssociation), 2);
        assert!(plan.resources.get("ip-0_assoc").unwrap().properties.is_empty());

        let dup = vec![String::from("a"), String::from("a")];
        assert!(PlanComposer::release_ip_plan(&dup).is_err());
    }
}
