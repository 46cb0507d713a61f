//! Deterministic logical names.
//!
//! Every name is a pure function of the cluster id, the role tag and an
//! ordinal, so rebuilding a plan for the same cluster yields the same names.

/// Prefix shared by every generated name.
pub const NAME_PREFIX: &str = "stackfab";

/// Security group for a cluster.
#[must_use]
pub fn security_group_name(cluster_uuid: &str) -> String {
    format!("{NAME_PREFIX}-sec-{cluster_uuid}")
}

/// Instance `index` of a cluster role.
#[must_use]
pub fn instance_name(cluster_uuid: &str, ctype: &str, index: usize) -> String {
    format!("{NAME_PREFIX}-instance-{cluster_uuid}-{ctype}-{index}")
}

/// Management port of an instance.
#[must_use]
pub fn port_name(instance_name: &str) -> String {
    format!("{NAME_PREFIX}-port-{instance_name}")
}

/// Floating IP `index` of a cluster.
#[must_use]
pub fn floating_ip_name(cluster_uuid: &str, index: usize) -> String {
    format!("{NAME_PREFIX}-ip-{cluster_uuid}-{index}")
}

/// Association binding a floating IP to its port.
#[must_use]
pub fn association_name(floating_ip_name: &str) -> String {
    format!("{floating_ip_name}_assoc")
}

/// Output exposing an instance's private address.
#[must_use]
pub fn output_name(instance_name: &str) -> String {
    format!("{instance_name}-ip")
}

/// Stack holding a cluster role.
#[must_use]
pub fn stack_name(ctype: &str, cluster_uuid: &str) -> String {
    format!("{NAME_PREFIX}-app-{}-{cluster_uuid}", ctype.to_uppercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_names_are_stable() {
        assert_eq!(
            instance_name("c1", "backend", 3),
            instance_name("c1", "backend", 3)
        );
        assert_eq!(instance_name("c1", "backend", 3), "stackfab-instance-c1-backend-3");
        assert_eq!(
            port_name(&instance_name("c1", "backend", 0)),
            "stackfab-port-stackfab-instance-c1-backend-0"
        );
        assert_eq!(association_name("stackfab-ip-c1-0"), "stackfab-ip-c1-0_assoc");
        assert_eq!(stack_name("connector", "c1"), "stackfab-app-CONNECTOR-c1");
    }

    #[test]
    fn test_names_differ_by_ordinal_and_role() {
        assert_ne!(instance_name("c1", "backend", 0), instance_name("c1", "backend", 1));
        assert_ne!(instance_name("c1", "backend", 0), instance_name("c1", "connector", 0));
        assert_ne!(floating_ip_name("c1", 0), floating_ip_name("c2", 0));
    }
}
