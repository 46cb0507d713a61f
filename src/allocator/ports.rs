//! Security-group port rules from container requests.
//!
//! Connector roles open the container side of every port mapping and always
//! get floating IPs. Other roles open the first container's exposed ports and
//! get floating IPs only when the controller does not proxy for them.

use crate::error::{ConfigError, Result};
use crate::planner::PortRange;

use super::launcher::ContainerInfo;

/// Role tag of externally reachable clusters.
pub const CONNECTOR_CTYPE: &str = "connector";

/// Floating-IP policy and TCP ranges for a cluster role.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortRules {
    /// Whether instances get floating IPs.
    pub floating_ip: bool,
    /// TCP ranges opened in the security group.
    pub ranges: Vec<PortRange>,
}

/// Derives port rules for a request.
///
/// # Errors
///
/// Returns [`ConfigError::InvalidPort`] for an unparsable port entry.
pub fn derive_port_rules(ctype: &str, containers: &[ContainerInfo], proxy: bool) -> Result<PortRules> {
    if ctype == CONNECTOR_CTYPE {
        let ranges = containers
            .iter()
            .flat_map(|c| c.ports.iter())
            .map(|spec| parse_mapping(spec))
            .collect::<Result<Vec<_>>>()?;
        return Ok(PortRules {
            floating_ip: true,
            ranges,
        });
    }

    let ranges = containers
        .first()
        .map(|c| c.exposed.iter().map(|spec| parse_exposed(spec)).collect::<Result<Vec<_>>>())
        .transpose()?
        .unwrap_or_default();
    Ok(PortRules {
        floating_ip: !proxy,
        ranges,
    })
}

/// Parses `"port"`, `"host:container"` or `"ip:host:container"`, keeping
/// the container side. A `/tcp` style suffix is ignored.
///
/// # Errors
///
/// Returns [`ConfigError::InvalidPort`] if the port is not a number.
pub fn parse_mapping(spec: &str) -> Result<PortRange> {
    let mapping = without_protocol(spec);
    let port = mapping.rsplit_once(':').map_or(mapping, |(_, container)| container);
    parse_port(port, spec).map(PortRange::single)
}

/// Parses `"port"` or `"min-max"`.
///
/// # Errors
///
/// Returns [`ConfigError::InvalidPort`] if a bound is not a number or the
/// range is reversed.
pub fn parse_exposed(spec: &str) -> Result<PortRange> {
    let ports = without_protocol(spec);
    match ports.split_once('-') {
        None => parse_port(ports, spec).map(PortRange::single),
        Some((min, max)) => {
            let range = PortRange::new(parse_port(min, spec)?, parse_port(max, spec)?);
            if range.min > range.max {
                return Err(invalid(spec));
            }
            Ok(range)
        }
    }
}

fn without_protocol(spec: &str) -> &str {
    spec.split_once('/').map_or(spec, |(ports, _)| ports)
}

fn parse_port(port: &str, spec: &str) -> Result<u16> {
    port.trim().parse().map_err(|_| invalid(spec))
}

fn invalid(spec: &str) -> crate::error::StackfabError {
    ConfigError::InvalidPort {
        spec: spec.to_string(),
    }
    .into()
}
