//! Output formatting for CLI commands.
//!
//! This module provides formatting utilities for displaying
//! information to the user in various formats.

use colored::Colorize;
use serde::Serialize;
use std::fmt::Write;
use tabled::{Table, Tabled};

use crate::allocator::{LaunchRecord, LaunchedCluster};
use crate::error::{PlanError, Result};
use crate::openstack::SubnetInfo;
use crate::planner::{ComposedStack, PlanHasher};
use crate::state::ClusterRecord;

use super::commands::OutputFormat;

/// Output formatter for CLI.
#[derive(Debug)]
pub struct OutputFormatter {
    /// Output format.
    format: OutputFormat,
}

/// Cluster row for table display.
#[derive(Tabled)]
struct ClusterRow {
    #[tabled(rename = "Cluster")]
    cluster: String,
    #[tabled(rename = "Type")]
    ctype: String,
    #[tabled(rename = "Servers")]
    servers: usize,
    #[tabled(rename = "Public IPs")]
    public_ips: String,
    #[tabled(rename = "Stack")]
    stack: String,
    #[tabled(rename = "Template")]
    template: String,
    #[tabled(rename = "Created")]
    created: String,
}

/// Server row for table display.
#[derive(Tabled)]
struct ServerRow {
    #[tabled(rename = "Server")]
    name: String,
    #[tabled(rename = "Private IP")]
    private_ip: String,
    #[tabled(rename = "Public IP")]
    public_ip: String,
}

/// Launch row for table display.
#[derive(Tabled)]
struct LaunchRow {
    #[tabled(rename = "#")]
    index: usize,
    #[tabled(rename = "Private IP")]
    private_ip: String,
    #[tabled(rename = "Public IP")]
    public_ip: String,
    #[tabled(rename = "Host options")]
    host_opts: usize,
}

impl OutputFormatter {
    /// Creates a new output formatter.
    #[must_use]
    pub const fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    /// Formats a composed stack.
    ///
    /// # Errors
    ///
    /// Returns an error if the template cannot be rendered.
    pub fn format_plan(&self, stack: &ComposedStack) -> Result<String> {
        let template = stack.template()?;
        let rendered = serde_json::to_string_pretty(&template)
            .map_err(|e| PlanError::Serialization { message: e.to_string() })?;

        match self.format {
            OutputFormat::Json => Ok(rendered),
            OutputFormat::Text => {
                let summary = stack.summary();
                let mut output = format!("\nStack plan: {}\n", stack.name.bold());
                let _ = writeln!(
                    output,
                    "   {} servers, {} ports, {} floating IPs ({} resources)\n",
                    summary["servers"], summary["ports"], summary["floating_ips"], summary["resources"]
                );
                output.push_str(&rendered);
                output.push('\n');
                Ok(output)
            }
        }
    }

    /// Formats the launches of one allocation.
    #[must_use]
    pub fn format_launches(&self, cluster_uuid: &str, calls: &[LaunchRecord], launched: &LaunchedCluster) -> String {
        match self.format {
            OutputFormat::Json => serde_json::to_string_pretty(&LaunchJson {
                cluster: cluster_uuid,
                launches: calls,
                containers: launched,
            })
            .unwrap_or_default(),
            OutputFormat::Text => {
                if launched.is_empty() {
                    return format!(
                        "{} Cluster {cluster_uuid} was not provisioned; nothing launched.\n",
                        "✗".red()
                    );
                }

                let rows: Vec<LaunchRow> = calls
                    .iter()
                    .enumerate()
                    .map(|(i, c)| LaunchRow {
                        index: i + 1,
                        private_ip: Self::or_dash(c.private_ip.as_deref()),
                        public_ip: Self::or_dash(c.public_ip.as_deref()),
                        host_opts: c.host_opts.len(),
                    })
                    .collect();

                let mut output = format!(
                    "{} Cluster {cluster_uuid}: {} containers launched\n\n",
                    "✓".green(),
                    launched.containers.len()
                );
                output.push_str(&Table::new(rows).to_string());
                output.push('\n');
                output
            }
        }
    }

    /// Formats the registry contents.
    #[must_use]
    pub fn format_status(&self, records: &[ClusterRecord], detailed: bool) -> String {
        match self.format {
            OutputFormat::Json => serde_json::to_string_pretty(records).unwrap_or_default(),
            OutputFormat::Text => {
                if records.is_empty() {
                    return String::from("\n   No clusters allocated.\n");
                }

                let hasher = PlanHasher::new();
                let rows: Vec<ClusterRow> = records
                    .iter()
                    .map(|r| ClusterRow {
                        cluster: r.cluster_uuid.clone(),
                        ctype: r.ctype.clone(),
                        servers: r.server_count(),
                        public_ips: r.public_ips().join(", "),
                        stack: Self::truncate(&r.stack_id, 12),
                        template: hasher.short_hash(&r.template_hash),
                        created: r.created_at.format("%Y-%m-%d %H:%M").to_string(),
                    })
                    .collect();

                let mut output = String::from("\n");
                output.push_str(&Table::new(rows).to_string());
                output.push('\n');

                if detailed {
                    for record in records {
                        let _ = writeln!(output, "\n{} ({})", record.cluster_uuid.bold(), record.stack_name);
                        output.push_str(&Table::new(Self::server_rows(record)).to_string());
                        output.push('\n');
                    }
                }

                output
            }
        }
    }

    /// Formats the management subnet.
    #[must_use]
    pub fn format_subnet(&self, network_id: &str, subnet: &SubnetInfo) -> String {
        match self.format {
            OutputFormat::Json => serde_json::to_string_pretty(subnet).unwrap_or_default(),
            OutputFormat::Text => {
                let mut output = format!("\nManagement network {network_id}\n");
                let _ = writeln!(output, "   Subnet:  {}", subnet.id);
                let _ = writeln!(output, "   CIDR:    {}", subnet.cidr);
                let _ = writeln!(output, "   Gateway: {}", Self::or_dash(subnet.gateway.as_deref()));
                output
            }
        }
    }

    /// Formats the result of a teardown.
    #[must_use]
    pub fn format_destroyed(&self, cluster_uuid: &str, released: usize) -> String {
        match self.format {
            OutputFormat::Json => serde_json::to_string_pretty(&serde_json::json!({
                "cluster": cluster_uuid,
                "floating_ips_released": released,
            }))
            .unwrap_or_default(),
            OutputFormat::Text => format!(
                "{} Cluster {cluster_uuid} destroyed ({released} floating IPs released)\n",
                "✓".green()
            ),
        }
    }

    fn server_rows(record: &ClusterRecord) -> Vec<ServerRow> {
        let desc = &record.description;
        desc.servers()
            .into_iter()
            .map(|(name, server)| ServerRow {
                name: name.clone(),
                private_ip: Self::or_dash(
                    server
                        .ports
                        .iter()
                        .filter_map(|p| desc.get(p))
                        .find_map(|p| p.ip_address.as_deref()),
                ),
                public_ip: Self::or_dash(desc.public_ip(server)),
            })
            .collect()
    }

    fn or_dash(value: Option<&str>) -> String {
        value.map_or_else(|| "-".dimmed().to_string(), String::from)
    }

    /// Truncates a string to a maximum length.
    fn truncate(s: &str, max_len: usize) -> String {
        if s.chars().count() <= max_len {
            s.to_string()
        } else {
            let head: String = s.chars().take(max_len.saturating_sub(3)).collect();
            format!("{head}...")
        }
    }
}

#[derive(Serialize)]
struct LaunchJson<'a> {
    cluster: &'a str,
    launches: &'a [LaunchRecord],
    containers: &'a LaunchedCluster,
}
