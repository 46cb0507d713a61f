//! CLI command definitions.
//!
//! This module defines all CLI commands and their arguments using clap.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Stackfab - Heat-provisioned container clusters on OpenStack.
#[derive(Parser, Debug)]
#[command(name = "stackfab")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to the configuration file.
    #[arg(short, long, global = true, env = "STACKFAB_CONFIG")]
    pub config: Option<PathBuf>,

    /// Enable verbose output.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Output format (text, json).
    #[arg(long, global = true, default_value = "text")]
    pub output: OutputFormat,

    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Validate the deployment configuration.
    Validate {
        /// Show all warnings, not just errors.
        #[arg(short, long)]
        warnings: bool,
    },

    /// Compose and print a cluster stack template without submitting it.
    Plan {
        /// Cluster identifier.
        #[arg(long)]
        cluster: String,

        /// Cluster role tag.
        #[arg(long)]
        ctype: String,

        /// Number of instances.
        #[arg(long, default_value = "1")]
        count: usize,

        /// Extra TCP port or range to open (`port` or `min-max`).
        #[arg(long = "port")]
        ports: Vec<String>,

        /// Attach a floating IP to every instance.
        #[arg(long)]
        floating_ip: bool,
    },

    /// Provision a cluster and hand its containers to the launcher.
    Alloc {
        /// Cluster identifier.
        #[arg(long)]
        cluster: String,

        /// Cluster role tag.
        #[arg(long)]
        ctype: String,

        /// YAML file listing the requested containers.
        #[arg(long)]
        containers: PathBuf,

        /// The controller proxies traffic for this cluster.
        #[arg(long)]
        proxy: bool,
    },

    /// List allocated clusters.
    Status {
        /// Show per-instance addresses.
        #[arg(short, long)]
        detailed: bool,
    },

    /// Tear down a cluster's stack.
    Destroy {
        /// Cluster identifier.
        cluster: String,

        /// Skip confirmation prompt.
        #[arg(short, long)]
        yes: bool,
    },

    /// Show the management subnet.
    Subnets,
}

/// Output format options.
#[derive(Debug, Clone, Copy, Default, clap::ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text output.
    #[default]
    Text,
    /// JSON output for scripting.
    Json,
}

impl Cli {
    /// Parses CLI arguments from the command line.
    #[must_use]
    pub fn parse_args() -> Self {
        Self::parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plan_arguments() {
        let cli = Cli::try_parse_from([
            "stackfab", "plan", "--cluster", "c1", "--ctype", "backend", "--count", "3", "--port",
            "8080", "--port", "50000-50010", "--floating-ip",
        ])
        .unwrap();

        match cli.command {
            Commands::Plan {
                cluster,
                count,
                ports,
                floating_ip,
                ..
            } => {
                assert_eq!(cluster, "c1");
                assert_eq!(count, 3);
                assert_eq!(ports, vec!["8080", "50000-50010"]);
                assert!(floating_ip);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from(["stackfab", "destroy", "c1", "--yes", "--output", "json", "-v"]).unwrap();
        assert!(cli.verbose);
        assert!(matches!(cli.output, OutputFormat::Json));
        assert!(matches!(cli.command, Commands::Destroy { ref cluster, yes: true } if cluster == "c1"));
    }
}
