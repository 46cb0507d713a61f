//! Stackfab CLI entrypoint.
//!
//! This is the main entrypoint for the stackfab command-line tool.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use stackfab::allocator::{ClusterAllocator, ContainerInfo, RecordingLauncher, parse_exposed};
use stackfab::cli::{Cli, Commands, OutputFormatter};
use stackfab::config::{ConfigParser, ConfigValidator, FabricConfig, find_config_file};
use stackfab::error::{ConfigError, Result, StackfabError};
use stackfab::openstack::{CloudClients, NetworkReconciler};
use stackfab::planner::{InstanceSettings, PlanComposer, StackRequest};
use stackfab::state::{AppRegistry, LocalRegistryStore, STATE_DIR};

use clap::Parser;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

/// Main entrypoint.
fn main() -> ExitCode {
    let cli = Cli::parse();

    // Initialize logging
    init_logging(cli.verbose);

    // Run async runtime
    let runtime = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("Failed to create async runtime: {e}");
            return ExitCode::FAILURE;
        }
    };

    match runtime.block_on(run(cli)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

/// Initializes the logging system.
fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

/// Main async entry point.
async fn run(cli: Cli) -> Result<()> {
    let formatter = OutputFormatter::new(cli.output);
    let config_path = cli.config.as_ref();

    match cli.command {
        Commands::Validate { warnings } => cmd_validate(config_path, warnings),
        Commands::Plan {
            cluster,
            ctype,
            count,
            ports,
            floating_ip,
        } => cmd_plan(config_path, &cluster, &ctype, count, &ports, floating_ip, &formatter),
        Commands::Alloc {
            cluster,
            ctype,
            containers,
            proxy,
        } => cmd_alloc(config_path, &cluster, &ctype, &containers, proxy, &formatter).await,
        Commands::Status { detailed } => cmd_status(config_path, detailed, &formatter).await,
        Commands::Destroy { cluster, yes } => cmd_destroy(config_path, &cluster, yes, &formatter).await,
        Commands::Subnets => cmd_subnets(config_path, &formatter).await,
    }
}

/// Validate configuration.
fn cmd_validate(config_path: Option<&PathBuf>, show_warnings: bool) -> Result<()> {
    let (config, config_file) = load_config(config_path)?;
    info!("Validated configuration: {}", config_file.display());

    let result = ConfigValidator::new().validate(&config)?;

    eprintln!("Configuration is valid!");
    if show_warnings && !result.warnings.is_empty() {
        eprintln!("\nWarnings:");
        for warning in &result.warnings {
            eprintln!("  - {warning}");
        }
    }

    // Show summary
    eprintln!("\nConfiguration summary:");
    eprintln!("  Provider: {}", config.provider);
    eprintln!("  Datacenter: {} ({})", config.dc, config.zone);
    eprintln!("  Management network: {}", config.manage_network());
    eprintln!(
        "  External network: {}",
        config.external_network().unwrap_or("none")
    );
    eprintln!("  Image: {} / {}", config.deploy.image, config.deploy.personality);

    Ok(())
}

/// Show the stack a cluster would be created with.
fn cmd_plan(
    config_path: Option<&PathBuf>,
    cluster: &str,
    ctype: &str,
    count: usize,
    ports: &[String],
    floating_ip: bool,
    formatter: &OutputFormatter,
) -> Result<()> {
    let (config, _) = load_config(config_path)?;
    ConfigValidator::new().validate(&config)?;

    let ranges = ports
        .iter()
        .map(|p| parse_exposed(p))
        .collect::<Result<Vec<_>>>()?;

    let settings = InstanceSettings::from_config(&config);
    let stack = PlanComposer::new(&settings, config.manage_network()).app_stack_plan(&StackRequest {
        cluster_uuid: cluster,
        ctype,
        count,
        ports: &ranges,
        floating: floating_ip,
    })?;

    eprintln!("{}", formatter.format_plan(&stack)?);
    Ok(())
}

/// Allocate a cluster.
async fn cmd_alloc(
    config_path: Option<&PathBuf>,
    cluster: &str,
    ctype: &str,
    containers_file: &Path,
    proxy: bool,
    formatter: &OutputFormatter,
) -> Result<()> {
    let (config, config_file) = load_config(config_path)?;
    ConfigValidator::new().validate(&config)?;

    let containers = load_containers(containers_file)?;
    let registry = open_registry(&config_file).await?;

    let clients = CloudClients::from_config(&config)?;
    let allocator = ClusterAllocator::connect(&config, clients.heat, clients.neutron, RecordingLauncher::new())
        .await?
        .with_registry(registry);

    let launched = allocator.alloc(cluster, &containers, ctype, proxy).await?;
    let calls = allocator.launcher().calls().await;

    eprintln!("{}", formatter.format_launches(cluster, &calls, &launched));
    Ok(())
}

/// Show allocated clusters.
async fn cmd_status(config_path: Option<&PathBuf>, detailed: bool, formatter: &OutputFormatter) -> Result<()> {
    let config_file = resolve_config_path(config_path)?;
    let registry = open_registry(&config_file).await?;

    eprintln!("{}", formatter.format_status(&registry.list().await, detailed));
    Ok(())
}

/// Tear down a cluster.
async fn cmd_destroy(
    config_path: Option<&PathBuf>,
    cluster: &str,
    auto_approve: bool,
    formatter: &OutputFormatter,
) -> Result<()> {
    let (config, config_file) = load_config(config_path)?;
    let registry = open_registry(&config_file).await?;

    let Some(record) = registry.get(cluster).await else {
        eprintln!("No allocation recorded for cluster {cluster}.");
        return Ok(());
    };

    eprintln!(
        "Stack {} ({} servers) will be destroyed.",
        record.stack_name,
        record.server_count()
    );

    // Confirm
    if !auto_approve {
        eprint!("\nThis action is IRREVERSIBLE. Type 'destroy' to confirm: ");
        std::io::stderr().flush()?;

        let mut input = String::new();
        std::io::stdin().read_line(&mut input)?;

        if input.trim() != "destroy" {
            eprintln!("Destruction cancelled.");
            return Ok(());
        }
    }

    let clients = CloudClients::from_config(&config)?;
    let allocator = ClusterAllocator::connect(&config, clients.heat, clients.neutron, RecordingLauncher::new())
        .await?
        .with_registry(registry);

    let released = allocator.release(cluster).await?;
    eprintln!("{}", formatter.format_destroyed(cluster, released));
    Ok(())
}

/// Show the management subnet.
async fn cmd_subnets(config_path: Option<&PathBuf>, formatter: &OutputFormatter) -> Result<()> {
    let (config, _) = load_config(config_path)?;
    let clients = CloudClients::from_config(&config)?;

    let subnet = NetworkReconciler::new(&clients.neutron)
        .collect_subnet_info(config.manage_network())
        .await?;

    eprintln!("{}", formatter.format_subnet(config.manage_network(), &subnet));
    Ok(())
}

// ============================================================================
// Helper Functions
// ============================================================================

/// Resolves the configuration file path.
fn resolve_config_path(config_path: Option<&PathBuf>) -> Result<PathBuf> {
    config_path.map_or_else(|| find_config_file("."), |path| Ok(path.clone()))
}

/// Directory holding the configuration file.
fn config_dir(config_file: &Path) -> &Path {
    config_file.parent().unwrap_or_else(|| Path::new("."))
}

/// Loads `.env` and the configuration.
fn load_config(config_path: Option<&PathBuf>) -> Result<(FabricConfig, PathBuf)> {
    let config_file = resolve_config_path(config_path)?;
    debug!("Loading configuration from: {}", config_file.display());

    let parser = ConfigParser::new().with_base_path(config_dir(&config_file));
    parser.load_dotenv()?;

    let config = parser.load_with_env(&config_file)?;
    Ok((config, config_file))
}

/// Opens the registry stored next to the configuration file.
async fn open_registry(config_file: &Path) -> Result<AppRegistry> {
    let store = LocalRegistryStore::with_base_dir(config_dir(config_file).join(STATE_DIR));
    AppRegistry::open(Arc::new(store)).await
}

/// Reads the container list of an allocation request.
fn load_containers(path: &Path) -> Result<Vec<ContainerInfo>> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        StackfabError::Config(ConfigError::ParseError {
            message: format!("Failed to read container list: {e}"),
            location: Some(path.display().to_string()),
        })
    })?;

    serde_yaml::from_str(&content).map_err(|e| {
        StackfabError::Config(ConfigError::ParseError {
            message: format!("Invalid container list: {e}"),
            location: Some(path.display().to_string()),
        })
    })
}
