//! Cluster allocation.
//!
//! [`ClusterAllocator::alloc`] is the top-level operation: it derives port
//! rules for the request, composes and submits one stack for the cluster
//! role, reconciles its networking, records the allocation, and hands each
//! container to the workload launcher with its instance's addresses.
//! Either the whole stack provisions or no container is launched.

mod launcher;
mod ports;

pub use launcher::{
    ContainerHandle, ContainerInfo, LaunchOutcome, LaunchRecord, RecordingLauncher,
    WorkloadLauncher,
};
pub use ports::{CONNECTOR_CTYPE, PortRules, derive_port_rules, parse_exposed, parse_mapping};

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use tracing::{info, warn};

use crate::config::FabricConfig;
use crate::error::{LaunchError, Result, StackfabError, StateError};
use crate::openstack::{
    NetworkApi, NetworkReconciler, OrchestrationApi, PollPolicy, StackDriver, StackTeardown,
    SubnetInfo,
};
use crate::planner::{ComposedStack, InstanceSettings, PlanComposer, PlanHasher, StackRequest};
use crate::state::{AppRegistry, ClusterRecord};

/// Containers started for one allocation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LaunchedCluster {
    /// Started containers, in request order.
    pub containers: Vec<ContainerHandle>,
    /// Volume mounts of all started containers.
    pub mounts: BTreeMap<String, Value>,
}

impl LaunchedCluster {
    /// Returns true if nothing was launched.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.containers.is_empty()
    }
}

/// Builds the LXC options that bind a container directly to the host's
/// data interface with a static address.
///
/// Returns `None` if the subnet CIDR has no prefix length.
#[must_use]
pub fn host_network_opts(private_ip: &str, subnet: &SubnetInfo, data_iface: &str) -> Option<Vec<String>> {
    let prefix = subnet.prefix_len()?;

    let mut opts = vec![
        String::from("lxc.network.type = phys"),
        format!("lxc.network.ipv4 = {private_ip}/{prefix}"),
    ];
    if let Some(gateway) = &subnet.gateway {
        opts.push(format!("lxc.network.ipv4.gateway = {gateway}"));
    }
    opts.extend([
        format!("lxc.network.link = {data_iface}"),
        String::from("lxc.network.name = eth0"),
        String::from("lxc.network.flags = up"),
    ]);
    Some(opts)
}

/// Attributes a launcher failure to the instance it targeted.
fn launch_failed(host: &str, err: StackfabError) -> StackfabError {
    match err {
        StackfabError::Launch(_) => err,
        other => LaunchError::Failed {
            host: host.to_string(),
            message: other.to_string(),
        }
        .into(),
    }
}

/// Allocates clusters on one datacenter.
#[derive(Debug)]
pub struct ClusterAllocator<O, N, L> {
    orchestration: O,
    network: N,
    launcher: L,
    settings: InstanceSettings,
    manage_network: String,
    data_iface: String,
    subnet: SubnetInfo,
    policy: PollPolicy,
    registry: AppRegistry,
}

impl<O, N, L> ClusterAllocator<O, N, L>
where
    O: OrchestrationApi,
    N: NetworkApi,
    L: WorkloadLauncher,
{
    /// Creates an allocator, looking up the management subnet once.
    ///
    /// # Errors
    ///
    /// Returns an error if the management network has no subnet or the
    /// listing fails.
    pub async fn connect(config: &FabricConfig, orchestration: O, network: N, launcher: L) -> Result<Self> {
        let subnet = NetworkReconciler::new(&network)
            .collect_subnet_info(config.manage_network())
            .await?;
        Ok(Self::with_subnet(config, orchestration, network, launcher, subnet))
    }

    /// Creates an allocator with a known management subnet.
    #[must_use]
    pub fn with_subnet(
        config: &FabricConfig,
        orchestration: O,
        network: N,
        launcher: L,
        subnet: SubnetInfo,
    ) -> Self {
        Self {
            orchestration,
            network,
            launcher,
            settings: InstanceSettings::from_config(config),
            manage_network: config.manage_network().to_string(),
            data_iface: config.datacenter.data_iface.clone(),
            subnet,
            policy: PollPolicy::default(),
            registry: AppRegistry::in_memory(),
        }
    }

    /// Replaces the poll policy.
    #[must_use]
    pub fn with_policy(mut self, policy: PollPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Replaces the registry.
    #[must_use]
    pub fn with_registry(mut self, registry: AppRegistry) -> Self {
        self.registry = registry;
        self
    }

    /// Returns the allocation registry.
    #[must_use]
    pub const fn registry(&self) -> &AppRegistry {
        &self.registry
    }

    /// Returns the management subnet.
    #[must_use]
    pub const fn subnet(&self) -> &SubnetInfo {
        &self.subnet
    }

    /// Returns the workload launcher.
    #[must_use]
    pub const fn launcher(&self) -> &L {
        &self.launcher
    }

    /// Composes the stack `alloc` would submit, without submitting it.
    ///
    /// # Errors
    ///
    /// Returns an error for an invalid port entry or an unsatisfiable plan.
    pub fn plan(&self, cluster_uuid: &str, containers: &[ContainerInfo], ctype: &str, proxy: bool) -> Result<ComposedStack> {
        let rules = derive_port_rules(ctype, containers, proxy)?;
        PlanComposer::new(&self.settings, &self.manage_network).app_stack_plan(&StackRequest {
            cluster_uuid,
            ctype,
            count: containers.len(),
            ports: &rules.ranges,
            floating: rules.floating_ip,
        })
    }

    /// Provisions one instance per container and launches the containers.
    ///
    /// A stack that fails to create yields an empty result and leaves the
    /// registry untouched. A created stack whose networking cannot be
    /// resolved or whose record cannot be saved is deleted again.
    ///
    /// # Errors
    ///
    /// Returns an error for invalid input, API failures, an exhausted poll
    /// budget, or a launcher failure.
    pub async fn alloc(
        &self,
        cluster_uuid: &str,
        containers: &[ContainerInfo],
        ctype: &str,
        proxy: bool,
    ) -> Result<LaunchedCluster> {
        let stack = self.plan(cluster_uuid, containers, ctype, proxy)?;
        let template_hash = PlanHasher::new().hash_plan(&stack.plan)?;
        info!(
            "Allocating cluster {} ({}): {} instances, stack {}",
            cluster_uuid,
            ctype,
            containers.len(),
            stack.name
        );

        let driver = StackDriver::new(&self.orchestration).with_policy(self.policy);
        let Some(description) = driver
            .submit(&stack.name, &stack.plan, stack.description)
            .await?
        else {
            warn!("Stack {} failed; no containers launched", stack.name);
            return Ok(LaunchedCluster::default());
        };

        let stack_id = description
            .stack()
            .map(|(_, id)| id.to_string())
            .ok_or_else(|| StackfabError::internal(format!("Stack {} has no recorded id", stack.name)))?;

        // from here on a failure must not leave the stack behind
        let recorded = async {
            let description = NetworkReconciler::new(&self.network)
                .enrich(description)
                .await?;
            self.registry
                .insert(ClusterRecord {
                    cluster_uuid: cluster_uuid.to_string(),
                    ctype: ctype.to_string(),
                    stack_name: stack.name.clone(),
                    stack_id: stack_id.clone(),
                    template_hash,
                    description: description.clone(),
                    created_at: Utc::now(),
                })
                .await?;
            Ok::<_, StackfabError>(description)
        }
        .await;

        let description = match recorded {
            Ok(description) => description,
            Err(e) => {
                self.discard_stack(&stack.name, &stack_id).await;
                return Err(e);
            }
        };

        let servers = description.servers();
        let mut launched = LaunchedCluster::default();

        for (container, (server_name, server)) in containers.iter().zip(servers) {
            let private_ip = description.private_ip(server, &self.subnet.id);
            let public_ip = description.public_ip(server);

            let host_opts = private_ip
                .and_then(|ip| host_network_opts(ip, &self.subnet, &self.data_iface))
                .unwrap_or_else(|| {
                    warn!("No private address resolved for {}; launching without host networking", server_name);
                    Vec::new()
                });

            let outcome = self
                .launcher
                .execute_docker_containers(container, &host_opts, private_ip, public_ip)
                .await
                .map_err(|e| launch_failed(private_ip.unwrap_or(server_name), e))?;

            if let Some(handle) = outcome.container {
                launched.mounts.extend(outcome.mounts);
                launched.containers.push(handle);
            }
        }

        info!(
            "Cluster {} launched {} of {} containers",
            cluster_uuid,
            launched.containers.len(),
            containers.len()
        );
        Ok(launched)
    }

    /// Deletes a stack whose allocation could not be completed.
    async fn discard_stack(&self, stack_name: &str, stack_id: &str) {
        warn!("Allocation of stack {} failed after creation; deleting it", stack_name);
        if let Err(e) = StackTeardown::new(&self.orchestration, &self.network)
            .destroy(stack_id)
            .await
        {
            warn!("Failed to delete stack {}: {}", stack_name, e);
        }
    }

    /// Tears down a cluster's stack and forgets it.
    ///
    /// Returns the number of floating IPs released.
    ///
    /// # Errors
    ///
    /// Returns [`StateError::UnknownCluster`] if the cluster is not recorded,
    /// or any teardown error; the record is kept if teardown fails.
    pub async fn release(&self, cluster_uuid: &str) -> Result<usize> {
        let record = self
            .registry
            .get(cluster_uuid)
            .await
            .ok_or_else(|| StateError::UnknownCluster {
                cluster_uuid: cluster_uuid.to_string(),
            })?;

        let released = StackTeardown::new(&self.orchestration, &self.network)
            .destroy(&record.stack_id)
            .await?;
        self.registry.remove(cluster_uuid).await?;

        info!("Cluster {} released (stack {})", cluster_uuid, record.stack_name);
        Ok(released)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConfigParser;
    use crate::config::parser::tests::SAMPLE;
    use crate::openstack::fake::{FAKE_SUBNET, FakeCloud};
    use std::collections::HashMap;
    use std::sync::Arc;
    use crate::state::{LocalRegistryStore, RegistryStore};
    use std::time::Duration;
    use tempfile::TempDir;

    fn config() -> FabricConfig {
        let env: HashMap<&str, &str> = [
            ("OS_USERNAME", "operator"),
            ("OS_PASSWORD", "secret"),
            ("OS_TENANT_ID", "t-1"),
            ("OS_TENANT_NAME", "fabric"),
        ]
        .into_iter()
        .collect();
        let file = ConfigParser::new().parse_yaml(SAMPLE, None).unwrap();
        ConfigParser::resolve(&file, |k| env.get(k).map(ToString::to_string)).unwrap()
    }

    fn quick() -> PollPolicy {
        PollPolicy {
            interval: Duration::ZERO,
            max_wait: Duration::from_secs(5),
            max_auth_failures: 2,
        }
    }

    async fn allocator(
        cloud: &Arc<FakeCloud>,
    ) -> ClusterAllocator<Arc<FakeCloud>, Arc<FakeCloud>, RecordingLauncher> {
        let cfg = config();
        ClusterAllocator::connect(&cfg, Arc::clone(cloud), Arc::clone(cloud), RecordingLauncher::new())
            .await
            .unwrap()
            .with_policy(quick())
    }

    fn request(ports: &[&str]) -> ContainerInfo {
        ContainerInfo {
            ports: ports.iter().map(ToString::to_string).collect(),
            ..ContainerInfo::default()
        }
    }

    #[test]
    fn test_host_network_opts() {
        let subnet = SubnetInfo {
            id: String::from("sub-1"),
            cidr: String::from("10.0.0.0/24"),
            gateway: Some(String::from("10.0.0.1")),
        };
        let opts = host_network_opts("10.0.0.5", &subnet, "eth1").unwrap();
        assert_eq!(
            opts,
            vec![
                "lxc.network.type = phys",
                "lxc.network.ipv4 = 10.0.0.5/24",
                "lxc.network.ipv4.gateway = 10.0.0.1",
                "lxc.network.link = eth1",
                "lxc.network.name = eth0",
                "lxc.network.flags = up",
            ]
        );

        let bare = SubnetInfo {
            cidr: String::from("10.0.0.0"),
            ..subnet
        };
        assert!(host_network_opts("10.0.0.5", &bare, "eth1").is_none());
    }

    #[tokio::test]
    async fn test_backend_alloc_launches_with_public_ip() {
        let cloud = Arc::new(FakeCloud::new("net-manage"));
        let alloc = allocator(&cloud).await;
        assert_eq!(alloc.subnet().id, FAKE_SUBNET);

        let launched = alloc
            .alloc("c1", &[request(&["8080:80"])], "backend", false)
            .await
            .unwrap();
        assert_eq!(launched.containers.len(), 1);

        let calls = alloc.launcher().calls().await;
        assert_eq!(calls.len(), 1);
        assert!(calls[0].public_ip.is_some());
        let private = calls[0].private_ip.clone().unwrap();
        assert!(calls[0]
            .host_opts
            .contains(&format!("lxc.network.ipv4 = {private}/24")));
        assert!(calls[0].host_opts.contains(&String::from("lxc.network.link = eth1")));

        let record = alloc.registry().get("c1").await.unwrap();
        assert_eq!(record.stack_name, "stackfab-app-BACKEND-c1");
        assert_eq!(record.template_hash.len(), 64);
        assert_eq!(record.server_count(), 1);
    }

    #[tokio::test]
    async fn test_proxied_backend_has_no_public_ip() {
        let cloud = Arc::new(FakeCloud::new("net-manage"));
        let alloc = allocator(&cloud).await;

        alloc
            .alloc("c1", &[request(&[]), request(&[])], "backend", true)
            .await
            .unwrap();

        let calls = alloc.launcher().calls().await;
        assert_eq!(calls.len(), 2);
        assert!(calls.iter().all(|c| c.public_ip.is_none() && c.private_ip.is_some()));
        assert_ne!(calls[0].private_ip, calls[1].private_ip);
    }

    #[tokio::test]
    async fn test_failed_stack_launches_nothing() {
        let cloud = Arc::new(FakeCloud::failing("net-manage"));
        let alloc = allocator(&cloud).await;

        let launched = alloc
            .alloc("c1", &[request(&["80"])], CONNECTOR_CTYPE, false)
            .await
            .unwrap();

        assert!(launched.is_empty());
        assert!(alloc.launcher().calls().await.is_empty());
        assert!(alloc.registry().is_empty().await);
        assert_eq!(cloud.stack_count(), 1);
    }

    #[tokio::test]
    async fn test_invalid_port_fails_before_submission() {
        let cloud = Arc::new(FakeCloud::new("net-manage"));
        let alloc = allocator(&cloud).await;

        let result = alloc
            .alloc("c1", &[request(&["80:http"])], CONNECTOR_CTYPE, false)
            .await;
        assert!(result.is_err());
        assert_eq!(cloud.stack_count(), 0);
    }

    #[tokio::test]
    async fn test_release_tears_down_and_forgets() {
        let cloud = Arc::new(FakeCloud::new("net-manage"));
        let alloc = allocator(&cloud).await;

        alloc
            .alloc("c1", &[request(&["80"]), request(&["443"])], CONNECTOR_CTYPE, false)
            .await
            .unwrap();
        let stack_id = alloc.registry().get("c1").await.unwrap().stack_id;

        let released = alloc.release("c1").await.unwrap();
        assert_eq!(released, 2);
        assert_eq!(cloud.disassociated().len(), 2);
        assert_eq!(cloud.deleted(), vec![stack_id]);
        assert!(!alloc.registry().contains("c1").await);

        let err = alloc.release("c1").await.unwrap_err();
        assert!(matches!(
            err,
            StackfabError::State(StateError::UnknownCluster { .. })
        ));
    }

    #[derive(Debug)]
    struct UnreachableLauncher;

    #[async_trait::async_trait]
    impl WorkloadLauncher for UnreachableLauncher {
        async fn execute_docker_containers(
            &self,
            _container: &ContainerInfo,
            _host_opts: &[String],
            _private_ip: Option<&str>,
            _public_ip: Option<&str>,
        ) -> Result<LaunchOutcome> {
            Err(StackfabError::internal("docker daemon unreachable"))
        }
    }

    #[tokio::test]
    async fn test_launcher_failure_names_the_instance() {
        let cloud = Arc::new(FakeCloud::new("net-manage"));
        let alloc = ClusterAllocator::connect(&config(), Arc::clone(&cloud), Arc::clone(&cloud), UnreachableLauncher)
            .await
            .unwrap()
            .with_policy(quick());

        let err = alloc
            .alloc("c1", &[request(&[])], "backend", true)
            .await
            .unwrap_err();
        match err {
            StackfabError::Launch(LaunchError::Failed { host, message }) => {
                assert!(host.starts_with("10.0.0."));
                assert!(message.contains("docker daemon unreachable"));
            }
            other => panic!("unexpected error: {other:?}"),
        }

        // the stack is up and recorded, so it can still be released
        assert!(alloc.registry().contains("c1").await);
        assert_eq!(cloud.stack_count(), 1);
    }

    #[tokio::test]
    async fn test_unrecordable_stack_is_deleted() {
        let temp = TempDir::new().unwrap();
        let store: Arc<dyn RegistryStore> = Arc::new(LocalRegistryStore::with_base_dir(temp.path()));
        let registry = AppRegistry::open(Arc::clone(&store)).await.unwrap();
        let _foreign = store.acquire_lock("other-process").await.unwrap();

        let cloud = Arc::new(FakeCloud::new("net-manage"));
        let alloc = allocator(&cloud).await.with_registry(registry);

        let err = alloc
            .alloc("c1", &[request(&[])], "backend", true)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            StackfabError::State(StateError::LockedByOther { .. })
        ));

        assert_eq!(cloud.deleted(), vec![String::from("stack-1")]);
        assert_eq!(cloud.stack_count(), 0);
        assert!(alloc.registry().is_empty().await);
        assert!(alloc.launcher().calls().await.is_empty());
    }
}
