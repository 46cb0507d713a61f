//! OpenStack integration.
//!
//! This module contains everything that talks to the cloud:
//! - The consumed Heat and Neutron capabilities as traits
//! - Keystone-authenticated HTTP clients implementing them
//! - Provisioning, network reconciliation and teardown drivers

mod api;
mod auth;
#[cfg(test)]
pub(crate) mod fake;
mod heat;
mod network;
mod neutron;
mod provisioner;
mod session;
mod teardown;
mod types;

pub use api::{NetworkApi, OrchestrationApi};
pub use auth::KeystoneAuth;
pub use heat::HeatClient;
pub use network::NetworkReconciler;
pub use neutron::NeutronClient;
pub use provisioner::{PollPolicy, StackDriver};
pub use session::{ApiSession, DEFAULT_TIMEOUT_SECS, http_client};
pub use teardown::StackTeardown;
pub use types::{FixedIp, FloatingIp, Port, Stack, StackResource, StackStatus, Subnet, SubnetInfo};

use std::sync::Arc;

use crate::config::FabricConfig;
use crate::error::Result;

/// Heat and Neutron clients sharing one Keystone session.
#[derive(Debug, Clone)]
pub struct CloudClients {
    /// Orchestration client.
    pub heat: HeatClient,
    /// Networking client.
    pub neutron: NeutronClient,
}

impl CloudClients {
    /// Builds both clients from configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be created.
    pub fn from_config(config: &FabricConfig) -> Result<Self> {
        let client = http_client(DEFAULT_TIMEOUT_SECS)?;
        let auth = Arc::new(KeystoneAuth::new(
            client.clone(),
            &config.datacenter.keystone,
            config.credentials.clone(),
        ));
        let session = ApiSession::new(client, auth);

        Ok(Self {
            heat: HeatClient::new(session.clone(), &config.datacenter.heat),
            neutron: NeutronClient::new(session, &config.datacenter.neutron),
        })
    }
}
