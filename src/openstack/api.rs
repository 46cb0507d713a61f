//! Consumed cloud capabilities.
//!
//! The provisioning, reconciliation and teardown drivers only see these two
//! traits, so they can run against the HTTP clients or against test doubles.

use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;
use serde_json::Value;
use std::sync::Arc;

use crate::error::Result;

use super::types::{FloatingIp, Port, Stack, StackResource, Subnet};

/// Template execution engine (Heat).
#[cfg_attr(test, automock)]
#[async_trait]
pub trait OrchestrationApi: Send + Sync {
    /// Creates a stack and returns its id.
    async fn create_stack(&self, name: &str, template: &Value) -> Result<String>;

    /// Fetches a stack by id.
    async fn get_stack(&self, stack_id: &str) -> Result<Stack>;

    /// Lists the realized resources of a stack.
    async fn list_resources(&self, stack_id: &str) -> Result<Vec<StackResource>>;

    /// Replaces a stack's template.
    async fn update_stack(&self, stack_id: &str, template: &Value) -> Result<()>;

    /// Deletes a stack without waiting for completion.
    async fn delete_stack(&self, stack_id: &str) -> Result<()>;
}

/// Network management API (Neutron).
#[cfg_attr(test, automock)]
#[async_trait]
pub trait NetworkApi: Send + Sync {
    /// Lists all subnets.
    async fn list_subnets(&self) -> Result<Vec<Subnet>>;

    /// Lists all floating IPs.
    async fn list_floatingips(&self) -> Result<Vec<FloatingIp>>;

    /// Lists all ports.
    async fn list_ports(&self) -> Result<Vec<Port>>;

    /// Clears a floating IP's port binding.
    async fn disassociate_floatingip(&self, floatingip_id: &str) -> Result<()>;
}

#[async_trait]
impl<T: OrchestrationApi + ?Sized> OrchestrationApi for Arc<T> {
    async fn create_stack(&self, name: &str, template: &Value) -> Result<String> {
        (**self).create_stack(name, template).await
    }

    async fn get_stack(&self, stack_id: &str) -> Result<Stack> {
        (**self).get_stack(stack_id).await
    }

    async fn list_resources(&self, stack_id: &str) -> Result<Vec<StackResource>> {
        (**self).list_resources(stack_id).await
    }

    async fn update_stack(&self, stack_id: &str, template: &Value) -> Result<()> {
        (**self).update_stack(stack_id, template).await
    }

    async fn delete_stack(&self, stack_id: &str) -> Result<()> {
        (**self).delete_stack(stack_id).await
    }
}

#[async_trait]
impl<T: NetworkApi + ?Sized> NetworkApi for Arc<T> {
    async fn list_subnets(&self) -> Result<Vec<Subnet>> {
        (**self).list_subnets().await
    }

    async fn list_floatingips(&self) -> Result<Vec<FloatingIp>> {
        (**self).list_floatingips().await
    }

    async fn list_ports(&self) -> Result<Vec<Port>> {
        (**self).list_ports().await
    }

    async fn disassociate_floatingip(&self, floatingip_id: &str) -> Result<()> {
        (**self).disassociate_floatingip(floatingip_id).await
    }
}
