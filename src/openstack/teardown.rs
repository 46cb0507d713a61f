//! Stack teardown.
//!
//! Heat refuses to delete a stack while one of its floating IPs is still
//! bound to a port it is also deleting, so bindings are cleared first.

use tracing::{debug, info};

use crate::error::Result;
use crate::planner::ResourceType;

use super::api::{NetworkApi, OrchestrationApi};

/// Deletes stacks after clearing their floating-IP bindings.
#[derive(Debug)]
pub struct StackTeardown<'a, O: ?Sized, N: ?Sized> {
    orchestration: &'a O,
    network: &'a N,
}

impl<'a, O, N> StackTeardown<'a, O, N>
where
    O: OrchestrationApi + ?Sized,
    N: NetworkApi + ?Sized,
{
    /// Creates a teardown driver.
    #[must_use]
    pub const fn new(orchestration: &'a O, network: &'a N) -> Self {
        Self {
            orchestration,
            network,
        }
    }

    /// Disassociates every floating IP of the stack, then requests deletion.
    ///
    /// Deletion is not awaited. Returns the number of floating IPs released.
    ///
    /// # Errors
    ///
    /// Returns an error if any API call fails; the stack is not deleted if a
    /// disassociation fails.
    pub async fn destroy(&self, stack_id: &str) -> Result<usize> {
        let resources = self.orchestration.list_resources(stack_id).await?;

        let mut released = 0;
        for resource in resources
            .iter()
            .filter(|r| r.resource_type == ResourceType::FloatingIp)
        {
            debug!(
                "Releasing floating IP {} ({})",
                resource.logical_resource_id, resource.physical_resource_id
            );
            self.network
                .disassociate_floatingip(&resource.physical_resource_id)
                .await?;
            released += 1;
        }

        self.orchestration.delete_stack(stack_id).await?;
        info!(
            "Deletion of stack {} requested ({} floating IPs released)",
            stack_id, released
        );
        Ok(released)
    }
}
