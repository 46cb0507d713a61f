//! Stack provisioning driver.
//!
//! Submits a composed plan, polls Heat until the stack reaches a terminal
//! state, then writes the physical ids of the realized resources back into
//! the plan's description.

use serde_json::Value;
use std::time::{Duration, Instant};
use tracing::{debug, info, trace, warn};

use crate::error::{OrchestrationError, Result};
use crate::planner::{StackDescription, StackPlan};

use super::api::OrchestrationApi;
use super::types::{StackResource, StackStatus};

/// Default delay between status polls, in seconds.
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 2;

/// Default upper bound on a single wait, in seconds.
pub const DEFAULT_MAX_WAIT_SECS: u64 = 15 * 60;

/// Default number of consecutive authorization failures tolerated.
pub const DEFAULT_MAX_AUTH_FAILURES: u32 = 10;

/// Bounds on the stack status poll loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    /// Delay between polls.
    pub interval: Duration,
    /// Total time budget for one wait.
    pub max_wait: Duration,
    /// Consecutive authorization failures before giving up.
    pub max_auth_failures: u32,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(DEFAULT_POLL_INTERVAL_SECS),
            max_wait: Duration::from_secs(DEFAULT_MAX_WAIT_SECS),
            max_auth_failures: DEFAULT_MAX_AUTH_FAILURES,
        }
    }
}

/// Drives stacks through creation and update.
#[derive(Debug)]
pub struct StackDriver<'a, O: ?Sized> {
    api: &'a O,
    policy: PollPolicy,
}

impl<'a, O: OrchestrationApi + ?Sized> StackDriver<'a, O> {
    /// Creates a driver with the default poll policy.
    #[must_use]
    pub fn new(api: &'a O) -> Self {
        Self {
            api,
            policy: PollPolicy::default(),
        }
    }

    /// Replaces the poll policy.
    #[must_use]
    pub const fn with_policy(mut self, policy: PollPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Submits a plan and waits for it.
    ///
    /// Returns the description with physical ids filled in and the stack's
    /// own id recorded under `name`, or `None` if the stack failed.
    ///
    /// # Errors
    ///
    /// Returns an error if an API call fails or the poll budget runs out.
    pub async fn submit(
        &self,
        name: &str,
        plan: &StackPlan,
        mut description: StackDescription,
    ) -> Result<Option<StackDescription>> {
        let template = plan.to_json()?;
        debug!("Submitting stack {}: {}", name, template);

        let stack_id = self.api.create_stack(name, &template).await?;
        info!("Stack {} submitted (ID: {})", name, stack_id);

        if !self.wait_for_stack(&stack_id).await? {
            warn!("Stack {} ({}) failed to create", name, stack_id);
            return Ok(None);
        }

        let resources = self.collect_resources(&stack_id).await?;
        let stitched = stitch_physical_ids(&mut description, &resources);
        debug!(
            "Stack {} realized {} resources, {} tracked",
            name,
            resources.len(),
            stitched
        );

        description.record_stack(name, &stack_id);
        info!("Stack {} is ready", name);
        Ok(Some(description))
    }

    /// Polls a stack until it completes (`true`) or fails (`false`).
    ///
    /// Authorization failures are retried up to the policy's limit;
    /// transport failures are retried until the time budget runs out.
    ///
    /// # Errors
    ///
    /// Returns [`OrchestrationError::StackTimeout`] when the time budget is
    /// spent, [`OrchestrationError::AuthRetriesExhausted`] when authorization
    /// keeps failing, or any other API error as-is.
    pub async fn wait_for_stack(&self, stack_id: &str) -> Result<bool> {
        let start = Instant::now();
        let mut auth_failures = 0u32;

        loop {
            match self.api.get_stack(stack_id).await {
                Ok(stack) => {
                    auth_failures = 0;
                    let status = stack.status();
                    if status.is_terminal() {
                        if status == StackStatus::Failed {
                            warn!(
                                "Stack {} reached {}: {}",
                                stack_id,
                                stack.stack_status,
                                stack.stack_status_reason.as_deref().unwrap_or("no reason given")
                            );
                        }
                        return Ok(status == StackStatus::Complete);
                    }
                    trace!("Stack {} is {}", stack_id, stack.stack_status);
                }
                Err(e) if e.is_unauthorized() => {
                    auth_failures += 1;
                    warn!(
                        "Authorization failed while polling stack {} ({}/{}): {}",
                        stack_id, auth_failures, self.policy.max_auth_failures, e
                    );
                    if auth_failures >= self.policy.max_auth_failures {
                        return Err(OrchestrationError::AuthRetriesExhausted {
                            stack_id: stack_id.to_string(),
                            attempts: auth_failures,
                        }
                        .into());
                    }
                }
                Err(e) if e.is_retryable() => {
                    warn!("Transient failure while polling stack {}: {}", stack_id, e);
                }
                Err(e) => return Err(e),
            }

            if start.elapsed() >= self.policy.max_wait {
                return Err(OrchestrationError::StackTimeout {
                    stack_id: stack_id.to_string(),
                    waited_secs: start.elapsed().as_secs(),
                }
                .into());
            }

            tokio::time::sleep(self.policy.interval).await;
        }
    }

    /// Lists the realized resources of a stack.
    ///
    /// # Errors
    ///
    /// Returns an error if the API call fails.
    pub async fn collect_resources(&self, stack_id: &str) -> Result<Vec<StackResource>> {
        self.api.list_resources(stack_id).await
    }

    /// Submits a new template for an existing stack and waits for it.
    ///
    /// # Errors
    ///
    /// Returns an error if an API call fails or the poll budget runs out.
    pub async fn update(&self, stack_id: &str, plan: &StackPlan) -> Result<bool> {
        let template: Value = plan.to_json()?;
        info!("Updating stack {}", stack_id);
        self.api.update_stack(stack_id, &template).await?;
        self.wait_for_stack(stack_id).await
    }
}

/// Writes physical ids into the description; returns how many matched.
fn stitch_physical_ids(description: &mut StackDescription, resources: &[StackResource]) -> usize {
    let mut matched = 0;
    for resource in resources {
        if let Some(entry) = description.get_mut(&resource.logical_resource_id) {
            entry.id = Some(resource.physical_resource_id.clone());
            matched += 1;
        }
    }
    matched
}
