// ============================================================================
// Strict linting - Dangerous or non-idiomatic practices are forbidden
// ============================================================================

#![deny(warnings)]                    // All warnings are treated as errors
#![deny(unsafe_code)]                 // Unsafe code is forbidden
#![deny(missing_docs)]                // All public items must be documented
#![deny(dead_code)]                   // Unused code is forbidden
#![deny(non_camel_case_types)]        // Types must follow CamelCase convention

// Additional strictness - Leave nothing unchecked
#![deny(unused_imports)]              // Unused imports are forbidden
#![deny(unused_variables)]            // Unused variables are forbidden
#![deny(unused_must_use)]             // Must handle Result and Option explicitly
#![deny(non_snake_case)]              // Variables and functions must be snake_case
#![deny(non_upper_case_globals)]      // Constants must be UPPER_CASE
#![deny(nonstandard_style)]           // Non-standard code style is forbidden
#![forbid(unsafe_op_in_unsafe_fn)]    // Unsafe ops in unsafe fns are forbidden

// Clippy lints (warnings only)
#![warn(clippy::all)]                 // All standard Clippy lints
#![warn(clippy::pedantic)]            // Very strict Clippy lints
#![warn(clippy::nursery)]             // Experimental lints
#![warn(clippy::unwrap_used)]         // unwrap() warning
#![warn(clippy::expect_used)]         // expect() warning
#![warn(clippy::panic)]               // panic!() warning
#![warn(clippy::print_stdout)]        // println!() warning
#![warn(clippy::todo)]                // TODO warning
#![warn(clippy::unimplemented)]       // unimplemented!() warning
#![warn(clippy::missing_const_for_fn)] // Force const when possible
#![warn(clippy::unwrap_in_result)]    // unwrap() in Result warning
#![warn(clippy::module_inception)]    // Module with same name as crate warning
#![warn(clippy::redundant_clone)]     // Useless clones warning
#![warn(clippy::shadow_unrelated)]    // Shadowing unrelated variables warning
#![warn(clippy::too_many_arguments)]  // Limit function arguments
#![warn(clippy::cognitive_complexity)] // Limit cognitive complexity

// Safety and robustness lints
#![deny(overflowing_literals)]        // Overflowing literals are forbidden
#![deny(arithmetic_overflow)]         // Arithmetic overflow is forbidden

// ============================================================================
// Crate Documentation
// ============================================================================

//! # Stackfab
//!
//! Cluster provisioning on OpenStack: one Heat stack per cluster role, with
//! Neutron addresses resolved afterwards and handed to a container launcher.
//!
//! ## Overview
//!
//! An allocation request names a cluster, a role tag and a list of
//! containers. Stackfab:
//!
//! - Composes a Heat template with one instance per container, a security
//!   group opening the requested ports, and optional floating IPs
//! - Submits the stack and polls it until it completes or fails
//! - Resolves each port's subnet, private address and floating address
//! - Launches every container with host networking bound to its instance
//!
//! Failed stacks launch nothing. Allocated clusters are recorded so they can
//! be listed and torn down later.
//!
//! ## Modules
//!
//! - [`config`]: Configuration parsing and validation
//! - [`planner`]: Template fragments, composition and fingerprints
//! - [`openstack`]: Keystone, Heat and Neutron clients and drivers
//! - [`allocator`]: Cluster allocation and release
//! - [`state`]: Allocation registry and its local store
//! - [`cli`]: Command-line interface
//!
//! ## Example
//!
//! ```yaml
//! system:
//!   provider: hpcloud
//! hpcloud:
//!   params:
//!     dc: region-b
//!     zone: az2
//!   region-b:
//!     network: <management network id>
//!     extnet: <external network id>
//!     keystone: https://identity.example.com/v3
//!     neutron: https://network.example.com
//!     heat: https://orchestration.example.com/v1/<tenant>
//!   deploy:
//!     image: stackfab-base
//!     personality: standard.small
//!     ssh: stackfab-key
//!     ssh-user: ubuntu
//! ```

// ============================================================================
// Modules
// ============================================================================

pub mod allocator;
pub mod cli;
pub mod config;
pub mod error;
pub mod openstack;
pub mod planner;
pub mod state;

// ============================================================================
// Re-exports
// ============================================================================

pub use allocator::{ClusterAllocator, ContainerInfo, LaunchedCluster, WorkloadLauncher};
pub use cli::{Cli, Commands, OutputFormatter};
pub use config::{ConfigParser, ConfigValidator, FabricConfig};
pub use error::{Result, StackfabError};
pub use openstack::{CloudClients, HeatClient, NetworkApi, NeutronClient, OrchestrationApi};
pub use planner::{ComposedStack, PlanComposer, StackDescription, StackPlan};
pub use state::{AppRegistry, ClusterRecord, LocalRegistryStore, RegistryStore};
