//! Planning module for cluster stacks.
//!
//! This module builds Heat templates without any I/O:
//! - Typed template envelope and resources
//! - Fragment builders and the description side-table
//! - Composition of a cluster role's stack and template fingerprints

mod compose;
mod description;
mod fragments;
mod hash;
pub mod naming;
mod template;

pub use compose::{ComposedStack, PlanComposer, StackRequest};
pub use description::{DescriptionEntry, PortRole, StackDescription};
pub use fragments::{
    ATTACHMENT_MOUNT_POINT, BootScript, Fragment, FragmentBuilder, InstanceSettings, PortRange,
};
pub use hash::PlanHasher;
pub use template::{
    NetworkRef, Resource, ResourceFragment, ResourceType, StackPlan, TEMPLATE_DESCRIPTION,
    TEMPLATE_FORMAT_VERSION, get_attr, reference,
};
