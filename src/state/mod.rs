//! Allocation registry for stackfab.
//!
//! This module tracks allocated clusters so they can be found again for
//! status reporting and teardown, optionally persisted to a local JSON file.

mod local;
mod lock;
mod registry;
mod store;
mod types;

pub use local::{LocalRegistryStore, STATE_DIR};
pub use lock::{LOCK_EXPIRY_SECS, LockInfo, generate_holder_id};
pub use registry::AppRegistry;
pub use store::RegistryStore;
pub use types::{ClusterRecord, REGISTRY_VERSION, RegistrySnapshot};
#[cfg(test)]
pub(crate) use types::tests::record as sample_record;
