//! Registry store trait definition.

use async_trait::async_trait;

use crate::error::Result;
use super::lock::LockInfo;
use super::types::RegistrySnapshot;

/// Trait for registry storage backends.
#[async_trait]
pub trait RegistryStore: Send + Sync + std::fmt::Debug {
    /// Loads the registry.
    ///
    /// Returns `None` if nothing has been saved yet.
    async fn load(&self) -> Result<Option<RegistrySnapshot>>;

    /// Saves the registry.
    async fn save(&self, snapshot: &RegistrySnapshot) -> Result<()>;

    /// Acquires the advisory lock.
    async fn acquire_lock(&self, holder: &str) -> Result<LockInfo>;

    /// Releases the advisory lock if `lock_id` still holds it.
    async fn release_lock(&self, lock_id: &str) -> Result<()>;

    /// Gets current lock information if locked.
    async fn get_lock_info(&self) -> Result<Option<LockInfo>>;

    /// Checks if the registry is locked.
    async fn is_locked(&self) -> Result<bool>;

    /// Gets the backend type name.
    fn backend_type(&self) -> &'static str;
}
