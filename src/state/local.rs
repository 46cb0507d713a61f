//! Local file-based registry store.
//!
//! The registry lives in `registry.json` under a base directory, normally
//! `.stackfab` next to the configuration file.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::debug;

use crate::error::{Result, StackfabError, StateError};

use super::lock::{LockInfo, generate_holder_id};
use super::store::RegistryStore;
use super::types::RegistrySnapshot;

/// Default registry directory name.
pub const STATE_DIR: &str = ".stackfab";

/// Registry file name.
const REGISTRY_FILE: &str = "registry.json";

/// Lock file name.
const LOCK_FILE: &str = "registry.lock";

/// Local file-based registry store.
#[derive(Debug)]
pub struct LocalRegistryStore {
    /// Base directory for registry files.
    base_dir: PathBuf,
    /// Path to the registry file.
    registry_path: PathBuf,
    /// Path to the lock file.
    lock_path: PathBuf,
}

fn write_failed(what: &str, e: &std::io::Error) -> StackfabError {
    StateError::WriteFailed {
        message: format!("{what}: {e}"),
    }
    .into()
}

fn lock_failed(what: &str, e: &std::io::Error) -> StackfabError {
    StateError::LockFailed {
        message: format!("{what}: {e}"),
    }
    .into()
}

impl LocalRegistryStore {
    /// Creates a store with a custom base directory.
    #[must_use]
    pub fn with_base_dir(base_dir: impl Into<PathBuf>) -> Self {
        let base_dir = base_dir.into();
        let registry_path = base_dir.join(REGISTRY_FILE);
        let lock_path = base_dir.join(LOCK_FILE);

        Self {
            base_dir,
            registry_path,
            lock_path,
        }
    }

    /// Returns the registry file path.
    #[must_use]
    pub fn registry_path(&self) -> &Path {
        &self.registry_path
    }

    async fn ensure_dir(&self) -> Result<()> {
        if !self.base_dir.exists() {
            debug!("Creating registry directory: {}", self.base_dir.display());
            fs::create_dir_all(&self.base_dir)
                .await
                .map_err(|e| write_failed("Failed to create registry directory", &e))?;
        }
        Ok(())
    }

    async fn read_lock_file(&self) -> Result<Option<LockInfo>> {
        if !self.lock_path.exists() {
            return Ok(None);
        }

        let content = fs::read_to_string(&self.lock_path).await.map_err(|e| {
            StackfabError::State(StateError::Corrupted {
                message: format!("Failed to read lock file: {e}"),
            })
        })?;

        let lock_info: LockInfo = serde_json::from_str(&content).map_err(|e| {
            StackfabError::State(StateError::Corrupted {
                message: format!("Failed to parse lock file: {e}"),
            })
        })?;

        Ok(Some(lock_info))
    }

    async fn write_lock_file(&self, lock_info: &LockInfo) -> Result<()> {
        self.ensure_dir().await?;

        let content = serde_json::to_string_pretty(lock_info)
            .map_err(|e| StateError::serialization(format!("Failed to serialize lock: {e}")))?;

        let mut file = fs::File::create(&self.lock_path)
            .await
            .map_err(|e| lock_failed("Failed to create lock file", &e))?;
        file.write_all(content.as_bytes())
            .await
            .map_err(|e| lock_failed("Failed to write lock file", &e))?;
        file.sync_all()
            .await
            .map_err(|e| lock_failed("Failed to sync lock file", &e))?;

        Ok(())
    }

    async fn delete_lock_file(&self) -> Result<()> {
        if self.lock_path.exists() {
            fs::remove_file(&self.lock_path)
                .await
                .map_err(|e| lock_failed("Failed to delete lock file", &e))?;
        }
        Ok(())
    }
}

#[async_trait]
impl RegistryStore for LocalRegistryStore {
    async fn load(&self) -> Result<Option<RegistrySnapshot>> {
        if !self.registry_path.exists() {
            debug!("Registry file does not exist: {}", self.registry_path.display());
            return Ok(None);
        }

        debug!("Loading registry from: {}", self.registry_path.display());

        let content = fs::read_to_string(&self.registry_path).await.map_err(|e| {
            StackfabError::State(StateError::Corrupted {
                message: format!("Failed to read registry file: {e}"),
            })
        })?;

        let snapshot: RegistrySnapshot = serde_json::from_str(&content).map_err(|e| {
            StackfabError::State(StateError::Corrupted {
                message: format!("Failed to parse registry file: {e}"),
            })
        })?;

        Ok(Some(snapshot))
    }

    async fn save(&self, snapshot: &RegistrySnapshot) -> Result<()> {
        self.ensure_dir().await?;

        debug!(
            "Saving {} cluster records to: {}",
            snapshot.clusters.len(),
            self.registry_path.display()
        );

        let content = serde_json::to_string_pretty(snapshot)
            .map_err(|e| StateError::serialization(format!("Failed to serialize registry: {e}")))?;

        // Write to a temporary file first, then rename over the registry
        let temp_path = self.registry_path.with_extension("tmp");

        let mut file = fs::File::create(&temp_path)
            .await
            .map_err(|e| write_failed("Failed to create temp registry file", &e))?;
        file.write_all(content.as_bytes())
            .await
            .map_err(|e| write_failed("Failed to write registry file", &e))?;
        file.sync_all()
            .await
            .map_err(|e| write_failed("Failed to sync registry file", &e))?;

        fs::rename(&temp_path, &self.registry_path)
            .await
            .map_err(|e| write_failed("Failed to rename registry file", &e))?;

        Ok(())
    }

    async fn acquire_lock(&self, holder: &str) -> Result<LockInfo> {
        if let Some(existing) = self.read_lock_file().await? {
            existing.ensure_expired()?;
            debug!("Expired lock held by {} found, taking over", existing.holder);
        }

        let holder_id = if holder.is_empty() {
            generate_holder_id()
        } else {
            holder.to_string()
        };

        let lock_info = LockInfo::new(&holder_id);
        self.write_lock_file(&lock_info).await?;

        debug!(
            "Acquired registry lock: {} (expires in {}s)",
            lock_info.lock_id,
            lock_info.remaining().num_seconds()
        );

        Ok(lock_info)
    }

    async fn release_lock(&self, lock_id: &str) -> Result<()> {
        if let Some(existing) = self.read_lock_file().await? {
            if existing.lock_id == lock_id {
                self.delete_lock_file().await?;
                debug!("Released registry lock: {lock_id}");
            } else {
                debug!(
                    "Lock ID mismatch: expected {lock_id}, found {}",
                    existing.lock_id
                );
            }
        }
        Ok(())
    }

    async fn get_lock_info(&self) -> Result<Option<LockInfo>> {
        self.read_lock_file().await
    }

    async fn is_locked(&self) -> Result<bool> {
        if let Some(lock_info) = self.read_lock_file().await? {
            return Ok(!lock_info.is_expired());
        }
        Ok(false)
    }

    fn backend_type(&self) -> &'static str {
        "local"
    }
}
