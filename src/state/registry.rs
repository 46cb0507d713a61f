//! The process-wide allocation table.
//!
//! Records are inserted when a stack completes and removed on release.
//! With a backing store, every change is applied to the saved registry under
//! the store's advisory lock; the in-memory table only changes once the write
//! succeeded.

use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::error::Result;

use super::lock::generate_holder_id;
use super::store::RegistryStore;
use super::types::{ClusterRecord, RegistrySnapshot};

/// Allocation table keyed by cluster id.
#[derive(Debug)]
pub struct AppRegistry {
    records: RwLock<BTreeMap<String, ClusterRecord>>,
    store: Option<Arc<dyn RegistryStore>>,
    holder: String,
}

impl Default for AppRegistry {
    fn default() -> Self {
        Self::in_memory()
    }
}

impl AppRegistry {
    /// Creates an empty registry without persistence.
    #[must_use]
    pub fn in_memory() -> Self {
        Self {
            records: RwLock::new(BTreeMap::new()),
            store: None,
            holder: generate_holder_id(),
        }
    }

    /// Opens a registry backed by `store`, loading any saved records.
    ///
    /// # Errors
    ///
    /// Returns an error if the saved registry cannot be read.
    pub async fn open(store: Arc<dyn RegistryStore>) -> Result<Self> {
        let records = store
            .load()
            .await?
            .map(|snapshot| snapshot.clusters)
            .unwrap_or_default();

        info!(
            "Loaded {} cluster records from {} registry",
            records.len(),
            store.backend_type()
        );

        Ok(Self {
            records: RwLock::new(records),
            store: Some(store),
            holder: generate_holder_id(),
        })
    }

    /// Returns true if changes are persisted.
    #[must_use]
    pub fn is_persistent(&self) -> bool {
        self.store.is_some()
    }

    /// Records an allocation, replacing any previous record for the cluster.
    ///
    /// # Errors
    ///
    /// Returns an error if persisting fails; the table is unchanged then.
    pub async fn insert(&self, record: ClusterRecord) -> Result<Option<ClusterRecord>> {
        let key = record.cluster_uuid.clone();
        self.apply(move |records| records.insert(key, record)).await
    }

    /// Forgets a cluster.
    ///
    /// # Errors
    ///
    /// Returns an error if persisting fails; the table is unchanged then.
    pub async fn remove(&self, cluster_uuid: &str) -> Result<Option<ClusterRecord>> {
        self.apply(|records| records.remove(cluster_uuid)).await
    }

    /// Gets a cluster's record.
    pub async fn get(&self, cluster_uuid: &str) -> Option<ClusterRecord> {
        self.records.read().await.get(cluster_uuid).cloned()
    }

    /// Returns true if the cluster is recorded.
    pub async fn contains(&self, cluster_uuid: &str) -> bool {
        self.records.read().await.contains_key(cluster_uuid)
    }

    /// Lists all records in cluster-id order.
    pub async fn list(&self) -> Vec<ClusterRecord> {
        self.records.read().await.values().cloned().collect()
    }

    /// Returns the number of records.
    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    /// Returns true if no cluster is recorded.
    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }

    /// Applies one change to the table.
    ///
    /// With a store, the change is applied to the snapshot read under the
    /// lock rather than to this process's copy, so records written by other
    /// registries on the same store are kept. The table then takes the
    /// merged result.
    async fn apply<T>(&self, change: impl FnOnce(&mut BTreeMap<String, ClusterRecord>) -> T) -> Result<T> {
        let mut records = self.records.write().await;
        let Some(store) = &self.store else {
            return Ok(change(&mut *records));
        };

        let lock = store.acquire_lock(&self.holder).await?;
        let merged = Self::write_through(store.as_ref(), change).await;
        store.release_lock(&lock.lock_id).await?;
        let (next, outcome) = merged?;

        debug!("Persisted {} cluster records", next.len());
        *records = next;
        Ok(outcome)
    }

    async fn write_through<T>(
        store: &dyn RegistryStore,
        change: impl FnOnce(&mut BTreeMap<String, ClusterRecord>) -> T,
    ) -> Result<(BTreeMap<String, ClusterRecord>, T)> {
        let mut next = store
            .load()
            .await?
            .map(|snapshot| snapshot.clusters)
            .unwrap_or_default();
        let outcome = change(&mut next);
        store.save(&RegistrySnapshot::new(next.clone())).await?;
        Ok((next, outcome))
    }
}
