// # Memory Resource Store
//
// In-memory implementation of ResourceStore.
//
// ## Purpose
//
// Provides a fast store that doesn't persist across restarts. Used by tests
// and by deployments where sources are re-applied from the manifest on
// every start.
//
// ## Crash Behavior
//
// - All objects are lost on restart/crash
// - The first cycle after a restart finds no destination, so it always
//   queries inventory and recreates it

use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

use super::table::ObjectTable;
use crate::Error;
use crate::config::StoreConfig;
use crate::model::{DnsEndpoint, MerakiSource, ObjectKey};
use crate::traits::{ResourceStore, ResourceStoreFactory};

/// In-memory resource store
///
/// Clones share the same underlying table.
///
/// # Example
///
/// ```rust,no_run
/// use merakidns_core::model::{MerakiSource, MerakiSourceSpec, ObjectMeta};
/// use merakidns_core::store::MemoryResourceStore;
/// use merakidns_core::traits::ResourceStore;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let store = MemoryResourceStore::new();
///
///     let source = MerakiSource::new(ObjectMeta::new("dns", "office"), MerakiSourceSpec::default());
///     let stored = store.apply_source(&source).await?;
///     assert!(stored.metadata.uid.is_some());
///
///     Ok(())
/// }
/// ```
#[derive(Debug, Clone, Default)]
pub struct MemoryResourceStore {
    inner: Arc<RwLock<ObjectTable>>,
}

impl MemoryResourceStore {
    /// Create a new empty memory store
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored endpoints
    pub async fn endpoint_count(&self) -> usize {
        self.inner.read().await.endpoint_count()
    }

    /// Number of stored sources
    pub async fn source_count(&self) -> usize {
        self.inner.read().await.source_count()
    }
}

#[async_trait]
impl ResourceStore for MemoryResourceStore {
    async fn get_source(&self, key: &ObjectKey) -> Result<Option<MerakiSource>, Error> {
        Ok(self.inner.read().await.get_source(key))
    }

    async fn get_endpoint(&self, key: &ObjectKey) -> Result<Option<DnsEndpoint>, Error> {
        Ok(self.inner.read().await.get_endpoint(key))
    }

    async fn create_endpoint(&self, endpoint: &DnsEndpoint) -> Result<DnsEndpoint, Error> {
        self.inner.write().await.create_endpoint(endpoint)
    }

    async fn update_endpoint(&self, endpoint: &DnsEndpoint) -> Result<DnsEndpoint, Error> {
        self.inner.write().await.update_endpoint(endpoint)
    }

    async fn update_source_status(&self, source: &MerakiSource) -> Result<MerakiSource, Error> {
        self.inner.write().await.update_source_status(source)
    }

    async fn apply_source(&self, source: &MerakiSource) -> Result<MerakiSource, Error> {
        Ok(self.inner.write().await.apply_source(source))
    }

    async fn delete_source(&self, key: &ObjectKey) -> Result<bool, Error> {
        let removed = self.inner.write().await.delete_source(key);
        match removed {
            Some(endpoints) => {
                debug!("Deleted source {} and {} owned endpoints", key, endpoints.len());
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn list_sources(&self) -> Result<Vec<ObjectKey>, Error> {
        Ok(self.inner.read().await.list_sources())
    }

    async fn flush(&self) -> Result<(), Error> {
        // No-op for memory store
        Ok(())
    }

    fn store_name(&self) -> &'static str {
        "memory"
    }
}

/// Factory for creating memory stores
pub struct MemoryResourceStoreFactory;

#[async_trait]
impl ResourceStoreFactory for MemoryResourceStoreFactory {
    async fn create(&self, config: &StoreConfig) -> Result<Arc<dyn ResourceStore>, Error> {
        match config {
            StoreConfig::Memory => Ok(Arc::new(MemoryResourceStore::new())),
            _ => Err(Error::config("Expected Memory store configuration")),
        }
    }
}
