// # Resource Store Trait
//
// Defines the storage contract the reconciler needs from the cluster:
// keyed reads, version-guarded writes, and ownership-aware deletion.
//
// ## Optimistic Concurrency
//
// Every stored object carries a `resourceVersion`. Updates must present the
// version they were derived from; a mismatch is rejected with
// `Error::Conflict` and nothing is written. Callers re-read and retry.
//
// ## Implementations
//
// - In-memory: `store::MemoryResourceStore`
// - File-backed JSON: `store::FileResourceStore`
// - A real cluster API server would implement the same contract

use async_trait::async_trait;
use std::sync::Arc;

use crate::model::{DnsEndpoint, MerakiSource, ObjectKey};

/// Trait for resource store implementations
///
/// # Thread Safety
///
/// All methods must be safe to call concurrently from multiple tasks.
/// No method may hold a lock across an await point of its caller.
///
/// # Write Semantics
///
/// Writes are atomic per object: they either fully apply (and return the
/// stored object with its new `resourceVersion`) or leave the prior state
/// untouched.
#[async_trait]
pub trait ResourceStore: Send + Sync {
    /// Get a source by key (`Ok(None)` when absent)
    async fn get_source(&self, key: &ObjectKey) -> Result<Option<MerakiSource>, crate::Error>;

    /// Get an endpoint by key (`Ok(None)` when absent)
    async fn get_endpoint(&self, key: &ObjectKey) -> Result<Option<DnsEndpoint>, crate::Error>;

    /// Create an endpoint
    ///
    /// Assigns uid, creation timestamp and resource version. Fails with
    /// `Error::Conflict` when an endpoint with the same key already exists.
    async fn create_endpoint(&self, endpoint: &DnsEndpoint) -> Result<DnsEndpoint, crate::Error>;

    /// Replace an endpoint's spec and owner references
    ///
    /// - `Error::Conflict`: stored version differs from `endpoint.metadata.resource_version`
    /// - `Error::NotFound`: the endpoint no longer exists
    async fn update_endpoint(&self, endpoint: &DnsEndpoint) -> Result<DnsEndpoint, crate::Error>;

    /// Replace a source's status, leaving its spec untouched
    ///
    /// - `Error::Conflict`: stored version differs from `source.metadata.resource_version`
    /// - `Error::NotFound`: the source no longer exists
    async fn update_source_status(&self, source: &MerakiSource)
    -> Result<MerakiSource, crate::Error>;

    /// Create a source or replace the spec of an existing one (status is kept)
    async fn apply_source(&self, source: &MerakiSource) -> Result<MerakiSource, crate::Error>;

    /// Delete a source and every endpoint it controls
    ///
    /// Returns `Ok(false)` when the source did not exist.
    async fn delete_source(&self, key: &ObjectKey) -> Result<bool, crate::Error>;

    /// List all source keys
    async fn list_sources(&self) -> Result<Vec<ObjectKey>, crate::Error>;

    /// Persist any pending changes
    async fn flush(&self) -> Result<(), crate::Error>;

    /// Store name (for logging/debugging)
    fn store_name(&self) -> &'static str;
}

/// Helper trait for constructing resource stores from configuration
#[async_trait]
pub trait ResourceStoreFactory: Send + Sync {
    async fn create(
        &self,
        config: &crate::config::StoreConfig,
    ) -> Result<Arc<dyn ResourceStore>, crate::Error>;
}
