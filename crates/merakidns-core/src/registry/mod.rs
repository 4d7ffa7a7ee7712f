//! Explicit type and plugin registry
//!
//! The registry is built once at startup and handed to the reconciler. It
//! replaces process-wide registration with a plain value:
//!
//! - **Kinds**: maps resource kinds to their API group/version, used to build
//!   object and owner references
//! - **Inventory factories**: create inventory clients from configuration
//! - **Store factories**: create resource stores from configuration
//!
//! ## Usage
//!
//! ```rust,ignore
//! use merakidns_core::Registry;
//!
//! let mut registry = Registry::with_builtin_kinds();
//! merakidns_core::store::register(&mut registry);
//! merakidns_inventory_meraki::register(&mut registry);
//!
//! let inventory = registry.create_inventory(&config.inventory)?;
//! let store = registry.create_store(&config.store).await?;
//! ```

use crate::config::{InventoryConfig, StoreConfig};
use crate::error::{Error, Result};
use crate::model::{DnsEndpoint, MerakiSource, ObjectReference, OwnerReference, Resource};
use crate::traits::{InventoryClient, InventoryClientFactory, ResourceStore, ResourceStoreFactory};
use std::collections::HashMap;
use std::sync::Arc;

/// API group of [`MerakiSource`]
pub const SOURCE_GROUP: &str = "dns.jossware.com";

/// API group of [`DnsEndpoint`], as defined by external-dns
pub const ENDPOINT_GROUP: &str = "externaldns.k8s.io";

/// API version shared by both kinds
pub const API_VERSION: &str = "v1alpha1";

/// API group and version of a registered kind
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupVersion {
    pub group: String,
    pub version: String,
}

impl GroupVersion {
    pub fn new(group: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            group: group.into(),
            version: version.into(),
        }
    }

    /// `group/version`, or just `version` for the core group
    pub fn api_version(&self) -> String {
        if self.group.is_empty() {
            self.version.clone()
        } else {
            format!("{}/{}", self.group, self.version)
        }
    }
}

/// Registry of kinds, inventory factories and store factories
///
/// Mutation happens through `&mut self` during startup only; afterwards the
/// registry is shared read-only behind an `Arc`.
#[derive(Default)]
pub struct Registry {
    kinds: HashMap<String, GroupVersion>,
    inventories: HashMap<String, Box<dyn InventoryClientFactory>>,
    stores: HashMap<String, Arc<dyn ResourceStoreFactory>>,
}

impl Registry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with `MerakiSource` and `DNSEndpoint` registered
    pub fn with_builtin_kinds() -> Self {
        let mut registry = Self::new();
        registry.register_kind(MerakiSource::KIND, GroupVersion::new(SOURCE_GROUP, API_VERSION));
        registry.register_kind(DnsEndpoint::KIND, GroupVersion::new(ENDPOINT_GROUP, API_VERSION));
        registry
    }

    pub fn register_kind(&mut self, kind: impl Into<String>, group_version: GroupVersion) {
        self.kinds.insert(kind.into(), group_version);
    }

    /// Register an inventory client factory
    ///
    /// # Parameters
    ///
    /// - `name`: Inventory type name (e.g., "meraki")
    /// - `factory`: Factory object for creating inventory clients
    pub fn register_inventory(
        &mut self,
        name: impl Into<String>,
        factory: Box<dyn InventoryClientFactory>,
    ) {
        self.inventories.insert(name.into(), factory);
    }

    /// Register a resource store factory
    ///
    /// # Parameters
    ///
    /// - `name`: Store type name (e.g., "file", "memory")
    /// - `factory`: Factory object for creating store instances
    pub fn register_store(&mut self, name: impl Into<String>, factory: Box<dyn ResourceStoreFactory>) {
        self.stores.insert(name.into(), Arc::from(factory));
    }

    /// Look up the group/version of a registered kind
    pub fn group_version(&self, kind: &str) -> Result<&GroupVersion> {
        self.kinds
            .get(kind)
            .ok_or_else(|| Error::registry(format!("Kind {kind} is not registered")))
    }

    /// `apiVersion` string for a resource type
    pub fn api_version_of<R: Resource>(&self) -> Result<String> {
        Ok(self.group_version(R::KIND)?.api_version())
    }

    /// Build a reference to a resource, pinned to its current version
    pub fn object_reference<R: Resource>(&self, resource: &R) -> Result<ObjectReference> {
        let meta = resource.metadata();
        Ok(ObjectReference {
            api_version: self.api_version_of::<R>()?,
            kind: R::KIND.to_string(),
            namespace: meta.namespace.clone(),
            name: meta.name.clone(),
            uid: meta.uid.clone(),
            resource_version: meta.resource_version.clone(),
        })
    }

    /// Build a controller owner reference pointing at `owner`
    ///
    /// The owner must have been persisted (it needs a uid).
    pub fn controller_reference<R: Resource>(&self, owner: &R) -> Result<OwnerReference> {
        let meta = owner.metadata();
        let uid = meta.uid.clone().ok_or_else(|| {
            Error::invalid_input(format!(
                "{} {} has no uid, cannot own other objects",
                R::KIND,
                meta.key()
            ))
        })?;

        Ok(OwnerReference {
            api_version: self.api_version_of::<R>()?,
            kind: R::KIND.to_string(),
            name: meta.name.clone(),
            uid,
            controller: true,
            block_owner_deletion: true,
        })
    }

    /// Create an inventory client from configuration
    ///
    /// - `Err(Error::Registry)`: the inventory type is not registered
    pub fn create_inventory(&self, config: &InventoryConfig) -> Result<Arc<dyn InventoryClient>> {
        let inventory_type = config.type_name();
        let factory = self.inventories.get(inventory_type).ok_or_else(|| {
            Error::registry(format!("Unknown inventory type: {inventory_type}"))
        })?;

        factory.create(config)
    }

    /// Create a resource store from configuration
    ///
    /// - `Err(Error::Registry)`: the store type is not registered
    pub async fn create_store(&self, config: &StoreConfig) -> Result<Arc<dyn ResourceStore>> {
        let store_type = config.type_name();
        let factory = self
            .stores
            .get(store_type)
            .ok_or_else(|| Error::registry(format!("Unknown store type: {store_type}")))?
            .clone();

        factory.create(config).await
    }

    pub fn has_kind(&self, kind: &str) -> bool {
        self.kinds.contains_key(kind)
    }

    pub fn has_inventory(&self, name: &str) -> bool {
        self.inventories.contains_key(name)
    }

    pub fn has_store(&self, name: &str) -> bool {
        self.stores.contains_key(name)
    }

    /// Registered inventory type names, sorted
    pub fn list_inventories(&self) -> Vec<String> {
        let mut names: Vec<String> = self.inventories.keys().cloned().collect();
        names.sort();
        names
    }

    /// Registered store type names, sorted
    pub fn list_stores(&self) -> Vec<String> {
        let mut names: Vec<String> = self.stores.keys().cloned().collect();
        names.sort();
        names
    }
}
