//! Test doubles and common utilities for reconcile contract tests
//!
//! The doubles count every collaborator call so tests can assert on what a
//! cycle did, not only on what it returned.

#![allow(dead_code)]

use chrono::{DateTime, TimeZone, Utc};
use merakidns_core::config::ReconcilerConfig;
use merakidns_core::error::{Error, Result};
use merakidns_core::model::{
    Client, DnsEndpoint, MerakiRef, MerakiSource, MerakiSourceSpec, Network, ObjectKey,
    ObjectMeta, Organization,
};
use merakidns_core::store::MemoryResourceStore;
use merakidns_core::traits::{InventoryClient, ResourceStore};
use merakidns_core::{Reconciler, Registry};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// An inventory with a mutable client list and per-call counters
pub struct CountingInventory {
    organizations: Vec<Organization>,
    networks: Vec<Network>,
    clients: Mutex<Vec<Client>>,
    /// HTTP status to fail every call with, if any
    failure: Mutex<Option<u16>>,
    organization_calls: AtomicUsize,
    network_calls: AtomicUsize,
    client_calls: AtomicUsize,
}

impl CountingInventory {
    pub fn new(organizations: Vec<Organization>, networks: Vec<Network>, clients: Vec<Client>) -> Self {
        Self {
            organizations,
            networks,
            clients: Mutex::new(clients),
            failure: Mutex::new(None),
            organization_calls: AtomicUsize::new(0),
            network_calls: AtomicUsize::new(0),
            client_calls: AtomicUsize::new(0),
        }
    }

    /// Replace the clients reported from now on
    pub fn set_clients(&self, clients: Vec<Client>) {
        *self.clients.lock().unwrap() = clients;
    }

    /// Fail every call with this HTTP status
    pub fn fail_with(&self, status: u16) {
        *self.failure.lock().unwrap() = Some(status);
    }

    pub fn organization_calls(&self) -> usize {
        self.organization_calls.load(Ordering::SeqCst)
    }

    pub fn network_calls(&self) -> usize {
        self.network_calls.load(Ordering::SeqCst)
    }

    pub fn client_calls(&self) -> usize {
        self.client_calls.load(Ordering::SeqCst)
    }

    /// Total calls of any kind
    pub fn total_calls(&self) -> usize {
        self.organization_calls() + self.network_calls() + self.client_calls()
    }

    fn check_failure(&self) -> Result<()> {
        match *self.failure.lock().unwrap() {
            Some(status) => Err(Error::transport(
                "counting",
                Some(status),
                format!("HTTP {status}"),
            )),
            None => Ok(()),
        }
    }
}

#[async_trait::async_trait]
impl InventoryClient for CountingInventory {
    async fn organizations(&self) -> Result<Vec<Organization>> {
        self.organization_calls.fetch_add(1, Ordering::SeqCst);
        self.check_failure()?;
        Ok(self.organizations.clone())
    }

    async fn networks(&self, organization_id: &str) -> Result<Vec<Network>> {
        self.network_calls.fetch_add(1, Ordering::SeqCst);
        self.check_failure()?;
        Ok(self
            .networks
            .iter()
            .filter(|n| n.organization_id.as_deref() == Some(organization_id))
            .cloned()
            .collect())
    }

    async fn clients(&self, _network_id: &str) -> Result<Vec<Client>> {
        self.client_calls.fetch_add(1, Ordering::SeqCst);
        self.check_failure()?;
        Ok(self.clients.lock().unwrap().clone())
    }

    fn inventory_name(&self) -> &'static str {
        "counting"
    }
}

/// A store whose next status writes lose a race against another writer
///
/// Before delegating, the wrapper commits the currently stored status
/// itself, so the caller's write carries a stale resourceVersion and gets a
/// real `Error::Conflict` from the inner store.
pub struct ConflictInjectingStore {
    inner: MemoryResourceStore,
    conflicts_remaining: AtomicUsize,
}

impl ConflictInjectingStore {
    pub fn new(inner: MemoryResourceStore, conflicts: usize) -> Self {
        Self {
            inner,
            conflicts_remaining: AtomicUsize::new(conflicts),
        }
    }
}

#[async_trait::async_trait]
impl ResourceStore for ConflictInjectingStore {
    async fn get_source(&self, key: &ObjectKey) -> Result<Option<MerakiSource>> {
        self.inner.get_source(key).await
    }

    async fn get_endpoint(&self, key: &ObjectKey) -> Result<Option<DnsEndpoint>> {
        self.inner.get_endpoint(key).await
    }

    async fn create_endpoint(&self, endpoint: &DnsEndpoint) -> Result<DnsEndpoint> {
        self.inner.create_endpoint(endpoint).await
    }

    async fn update_endpoint(&self, endpoint: &DnsEndpoint) -> Result<DnsEndpoint> {
        self.inner.update_endpoint(endpoint).await
    }

    async fn update_source_status(&self, source: &MerakiSource) -> Result<MerakiSource> {
        let inject = self
            .conflicts_remaining
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();

        if inject && let Some(current) = self.inner.get_source(&source.metadata.key()).await? {
            self.inner.update_source_status(&current).await?;
        }

        self.inner.update_source_status(source).await
    }

    async fn apply_source(&self, source: &MerakiSource) -> Result<MerakiSource> {
        self.inner.apply_source(source).await
    }

    async fn delete_source(&self, key: &ObjectKey) -> Result<bool> {
        self.inner.delete_source(key).await
    }

    async fn list_sources(&self) -> Result<Vec<ObjectKey>> {
        self.inner.list_sources().await
    }

    async fn flush(&self) -> Result<()> {
        self.inner.flush().await
    }

    fn store_name(&self) -> &'static str {
        "conflict-injecting"
    }
}

pub fn organization(id: &str, name: &str) -> Organization {
    Organization {
        id: id.to_string(),
        name: name.to_string(),
        url: None,
    }
}

pub fn network(id: &str, organization_id: &str, name: &str) -> Network {
    Network {
        id: id.to_string(),
        name: name.to_string(),
        organization_id: Some(organization_id.to_string()),
        time_zone: None,
        tags: None,
        product_types: Vec::new(),
        network_type: None,
    }
}

/// Three clients: two described, one known only by MAC
pub fn office_clients() -> Vec<Client> {
    vec![
        Client::new("k1", "aa:bb:cc:00:00:01", "10.0.0.10").with_description("Living Room TV"),
        Client::new("k2", "AA:BB:CC:00:00:02", "10.0.0.11"),
        Client::new("k3", "aa:bb:cc:00:00:03", "10.0.0.12").with_description("NAS"),
    ]
}

/// Inventory with organization "Acme" holding network "Main Office"
pub fn office_inventory() -> Arc<CountingInventory> {
    Arc::new(CountingInventory::new(
        vec![organization("O_1", "Acme")],
        vec![network("N_1", "O_1", "Main Office")],
        office_clients(),
    ))
}

pub fn office_spec() -> MerakiSourceSpec {
    MerakiSourceSpec {
        organization: MerakiRef::by_name("acme"),
        network: MerakiRef::by_name("main office"),
        domain: "home.example.com".to_string(),
        ttl: None,
    }
}

pub fn office_key() -> ObjectKey {
    ObjectKey::new("dns", "office")
}

/// Store a source and return it as stored
pub async fn seed_source(store: &dyn ResourceStore, key: &ObjectKey, spec: MerakiSourceSpec) -> MerakiSource {
    let source = MerakiSource::new(ObjectMeta::new(&key.namespace, &key.name), spec);
    store.apply_source(&source).await.expect("source is stored")
}

pub fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
}

pub fn seconds(n: i64) -> chrono::Duration {
    chrono::Duration::seconds(n)
}

/// Reconciler config with a 60s throttle and 300s requeue
pub fn reconciler_config() -> ReconcilerConfig {
    ReconcilerConfig {
        throttle_interval_secs: 60,
        requeue_interval_secs: 300,
        ..ReconcilerConfig::default()
    }
}

pub fn reconciler(inventory: Arc<CountingInventory>, store: Arc<dyn ResourceStore>) -> Reconciler {
    Reconciler::new(
        inventory,
        store,
        Arc::new(Registry::with_builtin_kinds()),
        &reconciler_config(),
    )
    .expect("reconciler construction succeeds")
}
