//! Source reconciler
//!
//! The Reconciler drives one `MerakiSource` towards its desired state:
//! a `DNSEndpoint` of the same name holding one `A` record per inventory
//! client, and a status pointing at that endpoint.
//!
//! ## Architecture
//!
//! ```text
//!                 ┌──────────────┐
//!   ObjectKey ───▶│  Reconciler  │───▶ ReconcileAction
//!                 └──────────────┘
//!                        │
//!      ┌─────────────────┼──────────────────┬─────────────────┐
//!      │                 │                  │                 │
//!      ▼                 ▼                  ▼                 ▼
//! ┌──────────┐   ┌───────────────┐   ┌────────────┐   ┌──────────────┐
//! │  plan    │   │   Resolver    │   │   Mapper   │   │    Status    │
//! │ (decide) │   │ (org/network) │   │ (clients)  │   │ Synchronizer │
//! └──────────┘   └───────────────┘   └────────────┘   └──────────────┘
//! ```
//!
//! ## Cycle
//!
//! 1. Load the source; a missing source ends the cycle with `AwaitChange`
//! 2. Load the destination, or start from an empty unpersisted one
//! 3. Inside the throttle window, reuse the existing record set
//! 4. Otherwise resolve ids, list clients and map them
//! 5. Create or replace the destination, owner reference included
//! 6. Commit status; a version conflict returns `RequeueNow`
//! 7. Requeue after the resync interval
//!
//! Any other failure aborts the cycle before the next write and is returned
//! to the caller for backoff.

pub mod plan;
pub mod status;

pub use plan::{DesiredState, FetchReason, SyncDecision};
pub use status::{StatusOutcome, StatusSynchronizer};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::ReconcilerConfig;
use crate::error::{Error, Result};
use crate::mapper;
use crate::model::{DnsEndpoint, Endpoint, MerakiSource, MerakiSourceSpec, ObjectKey, Resource};
use crate::registry::Registry;
use crate::resolver::InventoryResolver;
use crate::traits::{InventoryClient, ResourceStore};

/// What the scheduler should do with a key after a cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileAction {
    /// Reconcile again after the delay
    RequeueAfter(Duration),
    /// Reconcile again immediately
    RequeueNow,
    /// Nothing to do until the source changes
    AwaitChange,
}

/// Anything the controller can drive
#[async_trait]
pub trait Reconcile: Send + Sync {
    async fn reconcile(&self, key: &ObjectKey, cancel: &CancellationToken) -> Result<ReconcileAction>;
}

/// Events emitted by the Reconciler
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconcileEvent {
    /// The source no longer exists
    SourceMissing { key: ObjectKey },

    /// Inventory was queried and the destination written
    Synced {
        key: ObjectKey,
        endpoints: usize,
        created: bool,
    },

    /// The existing record set was reused
    Throttled { key: ObjectKey, remaining: Duration },

    /// The status write lost a race
    StatusConflict { key: ObjectKey },
}

/// Reconciles `MerakiSource` objects into `DNSEndpoint` objects
pub struct Reconciler {
    inventory: Arc<dyn InventoryClient>,

    store: Arc<dyn ResourceStore>,

    registry: Arc<Registry>,

    status: StatusSynchronizer,

    /// Minimum time between inventory queries for one source
    throttle_interval: Duration,

    /// Delay before the next cycle of a healthy source
    requeue_interval: Duration,

    /// Deadline for each collaborator call
    call_timeout: Duration,

    event_tx: Option<mpsc::Sender<ReconcileEvent>>,
}

impl Reconciler {
    /// Create a new reconciler
    ///
    /// # Errors
    ///
    /// - `Error::Config`: invalid reconciler settings
    /// - `Error::Registry`: `MerakiSource` or `DNSEndpoint` is not registered
    pub fn new(
        inventory: Arc<dyn InventoryClient>,
        store: Arc<dyn ResourceStore>,
        registry: Arc<Registry>,
        config: &ReconcilerConfig,
    ) -> Result<Self> {
        config.validate()?;

        // Fail here rather than after the destination was already written
        registry.api_version_of::<MerakiSource>()?;
        registry.api_version_of::<DnsEndpoint>()?;

        let status = StatusSynchronizer::new(store.clone(), registry.clone(), config.call_timeout());

        Ok(Self {
            inventory,
            store,
            registry,
            status,
            throttle_interval: config.throttle_interval(),
            requeue_interval: config.requeue_interval(),
            call_timeout: config.call_timeout(),
            event_tx: None,
        })
    }

    /// Attach an event channel
    ///
    /// Events are dropped, with a warning, when the channel is full.
    pub fn with_events(mut self, capacity: usize) -> (Self, mpsc::Receiver<ReconcileEvent>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        self.event_tx = Some(tx);
        (self, rx)
    }

    /// Run one cycle for `key` as of `now`
    pub async fn reconcile_at(
        &self,
        key: &ObjectKey,
        now: DateTime<Utc>,
        cancel: &CancellationToken,
    ) -> Result<ReconcileAction> {
        let Some(source) = self.call(self.store.get_source(key), cancel).await? else {
            debug!("Source {} not found, nothing to reconcile", key);
            self.emit_event(ReconcileEvent::SourceMissing { key: key.clone() });
            return Ok(ReconcileAction::AwaitChange);
        };

        let owner = self.registry.controller_reference(&source)?;
        let existing = self.call(self.store.get_endpoint(key), cancel).await?;
        let decision = plan::decide(&source, existing.is_some(), now, self.throttle_interval);
        let destination = existing.unwrap_or_else(|| plan::empty_destination(&source));

        let fetched = match decision {
            SyncDecision::Fetch(reason) => {
                debug!("Syncing {} from {} ({:?})", key, self.inventory.inventory_name(), reason);
                Some(self.fetch_endpoints(&source.spec, cancel).await?)
            }
            SyncDecision::Throttled { remaining } => {
                debug!(
                    "Sync of {} throttled, reusing {} endpoints ({}s left)",
                    key,
                    destination.spec.endpoints.len(),
                    remaining.as_secs()
                );
                self.emit_event(ReconcileEvent::Throttled {
                    key: key.clone(),
                    remaining,
                });
                None
            }
        };

        let desired = plan::desired_state(&source, destination.clone(), owner, fetched, now)?;

        let destination = match desired.destination {
            Some(desired) => self.write_destination(desired, cancel).await?,
            None => destination,
        };

        match self
            .status
            .commit(&source, &destination, desired.synced_at, cancel)
            .await?
        {
            StatusOutcome::Conflict => {
                self.emit_event(ReconcileEvent::StatusConflict { key: key.clone() });
                return Ok(ReconcileAction::RequeueNow);
            }
            StatusOutcome::Committed(_) | StatusOutcome::Unchanged => {}
        }

        Ok(ReconcileAction::RequeueAfter(self.requeue_interval))
    }

    /// Resolve the network, list its clients and map them to endpoints
    async fn fetch_endpoints(
        &self,
        spec: &MerakiSourceSpec,
        cancel: &CancellationToken,
    ) -> Result<Vec<Endpoint>> {
        if spec.domain.is_empty() {
            return Err(Error::invalid_input("domain cannot be empty"));
        }

        let resolver = InventoryResolver::new(self.inventory.as_ref());
        let network_id = self.call(resolver.resolve_network_for(spec), cancel).await?;
        let clients = self.call(self.inventory.clients(&network_id), cancel).await?;

        debug!("Network {} has {} clients", network_id, clients.len());
        Ok(mapper::map_clients(&clients, spec))
    }

    /// Create the destination if it was never persisted, otherwise replace it
    async fn write_destination(
        &self,
        destination: DnsEndpoint,
        cancel: &CancellationToken,
    ) -> Result<DnsEndpoint> {
        let key = destination.key();
        let created = destination.metadata.is_new();

        let written = if created {
            self.call(self.store.create_endpoint(&destination), cancel).await?
        } else {
            self.call(self.store.update_endpoint(&destination), cancel).await?
        };

        info!(
            "{} {} {} with {} endpoints",
            if created { "Created" } else { "Updated" },
            DnsEndpoint::KIND,
            key,
            written.spec.endpoints.len()
        );
        self.emit_event(ReconcileEvent::Synced {
            key,
            endpoints: written.spec.endpoints.len(),
            created,
        });

        Ok(written)
    }

    async fn call<T>(&self, fut: impl Future<Output = Result<T>>, cancel: &CancellationToken) -> Result<T> {
        bounded(fut, self.call_timeout, cancel).await
    }

    fn emit_event(&self, event: ReconcileEvent) {
        if let Some(tx) = &self.event_tx
            && tx.try_send(event).is_err()
        {
            warn!("Reconcile event channel full, dropping event");
        }
    }
}

#[async_trait]
impl Reconcile for Reconciler {
    async fn reconcile(&self, key: &ObjectKey, cancel: &CancellationToken) -> Result<ReconcileAction> {
        self.reconcile_at(key, Utc::now(), cancel).await
    }
}

/// Run a collaborator call under a deadline and a cancellation token
pub(crate) async fn bounded<T>(
    fut: impl Future<Output = Result<T>>,
    deadline: Duration,
    cancel: &CancellationToken,
) -> Result<T> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(Error::Cancelled),
        res = tokio::time::timeout(deadline, fut) => match res {
            Ok(res) => res,
            Err(_) => Err(Error::Timeout(deadline)),
        },
    }
}
