//! Status synchronizer
//!
//! Writes the destination reference and the sync timestamp back to the
//! source, in one update guarded by the source's `resourceVersion`.
//!
//! A version mismatch is reported as [`StatusOutcome::Conflict`]. It is never
//! retried or merged here: the caller re-runs the whole cycle from a fresh
//! read.

use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::{bounded, plan};
use crate::error::Result;
use crate::model::{DnsEndpoint, MerakiSource};
use crate::registry::Registry;
use crate::traits::ResourceStore;

/// Result of a status commit
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatusOutcome {
    /// The new status was stored
    Committed(MerakiSource),
    /// The stored status already matched, nothing was written
    Unchanged,
    /// The source changed since it was read
    Conflict,
}

pub struct StatusSynchronizer {
    store: Arc<dyn ResourceStore>,
    registry: Arc<Registry>,
    call_timeout: Duration,
}

impl StatusSynchronizer {
    pub fn new(store: Arc<dyn ResourceStore>, registry: Arc<Registry>, call_timeout: Duration) -> Self {
        Self {
            store,
            registry,
            call_timeout,
        }
    }

    /// Point `source`'s status at `destination`
    ///
    /// `synced_at` is `Some` only when this cycle fetched from inventory.
    pub async fn commit(
        &self,
        source: &MerakiSource,
        destination: &DnsEndpoint,
        synced_at: Option<DateTime<Utc>>,
        cancel: &CancellationToken,
    ) -> Result<StatusOutcome> {
        let reference = self.registry.object_reference(destination)?;
        let status = plan::desired_status(&source.status, reference, synced_at);

        if status == source.status {
            debug!("Status of {} is up to date", source.metadata.key());
            return Ok(StatusOutcome::Unchanged);
        }

        let mut updated = source.clone();
        updated.status = status;

        let write = self.store.update_source_status(&updated);
        match bounded(write, self.call_timeout, cancel).await {
            Ok(stored) => {
                debug!(
                    "Committed status of {} (version {:?})",
                    stored.metadata.key(),
                    stored.metadata.resource_version
                );
                Ok(StatusOutcome::Committed(stored))
            }
            Err(e) if e.is_conflict() => {
                warn!("Status of {} changed concurrently: {}", source.metadata.key(), e);
                Ok(StatusOutcome::Conflict)
            }
            Err(e) => Err(e),
        }
    }
}
