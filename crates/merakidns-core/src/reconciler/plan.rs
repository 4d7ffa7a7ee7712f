// # Reconcile Planning
//
// Pure functions deciding what a reconcile cycle should do, given the loaded
// source, the loaded destination and the current time. No I/O happens here,
// so every branch of the algorithm is testable without a store, an
// inventory or a scheduler.

use chrono::{DateTime, Utc};
use std::time::Duration;

use crate::error::{Error, Result};
use crate::model::{
    DnsEndpoint, Endpoint, MerakiSource, MerakiSourceStatus, ObjectMeta, ObjectReference,
    OwnerReference,
};

/// Whether inventory has to be queried this cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncDecision {
    /// Query inventory and replace the record set
    Fetch(FetchReason),
    /// Reuse the existing record set
    Throttled {
        /// Time left until the throttle window closes
        remaining: Duration,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchReason {
    /// The source has never been synced
    NeverSynced,
    /// The throttle window has elapsed
    WindowElapsed,
    /// The destination does not exist, so there is nothing to reuse
    DestinationMissing,
}

/// Decide whether to query inventory
///
/// The window is half-open: a cycle at exactly `synced_at + throttle` fetches.
pub fn decide(
    source: &MerakiSource,
    destination_exists: bool,
    now: DateTime<Utc>,
    throttle: Duration,
) -> SyncDecision {
    if !destination_exists {
        return SyncDecision::Fetch(FetchReason::DestinationMissing);
    }

    let Some(synced_at) = source.status.synced_at else {
        return SyncDecision::Fetch(FetchReason::NeverSynced);
    };

    let window = chrono::Duration::from_std(throttle).unwrap_or(chrono::Duration::MAX);
    let elapsed = now.signed_duration_since(synced_at);

    if elapsed < window {
        // A syncedAt ahead of `now` (clock skew) counts as zero elapsed
        let remaining = window
            .checked_sub(&elapsed.max(chrono::Duration::zero()))
            .and_then(|left| left.to_std().ok())
            .map_or(throttle, |left| left.min(throttle));
        SyncDecision::Throttled { remaining }
    } else {
        SyncDecision::Fetch(FetchReason::WindowElapsed)
    }
}

/// Next `syncedAt`, never earlier than the previous one
pub fn advance_synced_at(previous: Option<DateTime<Utc>>, now: DateTime<Utc>) -> DateTime<Utc> {
    previous.map_or(now, |previous| previous.max(now))
}

/// Empty, unpersisted destination for a source
pub fn empty_destination(source: &MerakiSource) -> DnsEndpoint {
    DnsEndpoint::empty(ObjectMeta::new(
        &source.metadata.namespace,
        &source.metadata.name,
    ))
}

/// Record `owner` as the controller of `meta`
///
/// Fails when another object already controls it.
pub fn set_controller_reference(meta: &mut ObjectMeta, owner: OwnerReference) -> Result<()> {
    if let Some(existing) = meta.controller_owner()
        && existing.uid != owner.uid
    {
        return Err(Error::invalid_input(format!(
            "{} is already controlled by {} {} ({})",
            meta.key(),
            existing.kind,
            existing.name,
            existing.uid
        )));
    }

    meta.owner_references.retain(|o| o.uid != owner.uid);
    meta.owner_references.push(owner);
    Ok(())
}

/// Destination with the owner recorded and the record list fully replaced
pub fn desired_destination(
    mut destination: DnsEndpoint,
    owner: OwnerReference,
    endpoints: Vec<Endpoint>,
) -> Result<DnsEndpoint> {
    set_controller_reference(&mut destination.metadata, owner)?;
    destination.spec.endpoints = endpoints;
    Ok(destination)
}

/// What a cycle has to write
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DesiredState {
    /// Destination to write, `None` when the existing one is reused
    pub destination: Option<DnsEndpoint>,
    /// New `syncedAt`, `None` when it stays as is
    pub synced_at: Option<DateTime<Utc>>,
}

/// Derive the writes of a cycle from its inputs
///
/// `fetched` is `None` on the throttled path.
pub fn desired_state(
    source: &MerakiSource,
    destination: DnsEndpoint,
    owner: OwnerReference,
    fetched: Option<Vec<Endpoint>>,
    now: DateTime<Utc>,
) -> Result<DesiredState> {
    let Some(endpoints) = fetched else {
        return Ok(DesiredState {
            destination: None,
            synced_at: None,
        });
    };

    Ok(DesiredState {
        destination: Some(desired_destination(destination, owner, endpoints)?),
        synced_at: Some(advance_synced_at(source.status.synced_at, now)),
    })
}

/// Status pointing at `reference`, with `synced_at` advanced when a sync ran
pub fn desired_status(
    current: &MerakiSourceStatus,
    reference: ObjectReference,
    synced_at: Option<DateTime<Utc>>,
) -> MerakiSourceStatus {
    MerakiSourceStatus {
        endpoint: Some(reference),
        synced_at: synced_at.or(current.synced_at),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{MerakiSourceSpec, RecordType};
    use chrono::TimeZone;

    fn source_synced_at(synced_at: Option<DateTime<Utc>>) -> MerakiSource {
        let mut source = MerakiSource::new(ObjectMeta::new("dns", "office"), MerakiSourceSpec::default());
        source.status.synced_at = synced_at;
        source
    }

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
    }

    fn owner(uid: &str) -> OwnerReference {
        OwnerReference {
            api_version: "dns.jossware.com/v1alpha1".to_string(),
            kind: "MerakiSource".to_string(),
            name: "office".to_string(),
            uid: uid.to_string(),
            controller: true,
            block_owner_deletion: true,
        }
    }

    #[test]
    fn never_synced_fetches() {
        let source = source_synced_at(None);
        assert_eq!(
            decide(&source, true, t0(), Duration::from_secs(60)),
            SyncDecision::Fetch(FetchReason::NeverSynced)
        );
    }

    #[test]
    fn synced_at_in_the_future_stays_within_the_window() {
        let source = source_synced_at(Some(t0() + chrono::Duration::hours(2)));

        assert_eq!(
            decide(&source, true, t0(), Duration::from_secs(60)),
            SyncDecision::Throttled {
                remaining: Duration::from_secs(60)
            }
        );

        let unbounded = Duration::from_secs(u64::MAX);
        assert!(matches!(
            decide(&source, true, t0(), unbounded),
            SyncDecision::Throttled { remaining } if remaining > Duration::from_secs(3600)
        ));
    }

    #[test]
    fn throttle_boundary_is_half_open() {
        let source = source_synced_at(Some(t0()));
        let throttle = Duration::from_secs(60);

        let just_before = t0() + chrono::Duration::seconds(59);
        assert_eq!(
            decide(&source, true, just_before, throttle),
            SyncDecision::Throttled {
                remaining: Duration::from_secs(1)
            }
        );

        let at_boundary = t0() + chrono::Duration::seconds(60);
        assert_eq!(
            decide(&source, true, at_boundary, throttle),
            SyncDecision::Fetch(FetchReason::WindowElapsed)
        );
    }

    #[test]
    fn missing_destination_bypasses_throttle() {
        let source = source_synced_at(Some(t0()));
        assert_eq!(
            decide(&source, false, t0(), Duration::from_secs(60)),
            SyncDecision::Fetch(FetchReason::DestinationMissing)
        );
    }

    #[test]
    fn zero_throttle_always_fetches() {
        let source = source_synced_at(Some(t0()));
        assert_eq!(
            decide(&source, true, t0(), Duration::ZERO),
            SyncDecision::Fetch(FetchReason::WindowElapsed)
        );
    }

    #[test]
    fn synced_at_never_moves_backwards() {
        let later = t0() + chrono::Duration::seconds(30);
        assert_eq!(advance_synced_at(Some(later), t0()), later);
        assert_eq!(advance_synced_at(Some(t0()), later), later);
        assert_eq!(advance_synced_at(None, t0()), t0());
    }

    #[test]
    fn desired_destination_replaces_records() {
        let mut destination = empty_destination(&source_synced_at(None));
        destination.spec.endpoints = vec![
            Endpoint::new("a.lan", RecordType::A, "10.0.0.1"),
            Endpoint::new("b.lan", RecordType::A, "10.0.0.2"),
        ];

        let fresh = vec![Endpoint::new("c.lan", RecordType::A, "10.0.0.3")];
        let desired = desired_destination(destination, owner("uid-1"), fresh.clone()).unwrap();

        assert_eq!(desired.spec.endpoints, fresh);
        assert_eq!(desired.metadata.owner_references.len(), 1);
    }

    #[test]
    fn throttled_state_writes_nothing() {
        let source = source_synced_at(Some(t0()));
        let state = desired_state(&source, empty_destination(&source), owner("uid-1"), None, t0()).unwrap();
        assert_eq!(
            state,
            DesiredState {
                destination: None,
                synced_at: None
            }
        );
    }

    #[test]
    fn fetched_state_stages_records_and_sync_time() {
        let source = source_synced_at(None);
        let fresh = vec![Endpoint::new("nas.lan", RecordType::A, "10.0.0.9")];
        let now = t0() + chrono::Duration::minutes(1);

        let state = desired_state(
            &source,
            empty_destination(&source),
            owner("uid-1"),
            Some(fresh.clone()),
            now,
        )
        .unwrap();

        let destination = state.destination.unwrap();
        assert_eq!(destination.spec.endpoints, fresh);
        assert_eq!(destination.metadata.name, "office");
        assert_eq!(state.synced_at, Some(now));
    }

    #[test]
    fn foreign_controller_is_rejected() {
        let mut meta = ObjectMeta::new("dns", "office");
        set_controller_reference(&mut meta, owner("uid-1")).unwrap();
        set_controller_reference(&mut meta, owner("uid-1")).unwrap();
        assert_eq!(meta.owner_references.len(), 1);

        assert!(set_controller_reference(&mut meta, owner("uid-2")).is_err());
    }

    #[test]
    fn desired_status_keeps_previous_sync_when_throttled() {
        let current = MerakiSourceStatus {
            endpoint: None,
            synced_at: Some(t0()),
        };
        let reference = ObjectReference {
            name: "office".to_string(),
            ..ObjectReference::default()
        };

        let throttled = desired_status(&current, reference.clone(), None);
        assert_eq!(throttled.synced_at, Some(t0()));
        assert_eq!(throttled.endpoint, Some(reference.clone()));

        let later = t0() + chrono::Duration::minutes(5);
        let synced = desired_status(&current, reference, Some(later));
        assert_eq!(synced.synced_at, Some(later));
    }
}
