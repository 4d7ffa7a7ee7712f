// # Object Table
//
// Synchronous bookkeeping shared by every built-in store: keyed objects,
// a monotonically increasing revision used as `resourceVersion`, version
// guards on update, and the ownership cascade on delete.
//
// Callers wrap the table in their own lock; nothing here awaits.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::model::{DnsEndpoint, MerakiSource, ObjectKey, ObjectMeta};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ObjectTable {
    #[serde(default)]
    sources: BTreeMap<String, MerakiSource>,

    #[serde(default)]
    endpoints: BTreeMap<String, DnsEndpoint>,

    /// Last resourceVersion handed out
    #[serde(default)]
    revision: u64,
}

impl ObjectTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn source_count(&self) -> usize {
        self.sources.len()
    }

    pub fn endpoint_count(&self) -> usize {
        self.endpoints.len()
    }

    pub fn get_source(&self, key: &ObjectKey) -> Option<MerakiSource> {
        self.sources.get(&key.to_string()).cloned()
    }

    pub fn get_endpoint(&self, key: &ObjectKey) -> Option<DnsEndpoint> {
        self.endpoints.get(&key.to_string()).cloned()
    }

    pub fn create_endpoint(&mut self, endpoint: &DnsEndpoint) -> Result<DnsEndpoint> {
        let key = endpoint.metadata.key();
        if self.endpoints.contains_key(&key.to_string()) {
            return Err(Error::conflict(format!("DNSEndpoint {key} already exists")));
        }

        let mut stored = endpoint.clone();
        self.stamp_new(&mut stored.metadata);
        self.endpoints.insert(key.to_string(), stored.clone());
        Ok(stored)
    }

    pub fn update_endpoint(&mut self, endpoint: &DnsEndpoint) -> Result<DnsEndpoint> {
        let key = endpoint.metadata.key();
        let stored = self
            .endpoints
            .get_mut(&key.to_string())
            .ok_or_else(|| Error::not_found(format!("DNSEndpoint {key}")))?;
        check_version("DNSEndpoint", &stored.metadata, &endpoint.metadata)?;

        stored.spec = endpoint.spec.clone();
        stored.metadata.owner_references = endpoint.metadata.owner_references.clone();
        self.revision += 1;
        stored.metadata.resource_version = Some(self.revision.to_string());
        Ok(stored.clone())
    }

    pub fn update_source_status(&mut self, source: &MerakiSource) -> Result<MerakiSource> {
        let key = source.metadata.key();
        let stored = self
            .sources
            .get_mut(&key.to_string())
            .ok_or_else(|| Error::not_found(format!("MerakiSource {key}")))?;
        check_version("MerakiSource", &stored.metadata, &source.metadata)?;

        stored.status = source.status.clone();
        self.revision += 1;
        stored.metadata.resource_version = Some(self.revision.to_string());
        Ok(stored.clone())
    }

    /// Create a source, or replace the spec of an existing one
    ///
    /// The stored status is kept; a new source starts with an empty status.
    pub fn apply_source(&mut self, source: &MerakiSource) -> MerakiSource {
        let key = source.metadata.key().to_string();

        if let Some(stored) = self.sources.get_mut(&key) {
            if stored.spec != source.spec {
                self.revision += 1;
                stored.spec = source.spec.clone();
                stored.metadata.resource_version = Some(self.revision.to_string());
            }
            return stored.clone();
        }

        let mut stored = MerakiSource::new(
            ObjectMeta::new(&source.metadata.namespace, &source.metadata.name),
            source.spec.clone(),
        );
        self.stamp_new(&mut stored.metadata);
        self.sources.insert(key, stored.clone());
        stored
    }

    /// Delete a source and every endpoint it controls
    ///
    /// Returns the keys of the removed endpoints, or `None` when the source
    /// did not exist.
    pub fn delete_source(&mut self, key: &ObjectKey) -> Option<Vec<ObjectKey>> {
        let removed = self.sources.remove(&key.to_string())?;
        let Some(uid) = removed.metadata.uid else {
            return Some(Vec::new());
        };

        let owned: Vec<String> = self
            .endpoints
            .iter()
            .filter(|(_, endpoint)| {
                endpoint
                    .metadata
                    .controller_owner()
                    .is_some_and(|owner| owner.uid == uid)
            })
            .map(|(k, _)| k.clone())
            .collect();

        Some(
            owned
                .iter()
                .filter_map(|k| self.endpoints.remove(k))
                .map(|endpoint| endpoint.metadata.key())
                .collect(),
        )
    }

    /// All source keys, in key order
    pub fn list_sources(&self) -> Vec<ObjectKey> {
        self.sources.values().map(|s| s.metadata.key()).collect()
    }

    fn next_revision(&mut self) -> String {
        self.revision += 1;
        self.revision.to_string()
    }

    fn stamp_new(&mut self, meta: &mut ObjectMeta) {
        meta.uid = Some(Uuid::new_v4().to_string());
        meta.creation_timestamp = Some(Utc::now());
        meta.resource_version = Some(self.next_revision());
    }
}

fn check_version(kind: &str, stored: &ObjectMeta, incoming: &ObjectMeta) -> Result<()> {
    if stored.resource_version != incoming.resource_version {
        return Err(Error::conflict(format!(
            "{} {} was modified: stored version {:?}, got {:?}",
            kind,
            stored.key(),
            stored.resource_version,
            incoming.resource_version
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Endpoint, MerakiSourceSpec, OwnerReference, RecordType};

    fn source(name: &str) -> MerakiSource {
        MerakiSource::new(
            ObjectMeta::new("dns", name),
            MerakiSourceSpec {
                domain: "lan".to_string(),
                ..MerakiSourceSpec::default()
            },
        )
    }

    fn owned_endpoint(name: &str, owner_uid: &str) -> DnsEndpoint {
        let mut endpoint = DnsEndpoint::empty(ObjectMeta::new("dns", name));
        endpoint.metadata.owner_references.push(OwnerReference {
            api_version: "dns.jossware.com/v1alpha1".to_string(),
            kind: "MerakiSource".to_string(),
            name: name.to_string(),
            uid: owner_uid.to_string(),
            controller: true,
            block_owner_deletion: true,
        });
        endpoint
    }

    #[test]
    fn create_stamps_identity_and_version() {
        let mut table = ObjectTable::new();
        let created = table
            .create_endpoint(&DnsEndpoint::empty(ObjectMeta::new("dns", "office")))
            .unwrap();

        assert!(created.metadata.uid.is_some());
        assert!(!created.metadata.is_new());
        assert_eq!(created.metadata.resource_version.as_deref(), Some("1"));

        let again = table.create_endpoint(&DnsEndpoint::empty(ObjectMeta::new("dns", "office")));
        assert!(again.unwrap_err().is_conflict());
    }

    #[test]
    fn stale_update_is_rejected_and_leaves_state() {
        let mut table = ObjectTable::new();
        let created = table
            .create_endpoint(&DnsEndpoint::empty(ObjectMeta::new("dns", "office")))
            .unwrap();

        let mut first = created.clone();
        first.spec.endpoints = vec![Endpoint::new("a.lan", RecordType::A, "10.0.0.1")];
        let updated = table.update_endpoint(&first).unwrap();
        assert_ne!(updated.metadata.resource_version, created.metadata.resource_version);

        let mut stale = created;
        stale.spec.endpoints.clear();
        assert!(table.update_endpoint(&stale).unwrap_err().is_conflict());

        let stored = table.get_endpoint(&ObjectKey::new("dns", "office")).unwrap();
        assert_eq!(stored.spec.endpoints.len(), 1);
    }

    #[test]
    fn update_of_missing_object_is_not_found() {
        let mut table = ObjectTable::new();
        let err = table.update_source_status(&source("gone")).unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn apply_keeps_status_and_skips_noop_writes() {
        let mut table = ObjectTable::new();
        let created = table.apply_source(&source("office"));

        let mut with_status = created.clone();
        with_status.status.synced_at = Some(Utc::now());
        let committed = table.update_source_status(&with_status).unwrap();

        let unchanged = table.apply_source(&source("office"));
        assert_eq!(unchanged.metadata.resource_version, committed.metadata.resource_version);

        let mut changed = source("office");
        changed.spec.domain = "corp".to_string();
        let reapplied = table.apply_source(&changed);
        assert_eq!(reapplied.spec.domain, "corp");
        assert_eq!(reapplied.status, committed.status);
        assert_eq!(reapplied.metadata.uid, created.metadata.uid);
    }

    #[test]
    fn delete_cascades_to_controlled_endpoints_only() {
        let mut table = ObjectTable::new();
        let office = table.apply_source(&source("office"));
        let office_uid = office.metadata.uid.clone().unwrap();

        table.create_endpoint(&owned_endpoint("office", &office_uid)).unwrap();
        table.create_endpoint(&owned_endpoint("lab", "someone-else")).unwrap();

        let removed = table.delete_source(&ObjectKey::new("dns", "office")).unwrap();
        assert_eq!(removed, vec![ObjectKey::new("dns", "office")]);
        assert_eq!(table.endpoint_count(), 1);
        assert!(table.delete_source(&ObjectKey::new("dns", "office")).is_none());
    }
}
