// # MerakiSource
//
// The declarative input: which Meraki organization/network to read clients
// from, which DNS suffix to append, and an optional TTL override.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::meta::{ObjectMeta, ObjectReference, Resource};

/// Reference to a Meraki organization or network, by name or id
///
/// The id wins when both are set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MerakiRef {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
}

impl MerakiRef {
    pub fn by_name(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            id: None,
        }
    }

    pub fn by_id(id: impl Into<String>) -> Self {
        Self {
            name: None,
            id: Some(id.into()),
        }
    }

    /// Non-empty id, if set
    pub fn id(&self) -> Option<&str> {
        self.id.as_deref().filter(|id| !id.is_empty())
    }

    /// Non-empty name, if set
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref().filter(|name| !name.is_empty())
    }
}

/// Desired state of a MerakiSource
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MerakiSourceSpec {
    /// Organization to query (name or id)
    #[serde(default)]
    pub organization: MerakiRef,

    /// Network to query (name or id)
    #[serde(default)]
    pub network: MerakiRef,

    /// DNS suffix appended to every client hostname
    #[serde(default)]
    pub domain: String,

    /// Requested record TTL in seconds. The provider decides the effective value.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ttl: Option<u64>,
}

/// Observed state of a MerakiSource
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MerakiSourceStatus {
    /// The managed DNSEndpoint
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<ObjectReference>,

    /// Last successful inventory sync
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub synced_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MerakiSource {
    pub metadata: ObjectMeta,

    #[serde(default)]
    pub spec: MerakiSourceSpec,

    #[serde(default)]
    pub status: MerakiSourceStatus,
}

impl MerakiSource {
    pub fn new(metadata: ObjectMeta, spec: MerakiSourceSpec) -> Self {
        Self {
            metadata,
            spec,
            status: MerakiSourceStatus::default(),
        }
    }
}

impl Resource for MerakiSource {
    const KIND: &'static str = "MerakiSource";

    fn metadata(&self) -> &ObjectMeta {
        &self.metadata
    }

    fn metadata_mut(&mut self) -> &mut ObjectMeta {
        &mut self.metadata
    }
}
