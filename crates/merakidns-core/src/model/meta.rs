// # Object Metadata
//
// Cluster-style metadata shared by every stored resource: identity
// (namespace + name), the optimistic-concurrency token (resourceVersion),
// and ownership links used by the lifecycle collaborator.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::Error;

/// Namespace + name identifying a resource
///
/// A source and its destination share the same key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ObjectKey {
    pub namespace: String,
    pub name: String,
}

impl ObjectKey {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for ObjectKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

impl FromStr for ObjectKey {
    type Err = Error;

    /// Parse `namespace/name`; a bare `name` lands in the `default` namespace
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once('/') {
            Some((namespace, name)) if !namespace.is_empty() && !name.is_empty() => {
                Ok(Self::new(namespace, name))
            }
            Some(_) => Err(Error::invalid_input(format!("Invalid object key: {s}"))),
            None if !s.is_empty() => Ok(Self::new("default", s)),
            None => Err(Error::invalid_input("Object key cannot be empty")),
        }
    }
}

/// Metadata carried by every resource
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectMeta {
    pub name: String,

    #[serde(default = "default_namespace")]
    pub namespace: String,

    /// Assigned by the store on creation
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uid: Option<String>,

    /// Optimistic-concurrency token, replaced on every write
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_version: Option<String>,

    /// Assigned by the store on creation; `None` means never persisted
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub creation_timestamp: Option<DateTime<Utc>>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub owner_references: Vec<OwnerReference>,
}

impl ObjectMeta {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            namespace: namespace.into(),
            ..Self::default()
        }
    }

    pub fn key(&self) -> ObjectKey {
        ObjectKey::new(&self.namespace, &self.name)
    }

    /// The object has not been written to the store yet
    pub fn is_new(&self) -> bool {
        self.creation_timestamp.is_none()
    }

    /// The owner reference flagged as managing controller, if any
    pub fn controller_owner(&self) -> Option<&OwnerReference> {
        self.owner_references.iter().find(|o| o.controller)
    }
}

fn default_namespace() -> String {
    "default".to_string()
}

/// Declares that an object is exclusively owned by another one
///
/// Enforcement (cascading deletion) belongs to the resource-lifecycle
/// collaborator, i.e. the [`ResourceStore`](crate::traits::ResourceStore).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OwnerReference {
    pub api_version: String,
    pub kind: String,
    pub name: String,
    pub uid: String,
    #[serde(default)]
    pub controller: bool,
    #[serde(default)]
    pub block_owner_deletion: bool,
}

/// Pointer to a stored object, pinned to the version that was observed
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectReference {
    pub api_version: String,
    pub kind: String,
    pub namespace: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uid: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_version: Option<String>,
}

/// Implemented by every kind the registry knows about
pub trait Resource {
    /// Kind name, as registered in the [`Registry`](crate::registry::Registry)
    const KIND: &'static str;

    fn metadata(&self) -> &ObjectMeta;

    fn metadata_mut(&mut self) -> &mut ObjectMeta;

    fn key(&self) -> ObjectKey {
        self.metadata().key()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn object_key_parses_namespaced_and_bare_names() {
        let key: ObjectKey = "dns/office".parse().unwrap();
        assert_eq!(key, ObjectKey::new("dns", "office"));
        assert_eq!(key.to_string(), "dns/office");

        let bare: ObjectKey = "office".parse().unwrap();
        assert_eq!(bare.namespace, "default");

        assert!("dns/".parse::<ObjectKey>().is_err());
        assert!("".parse::<ObjectKey>().is_err());
    }

    #[test]
    fn meta_without_creation_timestamp_is_new() {
        let mut meta = ObjectMeta::new("dns", "office");
        assert!(meta.is_new());
        meta.creation_timestamp = Some(Utc::now());
        assert!(!meta.is_new());
    }
}
