// # DNSEndpoint
//
// The destination resource, in the external-dns `DNSEndpoint` wire format.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::meta::{ObjectMeta, Resource};

/// DNS record type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RecordType {
    /// IPv4 address record
    A,
}

impl fmt::Display for RecordType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordType::A => f.write_str("A"),
        }
    }
}

/// A single DNS record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Endpoint {
    pub dns_name: String,

    pub record_type: RecordType,

    pub targets: Vec<String>,

    #[serde(rename = "recordTTL", default, skip_serializing_if = "Option::is_none")]
    pub record_ttl: Option<u64>,
}

impl Endpoint {
    pub fn new(dns_name: impl Into<String>, record_type: RecordType, target: impl Into<String>) -> Self {
        Self {
            dns_name: dns_name.into(),
            record_type,
            targets: vec![target.into()],
            record_ttl: None,
        }
    }

    pub fn with_ttl(mut self, ttl: Option<u64>) -> Self {
        self.record_ttl = ttl;
        self
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.dns_name, self.record_type, self.targets.join(","))?;
        if let Some(ttl) = self.record_ttl {
            write!(f, " ttl={ttl}")?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DnsEndpointSpec {
    #[serde(default)]
    pub endpoints: Vec<Endpoint>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DnsEndpoint {
    pub metadata: ObjectMeta,

    #[serde(default)]
    pub spec: DnsEndpointSpec,
}

impl DnsEndpoint {
    /// An unpersisted, empty endpoint set
    pub fn empty(metadata: ObjectMeta) -> Self {
        Self {
            metadata,
            spec: DnsEndpointSpec::default(),
        }
    }
}

impl Resource for DnsEndpoint {
    const KIND: &'static str = "DNSEndpoint";

    fn metadata(&self) -> &ObjectMeta {
        &self.metadata
    }

    fn metadata_mut(&mut self) -> &mut ObjectMeta {
        &mut self.metadata
    }
}
