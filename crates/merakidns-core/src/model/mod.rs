//! Resource and inventory types
//!
//! - [`MerakiSource`]: declarative input, owned by the user
//! - [`DnsEndpoint`]: derived DNS records, owned by its source
//! - [`Organization`], [`Network`], [`Client`]: read-only inventory records

pub mod endpoint;
pub mod inventory;
pub mod meta;
pub mod source;

pub use endpoint::{DnsEndpoint, DnsEndpointSpec, Endpoint, RecordType};
pub use inventory::{Client, Network, Organization};
pub use meta::{ObjectKey, ObjectMeta, ObjectReference, OwnerReference, Resource};
pub use source::{MerakiRef, MerakiSource, MerakiSourceSpec, MerakiSourceStatus};
