// # merakidns-core
//
// Core library mirroring Meraki client inventory into external-dns
// `DNSEndpoint` records.
//
// ## Architecture Overview
//
// - **InventoryClient**: Trait for reading organizations, networks and clients
// - **ResourceStore**: Trait for version-guarded storage of sources and endpoints
// - **InventoryResolver**: Turns organization/network names into ids
// - **mapper**: Turns clients into DNS endpoints
// - **Reconciler**: Drives one source towards its desired destination and status
// - **Controller**: Schedules reconciles with coalescing, backoff and requeue
// - **Registry**: Explicit kind and plugin registry built at startup
//
// ## Design Principles
//
// 1. **Separation of Concerns**: Decisions live in pure functions, I/O at the traits
// 2. **Level-Triggered**: Every cycle recomputes the full record set
// 3. **Plugin-Based**: Inventories and stores are created through the registry
// 4. **Library-First**: All core functionality can be used as a library
// 5. **Optimistic Concurrency**: Writes are guarded by `resourceVersion`

pub mod config;
pub mod controller;
pub mod error;
pub mod mapper;
pub mod model;
pub mod reconciler;
pub mod registry;
pub mod resolver;
pub mod store;
pub mod traits;

// Re-export core types for convenience
pub use config::{InventoryConfig, MerakiDnsConfig, ReconcilerConfig, StoreConfig};
pub use controller::{Controller, ControllerHandle};
pub use error::{Error, Result};
pub use model::{DnsEndpoint, Endpoint, MerakiSource, ObjectKey};
pub use reconciler::{Reconcile, ReconcileAction, Reconciler};
pub use registry::Registry;
pub use resolver::InventoryResolver;
pub use store::{FileResourceStore, MemoryResourceStore};
pub use traits::{InventoryClient, ResourceStore};
