//! Core traits for the merakidns system
//!
//! This module defines the abstract interfaces that all implementations must follow.
//!
//! - [`InventoryClient`]: Read organizations, networks and clients from the management API
//! - [`ResourceStore`]: Version-guarded storage for sources and endpoints

pub mod inventory;
pub mod resource_store;

pub use inventory::{InventoryClient, InventoryClientFactory};
pub use resource_store::{ResourceStore, ResourceStoreFactory};
