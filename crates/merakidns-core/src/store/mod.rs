// # Resource Store Implementations
//
// This module provides implementations of the ResourceStore trait for
// different persistence strategies, sharing one in-memory object table.

pub mod file;
pub mod memory;
pub mod table;

pub use file::{FileResourceStore, FileResourceStoreFactory};
pub use memory::{MemoryResourceStore, MemoryResourceStoreFactory};
pub use table::ObjectTable;

use crate::registry::Registry;

/// Register the built-in `memory` and `file` stores
pub fn register(registry: &mut Registry) {
    registry.register_store("memory", Box::new(MemoryResourceStoreFactory));
    registry.register_store("file", Box::new(FileResourceStoreFactory));
}
