//! Persistent storage for the endpoint registry
//!
//! This crate defines the [`RegistryStore`] trait over the four registry
//! tables and its two implementations: a SQLite database and a process-local
//! in-memory store. Both apply the same cascading deletes.

pub mod error;
pub mod manager;
pub mod memory;
pub mod schema;
pub mod sqlite;
pub mod store;

#[cfg(test)]
mod conformance;

// Re-export commonly used types
pub use error::{Result, StorageError};
pub use manager::StorageManager;
pub use memory::MemoryStore;
pub use sqlite::SqliteStore;
pub use store::RegistryStore;
