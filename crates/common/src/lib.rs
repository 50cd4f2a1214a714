//! Common types for the endpoint registry
//!
//! This crate provides the records shared by every layer of the registry:
//! endpoints, algorithms, algorithm statuses and logged requests, together
//! with the input types used to create them and the common error type.

pub mod error;
pub mod models;
pub mod types;
pub mod utils;

// Re-export commonly used types
pub use error::{Error, Result};
pub use models::*;
pub use types::*;
