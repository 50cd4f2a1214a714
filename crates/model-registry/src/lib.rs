//! Endpoint and algorithm registry
//!
//! This crate provides the operations applied on top of a
//! [`storage_adapter::RegistryStore`]: registering algorithms on endpoints,
//! managing their lifecycle status, logging inference requests and looking
//! up algorithm versions.

pub mod lifecycle;
pub mod registry;
pub mod requests;
pub mod versioning;

// Re-export commonly used types
pub use registry::{AlgorithmRegistration, ModelRegistry, Registered};
