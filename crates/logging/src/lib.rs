//! Logging for the endpoint registry
//!
//! This crate installs the global `tracing` subscriber from the logging
//! settings, with structured output and an optional rolling log file.

pub mod logger;

// Re-export commonly used types
pub use logger::Logger;
