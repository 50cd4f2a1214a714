//! Command-line interface for the endpoint registry
//!
//! This crate provides the `registry` command tree and its dispatch onto a
//! [`model_registry::ModelRegistry`].

pub mod cli;
pub mod commands;

// Re-export commonly used types
pub use cli::Cli;
pub use commands::execute;
