//! Command tree

use std::path::PathBuf;
use clap::{Args, Parser, Subcommand};

use common::types::StatusKind;

/// Manage ML endpoints, algorithms, their lifecycle and logged requests
#[derive(Debug, Parser)]
#[command(name = "registry", version, about)]
pub struct Cli {
    /// Configuration file (TOML)
    #[arg(short, long, global = true, env = "REGISTRY_CONFIG")]
    pub config: Option<PathBuf>,

    /// Database URL, overrides `database.url`
    #[arg(long, global = true)]
    pub database: Option<String>,

    /// Use a throwaway in-memory store
    #[arg(long, global = true, conflicts_with = "database")]
    pub memory: bool,

    /// Log level, overrides `logging.level`
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Endpoint management
    #[command(subcommand)]
    Endpoint(EndpointCommand),

    /// Algorithm management
    #[command(subcommand)]
    Algorithm(AlgorithmCommand),

    /// Algorithm lifecycle status
    #[command(subcommand)]
    Status(StatusCommand),

    /// Logged inference requests
    #[command(subcommand)]
    Request(RequestCommand),

    /// Row counts of every table
    Stats,
}

#[derive(Debug, Subcommand)]
pub enum EndpointCommand {
    /// Create an endpoint
    Add {
        #[arg(long)]
        name: String,
        #[arg(long)]
        owner: String,
    },
    /// List endpoints
    List,
    /// Change name and owner
    Rename {
        id: i64,
        #[arg(long)]
        name: String,
        #[arg(long)]
        owner: String,
    },
    /// Delete an endpoint with its algorithms, statuses and requests
    Delete { id: i64 },
}

#[derive(Debug, Subcommand)]
pub enum AlgorithmCommand {
    /// Register an algorithm, creating the endpoint if needed
    Add(AddAlgorithm),
    /// List the algorithms of an endpoint
    List { endpoint_id: i64 },
    /// Show the newest version of an algorithm
    Latest { endpoint_id: i64, name: String },
    /// Delete an algorithm with its statuses and requests
    Delete { id: i64 },
}

#[derive(Debug, Args)]
pub struct AddAlgorithm {
    /// Endpoint name
    #[arg(long)]
    pub endpoint: String,
    #[arg(long)]
    pub name: String,
    #[arg(long)]
    pub version: String,
    #[arg(long)]
    pub owner: String,
    /// Serialized algorithm payload
    #[arg(long, conflicts_with = "code_file")]
    pub code: Option<String>,
    /// Read the payload from a file
    #[arg(long)]
    pub code_file: Option<PathBuf>,
    /// Initial status (testing, staging, production, ab_testing)
    #[arg(long, default_value = "testing")]
    pub status: StatusKind,
}

#[derive(Debug, Subcommand)]
pub enum StatusCommand {
    /// Record a status; it becomes the active one unless --inactive
    Set {
        algorithm_id: i64,
        status: StatusKind,
        #[arg(long = "by")]
        created_by: String,
        #[arg(long)]
        inactive: bool,
    },
    /// Show the status history
    History { algorithm_id: i64 },
    /// Show the active status
    Current { algorithm_id: i64 },
}

#[derive(Debug, Subcommand)]
pub enum RequestCommand {
    /// Log an inference call
    Log {
        algorithm_id: i64,
        #[arg(long)]
        input: String,
        #[arg(long)]
        full_response: String,
        #[arg(long)]
        response: String,
        #[arg(long)]
        feedback: Option<String>,
    },
    /// List the requests of an algorithm
    List { algorithm_id: i64 },
    /// Record feedback on a request
    Feedback { request_id: i64, feedback: String },
}
