//! Command dispatch
//!
//! Every command returns a JSON value that the binary prints.

use anyhow::{Context, Result};
use serde_json::{json, Value};
use tracing::debug;

use common::models::{NewEndpoint, NewRequest};
use common::types::{AlgorithmId, EndpointId, RequestId};
use model_registry::{AlgorithmRegistration, ModelRegistry};

use crate::cli::{AddAlgorithm, AlgorithmCommand, Command, EndpointCommand, RequestCommand, StatusCommand};

/// Runs one command against the registry
pub async fn execute(registry: &ModelRegistry, command: Command) -> Result<Value> {
    debug!("Executing {:?}", command);

    match command {
        Command::Endpoint(command) => endpoint(registry, command).await,
        Command::Algorithm(command) => algorithm(registry, command).await,
        Command::Status(command) => status(registry, command).await,
        Command::Request(command) => request(registry, command).await,
        Command::Stats => Ok(serde_json::to_value(registry.stats().await?)?),
    }
}

async fn endpoint(registry: &ModelRegistry, command: EndpointCommand) -> Result<Value> {
    let value = match command {
        EndpointCommand::Add { name, owner } => {
            serde_json::to_value(registry.add_endpoint(NewEndpoint::new(name, owner)).await?)?
        }
        EndpointCommand::List => serde_json::to_value(registry.endpoints().await?)?,
        EndpointCommand::Rename { id, name, owner } => serde_json::to_value(
            registry
                .update_endpoint(EndpointId(id), NewEndpoint::new(name, owner))
                .await?,
        )?,
        EndpointCommand::Delete { id } => {
            json!({ "removed": registry.remove_endpoint(EndpointId(id)).await? })
        }
    };
    Ok(value)
}

async fn algorithm(registry: &ModelRegistry, command: AlgorithmCommand) -> Result<Value> {
    let value = match command {
        AlgorithmCommand::Add(add) => {
            let registration = registration(add).await?;
            serde_json::to_value(registry.add_algorithm(registration).await?)?
        }
        AlgorithmCommand::List { endpoint_id } => {
            serde_json::to_value(registry.algorithms(EndpointId(endpoint_id)).await?)?
        }
        AlgorithmCommand::Latest { endpoint_id, name } => serde_json::to_value(
            registry.latest_version(EndpointId(endpoint_id), &name).await?,
        )?,
        AlgorithmCommand::Delete { id } => {
            json!({ "removed": registry.remove_algorithm(AlgorithmId(id)).await? })
        }
    };
    Ok(value)
}

async fn registration(add: AddAlgorithm) -> Result<AlgorithmRegistration> {
    let code = match (add.code, add.code_file) {
        (Some(code), _) => code,
        (None, Some(path)) => tokio::fs::read_to_string(&path)
            .await
            .with_context(|| format!("reading algorithm code from {}", path.display()))?,
        (None, None) => String::new(),
    };

    Ok(AlgorithmRegistration {
        endpoint_name: add.endpoint,
        algorithm_name: add.name,
        code,
        version: add.version,
        owner: add.owner,
        status: add.status,
    })
}

async fn status(registry: &ModelRegistry, command: StatusCommand) -> Result<Value> {
    let value = match command {
        StatusCommand::Set { algorithm_id, status, created_by, inactive } => serde_json::to_value(
            registry
                .set_status(AlgorithmId(algorithm_id), status, &created_by, !inactive)
                .await?,
        )?,
        StatusCommand::History { algorithm_id } => {
            serde_json::to_value(registry.status_history(AlgorithmId(algorithm_id)).await?)?
        }
        StatusCommand::Current { algorithm_id } => {
            serde_json::to_value(registry.current_status(AlgorithmId(algorithm_id)).await?)?
        }
    };
    Ok(value)
}

async fn request(registry: &ModelRegistry, command: RequestCommand) -> Result<Value> {
    let value = match command {
        RequestCommand::Log { algorithm_id, input, full_response, response, feedback } => {
            serde_json::to_value(
                registry
                    .log_request(NewRequest {
                        algorithm_id: AlgorithmId(algorithm_id),
                        input_data: input,
                        full_response,
                        response,
                        feedback,
                    })
                    .await?,
            )?
        }
        RequestCommand::List { algorithm_id } => {
            serde_json::to_value(registry.requests_for(AlgorithmId(algorithm_id)).await?)?
        }
        RequestCommand::Feedback { request_id, feedback } => serde_json::to_value(
            registry.record_feedback(RequestId(request_id), &feedback).await?,
        )?,
    };
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::sync::Arc;
    use clap::Parser;
    use storage_adapter::MemoryStore;

    use crate::cli::Cli;

    async fn run(registry: &ModelRegistry, args: &[&str]) -> Result<Value> {
        let mut argv = vec!["registry"];
        argv.extend_from_slice(args);
        execute(registry, Cli::try_parse_from(argv)?.command).await
    }

    fn registry() -> ModelRegistry {
        ModelRegistry::new(Arc::new(MemoryStore::new()))
    }

    #[tokio::test]
    async fn test_full_flow() {
        let registry = registry();

        let added = run(
            &registry,
            &[
                "algorithm", "add", "--endpoint", "income_classifier", "--name", "random forest",
                "--version", "0.0.1", "--owner", "ops", "--code", "{}", "--status", "production",
            ],
        )
        .await
        .unwrap();
        assert_eq!(added["created"], json!(true));
        let algorithm_id = added["algorithm"]["id"].as_i64().unwrap();
        let endpoint_id = added["endpoint"]["id"].as_i64().unwrap();

        let current = run(&registry, &["status", "current", algorithm_id.to_string().as_str()])
            .await
            .unwrap();
        assert_eq!(current["status"], json!("production"));
        assert_eq!(current["active"], json!(true));

        let logged = run(
            &registry,
            &[
                "request", "log", algorithm_id.to_string().as_str(), "--input", "{\"age\": 40}",
                "--full-response", "{}", "--response", ">50K",
            ],
        )
        .await
        .unwrap();
        assert_eq!(logged["feedback"], Value::Null);
        let request_id = logged["id"].as_i64().unwrap();

        let feedback = run(&registry, &["request", "feedback", request_id.to_string().as_str(), "ok"])
            .await
            .unwrap();
        assert_eq!(feedback["feedback"], json!("ok"));

        let removed = run(&registry, &["endpoint", "delete", endpoint_id.to_string().as_str()])
            .await
            .unwrap();
        assert_eq!(
            removed["removed"],
            json!({ "endpoints": 1, "algorithms": 1, "statuses": 1, "requests": 1 })
        );

        let stats = run(&registry, &["stats"]).await.unwrap();
        assert_eq!(
            stats,
            json!({ "endpoints": 0, "algorithms": 0, "statuses": 0, "requests": 0 })
        );
    }

    #[tokio::test]
    async fn test_code_from_file() {
        let registry = registry();
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{{\"weights\": [0.1, 0.2]}}").unwrap();

        let added = run(
            &registry,
            &[
                "algorithm", "add", "--endpoint", "e", "--name", "lr", "--version", "1.0.0",
                "--owner", "ops", "--code-file", file.path().to_str().unwrap(),
            ],
        )
        .await
        .unwrap();
        assert_eq!(added["algorithm"]["code"], json!("{\"weights\": [0.1, 0.2]}"));
    }

    #[tokio::test]
    async fn test_missing_rows_surface_as_errors() {
        let registry = registry();
        assert!(run(&registry, &["endpoint", "delete", "9"]).await.is_err());
        assert!(run(&registry, &["status", "history", "9"]).await.is_err());
        assert!(run(&registry, &["algorithm", "latest", "9", "rf"]).await.is_err());
    }

    #[tokio::test]
    async fn test_rename_keeps_created_at() {
        let registry = registry();
        let added = run(&registry, &["endpoint", "add", "--name", "a", "--owner", "ops"])
            .await
            .unwrap();
        let id = added["id"].as_i64().unwrap().to_string();
        let renamed = run(&registry, &["endpoint", "rename", id.as_str(), "--name", "b", "--owner", "ml"])
            .await
            .unwrap();
        assert_eq!(renamed["name"], json!("b"));
        assert_eq!(renamed["created_at"], added["created_at"]);
    }
}
