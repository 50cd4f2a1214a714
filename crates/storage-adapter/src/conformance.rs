//! Behaviour shared by every backend

use std::sync::Arc;
use tempfile::TempDir;

use common::models::{NewAlgorithm, NewEndpoint, NewRequest, NewStatus, TableCounts};
use common::types::{AlgorithmId, EndpointId, RequestId, StatusKind};
use registry_config::DatabaseSettings;

use crate::error::StorageError;
use crate::memory::MemoryStore;
use crate::sqlite::SqliteStore;
use crate::store::RegistryStore;

/// Store under test, with the directory backing it when it has one
type Backend = (Arc<dyn RegistryStore>, Option<TempDir>);

async fn sqlite() -> Backend {
    let store = SqliteStore::connect(&DatabaseSettings::sqlite_in_memory())
        .await
        .unwrap();
    (Arc::new(store), None)
}

async fn sqlite_file() -> Backend {
    let dir = tempfile::tempdir().unwrap();
    let settings = DatabaseSettings {
        url: format!("sqlite://{}", dir.path().join("registry.db").display()),
        max_connections: 8,
        connect_timeout_secs: 30,
        ..DatabaseSettings::sqlite_in_memory()
    };
    let store = SqliteStore::connect(&settings).await.unwrap();
    (Arc::new(store), Some(dir))
}

async fn memory() -> Backend {
    (Arc::new(MemoryStore::new()), None)
}

fn algorithm(endpoint_id: EndpointId, name: &str, version: &str) -> NewAlgorithm {
    NewAlgorithm {
        endpoint_id,
        name: name.to_string(),
        code: "{\"trees\": 100}".to_string(),
        version: version.to_string(),
        owner: "ops".to_string(),
    }
}

fn request(algorithm_id: AlgorithmId, input: &str) -> NewRequest {
    NewRequest {
        algorithm_id,
        input_data: input.to_string(),
        full_response: "{\"probability\": 0.7, \"label\": \">50K\"}".to_string(),
        response: ">50K".to_string(),
        feedback: None,
    }
}

async fn endpoint_with_algorithm(store: &dyn RegistryStore) -> (EndpointId, AlgorithmId) {
    let endpoint = store
        .create_endpoint(NewEndpoint::new("income_classifier", "ops"))
        .await
        .unwrap();
    let algorithm = store
        .create_algorithm(algorithm(endpoint.id, "random forest", "0.0.1"))
        .await
        .unwrap();
    (endpoint.id, algorithm.id)
}

async fn algorithm_requires_existing_endpoint(store: Arc<dyn RegistryStore>) {
    let err = store
        .create_algorithm(algorithm(EndpointId(42), "random forest", "0.0.1"))
        .await
        .unwrap_err();
    assert!(err.is_not_found(), "{}", err);
    assert_eq!(store.counts().await.unwrap(), TableCounts::default());
}

async fn deleting_endpoint_cascades(store: Arc<dyn RegistryStore>) {
    let (endpoint_id, algorithm_id) = endpoint_with_algorithm(store.as_ref()).await;
    let other = store
        .create_endpoint(NewEndpoint::new("fraud", "risk"))
        .await
        .unwrap();
    let kept = store
        .create_algorithm(algorithm(other.id, "gbm", "1.0.0"))
        .await
        .unwrap();

    store
        .create_status(NewStatus::new(algorithm_id, "ops"))
        .await
        .unwrap();
    store.create_request(request(algorithm_id, "{}")).await.unwrap();
    store.create_request(request(kept.id, "{}")).await.unwrap();

    let removed = store.delete_endpoint(endpoint_id).await.unwrap();
    assert_eq!(
        removed,
        TableCounts { endpoints: 1, algorithms: 1, statuses: 1, requests: 1 }
    );

    assert!(store.get_algorithm(algorithm_id).await.unwrap_err().is_not_found());
    assert!(store.list_statuses(algorithm_id).await.unwrap().is_empty());
    assert!(store.list_requests(algorithm_id).await.unwrap().is_empty());
    assert_eq!(
        store.counts().await.unwrap(),
        TableCounts { endpoints: 1, algorithms: 1, statuses: 0, requests: 1 }
    );
    assert!(store.delete_endpoint(endpoint_id).await.unwrap_err().is_not_found());
}

async fn deleting_algorithm_cascades(store: Arc<dyn RegistryStore>) {
    let (endpoint_id, algorithm_id) = endpoint_with_algorithm(store.as_ref()).await;
    for kind in StatusKind::ALL {
        store
            .create_status(NewStatus::new(algorithm_id, "ops").with_status(kind))
            .await
            .unwrap();
    }
    for n in 0..3 {
        store
            .create_request(request(algorithm_id, &format!("{{\"age\": {}}}", 30 + n)))
            .await
            .unwrap();
    }

    let removed = store.delete_algorithm(algorithm_id).await.unwrap();
    assert_eq!(
        removed,
        TableCounts { endpoints: 0, algorithms: 1, statuses: 4, requests: 3 }
    );

    // The endpoint itself survives
    assert!(store.get_endpoint(endpoint_id).await.is_ok());
    assert_eq!(
        store.counts().await.unwrap(),
        TableCounts { endpoints: 1, ..TableCounts::default() }
    );
    assert!(store.delete_algorithm(algorithm_id).await.unwrap_err().is_not_found());
}

async fn created_at_is_set_and_kept(store: Arc<dyn RegistryStore>) {
    let before = chrono::Utc::now();
    let endpoint = store
        .create_endpoint(NewEndpoint::new("income_classifier", "ops"))
        .await
        .unwrap();
    assert!(endpoint.created_at >= before);
    assert!(endpoint.created_at <= chrono::Utc::now());

    let renamed = store
        .update_endpoint(endpoint.id, NewEndpoint::new("income", "data-team"))
        .await
        .unwrap();
    assert_eq!(renamed.name, "income");
    assert_eq!(renamed.owner, "data-team");
    assert_eq!(renamed.created_at, endpoint.created_at);

    let algorithm = store
        .create_algorithm(algorithm(endpoint.id, "random forest", "0.0.1"))
        .await
        .unwrap();
    let logged = store.create_request(request(algorithm.id, "{}")).await.unwrap();
    assert!(logged.feedback.is_none());

    let with_feedback = store.record_feedback(logged.id, "correct").await.unwrap();
    assert_eq!(with_feedback.feedback.as_deref(), Some("correct"));
    assert_eq!(with_feedback.created_at, logged.created_at);
    assert_eq!(store.get_request(logged.id).await.unwrap(), with_feedback);
}

async fn statuses_keep_history(store: Arc<dyn RegistryStore>) {
    let (_, algorithm_id) = endpoint_with_algorithm(store.as_ref()).await;

    let first = store
        .create_status(NewStatus::new(algorithm_id, "ops").active(true))
        .await
        .unwrap();
    assert_eq!(first.status, StatusKind::Testing);

    // Plain creation does not deactivate earlier entries
    store
        .create_status(
            NewStatus::new(algorithm_id, "ops")
                .with_status(StatusKind::Staging)
                .active(true),
        )
        .await
        .unwrap();
    assert_eq!(store.active_statuses(algorithm_id).await.unwrap().len(), 2);

    let production = store
        .activate_status(NewStatus::new(algorithm_id, "release-bot").with_status(StatusKind::Production))
        .await
        .unwrap();
    assert!(production.active);

    let active = store.active_statuses(algorithm_id).await.unwrap();
    assert_eq!(active, vec![production.clone()]);

    let history = store.list_statuses(algorithm_id).await.unwrap();
    let kinds: Vec<StatusKind> = history.iter().map(|s| s.status).collect();
    assert_eq!(
        kinds,
        vec![StatusKind::Testing, StatusKind::Staging, StatusKind::Production]
    );
    assert!(history.windows(2).all(|w| w[0].id < w[1].id));
    assert!(history.windows(2).all(|w| w[0].created_at <= w[1].created_at));
}

async fn status_for_missing_algorithm_is_rejected(store: Arc<dyn RegistryStore>) {
    let err = store
        .create_status(NewStatus::new(AlgorithmId(7), "ops"))
        .await
        .unwrap_err();
    assert!(err.is_not_found());
    let err = store
        .activate_status(NewStatus::new(AlgorithmId(7), "ops"))
        .await
        .unwrap_err();
    assert!(err.is_not_found());
    let err = store.create_request(request(AlgorithmId(7), "{}")).await.unwrap_err();
    assert!(err.is_not_found());
}

async fn invalid_fields_are_rejected(store: Arc<dyn RegistryStore>) {
    let err = store
        .create_endpoint(NewEndpoint::new("e".repeat(151), "ops"))
        .await
        .unwrap_err();
    assert!(err.is_validation());

    let (endpoint_id, algorithm_id) = endpoint_with_algorithm(store.as_ref()).await;

    let mut too_long = algorithm(endpoint_id, "random forest", "0.0.2");
    too_long.code = "c".repeat(6001);
    assert!(store.create_algorithm(too_long).await.unwrap_err().is_validation());

    let err = store
        .create_status(NewStatus::new(algorithm_id, ""))
        .await
        .unwrap_err();
    assert!(err.is_validation());

    let logged = store.create_request(request(algorithm_id, "{}")).await.unwrap();
    let err = store
        .record_feedback(logged.id, &"f".repeat(10_001))
        .await
        .unwrap_err();
    assert!(matches!(err, StorageError::Validation(_)));
    assert!(store
        .record_feedback(RequestId(999), "late")
        .await
        .unwrap_err()
        .is_not_found());
}

async fn lookups(store: Arc<dyn RegistryStore>) {
    let (endpoint_id, algorithm_id) = endpoint_with_algorithm(store.as_ref()).await;
    store
        .create_algorithm(algorithm(endpoint_id, "random forest", "0.0.2"))
        .await
        .unwrap();

    let found = store
        .find_endpoint_by_name("income_classifier")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(found.id, endpoint_id);
    assert!(store.find_endpoint_by_name("missing").await.unwrap().is_none());

    let found = store
        .find_algorithm(endpoint_id, "random forest", "0.0.1")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(found.id, algorithm_id);
    assert!(store
        .find_algorithm(endpoint_id, "random forest", "9.9.9")
        .await
        .unwrap()
        .is_none());

    let versions: Vec<String> = store
        .list_algorithms(endpoint_id)
        .await
        .unwrap()
        .into_iter()
        .map(|a| a.version)
        .collect();
    assert_eq!(versions, vec!["0.0.1", "0.0.2"]);
    assert_eq!(store.list_endpoints().await.unwrap().len(), 1);
}

async fn ids_are_not_reused(store: Arc<dyn RegistryStore>) {
    let first = store
        .create_endpoint(NewEndpoint::new("a", "ops"))
        .await
        .unwrap();
    store.delete_endpoint(first.id).await.unwrap();
    let second = store
        .create_endpoint(NewEndpoint::new("b", "ops"))
        .await
        .unwrap();
    assert!(second.id > first.id);
}

macro_rules! backend_tests {
    ($backend:ident: $($case:ident),* $(,)?) => {
        mod $backend {
            $(
                #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
                async fn $case() {
                    let (store, _dir) = super::$backend().await;
                    super::$case(store).await;
                }
            )*
        }
    };
}

backend_tests!(sqlite:
    algorithm_requires_existing_endpoint,
    deleting_endpoint_cascades,
    deleting_algorithm_cascades,
    created_at_is_set_and_kept,
    statuses_keep_history,
    status_for_missing_algorithm_is_rejected,
    invalid_fields_are_rejected,
    lookups,
    ids_are_not_reused,
);

backend_tests!(sqlite_file:
    algorithm_requires_existing_endpoint,
    deleting_endpoint_cascades,
    deleting_algorithm_cascades,
    created_at_is_set_and_kept,
    statuses_keep_history,
    status_for_missing_algorithm_is_rejected,
    invalid_fields_are_rejected,
    lookups,
    ids_are_not_reused,
);

backend_tests!(memory:
    algorithm_requires_existing_endpoint,
    deleting_endpoint_cascades,
    deleting_algorithm_cascades,
    created_at_is_set_and_kept,
    statuses_keep_history,
    status_for_missing_algorithm_is_rejected,
    invalid_fields_are_rejected,
    lookups,
    ids_are_not_reused,
);
