//! In-memory store
//!
//! All four tables live behind a single lock so that cascades and status
//! activation are applied atomically. Ids are never reused.

use std::collections::BTreeMap;
use async_trait::async_trait;
use chrono::Utc;
use parking_lot::RwLock;
use tracing::{debug, info};
use validator::Validate;

use common::models::{
    validate_feedback, Algorithm, AlgorithmStatus, Endpoint, NewAlgorithm, NewEndpoint,
    NewRequest, NewStatus, Request, TableCounts,
};
use common::types::{AlgorithmId, EndpointId, RequestId, StatusId};

use crate::error::{Result, StorageError};
use crate::store::RegistryStore;

#[derive(Default)]
struct Tables {
    endpoints: BTreeMap<EndpointId, Endpoint>,
    algorithms: BTreeMap<AlgorithmId, Algorithm>,
    statuses: BTreeMap<StatusId, AlgorithmStatus>,
    requests: BTreeMap<RequestId, Request>,
    last_endpoint_id: i64,
    last_algorithm_id: i64,
    last_status_id: i64,
    last_request_id: i64,
}

impl Tables {
    fn require_algorithm(&self, id: AlgorithmId) -> Result<()> {
        if self.algorithms.contains_key(&id) {
            Ok(())
        } else {
            Err(StorageError::NotFound(format!("Algorithm not found: {}", id.0)))
        }
    }

    fn insert_status(&mut self, input: NewStatus, active: bool) -> AlgorithmStatus {
        self.last_status_id += 1;
        let status = AlgorithmStatus {
            id: StatusId(self.last_status_id),
            status: input.status,
            active,
            created_by: input.created_by,
            created_at: Utc::now(),
            algorithm_id: input.algorithm_id,
        };
        self.statuses.insert(status.id, status.clone());
        status
    }

    /// Removes an algorithm and its dependent rows
    fn cascade_algorithm(&mut self, id: AlgorithmId, removed: &mut TableCounts) {
        if self.algorithms.remove(&id).is_none() {
            return;
        }
        removed.algorithms += 1;

        let before = self.statuses.len();
        self.statuses.retain(|_, status| status.algorithm_id != id);
        removed.statuses += (before - self.statuses.len()) as u64;

        let before = self.requests.len();
        self.requests.retain(|_, request| request.algorithm_id != id);
        removed.requests += (before - self.requests.len()) as u64;
    }

    fn statuses_of(&self, algorithm_id: AlgorithmId) -> impl Iterator<Item = &AlgorithmStatus> {
        self.statuses
            .values()
            .filter(move |status| status.algorithm_id == algorithm_id)
    }
}

/// Store holding every table in process memory
#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RegistryStore for MemoryStore {
    fn backend(&self) -> &'static str {
        "memory"
    }

    async fn create_endpoint(&self, input: NewEndpoint) -> Result<Endpoint> {
        input.validate()?;

        let mut tables = self.tables.write();
        tables.last_endpoint_id += 1;
        let endpoint = Endpoint {
            id: EndpointId(tables.last_endpoint_id),
            name: input.name,
            owner: input.owner,
            created_at: Utc::now(),
        };
        tables.endpoints.insert(endpoint.id, endpoint.clone());

        info!("Created endpoint {} ({})", endpoint.name, endpoint.id);
        Ok(endpoint)
    }

    async fn get_endpoint(&self, id: EndpointId) -> Result<Endpoint> {
        self.tables
            .read()
            .endpoints
            .get(&id)
            .cloned()
            .ok_or_else(|| StorageError::NotFound(format!("Endpoint not found: {}", id.0)))
    }

    async fn find_endpoint_by_name(&self, name: &str) -> Result<Option<Endpoint>> {
        Ok(self
            .tables
            .read()
            .endpoints
            .values()
            .find(|endpoint| endpoint.name == name)
            .cloned())
    }

    async fn list_endpoints(&self) -> Result<Vec<Endpoint>> {
        Ok(self.tables.read().endpoints.values().cloned().collect())
    }

    async fn update_endpoint(&self, id: EndpointId, input: NewEndpoint) -> Result<Endpoint> {
        input.validate()?;

        let mut tables = self.tables.write();
        let endpoint = tables
            .endpoints
            .get_mut(&id)
            .ok_or_else(|| StorageError::NotFound(format!("Endpoint not found: {}", id.0)))?;
        endpoint.name = input.name;
        endpoint.owner = input.owner;

        Ok(endpoint.clone())
    }

    async fn delete_endpoint(&self, id: EndpointId) -> Result<TableCounts> {
        let mut tables = self.tables.write();
        if tables.endpoints.remove(&id).is_none() {
            return Err(StorageError::NotFound(format!("Endpoint not found: {}", id.0)));
        }

        let mut removed = TableCounts {
            endpoints: 1,
            ..TableCounts::default()
        };
        let children: Vec<AlgorithmId> = tables
            .algorithms
            .values()
            .filter(|algorithm| algorithm.endpoint_id == id)
            .map(|algorithm| algorithm.id)
            .collect();
        for algorithm_id in children {
            tables.cascade_algorithm(algorithm_id, &mut removed);
        }

        Ok(removed)
    }

    async fn create_algorithm(&self, input: NewAlgorithm) -> Result<Algorithm> {
        input.validate()?;

        let mut tables = self.tables.write();
        if !tables.endpoints.contains_key(&input.endpoint_id) {
            return Err(StorageError::NotFound(format!(
                "Endpoint not found: {}",
                input.endpoint_id.0
            )));
        }

        tables.last_algorithm_id += 1;
        let algorithm = Algorithm {
            id: AlgorithmId(tables.last_algorithm_id),
            name: input.name,
            code: input.code,
            version: input.version,
            owner: input.owner,
            created_at: Utc::now(),
            endpoint_id: input.endpoint_id,
        };
        tables.algorithms.insert(algorithm.id, algorithm.clone());

        info!(
            "Created algorithm {} {} ({}) on endpoint {}",
            algorithm.name, algorithm.version, algorithm.id, algorithm.endpoint_id.0
        );
        Ok(algorithm)
    }

    async fn get_algorithm(&self, id: AlgorithmId) -> Result<Algorithm> {
        self.tables
            .read()
            .algorithms
            .get(&id)
            .cloned()
            .ok_or_else(|| StorageError::NotFound(format!("Algorithm not found: {}", id.0)))
    }

    async fn list_algorithms(&self, endpoint_id: EndpointId) -> Result<Vec<Algorithm>> {
        Ok(self
            .tables
            .read()
            .algorithms
            .values()
            .filter(|algorithm| algorithm.endpoint_id == endpoint_id)
            .cloned()
            .collect())
    }

    async fn find_algorithm(
        &self,
        endpoint_id: EndpointId,
        name: &str,
        version: &str,
    ) -> Result<Option<Algorithm>> {
        Ok(self
            .tables
            .read()
            .algorithms
            .values()
            .find(|a| a.endpoint_id == endpoint_id && a.name == name && a.version == version)
            .cloned())
    }

    async fn delete_algorithm(&self, id: AlgorithmId) -> Result<TableCounts> {
        let mut tables = self.tables.write();
        tables.require_algorithm(id)?;

        let mut removed = TableCounts::default();
        tables.cascade_algorithm(id, &mut removed);
        Ok(removed)
    }

    async fn create_status(&self, input: NewStatus) -> Result<AlgorithmStatus> {
        input.validate()?;

        let mut tables = self.tables.write();
        tables.require_algorithm(input.algorithm_id)?;
        let active = input.active;
        Ok(tables.insert_status(input, active))
    }

    async fn activate_status(&self, input: NewStatus) -> Result<AlgorithmStatus> {
        input.validate()?;

        let mut tables = self.tables.write();
        tables.require_algorithm(input.algorithm_id)?;

        let mut deactivated = 0;
        for status in tables.statuses.values_mut() {
            if status.algorithm_id == input.algorithm_id && status.active {
                status.active = false;
                deactivated += 1;
            }
        }

        let status = tables.insert_status(input, true);
        debug!(
            "Activated status {} for algorithm {} ({} deactivated)",
            status.status, status.algorithm_id.0, deactivated
        );
        Ok(status)
    }

    async fn list_statuses(&self, algorithm_id: AlgorithmId) -> Result<Vec<AlgorithmStatus>> {
        let mut statuses: Vec<_> = self.tables.read().statuses_of(algorithm_id).cloned().collect();
        statuses.sort_by_key(|status| (status.created_at, status.id));
        Ok(statuses)
    }

    async fn active_statuses(&self, algorithm_id: AlgorithmId) -> Result<Vec<AlgorithmStatus>> {
        let mut statuses: Vec<_> = self
            .tables
            .read()
            .statuses_of(algorithm_id)
            .filter(|status| status.active)
            .cloned()
            .collect();
        statuses.sort_by_key(|status| (status.created_at, status.id));
        Ok(statuses)
    }

    async fn create_request(&self, input: NewRequest) -> Result<Request> {
        input.validate()?;

        let mut tables = self.tables.write();
        tables.require_algorithm(input.algorithm_id)?;

        tables.last_request_id += 1;
        let request = Request {
            id: RequestId(tables.last_request_id),
            input_data: input.input_data,
            full_response: input.full_response,
            response: input.response,
            feedback: input.feedback,
            created_at: Utc::now(),
            algorithm_id: input.algorithm_id,
        };
        tables.requests.insert(request.id, request.clone());

        Ok(request)
    }

    async fn get_request(&self, id: RequestId) -> Result<Request> {
        self.tables
            .read()
            .requests
            .get(&id)
            .cloned()
            .ok_or_else(|| StorageError::NotFound(format!("Request not found: {}", id.0)))
    }

    async fn list_requests(&self, algorithm_id: AlgorithmId) -> Result<Vec<Request>> {
        let mut requests: Vec<_> = self
            .tables
            .read()
            .requests
            .values()
            .filter(|request| request.algorithm_id == algorithm_id)
            .cloned()
            .collect();
        requests.sort_by_key(|request| (request.created_at, request.id));
        Ok(requests)
    }

    async fn record_feedback(&self, id: RequestId, feedback: &str) -> Result<Request> {
        validate_feedback(feedback)?;

        let mut tables = self.tables.write();
        let request = tables
            .requests
            .get_mut(&id)
            .ok_or_else(|| StorageError::NotFound(format!("Request not found: {}", id.0)))?;
        request.feedback = Some(feedback.to_string());

        Ok(request.clone())
    }

    async fn counts(&self) -> Result<TableCounts> {
        let tables = self.tables.read();
        Ok(TableCounts {
            endpoints: tables.endpoints.len() as u64,
            algorithms: tables.algorithms.len() as u64,
            statuses: tables.statuses.len() as u64,
            requests: tables.requests.len() as u64,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[tokio::test]
    async fn test_history_is_ordered_by_creation_time() {
        let store = MemoryStore::new();
        let endpoint = store
            .create_endpoint(NewEndpoint::new("income_classifier", "ops"))
            .await
            .unwrap();
        let algorithm = store
            .create_algorithm(NewAlgorithm {
                endpoint_id: endpoint.id,
                name: "random forest".into(),
                code: String::new(),
                version: "0.0.1".into(),
                owner: "ops".into(),
            })
            .await
            .unwrap();

        let mut status_ids = Vec::new();
        let mut request_ids = Vec::new();
        for _ in 0..3 {
            let status = store
                .create_status(NewStatus::new(algorithm.id, "ops").active(true))
                .await
                .unwrap();
            status_ids.push(status.id);
            let request = store
                .create_request(NewRequest {
                    algorithm_id: algorithm.id,
                    input_data: "{}".into(),
                    full_response: "{}".into(),
                    response: "<=50K".into(),
                    feedback: None,
                })
                .await
                .unwrap();
            request_ids.push(request.id);
        }

        // Later ids with earlier timestamps, as with a clock step backwards
        {
            let mut tables = store.tables.write();
            let base = Utc::now();
            for (offset, id) in status_ids.iter().enumerate() {
                tables.statuses.get_mut(id).unwrap().created_at =
                    base - Duration::seconds(offset as i64);
            }
            for (offset, id) in request_ids.iter().enumerate() {
                tables.requests.get_mut(id).unwrap().created_at =
                    base - Duration::seconds(offset as i64);
            }
        }

        let listed: Vec<_> = store
            .list_statuses(algorithm.id)
            .await
            .unwrap()
            .into_iter()
            .map(|status| status.id)
            .collect();
        status_ids.reverse();
        assert_eq!(listed, status_ids);

        let listed: Vec<_> = store
            .list_requests(algorithm.id)
            .await
            .unwrap()
            .into_iter()
            .map(|request| request.id)
            .collect();
        request_ids.reverse();
        assert_eq!(listed, request_ids);
    }
}
