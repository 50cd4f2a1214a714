//! Store abstraction over the four registry tables
//!
//! Cascades: deleting an endpoint removes its algorithms, and deleting an
//! algorithm removes its status history and logged requests. Deletes return
//! the number of rows removed per table.
//!
//! The store does not enforce a single active status per algorithm;
//! [`RegistryStore::activate_status`] is the operation that maintains it.

use async_trait::async_trait;

use common::models::{
    Algorithm, AlgorithmStatus, Endpoint, NewAlgorithm, NewEndpoint, NewRequest, NewStatus,
    Request, TableCounts,
};
use common::types::{AlgorithmId, EndpointId, RequestId};

use crate::error::Result;

#[async_trait]
pub trait RegistryStore: Send + Sync {
    /// Short backend name for logs
    fn backend(&self) -> &'static str;

    async fn create_endpoint(&self, input: NewEndpoint) -> Result<Endpoint>;

    async fn get_endpoint(&self, id: EndpointId) -> Result<Endpoint>;

    /// First endpoint (lowest id) with this name
    async fn find_endpoint_by_name(&self, name: &str) -> Result<Option<Endpoint>>;

    async fn list_endpoints(&self) -> Result<Vec<Endpoint>>;

    /// Replaces name and owner. `created_at` is kept.
    async fn update_endpoint(&self, id: EndpointId, input: NewEndpoint) -> Result<Endpoint>;

    async fn delete_endpoint(&self, id: EndpointId) -> Result<TableCounts>;

    /// Fails with `NotFound` when the parent endpoint does not exist
    async fn create_algorithm(&self, input: NewAlgorithm) -> Result<Algorithm>;

    async fn get_algorithm(&self, id: AlgorithmId) -> Result<Algorithm>;

    /// Algorithms of an endpoint in insertion order
    async fn list_algorithms(&self, endpoint_id: EndpointId) -> Result<Vec<Algorithm>>;

    /// First algorithm (lowest id) with this name and version on the endpoint
    async fn find_algorithm(
        &self,
        endpoint_id: EndpointId,
        name: &str,
        version: &str,
    ) -> Result<Option<Algorithm>>;

    async fn delete_algorithm(&self, id: AlgorithmId) -> Result<TableCounts>;

    /// Appends a status entry as given, without touching other entries
    async fn create_status(&self, input: NewStatus) -> Result<AlgorithmStatus>;

    /// Deactivates every status of the algorithm and appends `input` as the active one
    async fn activate_status(&self, input: NewStatus) -> Result<AlgorithmStatus>;

    /// Status history ordered by creation
    async fn list_statuses(&self, algorithm_id: AlgorithmId) -> Result<Vec<AlgorithmStatus>>;

    async fn active_statuses(&self, algorithm_id: AlgorithmId) -> Result<Vec<AlgorithmStatus>>;

    async fn create_request(&self, input: NewRequest) -> Result<Request>;

    async fn get_request(&self, id: RequestId) -> Result<Request>;

    /// Requests served by an algorithm ordered by creation
    async fn list_requests(&self, algorithm_id: AlgorithmId) -> Result<Vec<Request>>;

    /// Sets the feedback of a logged request
    async fn record_feedback(&self, id: RequestId, feedback: &str) -> Result<Request>;

    async fn counts(&self) -> Result<TableCounts>;
}
