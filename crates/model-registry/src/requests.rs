//! Inference request log

use anyhow::Result;
use tracing::debug;

use common::error::Error;
use common::models::{NewRequest, Request};
use common::types::{AlgorithmId, RequestId};
use common::utils::truncate_string;

use crate::registry::ModelRegistry;

const LOG_PREVIEW_CHARS: usize = 64;

impl ModelRegistry {
    /// Records one inference call
    pub async fn log_request(&self, input: NewRequest) -> Result<Request> {
        let request = self.store().create_request(input).await.map_err(Error::from)?;

        debug!(
            "Logged request {} for algorithm {}: {} -> {}",
            request.id.0,
            request.algorithm_id.0,
            truncate_string(&request.input_data, LOG_PREVIEW_CHARS),
            truncate_string(&request.response, LOG_PREVIEW_CHARS)
        );
        Ok(request)
    }

    /// Attaches feedback to a logged request
    pub async fn record_feedback(&self, request_id: RequestId, feedback: &str) -> Result<Request> {
        Ok(self
            .store()
            .record_feedback(request_id, feedback)
            .await
            .map_err(Error::from)?)
    }

    /// Requests served by an algorithm, oldest first
    pub async fn requests_for(&self, algorithm_id: AlgorithmId) -> Result<Vec<Request>> {
        self.store().get_algorithm(algorithm_id).await.map_err(Error::from)?;
        Ok(self
            .store()
            .list_requests(algorithm_id)
            .await
            .map_err(Error::from)?)
    }
}
