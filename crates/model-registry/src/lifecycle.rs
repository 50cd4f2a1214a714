//! Algorithm lifecycle status

use anyhow::Result;
use tracing::info;

use common::error::Error;
use common::models::{AlgorithmStatus, NewStatus};
use common::types::{AlgorithmId, StatusKind};

use crate::registry::ModelRegistry;

impl ModelRegistry {
    /// Appends a status entry. An active entry replaces the previously active ones.
    pub async fn set_status(
        &self,
        algorithm_id: AlgorithmId,
        status: StatusKind,
        created_by: &str,
        active: bool,
    ) -> Result<AlgorithmStatus> {
        let input = NewStatus::new(algorithm_id, created_by)
            .with_status(status)
            .active(active);

        let entry = if active {
            self.store().activate_status(input).await
        } else {
            self.store().create_status(input).await
        }
        .map_err(Error::from)?;

        info!(
            "Algorithm {} status {} by {} (active: {})",
            algorithm_id.0, entry.status, entry.created_by, entry.active
        );
        Ok(entry)
    }

    /// Most recent active status, if any
    pub async fn current_status(&self, algorithm_id: AlgorithmId) -> Result<Option<AlgorithmStatus>> {
        self.store().get_algorithm(algorithm_id).await.map_err(Error::from)?;
        let mut active = self
            .store()
            .active_statuses(algorithm_id)
            .await
            .map_err(Error::from)?;
        Ok(active.pop())
    }

    /// Full status history, oldest first
    pub async fn status_history(&self, algorithm_id: AlgorithmId) -> Result<Vec<AlgorithmStatus>> {
        self.store().get_algorithm(algorithm_id).await.map_err(Error::from)?;
        Ok(self
            .store()
            .list_statuses(algorithm_id)
            .await
            .map_err(Error::from)?)
    }
}
