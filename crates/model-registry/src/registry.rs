//! Algorithm registration
//!
//! Registration is get-or-create: the endpoint is looked up by name and the
//! algorithm by name and version on that endpoint, so registering the same
//! algorithm twice returns the existing rows.

use std::sync::Arc;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, info};

use common::error::Error;
use common::models::{Algorithm, Endpoint, NewAlgorithm, NewEndpoint, NewStatus, TableCounts};
use common::types::{AlgorithmId, EndpointId, StatusKind};
use storage_adapter::RegistryStore;

/// Everything needed to register an algorithm on an endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlgorithmRegistration {
    /// Endpoint name, created when missing
    pub endpoint_name: String,
    /// Algorithm name
    pub algorithm_name: String,
    /// Serialized algorithm payload
    pub code: String,
    /// Algorithm version
    pub version: String,
    /// Owner of the endpoint and algorithm, also recorded as status author
    pub owner: String,
    /// Initial lifecycle status
    #[serde(default)]
    pub status: StatusKind,
}

/// Outcome of a registration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Registered {
    pub endpoint: Endpoint,
    pub algorithm: Algorithm,
    /// False when the algorithm already existed
    pub created: bool,
}

/// Registry operations over a store
pub struct ModelRegistry {
    /// Backing store
    store: Arc<dyn RegistryStore>,

    /// Serializes get-or-create sequences
    registration_lock: Mutex<()>,
}

impl ModelRegistry {
    /// Creates a new registry
    pub fn new(store: Arc<dyn RegistryStore>) -> Self {
        Self {
            store,
            registration_lock: Mutex::new(()),
        }
    }

    /// Gets the backing store
    pub fn store(&self) -> Arc<dyn RegistryStore> {
        self.store.clone()
    }

    /// Registers an algorithm, creating the endpoint and initial active status as needed
    pub async fn add_algorithm(&self, registration: AlgorithmRegistration) -> Result<Registered> {
        let _guard = self.registration_lock.lock().await;

        let endpoint = match self
            .store
            .find_endpoint_by_name(&registration.endpoint_name)
            .await
            .map_err(Error::from)?
        {
            Some(endpoint) => endpoint,
            None => self
                .store
                .create_endpoint(NewEndpoint::new(
                    registration.endpoint_name.clone(),
                    registration.owner.clone(),
                ))
                .await
                .map_err(Error::from)?,
        };

        if let Some(algorithm) = self
            .store
            .find_algorithm(endpoint.id, &registration.algorithm_name, &registration.version)
            .await
            .map_err(Error::from)?
        {
            debug!(
                "Algorithm {} {} already registered on {}",
                algorithm.name, algorithm.version, endpoint.name
            );
            return Ok(Registered {
                endpoint,
                algorithm,
                created: false,
            });
        }

        let algorithm = self
            .store
            .create_algorithm(NewAlgorithm {
                endpoint_id: endpoint.id,
                name: registration.algorithm_name,
                code: registration.code,
                version: registration.version,
                owner: registration.owner.clone(),
            })
            .await
            .map_err(Error::from)?;

        self.store
            .activate_status(
                NewStatus::new(algorithm.id, registration.owner).with_status(registration.status),
            )
            .await
            .map_err(Error::from)?;

        info!(
            "Registered algorithm {} {} on endpoint {} as {}",
            algorithm.name, algorithm.version, endpoint.name, registration.status
        );

        Ok(Registered {
            endpoint,
            algorithm,
            created: true,
        })
    }

    /// Creates an endpoint without attaching an algorithm
    pub async fn add_endpoint(&self, input: NewEndpoint) -> Result<Endpoint> {
        Ok(self.store.create_endpoint(input).await.map_err(Error::from)?)
    }

    /// Removes an endpoint together with its algorithms and their history
    pub async fn remove_endpoint(&self, endpoint_id: EndpointId) -> Result<TableCounts> {
        let removed = self
            .store
            .delete_endpoint(endpoint_id)
            .await
            .map_err(Error::from)?;

        info!(
            "Removed {}: {} algorithms, {} statuses, {} requests",
            endpoint_id, removed.algorithms, removed.statuses, removed.requests
        );
        Ok(removed)
    }

    /// Removes an algorithm together with its status history and requests
    pub async fn remove_algorithm(&self, algorithm_id: AlgorithmId) -> Result<TableCounts> {
        let removed = self
            .store
            .delete_algorithm(algorithm_id)
            .await
            .map_err(Error::from)?;

        info!(
            "Removed {}: {} statuses, {} requests",
            algorithm_id, removed.statuses, removed.requests
        );
        Ok(removed)
    }

    /// Lists endpoints
    pub async fn endpoints(&self) -> Result<Vec<Endpoint>> {
        Ok(self.store.list_endpoints().await.map_err(Error::from)?)
    }

    /// Lists the algorithms of an endpoint
    pub async fn algorithms(&self, endpoint_id: EndpointId) -> Result<Vec<Algorithm>> {
        self.store.get_endpoint(endpoint_id).await.map_err(Error::from)?;
        Ok(self
            .store
            .list_algorithms(endpoint_id)
            .await
            .map_err(Error::from)?)
    }

    /// Renames an endpoint or changes its owner
    pub async fn update_endpoint(&self, endpoint_id: EndpointId, input: NewEndpoint) -> Result<Endpoint> {
        Ok(self
            .store
            .update_endpoint(endpoint_id, input)
            .await
            .map_err(Error::from)?)
    }

    /// Row counts of every table
    pub async fn stats(&self) -> Result<TableCounts> {
        Ok(self.store.counts().await.map_err(Error::from)?)
    }
}
