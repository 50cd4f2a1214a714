//! Algorithm version lookup
//!
//! Versions that parse as semver are ordered by semver precedence and rank
//! above versions that do not parse; ties fall back to registration order.

use std::cmp::Reverse;
use anyhow::Result;
use semver::Version;
use tracing::warn;

use common::error::Error;
use common::models::Algorithm;
use common::types::EndpointId;

use crate::registry::ModelRegistry;

impl ModelRegistry {
    /// Every version of the named algorithm on an endpoint, newest first
    pub async fn versions_of(&self, endpoint_id: EndpointId, name: &str) -> Result<Vec<Algorithm>> {
        let mut versions: Vec<Algorithm> = self
            .algorithms(endpoint_id)
            .await?
            .into_iter()
            .filter(|algorithm| algorithm.name == name)
            .collect();

        versions.sort_by_cached_key(|algorithm| Reverse((parse_version(algorithm), algorithm.id)));
        Ok(versions)
    }

    /// Newest version of the named algorithm on an endpoint
    pub async fn latest_version(&self, endpoint_id: EndpointId, name: &str) -> Result<Algorithm> {
        self.versions_of(endpoint_id, name)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| {
                Error::NotFound(format!("No versions of {} on endpoint {}", name, endpoint_id.0))
                    .into()
            })
    }
}

fn parse_version(algorithm: &Algorithm) -> Option<Version> {
    match Version::parse(algorithm.version.trim_start_matches('v')) {
        Ok(version) => Some(version),
        Err(e) => {
            warn!(
                "Algorithm {} has non-semver version {}: {}",
                algorithm.id.0, algorithm.version, e
            );
            None
        }
    }
}
