//! Registry data models
//!
//! Records are returned by the stores and are read-only: ids and creation
//! timestamps are assigned at insertion. The `New*` input types carry only
//! the fields a caller may set, with their field limits.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::types::{AlgorithmId, EndpointId, RequestId, StatusId, StatusKind};

/// Maximum length of an endpoint name
pub const ENDPOINT_NAME_MAX: u64 = 150;
/// Maximum length of an endpoint owner
pub const ENDPOINT_OWNER_MAX: u64 = 120;
/// Maximum length of algorithm name, version and owner
pub const ALGORITHM_FIELD_MAX: u64 = 128;
/// Maximum length of a serialized algorithm payload
pub const ALGORITHM_CODE_MAX: u64 = 6000;
/// Maximum length of a status author
pub const STATUS_CREATED_BY_MAX: u64 = 128;
/// Maximum length of any logged request field
pub const REQUEST_FIELD_MAX: u64 = 10000;

/// A named API surface that algorithms are attached to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Endpoint {
    /// Endpoint ID
    pub id: EndpointId,
    /// Endpoint name, used in the serving URL
    pub name: String,
    /// Owner name
    pub owner: String,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
}

/// A versioned unit of inference logic tied to an endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Algorithm {
    /// Algorithm ID
    pub id: AlgorithmId,
    /// Algorithm name
    pub name: String,
    /// Serialized algorithm payload
    pub code: String,
    /// Version string, usually semver
    pub version: String,
    /// Owner name
    pub owner: String,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
    /// Parent endpoint
    pub endpoint_id: EndpointId,
}

/// One entry in the lifecycle history of an algorithm
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlgorithmStatus {
    /// Status entry ID
    pub id: StatusId,
    /// Lifecycle stage
    pub status: StatusKind,
    /// Whether this entry is the currently effective one
    pub active: bool,
    /// Author of the status change
    pub created_by: String,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
    /// Parent algorithm
    pub algorithm_id: AlgorithmId,
}

/// One logged inference call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Request {
    /// Request ID
    pub id: RequestId,
    /// Input payload as text
    pub input_data: String,
    /// Full algorithm output
    pub full_response: String,
    /// Response returned to the caller
    pub response: String,
    /// Feedback about the response, once recorded
    pub feedback: Option<String>,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
    /// Algorithm that served the request
    pub algorithm_id: AlgorithmId,
}

/// Fields of a new endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct NewEndpoint {
    #[validate(length(min = 1, max = "ENDPOINT_NAME_MAX"))]
    pub name: String,
    #[validate(length(min = 1, max = "ENDPOINT_OWNER_MAX"))]
    pub owner: String,
}

impl NewEndpoint {
    pub fn new(name: impl Into<String>, owner: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            owner: owner.into(),
        }
    }
}

/// Fields of a new algorithm
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct NewAlgorithm {
    pub endpoint_id: EndpointId,
    #[validate(length(min = 1, max = "ALGORITHM_FIELD_MAX"))]
    pub name: String,
    #[validate(length(max = "ALGORITHM_CODE_MAX"))]
    pub code: String,
    #[validate(length(min = 1, max = "ALGORITHM_FIELD_MAX"))]
    pub version: String,
    #[validate(length(min = 1, max = "ALGORITHM_FIELD_MAX"))]
    pub owner: String,
}

/// Fields of a new status entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct NewStatus {
    pub algorithm_id: AlgorithmId,
    #[serde(default)]
    pub status: StatusKind,
    #[serde(default)]
    pub active: bool,
    #[validate(length(min = 1, max = "STATUS_CREATED_BY_MAX"))]
    pub created_by: String,
}

impl NewStatus {
    /// An inactive `testing` entry, matching the column defaults
    pub fn new(algorithm_id: AlgorithmId, created_by: impl Into<String>) -> Self {
        Self {
            algorithm_id,
            status: StatusKind::default(),
            active: false,
            created_by: created_by.into(),
        }
    }

    pub fn with_status(mut self, status: StatusKind) -> Self {
        self.status = status;
        self
    }

    pub fn active(mut self, active: bool) -> Self {
        self.active = active;
        self
    }
}

/// Fields of a new logged request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct NewRequest {
    pub algorithm_id: AlgorithmId,
    #[validate(length(max = "REQUEST_FIELD_MAX"))]
    pub input_data: String,
    #[validate(length(max = "REQUEST_FIELD_MAX"))]
    pub full_response: String,
    #[validate(length(max = "REQUEST_FIELD_MAX"))]
    pub response: String,
    #[validate(length(max = "REQUEST_FIELD_MAX"))]
    #[serde(default)]
    pub feedback: Option<String>,
}

/// Validates feedback text recorded after the fact
pub fn validate_feedback(feedback: &str) -> crate::Result<()> {
    if feedback.chars().count() as u64 > REQUEST_FIELD_MAX {
        return Err(crate::Error::Validation(format!(
            "feedback: length must be at most {}",
            REQUEST_FIELD_MAX
        )));
    }
    Ok(())
}

/// Row counts of the four registry tables
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableCounts {
    pub endpoints: u64,
    pub algorithms: u64,
    pub statuses: u64,
    pub requests: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_limits() {
        let at = |n: u64| "a".repeat(n as usize);
        assert!(NewEndpoint::new("income_classifier", "ops").validate().is_ok());
        assert!(NewEndpoint::new("", "ops").validate().is_err());
        assert!(NewEndpoint::new(at(ENDPOINT_NAME_MAX), "ops").validate().is_ok());
        assert!(NewEndpoint::new(at(ENDPOINT_NAME_MAX + 1), "ops").validate().is_err());
        assert!(NewEndpoint::new("x", at(ENDPOINT_OWNER_MAX + 1)).validate().is_err());
    }

    #[test]
    fn test_algorithm_code_limit() {
        let mut input = NewAlgorithm {
            endpoint_id: EndpointId(1),
            name: "random forest".into(),
            code: "c".repeat(6000),
            version: "0.0.1".into(),
            owner: "ops".into(),
        };
        assert!(input.validate().is_ok());
        input.code.push('c');
        let err = crate::Error::from(input.validate().unwrap_err());
        assert!(err.is_validation());
        assert!(err.to_string().contains("code"));
    }

    #[test]
    fn test_new_status_defaults() {
        let status = NewStatus::new(AlgorithmId(4), "ops");
        assert_eq!(status.status, StatusKind::Testing);
        assert!(!status.active);

        let json = r#"{"algorithm_id": 4, "created_by": "ops"}"#;
        let parsed: NewStatus = serde_json::from_str(json).unwrap();
        assert_eq!(parsed, status);
    }

    #[test]
    fn test_limits_follow_constants() {
        let at = |n: u64| "x".repeat(n as usize);
        let status = |by: String| NewStatus::new(AlgorithmId(1), by);
        assert!(status(at(STATUS_CREATED_BY_MAX)).validate().is_ok());
        assert!(status(at(STATUS_CREATED_BY_MAX + 1)).validate().is_err());

        let mut request = NewRequest {
            algorithm_id: AlgorithmId(1),
            input_data: at(REQUEST_FIELD_MAX),
            full_response: String::new(),
            response: String::new(),
            feedback: Some(at(REQUEST_FIELD_MAX)),
        };
        assert!(request.validate().is_ok());
        request.feedback = Some(at(REQUEST_FIELD_MAX + 1));
        assert!(request.validate().is_err());

        let mut algorithm = NewAlgorithm {
            endpoint_id: EndpointId(1),
            name: at(ALGORITHM_FIELD_MAX),
            code: String::new(),
            version: "0.0.1".into(),
            owner: "ops".into(),
        };
        assert!(algorithm.validate().is_ok());
        algorithm.version = at(ALGORITHM_FIELD_MAX + 1);
        assert!(algorithm.validate().is_err());
    }

    #[test]
    fn test_feedback_limit() {
        assert!(validate_feedback("looks right").is_ok());
        assert!(validate_feedback(&"f".repeat(10001)).is_err());
    }
}
