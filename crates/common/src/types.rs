//! Common types for the endpoint registry
//!
//! Identifier newtypes and the algorithm lifecycle status enum.

use std::fmt;
use std::str::FromStr;
use serde::{Deserialize, Serialize};

use crate::error::Error;

macro_rules! record_id {
    ($(#[$meta:meta])* $name:ident, $label:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub i64);

        impl $name {
            /// Returns the raw row id
            pub fn get(self) -> i64 {
                self.0
            }
        }

        impl From<i64> for $name {
            fn from(id: i64) -> Self {
                Self(id)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{} {}", $label, self.0)
            }
        }
    };
}

record_id!(
    /// Identifier of an endpoint
    EndpointId, "endpoint"
);
record_id!(
    /// Identifier of an algorithm
    AlgorithmId, "algorithm"
);
record_id!(
    /// Identifier of an algorithm status entry
    StatusId, "status"
);
record_id!(
    /// Identifier of a logged request
    RequestId, "request"
);

/// Lifecycle stage of an algorithm
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusKind {
    /// Under test
    #[default]
    Testing,
    /// Staged for release
    Staging,
    /// Serving production traffic
    Production,
    /// Part of an A/B test
    AbTesting,
}

impl StatusKind {
    /// All accepted statuses, in lifecycle order
    pub const ALL: [StatusKind; 4] = [
        StatusKind::Testing,
        StatusKind::Staging,
        StatusKind::Production,
        StatusKind::AbTesting,
    ];

    /// Canonical text form, as persisted
    pub fn as_str(&self) -> &'static str {
        match self {
            StatusKind::Testing => "testing",
            StatusKind::Staging => "staging",
            StatusKind::Production => "production",
            StatusKind::AbTesting => "ab_testing",
        }
    }
}

impl fmt::Display for StatusKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StatusKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        StatusKind::ALL
            .into_iter()
            .find(|kind| kind.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| {
                Error::Validation(format!(
                    "Unknown algorithm status: {} (expected one of testing, staging, production, ab_testing)",
                    s
                ))
            })
    }
}
