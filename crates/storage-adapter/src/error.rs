//! Storage layer errors

use thiserror::Error;

/// Result type for storage operations
pub type Result<T> = std::result::Result<T, StorageError>;

/// Storage layer errors
#[derive(Debug, Error)]
pub enum StorageError {
    /// Database error
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Row not found
    #[error("Entity not found: {0}")]
    NotFound(String),

    /// Field length or choice validation failed
    #[error("Validation error: {0}")]
    Validation(String),

    /// Referenced parent row does not exist
    #[error("Foreign key violation: {0}")]
    ForeignKey(String),

    /// Schema constraint rejected the write
    #[error("Constraint violation: {0}")]
    Constraint(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl StorageError {
    /// Classifies a driver error by the constraint that raised it
    pub fn from_sqlx(err: sqlx::Error) -> Self {
        let classified = err.as_database_error().and_then(|db_err| {
            let message = db_err.message().to_string();
            match db_err.kind() {
                sqlx::error::ErrorKind::ForeignKeyViolation => Some(StorageError::ForeignKey(message)),
                sqlx::error::ErrorKind::CheckViolation
                | sqlx::error::ErrorKind::NotNullViolation
                | sqlx::error::ErrorKind::UniqueViolation => Some(StorageError::Constraint(message)),
                _ if message.contains("immutable") => Some(StorageError::Constraint(message)),
                _ => None,
            }
        });

        classified.unwrap_or_else(|| StorageError::Database(err))
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, StorageError::NotFound(_))
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, StorageError::Validation(_))
    }
}

impl From<validator::ValidationErrors> for StorageError {
    fn from(err: validator::ValidationErrors) -> Self {
        StorageError::Validation(err.to_string())
    }
}

impl From<common::Error> for StorageError {
    fn from(err: common::Error) -> Self {
        match err {
            common::Error::Validation(msg) => StorageError::Validation(msg),
            common::Error::NotFound(msg) => StorageError::NotFound(msg),
            other => StorageError::Configuration(other.to_string()),
        }
    }
}

impl From<StorageError> for common::Error {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotFound(msg) => common::Error::NotFound(msg),
            StorageError::Validation(msg) => common::Error::Validation(msg),
            StorageError::Configuration(msg) => common::Error::Config(msg),
            other => common::Error::Storage(other.to_string()),
        }
    }
}
