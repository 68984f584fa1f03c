//! services/responses_api/src/error.rs
//!
//! Defines the primary error type for the entire API service.

use crate::config::ConfigError;
use response_store_core::{InvalidCompanyId, PortError};

/// The primary error type for the `responses_api` service.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Represents an error that occurred during configuration loading.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Represents an error that propagated up from the storage port.
    #[error("Storage error: {0}")]
    Port(#[from] PortError),

    /// A required request field is missing or unusable.
    #[error("{0}")]
    Validation(String),

    /// The request body is not valid JSON.
    #[error("Invalid JSON body: {0}")]
    MalformedBody(#[source] serde_json::Error),

    /// A stored object could not be decoded into a record.
    #[error("Corrupt record at {key}: {source}")]
    CorruptRecord {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    /// No handler matches the request.
    #[error("{0}")]
    NotFound(String),

    #[error("Method not allowed")]
    MethodNotAllowed,

    /// Represents a standard Input/Output error (e.g., binding to a network socket).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A catch-all for any other unexpected errors.
    #[error("An unexpected internal error occurred: {0}")]
    Internal(String),
}

impl ApiError {
    /// The HTTP status code this error is reported with.
    pub fn status_code(&self) -> u16 {
        match self {
            ApiError::Validation(_) => 400,
            ApiError::NotFound(_) => 404,
            ApiError::MethodNotAllowed => 405,
            ApiError::Port(PortError::Conflict(_)) => 409,
            _ => 500,
        }
    }

    /// Builds a validation error naming every missing field.
    pub fn missing(fields: &[&str]) -> Self {
        ApiError::Validation(format!("Missing required parameters: {}", fields.join(", ")))
    }
}

impl From<InvalidCompanyId> for ApiError {
    fn from(err: InvalidCompanyId) -> Self {
        ApiError::Validation(err.to_string())
    }
}
