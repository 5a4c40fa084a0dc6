//! Error types for recency tracking
//!
//! Provides unified error handling using thiserror.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;

use crate::models::ErrorResponse;

// == Consistency Error Enum ==
/// Unified error type for the tracker, the augmenter and the HTTP surface.
#[derive(Error, Debug)]
pub enum ConsistencyError {
    /// A field-equality predicate names a field the record does not have
    #[error("Invalid predicate for {record_type}: record has no field '{field}'")]
    InvalidPredicate { record_type: String, field: String },

    /// A configured cache name has no registered store
    #[error("Unknown cache: {0}")]
    UnknownCache(String),

    /// The backing key-value store failed
    #[error("Backing store error: {0}")]
    Backend(String),

    /// A namespace value could not be encoded or decoded
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Settings could not be loaded
    #[error("Configuration error: {0}")]
    Config(String),

    /// Invalid request data
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

impl ConsistencyError {
    /// True for errors caused by bad configuration rather than runtime failure.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            ConsistencyError::InvalidPredicate { .. }
                | ConsistencyError::UnknownCache(_)
                | ConsistencyError::Config(_)
        )
    }
}

// == IntoResponse Implementation ==
impl IntoResponse for ConsistencyError {
    fn into_response(self) -> Response {
        let status = match &self {
            ConsistencyError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            ConsistencyError::Backend(_) => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = Json(ErrorResponse::new(self.to_string()));

        (status, body).into_response()
    }
}

// == Result Type Alias ==
/// Convenience Result type for recency tracking.
pub type Result<T> = std::result::Result<T, ConsistencyError>;
