use axum::{http::StatusCode, response::IntoResponse, Json};
use serde_json::json;
use thiserror::Error;

/// Error taxonomy for the RAG pipeline.
///
/// - `Validation`: malformed input, rejected immediately, never retried.
/// - `Provider`: embedding or answer service unreachable/erroring/timed out;
///   recovered locally (zero vectors, extractive fallback) wherever retrieval
///   can still run.
/// - `Storage`: vector store unavailable; surfaced to the caller, both
///   ingestion and query fail fast.
/// - `NotFound`: unknown resource (a missing collection is treated as empty,
///   not as this error).
#[derive(Debug, Error)]
pub enum WeaverError {
    #[error("validation error: {0}")]
    Validation(String),
    #[error("provider error: {0}")]
    Provider(String),
    #[error("storage error: {0}")]
    Storage(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("internal error: {0}")]
    Internal(String),
}

impl WeaverError {
    pub fn provider<E: std::fmt::Display>(err: E) -> Self {
        WeaverError::Provider(err.to_string())
    }

    pub fn storage<E: std::fmt::Display>(err: E) -> Self {
        WeaverError::Storage(err.to_string())
    }

    pub fn internal<E: std::fmt::Display>(err: E) -> Self {
        WeaverError::Internal(err.to_string())
    }
}

impl IntoResponse for WeaverError {
    fn into_response(self) -> axum::response::Response {
        let (status, message) = match &self {
            WeaverError::Validation(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            WeaverError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            WeaverError::Provider(msg) => (StatusCode::SERVICE_UNAVAILABLE, msg.clone()),
            WeaverError::Storage(msg) => (StatusCode::SERVICE_UNAVAILABLE, msg.clone()),
            WeaverError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg.clone()),
        };

        let body = Json(json!({
            "error": message,
            "request_id": uuid::Uuid::new_v4().to_string(),
        }));
        (status, body).into_response()
    }
}
