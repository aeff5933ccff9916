//! Error types for podsplice-server

use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;
use tracing::error;

/// API error type
#[derive(Debug, Error)]
pub enum ApiError {
    /// Resource not found (404)
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// Requested byte range lies outside the episode (416)
    #[error("Range not satisfiable for {length} byte episode")]
    RangeNotSatisfiable { length: u64 },

    /// Splice pipeline failure (500, details logged only)
    #[error("Splice failed: {0}")]
    Splice(#[from] podsplice_core::Error),

    /// Internal server error (500)
    #[error("Internal server error: {0}")]
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_code, message) = match &self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg.clone()),
            ApiError::RangeNotSatisfiable { .. } => (
                StatusCode::RANGE_NOT_SATISFIABLE,
                "RANGE_NOT_SATISFIABLE",
                self.to_string(),
            ),
            ApiError::Splice(err) => {
                error!(error = %err, "Episode generation failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "SPLICE_FAILED",
                    "Episode could not be generated".to_string(),
                )
            }
            ApiError::Internal(msg) => {
                error!(error = %msg, "Internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    "Internal server error".to_string(),
                )
            }
        };

        let body = Json(json!({
            "error": {
                "code": error_code,
                "message": message,
            }
        }));

        let mut response = (status, body).into_response();
        if let ApiError::RangeNotSatisfiable { length } = self {
            if let Ok(value) = HeaderValue::from_str(&format!("bytes */{}", length)) {
                response.headers_mut().insert(header::CONTENT_RANGE, value);
            }
        }
        response
    }
}

/// Result type for API handlers
pub type ApiResult<T> = Result<T, ApiError>;
