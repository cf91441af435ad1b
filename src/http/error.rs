//! Maps the domain error taxonomy (§7) onto HTTP status codes at the edge.
//! Failure bodies are an empty JSON object; the status code alone carries the
//! error class.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use tracing::{error, warn};

use crate::error::EngineError;

impl IntoResponse for EngineError {
    fn into_response(self) -> Response {
        let status = match &self {
            EngineError::NotFound(msg) => {
                warn!(reason = %msg, "request rejected: not found");
                StatusCode::NOT_FOUND
            }
            EngineError::BadRequest(msg) => {
                tracing::debug!(reason = %msg, "request rejected: bad request");
                StatusCode::BAD_REQUEST
            }
            EngineError::Unsupported(msg) => {
                warn!(reason = %msg, "request rejected: unsupported combination");
                StatusCode::BAD_REQUEST
            }
            EngineError::Internal(msg) => {
                error!(reason = %msg, "internal invariant violated");
                panic!("internal invariant violated: {msg}");
            }
        };
        (status, axum::Json(serde_json::json!({}))).into_response()
    }
}
