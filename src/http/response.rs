//! Error responses.
//!
//! # Responsibilities
//! - Render failures as `{"error":{"message":..., "code":...}}`
//! - Map failure kinds to HTTP status codes
//!
//! # Design Decisions
//! - Database errors and internal errors look identical on the wire
//! - No partial-batch response exists; a failed batch is one error object

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::pipeline::response::ErrorBody;
use crate::pipeline::PipelineError;

pub const UNAUTHORIZED: &str = "UNAUTHORIZED";
pub const BAD_REQUEST: &str = "BAD_REQUEST";

/// A top-level error returned instead of a normal response body.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiError {
    pub status: StatusCode,
    pub body: ErrorBody,
}

#[derive(Serialize)]
struct ErrorEnvelope<'a> {
    error: &'a ErrorBody,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>, code: impl Into<String>) -> Self {
        Self {
            status,
            body: ErrorBody {
                message: message.into(),
                code: code.into(),
            },
        }
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, message, UNAUTHORIZED)
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message, BAD_REQUEST)
    }
}

impl From<PipelineError> for ApiError {
    fn from(err: PipelineError) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, err.message, err.code)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(ErrorEnvelope { error: &self.body })).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn renders_error_envelope() {
        let response = ApiError::from(PipelineError {
            message: "no such table: t".into(),
            code: "SQLITE_ERROR".into(),
        })
        .into_response();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"error": {"message": "no such table: t", "code": "SQLITE_ERROR"}})
        );
    }
}
