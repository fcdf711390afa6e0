//! Endpoint handlers.

use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    Json,
};
use serde::Serialize;

use crate::http::request::request_id;
use crate::http::response::ApiError;
use crate::http::server::AppState;
use crate::pipeline::{self, PipelineRequest, PipelineResponse};

/// Protocol name reported by `/version`.
pub const PROTOCOL: &str = "hrana-2";

/// `POST /v2/pipeline`
///
/// Runs the whole batch and answers 200 with every result, or 500 with the
/// single error that aborted the batch. A malformed batch is such an error.
/// Only a body that is not JSON at all is answered with 400.
pub async fn pipeline(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<PipelineResponse>, ApiError> {
    let body: serde_json::Value = serde_json::from_slice(&body)
        .map_err(|e| ApiError::bad_request(format!("request body is not JSON: {e}")))?;
    let request = PipelineRequest::from_json(body).inspect_err(|e| {
        tracing::warn!(code = %e.code, error = %e.message, "Malformed pipeline request");
    })?;

    tracing::debug!(
        request_id = %request_id(&headers),
        items = request.requests.len(),
        "Pipeline request"
    );

    let settings = state.settings();
    let response = pipeline::handle(state.db.as_ref(), request, &settings.pipeline).await?;
    Ok(Json(response))
}

/// `GET /health`: 200 with no body, regardless of database state.
pub async fn health() -> StatusCode {
    StatusCode::OK
}

#[derive(Debug, Serialize)]
pub struct VersionInfo {
    pub version: &'static str,
    pub protocol: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
}

/// `GET /version`
pub async fn version(State(state): State<AppState>) -> Json<VersionInfo> {
    Json(VersionInfo {
        version: env!("CARGO_PKG_VERSION"),
        protocol: PROTOCOL,
        region: state.settings().region.clone(),
    })
}
