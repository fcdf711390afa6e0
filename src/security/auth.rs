//! Bearer-token gate for the pipeline endpoint.
//!
//! The gate is active only when `auth.token` is configured. Rejected requests
//! never reach the pipeline, so their bodies are never read.

use axum::{
    body::Body,
    extract::State,
    http::{header::AUTHORIZATION, Request},
    middleware::Next,
    response::Response,
};
use subtle::ConstantTimeEq;
use thiserror::Error;

use crate::http::response::ApiError;
use crate::http::server::AppState;
use crate::observability::metrics;

pub const BEARER_PREFIX: &str = "Bearer ";

/// Why a request was denied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum AuthError {
    #[error("Missing Authorization header")]
    MissingHeader,

    #[error("Authorization header must use the Bearer scheme")]
    MalformedHeader,

    #[error("Invalid bearer token")]
    InvalidToken,
}

/// Check an `Authorization` header value against the expected token.
///
/// The token comparison runs in constant time.
pub fn authorize(header: Option<&str>, expected: &str) -> Result<(), AuthError> {
    let header = header.ok_or(AuthError::MissingHeader)?;
    let presented = header
        .strip_prefix(BEARER_PREFIX)
        .ok_or(AuthError::MalformedHeader)?;

    if bool::from(presented.as_bytes().ct_eq(expected.as_bytes())) {
        Ok(())
    } else {
        Err(AuthError::InvalidToken)
    }
}

pub async fn bearer_auth_middleware(
    State(state): State<AppState>,
    request: Request<Body>,
    next: Next,
) -> Result<Response, ApiError> {
    let settings = state.settings();

    if let Some(expected) = settings.auth_token.as_deref() {
        // A header that is not visible ASCII is treated as malformed.
        let header = request
            .headers()
            .get(AUTHORIZATION)
            .map(|value| value.to_str().unwrap_or_default());

        if let Err(e) = authorize(header, expected) {
            metrics::record_auth_failure();
            tracing::warn!(reason = %e, "Rejected pipeline request");
            return Err(ApiError::unauthorized(e.to_string()));
        }
    }

    Ok(next.run(request).await)
}
