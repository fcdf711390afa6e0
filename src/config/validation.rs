//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (timeouts > 0, ports valid)
//! - Check URLs and addresses parse
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: GatewayConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;

use thiserror::Error;

use crate::config::schema::GatewayConfig;

/// A single semantic problem with a configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("listener.port must be non-zero")]
    ZeroPort,

    #[error("database.path must not be empty")]
    EmptyDatabasePath,

    #[error("database.sync_url is not a valid URL: {0}")]
    InvalidSyncUrl(String),

    #[error("{0} must be greater than zero")]
    ZeroValue(&'static str),

    #[error("timeouts.statement_ms ({statement_ms}) must be below timeouts.request_secs ({request_secs}s)")]
    StatementOutlivesRequest { statement_ms: u64, request_secs: u64 },

    #[error("auth.token must not be empty when set")]
    EmptyAuthToken,

    #[error("observability.metrics_address is not a socket address: {0}")]
    InvalidMetricsAddress(String),
}

/// Check `config` and collect every problem found.
pub fn validate_config(config: &GatewayConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.port == 0 {
        errors.push(ValidationError::ZeroPort);
    }

    if config.database.path.trim().is_empty() {
        errors.push(ValidationError::EmptyDatabasePath);
    }

    if let Some(sync_url) = &config.database.sync_url {
        if let Err(e) = url::Url::parse(sync_url) {
            errors.push(ValidationError::InvalidSyncUrl(format!("{sync_url}: {e}")));
        }
    }

    if config.database.sync_interval_secs == 0 {
        errors.push(ValidationError::ZeroValue("database.sync_interval_secs"));
    }

    if config.timeouts.request_secs == 0 {
        errors.push(ValidationError::ZeroValue("timeouts.request_secs"));
    }

    if config.timeouts.statement_ms == 0 {
        errors.push(ValidationError::ZeroValue("timeouts.statement_ms"));
    }

    // Otherwise the whole-request timeout answers first, without the error
    // envelope.
    let request_ms = config.timeouts.request_secs.saturating_mul(1000);
    if config.timeouts.statement_ms > 0
        && config.timeouts.request_secs > 0
        && config.timeouts.statement_ms >= request_ms
    {
        errors.push(ValidationError::StatementOutlivesRequest {
            statement_ms: config.timeouts.statement_ms,
            request_secs: config.timeouts.request_secs,
        });
    }

    if config.security.max_body_size == 0 {
        errors.push(ValidationError::ZeroValue("security.max_body_size"));
    }

    if matches!(config.auth.token.as_deref(), Some(token) if token.is_empty()) {
        errors.push(ValidationError::EmptyAuthToken);
    }

    if config.observability.metrics_enabled
        && config
            .observability
            .metrics_address
            .parse::<SocketAddr>()
            .is_err()
    {
        errors.push(ValidationError::InvalidMetricsAddress(
            config.observability.metrics_address.clone(),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
