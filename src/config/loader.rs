//! Configuration loading from disk and the environment.
//!
//! Precedence: built-in defaults, then the TOML file, then environment variables.

use std::fs;
use std::path::Path;

use thiserror::Error;

use crate::config::schema::GatewayConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid value for {var}: {message}")]
    Env { var: &'static str, message: String },

    #[error("Validation failed: {}", join_errors(.0))]
    Validation(Vec<ValidationError>),
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Load the optional TOML file, apply process environment overrides, and validate.
pub fn load_config(path: Option<&Path>) -> Result<GatewayConfig, ConfigError> {
    let mut config = match path {
        Some(path) => read_config_file(path)?,
        None => GatewayConfig::default(),
    };
    apply_env_overrides(&mut config, |var| std::env::var(var).ok())?;
    validate_config(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}

/// Parse a TOML configuration file without validating it.
pub fn read_config_file(path: &Path) -> Result<GatewayConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    Ok(toml::from_str(&content)?)
}

/// Overlay environment variables onto `config`.
///
/// `lookup` returns the value of a variable, if set.
pub fn apply_env_overrides<F>(config: &mut GatewayConfig, lookup: F) -> Result<(), ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(port) = lookup("PORT") {
        config.listener.port = parse_var("PORT", &port)?;
    }
    if let Some(path) = lookup("DATABASE_PATH") {
        config.database.path = path;
    }
    if let Some(url) = lookup("PRIMARY_URL") {
        config.database.sync_url = Some(url);
    }
    if let Some(token) = lookup("AUTH_TOKEN") {
        config.database.auth_token = Some(token);
    }
    if let Some(interval) = lookup("SYNC_INTERVAL") {
        config.database.sync_interval_secs = parse_var("SYNC_INTERVAL", &interval)?;
    }
    if let Some(token) = lookup("PROXY_AUTH_TOKEN") {
        config.auth.token = Some(token);
    }
    if let Some(region) = lookup("FLY_REGION") {
        config.deployment.region = Some(region);
    }
    if let Some(ms) = lookup("STATEMENT_TIMEOUT_MS") {
        config.timeouts.statement_ms = parse_var("STATEMENT_TIMEOUT_MS", &ms)?;
    }
    Ok(())
}

fn parse_var<T>(var: &'static str, raw: &str) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    raw.trim().parse::<T>().map_err(|e| ConfigError::Env {
        var,
        message: format!("{raw:?}: {e}"),
    })
}
