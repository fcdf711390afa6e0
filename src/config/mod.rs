//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML, optional)
//!     → loader.rs (parse, overlay environment variables)
//!     → validation.rs (semantic checks)
//!     → GatewayConfig (validated, immutable)
//!
//! On file change:
//!     watcher.rs detects change
//!     → loader.rs loads new config
//!     → validation.rs validates
//!     → HttpServer swaps its runtime settings
//! ```
//!
//! # Design Decisions
//! - All fields have defaults so the gateway runs from environment alone
//! - Environment variables win over the file
//! - Only request-time settings (auth, deadlines, protocol policy, region)
//!   reload live; listener and database changes need a restart

pub mod loader;
pub mod schema;
pub mod validation;
pub mod watcher;

pub use loader::{load_config, ConfigError};
pub use schema::{
    AuthConfig, DatabaseConfig, DeploymentConfig, GatewayConfig, ListenerConfig, LogFormat,
    ObservabilityConfig, ProtocolConfig, SecurityConfig, TimeoutConfig, UnknownRequestPolicy,
};
pub use watcher::ConfigWatcher;
