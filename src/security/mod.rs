//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming request:
//!     → body size limit (413 when exceeded)
//!     → auth.rs (bearer token check on /v2/pipeline)
//!     → Pass to pipeline handler
//! ```
//!
//! # Design Decisions
//! - Fail closed: reject on any authentication failure
//! - `/health` and `/version` stay public

pub mod auth;

pub use auth::{authorize, bearer_auth_middleware, AuthError};
