//! Pipeline gateway library.
//!
//! An HTTP gateway that accepts batched database operations in the JSON
//! pipeline protocol, runs them against an embedded SQLite database and
//! answers with type-preserving wire values.

pub mod config;
pub mod database;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod pipeline;
pub mod security;

pub use config::schema::GatewayConfig;
pub use database::{Database, SqliteDatabase};
pub use http::HttpServer;
pub use lifecycle::Shutdown;
