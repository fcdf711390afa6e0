//! Database capability.
//!
//! # Data Flow
//! ```text
//! pipeline dispatcher
//!     → Database::execute(stmt, cancel)   (one call per execute item)
//!     → sqlite.rs (embedded SQLite on the blocking pool)
//!       or scripted.rs (canned results for tests)
//!     → QueryResult | DatabaseError
//! ```
//!
//! # Design Decisions
//! - The handle is constructed once at startup and shared via `Arc<dyn Database>`
//! - Implementations must tolerate concurrent calls from in-flight requests
//! - Cancellation is scoped to one call through its `CancelToken`
//! - Row shape (positional or named) is decided per result, not per row

pub mod cancel;
pub mod scripted;
pub mod sqlite;

use async_trait::async_trait;
use thiserror::Error;

use crate::pipeline::request::Statement;
use crate::pipeline::row::Rows;
use crate::pipeline::value::Value;

pub use cancel::{CancelOnDrop, CancelToken};
pub use scripted::ScriptedDatabase;
pub use sqlite::SqliteDatabase;

/// Executes statements on behalf of the pipeline.
#[async_trait]
pub trait Database: Send + Sync {
    /// Run one statement to completion, including reading all rows.
    ///
    /// Once `cancel` fires, a statement that has not started must not start,
    /// and a running one must stop without leaving its changes behind. Either
    /// way the call returns an error. A statement that already completed
    /// returns its result.
    async fn execute(
        &self,
        stmt: &Statement,
        cancel: &CancelToken,
    ) -> Result<QueryResult, DatabaseError>;
}

/// Native result of a statement.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryResult {
    /// Column names in declaration order. Uniqueness is not enforced.
    pub columns: Vec<String>,
    pub rows: Rows,
    pub rows_affected: u64,
    pub last_insert_rowid: Option<i64>,
}

impl QueryResult {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn positional(columns: &[&str], rows: Vec<Vec<Value>>) -> Self {
        Self {
            columns: columns.iter().map(|c| c.to_string()).collect(),
            rows: Rows::Positional(rows),
            ..Self::default()
        }
    }

    pub fn named(
        columns: &[&str],
        rows: Vec<std::collections::HashMap<String, Value>>,
    ) -> Self {
        Self {
            columns: columns.iter().map(|c| c.to_string()).collect(),
            rows: Rows::Named(rows),
            ..Self::default()
        }
    }

    pub fn with_rows_affected(mut self, count: u64) -> Self {
        self.rows_affected = count;
        self
    }

    pub fn with_last_insert_rowid(mut self, rowid: i64) -> Self {
        self.last_insert_rowid = Some(rowid);
        self
    }
}

/// A failure raised by the database.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct DatabaseError {
    pub message: String,
    /// Native error code, e.g. `SQLITE_CONSTRAINT`.
    pub code: Option<String>,
}

impl DatabaseError {
    pub fn new(message: impl Into<String>, code: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            code: Some(code.into()),
        }
    }

    /// The statement was cancelled before it completed.
    pub fn cancelled() -> Self {
        Self::new("statement cancelled", "SQLITE_INTERRUPT")
    }

    /// An error without a native code.
    pub fn internal(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            code: None,
        }
    }
}
