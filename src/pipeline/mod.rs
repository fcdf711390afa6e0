//! Pipeline protocol translator.
//!
//! # Data Flow
//! ```text
//! PipelineRequest (request.rs)
//!     → handle() iterates items strictly in order
//!     → dispatch.rs (execute / close / unknown)
//!         → Database::execute
//!         → row.rs (project rows onto columns)
//!         → value.rs (tagged wire values)
//!     → PipelineResponse (response.rs)
//! ```
//!
//! # Design Decisions
//! - Items never run concurrently; later items may depend on earlier side effects
//! - All-or-nothing: the outcome is either every result or a single error
//! - Integers are carried as decimal strings end to end

pub mod dispatch;
pub mod request;
pub mod response;
pub mod row;
pub mod value;

use std::time::Duration;

use thiserror::Error;

use crate::config::UnknownRequestPolicy;
use crate::database::{Database, DatabaseError};

pub use request::{PipelineRequest, RequestItem, Statement};
pub use response::{PipelineResponse, ResultItem};

/// Code used when the database reports no native error code.
pub const INTERNAL_ERROR: &str = "INTERNAL_ERROR";
/// Code used when a statement exceeds its deadline.
pub const TIMEOUT: &str = "TIMEOUT";

/// Tunables applied while running a batch.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineOptions {
    /// Deadline for each `execute` call.
    pub statement_timeout: Duration,
    pub unknown_requests: UnknownRequestPolicy,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            statement_timeout: Duration::from_secs(10),
            unknown_requests: UnknownRequestPolicy::Skip,
        }
    }
}

/// The failure that aborted a batch.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{code}: {message}")]
pub struct PipelineError {
    pub message: String,
    pub code: String,
}

impl PipelineError {
    /// A failure with no more specific code.
    pub fn internal(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            code: INTERNAL_ERROR.to_string(),
        }
    }

    pub fn timeout(deadline: Duration) -> Self {
        Self {
            message: format!("statement exceeded its {}ms deadline", deadline.as_millis()),
            code: TIMEOUT.to_string(),
        }
    }
}

impl From<DatabaseError> for PipelineError {
    fn from(err: DatabaseError) -> Self {
        Self {
            message: err.message,
            code: err.code.unwrap_or_else(|| INTERNAL_ERROR.to_string()),
        }
    }
}

/// Run every item of `request` in order and assemble the envelope.
///
/// The first failing item abandons the batch; results gathered so far are discarded.
pub async fn handle(
    db: &dyn Database,
    request: PipelineRequest,
    options: &PipelineOptions,
) -> Result<PipelineResponse, PipelineError> {
    let total = request.requests.len();
    let mut results = Vec::with_capacity(total);

    for (index, item) in request.requests.into_iter().enumerate() {
        match dispatch::dispatch(db, item, options).await {
            Ok(Some(result)) => results.push(result),
            Ok(None) => {}
            Err(e) => {
                tracing::error!(
                    index,
                    total,
                    code = %e.code,
                    error = %e.message,
                    "Pipeline error"
                );
                return Err(e);
            }
        }
    }

    tracing::debug!(items = total, results = results.len(), "Pipeline completed");
    Ok(PipelineResponse::new(results))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::{QueryResult, ScriptedDatabase, SqliteDatabase};
    use crate::pipeline::response::StreamResponse;
    use crate::pipeline::value::Value;

    fn execute(sql: &str) -> RequestItem {
        RequestItem::Execute {
            stmt: Statement::new(sql),
        }
    }

    fn batch(items: Vec<RequestItem>) -> PipelineRequest {
        PipelineRequest {
            baton: None,
            requests: items,
        }
    }

    #[tokio::test]
    async fn results_align_with_requests() {
        let db = ScriptedDatabase::new()
            .with_result(QueryResult::empty().with_rows_affected(1))
            .with_result(QueryResult::positional(&["n"], vec![vec![Value::Integer(1)]]));

        let response = handle(
            &db,
            batch(vec![execute("INSERT"), execute("SELECT"), RequestItem::Close]),
            &PipelineOptions::default(),
        )
        .await
        .unwrap();

        assert_eq!(response.baton, None);
        assert_eq!(response.base_url, None);
        assert_eq!(response.results.len(), 3);
        assert_eq!(response.results[2], ResultItem::ok(StreamResponse::Close));

        let sql: Vec<String> = db.executed().into_iter().map(|s| s.sql).collect();
        assert_eq!(sql, vec!["INSERT", "SELECT"]);
    }

    #[tokio::test]
    async fn failure_aborts_remaining_items() {
        let db = ScriptedDatabase::new()
            .with_result(QueryResult::empty())
            .with_error(DatabaseError::new("no such table: t", "SQLITE_ERROR"));

        let err = handle(
            &db,
            batch(vec![execute("ok"), execute("bad"), execute("never")]),
            &PipelineOptions::default(),
        )
        .await
        .unwrap_err();

        assert_eq!(err.code, "SQLITE_ERROR");
        assert_eq!(err.message, "no such table: t");
        assert_eq!(db.executed().len(), 2);
    }

    #[tokio::test]
    async fn skipped_items_shift_result_indices() {
        let db = ScriptedDatabase::new();
        let response = handle(
            &db,
            batch(vec![RequestItem::Unknown, RequestItem::Close]),
            &PipelineOptions::default(),
        )
        .await
        .unwrap();

        assert_eq!(response.results, vec![ResultItem::ok(StreamResponse::Close)]);
    }

    #[tokio::test]
    async fn later_items_see_earlier_writes() {
        let db = SqliteDatabase::open_in_memory().unwrap();
        let response = handle(
            &db,
            batch(vec![
                execute("CREATE TABLE kv (k TEXT PRIMARY KEY, v INTEGER)"),
                execute("INSERT INTO kv VALUES ('a', 9223372036854775807)"),
                execute("SELECT v FROM kv WHERE k = 'a'"),
                RequestItem::Close,
            ]),
            &PipelineOptions::default(),
        )
        .await
        .unwrap();

        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["results"][1]["response"]["result"]["affected_row_count"], 1);
        assert_eq!(
            json["results"][2]["response"]["result"]["rows"][0][0]["value"],
            "9223372036854775807"
        );
        assert_eq!(json["results"][3]["response"]["type"], "close");
    }

    #[tokio::test]
    async fn empty_batch_is_ok() {
        let db = ScriptedDatabase::new();
        let response = handle(&db, batch(Vec::new()), &PipelineOptions::default())
            .await
            .unwrap();
        assert!(response.results.is_empty());
    }
}
