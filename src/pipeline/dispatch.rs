//! Per-item request dispatch.
//!
//! # Responsibilities
//! - Run `execute` items against the database under a deadline
//! - Answer `close` items without touching the database
//! - Apply the configured policy to unknown items
//!
//! # Design Decisions
//! - Database failures are returned, never converted to per-item errors:
//!   one failing item aborts the whole batch
//! - A deadline expiry cancels only that statement, then waits for the
//!   database to confirm it stopped; a statement that finished anyway is
//!   reported as the success it was

use std::time::{Duration, Instant};

use crate::config::UnknownRequestPolicy;
use crate::database::{CancelToken, Database, QueryResult};
use crate::observability::metrics;
use crate::pipeline::request::{RequestItem, Statement};
use crate::pipeline::response::{Col, ExecuteResult, ResultItem, StreamResponse};
use crate::pipeline::row::project;
use crate::pipeline::{PipelineError, PipelineOptions};

/// Error code attached to unknown items under [`UnknownRequestPolicy::Error`].
pub const UNSUPPORTED_REQUEST: &str = "UNSUPPORTED_REQUEST";

/// Dispatch one item. `Ok(None)` means the item produced no result.
pub async fn dispatch(
    db: &dyn Database,
    item: RequestItem,
    options: &PipelineOptions,
) -> Result<Option<ResultItem>, PipelineError> {
    metrics::record_pipeline_item(item.kind());

    match item {
        RequestItem::Execute { stmt } => {
            let result = execute(db, &stmt, options.statement_timeout).await?;
            Ok(Some(ResultItem::ok(StreamResponse::Execute {
                result: execute_result(result, stmt.want_rows),
            })))
        }
        RequestItem::Close => Ok(Some(ResultItem::ok(StreamResponse::Close))),
        RequestItem::Unknown => match options.unknown_requests {
            UnknownRequestPolicy::Skip => {
                tracing::warn!("Skipping pipeline item with unsupported type");
                Ok(None)
            }
            UnknownRequestPolicy::Error => Ok(Some(ResultItem::error(
                "unsupported request type",
                UNSUPPORTED_REQUEST,
            ))),
        },
    }
}

async fn execute(
    db: &dyn Database,
    stmt: &Statement,
    deadline: Duration,
) -> Result<QueryResult, PipelineError> {
    let start = Instant::now();
    tracing::debug!(sql = %stmt.sql, args = stmt.args.len(), "Executing statement");

    let cancel = CancelToken::new();
    // A dropped request abandons its statement too.
    let _abandon = cancel.cancel_on_drop();
    let mut call = db.execute(stmt, &cancel);

    let outcome = match tokio::time::timeout(deadline, &mut call).await {
        Ok(outcome) => outcome,
        Err(_) => {
            cancel.cancel();
            match call.await {
                Ok(result) => {
                    tracing::warn!(
                        deadline_ms = (deadline.as_millis() as u64),
                        "Statement completed after its deadline"
                    );
                    Ok(result)
                }
                Err(e) => {
                    metrics::record_statement("timeout", start);
                    tracing::warn!(error = %e, "Statement cancelled at its deadline");
                    return Err(PipelineError::timeout(deadline));
                }
            }
        }
    };

    match outcome {
        Ok(result) => {
            metrics::record_statement("ok", start);
            Ok(result)
        }
        Err(e) => {
            metrics::record_statement("error", start);
            Err(e.into())
        }
    }
}

/// Build the `execute` payload from a native result.
pub fn execute_result(result: QueryResult, want_rows: bool) -> ExecuteResult {
    let rows_read = result.rows.len() as u64;
    let rows = if want_rows {
        project(&result.rows, &result.columns)
    } else {
        Vec::new()
    };

    ExecuteResult {
        cols: result
            .columns
            .into_iter()
            .map(|name| Col {
                name,
                decltype: None,
            })
            .collect(),
        rows,
        affected_row_count: result.rows_affected,
        last_insert_rowid: result.last_insert_rowid.map(|id| id.to_string()),
        replication_index: None,
        rows_read,
        rows_written: result.rows_affected,
        query_duration_ms: 0,
    }
}
