//! Scripted database for tests.
//!
//! Returns queued responses in FIFO order and records every statement it
//! receives, so tests can assert on what the pipeline executed.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use crate::database::{CancelToken, Database, DatabaseError, QueryResult};
use crate::pipeline::request::Statement;

/// A `Database` that replays canned results.
///
/// # Example
/// ```
/// use pipeline_gateway::database::{QueryResult, ScriptedDatabase};
/// use pipeline_gateway::pipeline::value::Value;
///
/// let db = ScriptedDatabase::new()
///     .with_result(QueryResult::positional(&["n"], vec![vec![Value::Integer(1)]]));
/// assert!(db.executed().is_empty());
/// ```
#[derive(Default)]
pub struct ScriptedDatabase {
    responses: Mutex<VecDeque<Result<QueryResult, DatabaseError>>>,
    executed: Mutex<Vec<Statement>>,
    delay: Option<Duration>,
    cancellations: AtomicUsize,
}

impl ScriptedDatabase {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a successful result.
    pub fn with_result(self, result: QueryResult) -> Self {
        self.push(Ok(result));
        self
    }

    /// Queue a failure.
    pub fn with_error(self, error: DatabaseError) -> Self {
        self.push(Err(error));
        self
    }

    /// Sleep this long inside every `execute` call. Cancelling the call
    /// during the sleep abandons it without consuming a queued response.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Statements executed so far, in call order.
    pub fn executed(&self) -> Vec<Statement> {
        self.executed
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Number of calls abandoned through their cancel token.
    pub fn cancelled_count(&self) -> usize {
        self.cancellations.load(Ordering::SeqCst)
    }

    fn push(&self, response: Result<QueryResult, DatabaseError>) {
        self.responses
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push_back(response);
    }
}

#[async_trait]
impl Database for ScriptedDatabase {
    async fn execute(
        &self,
        stmt: &Statement,
        cancel: &CancelToken,
    ) -> Result<QueryResult, DatabaseError> {
        self.executed
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(stmt.clone());

        if let Some(delay) = self.delay {
            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = cancel.cancelled() => {
                    self.cancellations.fetch_add(1, Ordering::SeqCst);
                    return Err(DatabaseError::cancelled());
                }
            }
        }

        self.responses
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .pop_front()
            .unwrap_or_else(|| Ok(QueryResult::empty()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn replays_in_order_then_defaults_to_empty() {
        let db = ScriptedDatabase::new()
            .with_result(QueryResult::empty().with_rows_affected(3))
            .with_error(DatabaseError::new("boom", "SQLITE_ERROR"));

        let cancel = CancelToken::new();
        let first = db.execute(&Statement::new("a"), &cancel).await.unwrap();
        assert_eq!(first.rows_affected, 3);

        let second = db.execute(&Statement::new("b"), &cancel).await.unwrap_err();
        assert_eq!(second.code.as_deref(), Some("SQLITE_ERROR"));

        let third = db.execute(&Statement::new("c"), &cancel).await.unwrap();
        assert_eq!(third, QueryResult::empty());

        let sql: Vec<String> = db.executed().into_iter().map(|s| s.sql).collect();
        assert_eq!(sql, vec!["a", "b", "c"]);
    }

    #[tokio::test]
    async fn cancelled_call_keeps_its_response() {
        let db = ScriptedDatabase::new()
            .with_result(QueryResult::empty().with_rows_affected(7))
            .with_delay(Duration::from_millis(20));

        let cancel = CancelToken::new();
        cancel.cancel();
        let err = db.execute(&Statement::new("slow"), &cancel).await.unwrap_err();
        assert_eq!(err.code.as_deref(), Some("SQLITE_INTERRUPT"));
        assert_eq!(db.cancelled_count(), 1);

        let result = db.execute(&Statement::new("again"), &CancelToken::new()).await.unwrap();
        assert_eq!(result.rows_affected, 7);
    }
}
