//! Pipeline response envelope.

use serde::Serialize;

use crate::pipeline::value::WireValue;

/// Response to a whole batch.
///
/// `baton` and `base_url` exist for protocol compatibility and are always null.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PipelineResponse {
    pub baton: Option<String>,
    pub base_url: Option<String>,
    pub results: Vec<ResultItem>,
}

impl PipelineResponse {
    pub fn new(results: Vec<ResultItem>) -> Self {
        Self {
            baton: None,
            base_url: None,
            results,
        }
    }
}

/// Outcome of one request item.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ResultItem {
    Ok { response: StreamResponse },
    Error { error: ErrorBody },
}

impl ResultItem {
    pub fn ok(response: StreamResponse) -> Self {
        ResultItem::Ok { response }
    }

    pub fn error(message: impl Into<String>, code: impl Into<String>) -> Self {
        ResultItem::Error {
            error: ErrorBody {
                message: message.into(),
                code: code.into(),
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamResponse {
    Execute { result: ExecuteResult },
    Close,
}

/// Result payload of an `execute` item.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExecuteResult {
    pub cols: Vec<Col>,
    pub rows: Vec<Vec<WireValue>>,
    pub affected_row_count: u64,
    pub last_insert_rowid: Option<String>,
    pub replication_index: Option<String>,
    pub rows_read: u64,
    pub rows_written: u64,
    pub query_duration_ms: u64,
}

/// Column metadata. No declared type is surfaced.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Col {
    pub name: String,
    pub decltype: Option<String>,
}

/// `{message, code}` pair used by per-item and top-level errors.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ErrorBody {
    pub message: String,
    pub code: String,
}
