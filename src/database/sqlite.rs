//! Embedded SQLite backend.
//!
//! # Responsibilities
//! - Open the database file (or an in-memory database)
//! - Bind positional and named arguments
//! - Run statements on Tokio's blocking pool
//! - Stop a statement when its own cancel token fires
//! - Map SQLite failures to `DatabaseError` with the primary result code name

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use rusqlite::types::{ToSql, ToSqlOutput, Value as SqlValue, ValueRef};
use rusqlite::Connection;
use tokio::sync::Mutex;

use crate::config::DatabaseConfig;
use crate::database::{CancelToken, Database, DatabaseError, QueryResult};
use crate::pipeline::request::Statement;
use crate::pipeline::row::Rows;
use crate::pipeline::value::Value;

const IN_MEMORY_PATH: &str = ":memory:";

/// VM instructions between cancellation checks.
const CANCEL_CHECK_OPS: i32 = 1000;

/// A single SQLite connection shared by all requests.
///
/// Statements are serialized through the connection mutex. A call waiting for
/// the mutex gives up as soon as its token is cancelled, and a running
/// statement is stopped by a progress handler bound to the running call's
/// token only.
pub struct SqliteDatabase {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteDatabase {
    /// Open the database described by `config`.
    pub fn open(config: &DatabaseConfig) -> Result<Self, DatabaseError> {
        let conn = if config.path == IN_MEMORY_PATH {
            Connection::open_in_memory()?
        } else {
            Connection::open(Path::new(&config.path))?
        };
        conn.busy_timeout(Duration::from_millis(config.busy_timeout_ms))?;

        tracing::info!(path = %config.path, "SQLite database opened");
        Ok(Self::from_connection(conn))
    }

    /// Open a private in-memory database.
    pub fn open_in_memory() -> Result<Self, DatabaseError> {
        Ok(Self::from_connection(Connection::open_in_memory()?))
    }

    fn from_connection(conn: Connection) -> Self {
        Self {
            conn: Arc::new(Mutex::new(conn)),
        }
    }
}

#[async_trait]
impl Database for SqliteDatabase {
    async fn execute(
        &self,
        stmt: &Statement,
        cancel: &CancelToken,
    ) -> Result<QueryResult, DatabaseError> {
        let conn = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(DatabaseError::cancelled()),
            conn = Arc::clone(&self.conn).lock_owned() => conn,
        };
        let stmt = stmt.clone();
        let cancel = cancel.clone();

        tokio::task::spawn_blocking(move || {
            if cancel.is_cancelled() {
                return Err(DatabaseError::cancelled());
            }

            let token = cancel.clone();
            conn.progress_handler(CANCEL_CHECK_OPS, Some(move || token.is_cancelled()));
            let result = run_statement(&conn, &stmt);
            conn.progress_handler(CANCEL_CHECK_OPS, None::<fn() -> bool>);

            if result.is_err() && cancel.is_cancelled() {
                tracing::warn!("SQLite statement stopped by cancellation");
            }
            result
        })
        .await
        .map_err(|e| DatabaseError::internal(format!("statement task failed: {e}")))?
    }
}

fn run_statement(conn: &Connection, stmt: &Statement) -> Result<QueryResult, DatabaseError> {
    let mut prepared = conn.prepare(&stmt.sql)?;
    bind_arguments(&mut prepared, stmt)?;

    let columns: Vec<String> = prepared
        .column_names()
        .into_iter()
        .map(String::from)
        .collect();
    let changes_before = total_changes(conn)?;

    let mut rows = Vec::new();
    if columns.is_empty() {
        prepared.raw_execute()?;
    } else {
        let mut cursor = prepared.raw_query();
        while let Some(row) = cursor.next()? {
            let mut values = Vec::with_capacity(columns.len());
            for idx in 0..columns.len() {
                values.push(Value::from(row.get_ref(idx)?));
            }
            rows.push(values);
        }
    }

    let changed = total_changes(conn)? > changes_before;
    let (rows_affected, last_insert_rowid) = if changed {
        let rowid = conn.last_insert_rowid();
        (conn.changes() as u64, (rowid != 0).then_some(rowid))
    } else {
        (0, None)
    };

    Ok(QueryResult {
        columns,
        rows: Rows::Positional(rows),
        rows_affected,
        last_insert_rowid,
    })
}

fn total_changes(conn: &Connection) -> Result<i64, DatabaseError> {
    Ok(conn.query_row("SELECT total_changes()", [], |row| row.get(0))?)
}

fn bind_arguments(
    prepared: &mut rusqlite::Statement<'_>,
    stmt: &Statement,
) -> Result<(), DatabaseError> {
    let expected = prepared.parameter_count();
    if stmt.args.len() > expected {
        return Err(DatabaseError::new(
            format!(
                "statement takes {expected} positional argument(s) but {} were given",
                stmt.args.len()
            ),
            "SQLITE_RANGE",
        ));
    }
    for (idx, value) in stmt.args.iter().enumerate() {
        prepared.raw_bind_parameter(idx + 1, value)?;
    }

    for arg in &stmt.named_args {
        let idx = named_parameter_index(prepared, &arg.name)?.ok_or_else(|| {
            DatabaseError::new(
                format!("unknown named parameter {:?}", arg.name),
                "SQLITE_RANGE",
            )
        })?;
        prepared.raw_bind_parameter(idx, &arg.value)?;
    }
    Ok(())
}

/// Names may be given with or without their `:`, `@` or `$` prefix.
fn named_parameter_index(
    prepared: &rusqlite::Statement<'_>,
    name: &str,
) -> Result<Option<usize>, DatabaseError> {
    if name.starts_with([':', '@', '$']) {
        return Ok(prepared.parameter_index(name)?);
    }
    for prefix in [':', '@', '$'] {
        if let Some(idx) = prepared.parameter_index(&format!("{prefix}{name}"))? {
            return Ok(Some(idx));
        }
    }
    Ok(None)
}

impl ToSql for Value {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(match self {
            Value::Null => ToSqlOutput::Owned(SqlValue::Null),
            Value::Integer(i) => ToSqlOutput::Owned(SqlValue::Integer(*i)),
            Value::Real(f) => ToSqlOutput::Owned(SqlValue::Real(*f)),
            Value::Text(s) => ToSqlOutput::Borrowed(ValueRef::Text(s.as_bytes())),
            Value::Blob(b) => ToSqlOutput::Borrowed(ValueRef::Blob(b)),
        })
    }
}

impl From<ValueRef<'_>> for Value {
    fn from(value: ValueRef<'_>) -> Self {
        match value {
            ValueRef::Null => Value::Null,
            ValueRef::Integer(i) => Value::Integer(i),
            ValueRef::Real(f) => Value::Real(f),
            ValueRef::Text(t) => Value::Text(String::from_utf8_lossy(t).into_owned()),
            ValueRef::Blob(b) => Value::Blob(b.to_vec()),
        }
    }
}

impl From<rusqlite::Error> for DatabaseError {
    fn from(err: rusqlite::Error) -> Self {
        let code = match &err {
            rusqlite::Error::SqliteFailure(failure, _) => primary_code_name(failure.extended_code),
            _ => None,
        };
        DatabaseError {
            message: err.to_string(),
            code: code.map(String::from),
        }
    }
}

fn primary_code_name(extended_code: std::os::raw::c_int) -> Option<&'static str> {
    let name = match extended_code & 0xff {
        1 => "SQLITE_ERROR",
        2 => "SQLITE_INTERNAL",
        3 => "SQLITE_PERM",
        4 => "SQLITE_ABORT",
        5 => "SQLITE_BUSY",
        6 => "SQLITE_LOCKED",
        7 => "SQLITE_NOMEM",
        8 => "SQLITE_READONLY",
        9 => "SQLITE_INTERRUPT",
        10 => "SQLITE_IOERR",
        11 => "SQLITE_CORRUPT",
        12 => "SQLITE_NOTFOUND",
        13 => "SQLITE_FULL",
        14 => "SQLITE_CANTOPEN",
        15 => "SQLITE_PROTOCOL",
        16 => "SQLITE_EMPTY",
        17 => "SQLITE_SCHEMA",
        18 => "SQLITE_TOOBIG",
        19 => "SQLITE_CONSTRAINT",
        20 => "SQLITE_MISMATCH",
        21 => "SQLITE_MISUSE",
        22 => "SQLITE_NOLFS",
        23 => "SQLITE_AUTH",
        24 => "SQLITE_FORMAT",
        25 => "SQLITE_RANGE",
        26 => "SQLITE_NOTADB",
        _ => return None,
    };
    Some(name)
}
