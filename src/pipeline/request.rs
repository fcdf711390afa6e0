//! Pipeline request types.
//!
//! Items are decoded leniently: anything whose `type` is not the string
//! `"execute"` or `"close"` becomes [`RequestItem::Unknown`]. Structural
//! problems (no `requests` array, an `execute` without a usable `stmt`)
//! fail the whole batch before any item runs.

use serde::Deserialize;
use serde_json::Value as Json;

use crate::pipeline::value::Value;
use crate::pipeline::PipelineError;

/// An ordered batch of request items submitted in one HTTP exchange.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineRequest {
    /// Session continuation token. Accepted for compatibility and ignored.
    pub baton: Option<String>,
    pub requests: Vec<RequestItem>,
}

impl PipelineRequest {
    /// Decode a parsed request body.
    pub fn from_json(body: Json) -> Result<Self, PipelineError> {
        let Json::Object(mut body) = body else {
            return Err(PipelineError::internal("pipeline request must be a JSON object"));
        };
        let baton = match body.remove("baton") {
            Some(Json::String(baton)) => Some(baton),
            _ => None,
        };
        let items = match body.remove("requests") {
            Some(Json::Array(items)) => items,
            Some(_) => return Err(PipelineError::internal("`requests` must be an array")),
            None => return Err(PipelineError::internal("missing `requests`")),
        };

        let requests = items
            .into_iter()
            .enumerate()
            .map(|(index, item)| {
                RequestItem::from_json(item).map_err(|e| PipelineError {
                    message: format!("request {index}: {}", e.message),
                    ..e
                })
            })
            .collect::<Result<_, _>>()?;
        Ok(Self { baton, requests })
    }
}

/// One item of a pipeline batch.
#[derive(Debug, Clone, PartialEq)]
pub enum RequestItem {
    /// Run a statement against the database.
    Execute { stmt: Statement },
    /// Close the stream. No database interaction.
    Close,
    /// Any item without a `type` this gateway implements.
    Unknown,
}

impl RequestItem {
    pub fn from_json(mut item: Json) -> Result<Self, PipelineError> {
        match item.get("type").and_then(Json::as_str) {
            Some("execute") => {
                let stmt = item
                    .get_mut("stmt")
                    .map(Json::take)
                    .filter(|stmt| !stmt.is_null())
                    .ok_or_else(|| PipelineError::internal("execute request is missing `stmt`"))?;
                let stmt = Statement::deserialize(stmt)
                    .map_err(|e| PipelineError::internal(format!("invalid `stmt`: {e}")))?;
                Ok(RequestItem::Execute { stmt })
            }
            Some("close") => Ok(RequestItem::Close),
            _ => Ok(RequestItem::Unknown),
        }
    }

    /// Label used for logging and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            RequestItem::Execute { .. } => "execute",
            RequestItem::Close => "close",
            RequestItem::Unknown => "unknown",
        }
    }
}

/// SQL text plus bound arguments, passed to the database unmodified.
///
/// Deserializes from either a bare SQL string or an object
/// `{sql, args?, named_args?, want_rows?}`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(from = "StatementRepr")]
pub struct Statement {
    pub sql: String,
    pub args: Vec<Value>,
    pub named_args: Vec<NamedArg>,
    /// When false the rows are dropped from the response.
    pub want_rows: bool,
}

impl Statement {
    pub fn new(sql: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            args: Vec::new(),
            named_args: Vec::new(),
            want_rows: true,
        }
    }

    pub fn with_args(mut self, args: impl IntoIterator<Item = Value>) -> Self {
        self.args.extend(args);
        self
    }

    pub fn with_named_arg(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.named_args.push(NamedArg {
            name: name.into(),
            value: value.into(),
        });
        self
    }
}

/// A named statement argument.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct NamedArg {
    pub name: String,
    pub value: Value,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum StatementRepr {
    Sql(String),
    Full {
        sql: String,
        #[serde(default)]
        args: Vec<Value>,
        #[serde(default)]
        named_args: Vec<NamedArg>,
        #[serde(default)]
        want_rows: Option<bool>,
    },
}

impl From<StatementRepr> for Statement {
    fn from(repr: StatementRepr) -> Self {
        match repr {
            StatementRepr::Sql(sql) => Statement::new(sql),
            StatementRepr::Full {
                sql,
                args,
                named_args,
                want_rows,
            } => Statement {
                sql,
                args,
                named_args,
                want_rows: want_rows.unwrap_or(true),
            },
        }
    }
}
