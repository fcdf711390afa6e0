//! Row projection onto the declared column list.

use std::collections::HashMap;

use crate::pipeline::value::{encode, Value, WireValue};

/// Rows returned by a statement.
///
/// The shape is fixed once per result: either every row is positional or
/// every row is keyed by column name.
#[derive(Debug, Clone, PartialEq)]
pub enum Rows {
    /// Each row lists its values in column order.
    Positional(Vec<Vec<Value>>),
    /// Each row maps column names to values.
    Named(Vec<HashMap<String, Value>>),
}

impl Rows {
    pub fn len(&self) -> usize {
        match self {
            Rows::Positional(rows) => rows.len(),
            Rows::Named(rows) => rows.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for Rows {
    fn default() -> Self {
        Rows::Positional(Vec::new())
    }
}

/// Project every row onto `columns`, encoding each value.
///
/// Each projected row has exactly `columns.len()` entries. Positional rows
/// are truncated or padded with nulls; named rows resolve missing keys to null.
pub fn project(rows: &Rows, columns: &[String]) -> Vec<Vec<WireValue>> {
    match rows {
        Rows::Positional(rows) => rows
            .iter()
            .map(|row| project_positional(row, columns.len()))
            .collect(),
        Rows::Named(rows) => rows.iter().map(|row| project_named(row, columns)).collect(),
    }
}

fn project_positional(row: &[Value], width: usize) -> Vec<WireValue> {
    let mut out: Vec<WireValue> = row.iter().take(width).map(encode).collect();
    out.resize(width, WireValue::Null);
    out
}

fn project_named(row: &HashMap<String, Value>, columns: &[String]) -> Vec<WireValue> {
    columns
        .iter()
        .map(|name| row.get(name).map_or(WireValue::Null, encode))
        .collect()
}
