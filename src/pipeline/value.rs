//! Native scalar values and their tagged wire encoding.
//!
//! # Responsibilities
//! - Represent values read from (and bound into) the database
//! - Encode each value into the protocol's tagged form
//! - Accept statement arguments in tagged or bare JSON form
//!
//! # Design Decisions
//! - Integers travel as decimal strings so 64-bit values survive JSON clients
//!   that parse numbers as doubles
//! - A real with an integral value encodes as `integer`
//! - Encoding is total: every native value maps to one of the four wire variants

use serde::de::{self, Deserializer};
use serde::ser::{SerializeMap, Serializer};
use serde::{Deserialize, Serialize};

/// A native scalar as stored in, or bound into, the database.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
    Blob(Vec<u8>),
}

/// A scalar in the protocol's tagged wire form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WireValue {
    /// `{"type":"null","value":null}`
    Null,
    /// `{"type":"integer","value":"<decimal>"}`
    Integer(String),
    /// `{"type":"float","value":"<decimal>"}`
    Float(String),
    /// `{"type":"text","value":"<string>"}`
    Text(String),
}

impl WireValue {
    /// The wire `type` tag.
    pub fn type_name(&self) -> &'static str {
        match self {
            WireValue::Null => "null",
            WireValue::Integer(_) => "integer",
            WireValue::Float(_) => "float",
            WireValue::Text(_) => "text",
        }
    }
}

impl Serialize for WireValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(2))?;
        map.serialize_entry("type", self.type_name())?;
        match self {
            WireValue::Null => map.serialize_entry("value", &())?,
            WireValue::Integer(v) | WireValue::Float(v) | WireValue::Text(v) => {
                map.serialize_entry("value", v)?
            }
        }
        map.end()
    }
}

/// Encode a native value into its wire representation.
pub fn encode(value: &Value) -> WireValue {
    match value {
        Value::Null => WireValue::Null,
        Value::Integer(i) => WireValue::Integer(i.to_string()),
        Value::Real(f) => encode_real(*f),
        Value::Text(s) => WireValue::Text(s.clone()),
        Value::Blob(bytes) => WireValue::Text(String::from_utf8_lossy(bytes).into_owned()),
    }
}

fn encode_real(f: f64) -> WireValue {
    if f.is_nan() {
        return WireValue::Float("NaN".to_string());
    }
    if f.is_infinite() {
        let text = if f > 0.0 { "Infinity" } else { "-Infinity" };
        return WireValue::Float(text.to_string());
    }
    if f.fract() == 0.0 {
        // -0.0 prints as "-0"
        if f == 0.0 {
            return WireValue::Integer("0".to_string());
        }
        // f64 Display never switches to exponent notation.
        return WireValue::Integer(format!("{f}"));
    }
    WireValue::Float(format!("{f}"))
}

impl From<&Value> for WireValue {
    fn from(value: &Value) -> Self {
        encode(value)
    }
}

impl<'de> Deserialize<'de> for Value {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = serde_json::Value::deserialize(deserializer)?;
        Value::from_json(raw).map_err(de::Error::custom)
    }
}

impl Value {
    /// Interpret a statement argument given either as a tagged wire value
    /// or as a bare JSON scalar.
    pub fn from_json(raw: serde_json::Value) -> Result<Self, String> {
        use serde_json::Value as Json;

        match raw {
            Json::Null => Ok(Value::Null),
            Json::Bool(b) => Ok(Value::Integer(i64::from(b))),
            Json::Number(n) => number_to_value(&n),
            Json::String(s) => Ok(Value::Text(s)),
            Json::Array(_) => Err("array arguments are not supported".to_string()),
            Json::Object(mut fields) => {
                let tag = match fields.remove("type") {
                    Some(Json::String(tag)) => tag,
                    _ => return Err("tagged argument is missing a string `type`".to_string()),
                };
                let value = fields.remove("value").unwrap_or(Json::Null);
                match (tag.as_str(), value) {
                    ("null", _) => Ok(Value::Null),
                    ("integer", Json::String(s)) => s
                        .parse::<i64>()
                        .map(Value::Integer)
                        .map_err(|e| format!("invalid integer argument {s:?}: {e}")),
                    ("integer", Json::Number(n)) => n
                        .as_i64()
                        .map(Value::Integer)
                        .ok_or_else(|| format!("integer argument {n} is out of range")),
                    ("float", Json::String(s)) => s
                        .parse::<f64>()
                        .map(Value::Real)
                        .map_err(|e| format!("invalid float argument {s:?}: {e}")),
                    ("float", Json::Number(n)) => n
                        .as_f64()
                        .map(Value::Real)
                        .ok_or_else(|| format!("float argument {n} is not representable")),
                    ("text", Json::String(s)) => Ok(Value::Text(s)),
                    ("blob", _) => Err("blob arguments are not supported".to_string()),
                    (tag, value) => Err(format!("invalid `{tag}` argument value: {value}")),
                }
            }
        }
    }
}

fn number_to_value(n: &serde_json::Number) -> Result<Value, String> {
    if let Some(i) = n.as_i64() {
        return Ok(Value::Integer(i));
    }
    n.as_f64()
        .map(Value::Real)
        .ok_or_else(|| format!("numeric argument {n} is not representable"))
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Integer(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Real(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Value::Null, Into::into)
    }
}
