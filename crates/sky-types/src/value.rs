//! Loosely-typed event payload values.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A single field value in an event payload.
///
/// The service accepts strings, numbers, booleans and nested mappings.
/// Every other JSON shape (arrays, null) is rejected during event
/// decoding rather than silently coerced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    /// Boolean value.
    Bool(bool),
    /// 64-bit signed integer.
    Int(i64),
    /// 64-bit floating point.
    Float(f64),
    /// UTF-8 string.
    String(String),
    /// Nested mapping of field name to value.
    Map(BTreeMap<String, Value>),
}

/// Error converting a JSON value into a [`Value`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unsupported {kind} value")]
pub struct UnsupportedValueError {
    /// JSON type name of the offending value.
    pub kind: &'static str,
}

impl Value {
    /// Decodes a JSON value, rejecting shapes outside the closed sum.
    pub fn from_json(value: &serde_json::Value) -> Result<Self, UnsupportedValueError> {
        match value {
            serde_json::Value::Bool(b) => Ok(Value::Bool(*b)),
            serde_json::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Ok(Value::Int(i))
                } else if let Some(f) = n.as_f64() {
                    Ok(Value::Float(f))
                } else {
                    Err(UnsupportedValueError { kind: "number" })
                }
            }
            serde_json::Value::String(s) => Ok(Value::String(s.clone())),
            serde_json::Value::Object(fields) => {
                let mut map = BTreeMap::new();
                for (name, nested) in fields {
                    map.insert(name.clone(), Value::from_json(nested)?);
                }
                Ok(Value::Map(map))
            }
            serde_json::Value::Null => Err(UnsupportedValueError { kind: "null" }),
            serde_json::Value::Array(_) => Err(UnsupportedValueError { kind: "array" }),
        }
    }
}

impl From<Value> for serde_json::Value {
    fn from(value: Value) -> Self {
        match value {
            Value::Bool(b) => serde_json::Value::Bool(b),
            Value::Int(i) => serde_json::Value::from(i),
            Value::Float(f) => serde_json::Value::from(f),
            Value::String(s) => serde_json::Value::String(s),
            Value::Map(map) => serde_json::Value::Object(
                map.into_iter().map(|(k, v)| (k, v.into())).collect(),
            ),
        }
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Int(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Value::Int(i64::from(value))
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Float(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::String(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::String(value)
    }
}

impl From<BTreeMap<String, Value>> for Value {
    fn from(value: BTreeMap<String, Value>) -> Self {
        Value::Map(value)
    }
}
