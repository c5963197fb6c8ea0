//! Table property definitions.

use serde::{Deserialize, Serialize};

/// Data type of a table property.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataType {
    /// Variable-length string.
    String,
    /// 64-bit signed integer.
    Integer,
    /// 64-bit floating point.
    Float,
    /// Boolean.
    Boolean,
    /// Enumerated string, interned server-side.
    Factor,
}

/// A field definition on a Sky table.
///
/// Permanent properties describe persistent object state; transient
/// properties describe momentary actions that do not carry forward.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Property {
    /// Property name.
    pub name: String,
    /// Whether the property is transient.
    #[serde(default)]
    pub transient: bool,
    /// Declared data type.
    pub data_type: DataType,
}

impl Property {
    /// Creates a property definition.
    pub fn new(name: impl Into<String>, transient: bool, data_type: DataType) -> Self {
        Self {
            name: name.into(),
            transient,
            data_type,
        }
    }
}
