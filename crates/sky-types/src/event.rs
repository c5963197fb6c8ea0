//! Event records and their wire representation.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde_json::{Map, Value as JsonValue};
use thiserror::Error;

use crate::timestamp::{TimestampFormatError, format_timestamp, parse_timestamp};
use crate::value::Value;

/// Errors from decoding a wire event.
#[derive(Debug, Error)]
pub enum MalformedEventError {
    /// The `timestamp` field is absent or not a string.
    #[error("missing or non-string timestamp field")]
    MissingTimestamp,

    /// The `timestamp` field does not parse as a wire timestamp.
    #[error(transparent)]
    Timestamp(#[from] TimestampFormatError),

    /// The `data` field is present but not a mapping.
    #[error("data field is not a mapping")]
    DataNotMap,

    /// A `data` value has a shape the service does not accept.
    #[error("field {field:?}: unsupported {kind} value")]
    UnsupportedValue {
        /// Name of the offending payload field.
        field: String,
        /// JSON type name of the offending value.
        kind: &'static str,
    },
}

/// A state or action recorded for an object at a point in time.
///
/// `data` is a plain map, never an option: an empty payload serializes as
/// `{}` on the wire, never as a missing or null field.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Event {
    /// When the event occurred. Microsecond precision on the wire.
    pub timestamp: DateTime<Utc>,
    /// Field values keyed by property name.
    pub data: BTreeMap<String, Value>,
}

impl Event {
    /// Creates an event with the given timestamp and payload.
    pub fn new(timestamp: DateTime<Utc>, data: BTreeMap<String, Value>) -> Self {
        Self { timestamp, data }
    }

    /// Creates an event with an empty payload.
    pub fn at(timestamp: DateTime<Utc>) -> Self {
        Self {
            timestamp,
            data: BTreeMap::new(),
        }
    }

    /// Encodes the event into its wire map:
    /// `{"timestamp": <string>, "data": {…}}`.
    pub fn to_wire(&self) -> Map<String, JsonValue> {
        let data = self
            .data
            .iter()
            .map(|(name, value)| (name.clone(), JsonValue::from(value.clone())))
            .collect();

        let mut obj = Map::new();
        obj.insert(
            "timestamp".to_string(),
            JsonValue::String(format_timestamp(&self.timestamp)),
        );
        obj.insert("data".to_string(), JsonValue::Object(data));
        obj
    }

    /// Decodes an event from its wire map.
    ///
    /// An absent or null `data` field decodes as an empty payload; a
    /// present `data` of any non-mapping shape is an error.
    pub fn from_wire(obj: &Map<String, JsonValue>) -> Result<Self, MalformedEventError> {
        let timestamp = match obj.get("timestamp") {
            Some(JsonValue::String(s)) => parse_timestamp(s)?,
            _ => return Err(MalformedEventError::MissingTimestamp),
        };

        let data = match obj.get("data") {
            None | Some(JsonValue::Null) => BTreeMap::new(),
            Some(JsonValue::Object(fields)) => {
                let mut data = BTreeMap::new();
                for (name, value) in fields {
                    let value = Value::from_json(value).map_err(|err| {
                        MalformedEventError::UnsupportedValue {
                            field: name.clone(),
                            kind: err.kind,
                        }
                    })?;
                    data.insert(name.clone(), value);
                }
                data
            }
            Some(_) => return Err(MalformedEventError::DataNotMap),
        };

        Ok(Self { timestamp, data })
    }
}
