//! Value types for the row stream.
//!
//! [`RawValue`] is what the database boundary produces: one tagged variant
//! per wire representation, built once per fetched cell. [`Value`] is what
//! the rest of the pipeline sees after normalization: one variant per
//! [`StorageKind`](super::types::StorageKind).

use std::collections::HashMap;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use uuid::Uuid;

use super::types::StorageKind;

/// A cell as decoded from the database, before normalization.
#[derive(Debug, Clone, PartialEq)]
pub enum RawValue {
    /// SQL NULL.
    Null,

    /// Boolean value.
    Bool(bool),

    /// Any integer width, widened to 64 bits.
    Int(i64),

    /// Floating point or numeric, as double precision.
    Float(f64),

    /// Text data (also every column the source casts to text).
    Text(String),

    /// UUID value.
    Uuid(Uuid),

    /// Date without time component.
    Date(NaiveDate),

    /// Timestamp without time zone.
    Timestamp(NaiveDateTime),

    /// Timestamp with time zone, converted to UTC by the driver.
    TimestampTz(DateTime<Utc>),
}

impl RawValue {
    /// Short name of the representation, used in conversion warnings.
    pub fn kind(&self) -> &'static str {
        match self {
            RawValue::Null => "null",
            RawValue::Bool(_) => "bool",
            RawValue::Int(_) => "int",
            RawValue::Float(_) => "float",
            RawValue::Text(_) => "text",
            RawValue::Uuid(_) => "uuid",
            RawValue::Date(_) => "date",
            RawValue::Timestamp(_) => "timestamp",
            RawValue::TimestampTz(_) => "timestamptz",
        }
    }

    /// Check if this value is NULL.
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, RawValue::Null)
    }
}

/// A normalized cell, ready to append to a column array.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Int(i64),
    Float(f64),
    Bool(bool),
    Text(String),
}

impl Value {
    /// Storage kind this value belongs to.
    pub fn storage(&self) -> StorageKind {
        match self {
            Value::Int(_) => StorageKind::Int64,
            Value::Float(_) => StorageKind::Float64,
            Value::Bool(_) => StorageKind::Bool,
            Value::Text(_) => StorageKind::Text,
        }
    }
}

impl From<Value> for RawValue {
    fn from(v: Value) -> Self {
        match v {
            Value::Int(i) => RawValue::Int(i),
            Value::Float(f) => RawValue::Float(f),
            Value::Bool(b) => RawValue::Bool(b),
            Value::Text(s) => RawValue::Text(s),
        }
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

/// One table row, keyed by field name.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Row {
    values: HashMap<String, Value>,
}

impl Row {
    /// Create an empty row with room for `fields` values.
    pub fn with_capacity(fields: usize) -> Self {
        Self {
            values: HashMap::with_capacity(fields),
        }
    }

    /// Set the value of a field, replacing any previous value.
    pub fn insert(&mut self, field: impl Into<String>, value: Value) {
        self.values.insert(field.into(), value);
    }

    /// Value of a field, if present.
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.values.get(field)
    }

    /// Remove and return the value of a field.
    pub fn take(&mut self, field: &str) -> Option<Value> {
        self.values.remove(field)
    }

    /// Number of fields present.
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Check if the row has no fields.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Iterate over field names.
    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }
}

impl<K: Into<String>> FromIterator<(K, Value)> for Row {
    fn from_iter<I: IntoIterator<Item = (K, Value)>>(iter: I) -> Self {
        Self {
            values: iter.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }
}
