//! Row-to-column transposition.
//!
//! [`ColumnTransposer`] consumes normalized rows and appends each field's
//! value to a dense per-column array. Arrays grow as rows arrive; the row
//! count is never assumed up front.

use crate::core::{CanonicalType, RawValue, Row, StorageKind, TableMetadata, Value, ValueNormalizer};

/// Dense storage for one column.
#[derive(Debug, Clone, PartialEq)]
pub enum ColumnData {
    Int64(Vec<i64>),
    Float64(Vec<f64>),
    Bool(Vec<bool>),
    Text(Vec<String>),
}

impl ColumnData {
    fn with_capacity(kind: StorageKind, capacity: usize) -> Self {
        match kind {
            StorageKind::Int64 => ColumnData::Int64(Vec::with_capacity(capacity)),
            StorageKind::Float64 => ColumnData::Float64(Vec::with_capacity(capacity)),
            StorageKind::Bool => ColumnData::Bool(Vec::with_capacity(capacity)),
            StorageKind::Text => ColumnData::Text(Vec::with_capacity(capacity)),
        }
    }

    pub fn len(&self) -> usize {
        match self {
            ColumnData::Int64(v) => v.len(),
            ColumnData::Float64(v) => v.len(),
            ColumnData::Bool(v) => v.len(),
            ColumnData::Text(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn storage(&self) -> StorageKind {
        match self {
            ColumnData::Int64(_) => StorageKind::Int64,
            ColumnData::Float64(_) => StorageKind::Float64,
            ColumnData::Bool(_) => StorageKind::Bool,
            ColumnData::Text(_) => StorageKind::Text,
        }
    }

    /// Append a value of the matching storage kind.
    ///
    /// Returns the value back when its kind does not match.
    fn push(&mut self, value: Value) -> Result<(), Value> {
        match (self, value) {
            (ColumnData::Int64(v), Value::Int(i)) => v.push(i),
            (ColumnData::Float64(v), Value::Float(f)) => v.push(f),
            (ColumnData::Bool(v), Value::Bool(b)) => v.push(b),
            (ColumnData::Text(v), Value::Text(s)) => v.push(s),
            (_, other) => return Err(other),
        }
        Ok(())
    }
}

/// One exported column: name, canonical type and values.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnArray {
    pub name: String,
    pub data_type: CanonicalType,
    pub data: ColumnData,
}

impl ColumnArray {
    pub fn new(name: impl Into<String>, data_type: CanonicalType, capacity: usize) -> Self {
        Self {
            name: name.into(),
            data_type,
            data: ColumnData::with_capacity(data_type.storage(), capacity),
        }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// Accumulates rows of one table into per-field column arrays.
pub struct ColumnTransposer {
    columns: Vec<ColumnArray>,
    rows: u64,
    normalizer: ValueNormalizer,
}

impl ColumnTransposer {
    /// Create a transposer for `table`.
    ///
    /// `capacity_hint` pre-sizes the arrays; it does not need to be exact.
    pub fn new(table: &TableMetadata, capacity_hint: usize) -> Self {
        let columns = table
            .fields
            .iter()
            .map(|f| ColumnArray::new(&f.field_name, f.data_type, capacity_hint))
            .collect();
        Self {
            columns,
            rows: 0,
            normalizer: ValueNormalizer::new(),
        }
    }

    /// Append one row. A field missing from the row is treated as null.
    pub fn push_row(&mut self, mut row: Row) {
        for column in &mut self.columns {
            let value = match row.take(&column.name) {
                Some(v) if v.storage() == column.data_type.storage() => v,
                Some(v) => self
                    .normalizer
                    .normalize(&column.name, column.data_type, RawValue::from(v)),
                None => self
                    .normalizer
                    .normalize(&column.name, column.data_type, RawValue::Null),
            };
            if let Err(v) = column.data.push(value) {
                // normalize() always yields the column's storage kind
                unreachable!("{:?} does not fit column {}", v, column.name);
            }
        }
        self.rows += 1;
    }

    /// Rows consumed so far.
    pub fn rows(&self) -> u64 {
        self.rows
    }

    /// Conversion warnings raised while re-normalizing mismatched values.
    pub fn warnings(&self) -> u64 {
        self.normalizer.warnings()
    }

    /// Finished arrays in field order, each of length [`rows`](Self::rows).
    pub fn finish(self) -> Vec<ColumnArray> {
        self.columns
    }
}
