//! Canonical column types.
//!
//! Every source column is mapped onto one member of a closed set of eight
//! canonical types. Each canonical type has exactly one [`StorageKind`],
//! and that single table is what normalization, transposition and array
//! encoding all dispatch on.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Normalized value category for a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CanonicalType {
    String,
    Int,
    Float,
    Bool,
    Timestamp,
    Date,
    #[serde(rename = "uuid")]
    Uuid,
    Null,
}

/// Physical element type of an exported column array.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StorageKind {
    Int64,
    Float64,
    Bool,
    Text,
}

impl CanonicalType {
    /// All canonical types, in declaration order.
    pub const ALL: [CanonicalType; 8] = [
        CanonicalType::String,
        CanonicalType::Int,
        CanonicalType::Float,
        CanonicalType::Bool,
        CanonicalType::Timestamp,
        CanonicalType::Date,
        CanonicalType::Uuid,
        CanonicalType::Null,
    ];

    /// Map a PostgreSQL catalog type name onto a canonical type.
    ///
    /// Accepts both `information_schema.columns.data_type` spellings and the
    /// short `udt_name` aliases. Anything unrecognized is a string.
    pub fn from_pg_type(pg_type: &str) -> Self {
        match pg_type.to_lowercase().as_str() {
            "character varying" | "varchar" | "text" | "character" | "char" | "bpchar" => {
                CanonicalType::String
            }
            "integer" | "bigint" | "smallint" | "int" | "int2" | "int4" | "int8" => {
                CanonicalType::Int
            }
            "numeric" | "decimal" | "real" | "double precision" | "float4" | "float8" => {
                CanonicalType::Float
            }
            "boolean" | "bool" => CanonicalType::Bool,
            "timestamp without time zone"
            | "timestamp with time zone"
            | "time without time zone"
            | "time with time zone"
            | "timestamp"
            | "timestamptz" => CanonicalType::Timestamp,
            "date" => CanonicalType::Date,
            "uuid" => CanonicalType::Uuid,
            _ => CanonicalType::String,
        }
    }

    /// Storage kind used for this type's column array.
    pub fn storage(self) -> StorageKind {
        match self {
            CanonicalType::Int => StorageKind::Int64,
            CanonicalType::Float => StorageKind::Float64,
            CanonicalType::Bool => StorageKind::Bool,
            CanonicalType::String
            | CanonicalType::Timestamp
            | CanonicalType::Date
            | CanonicalType::Uuid
            | CanonicalType::Null => StorageKind::Text,
        }
    }

    /// Lowercase name as written to the schema metadata.
    pub fn as_str(self) -> &'static str {
        match self {
            CanonicalType::String => "string",
            CanonicalType::Int => "int",
            CanonicalType::Float => "float",
            CanonicalType::Bool => "bool",
            CanonicalType::Timestamp => "timestamp",
            CanonicalType::Date => "date",
            CanonicalType::Uuid => "uuid",
            CanonicalType::Null => "null",
        }
    }
}

impl fmt::Display for CanonicalType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
