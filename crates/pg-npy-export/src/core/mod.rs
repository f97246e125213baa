//! Core types shared by every stage of the export pipeline.
//!
//! - [`types`]: the closed canonical type set and its storage kinds
//! - [`value`]: raw database values, normalized values and rows
//! - [`normalize`]: null/zero-value policy and value coercion
//! - [`schema`]: table and field metadata, foreign-key closure
//!
//! Nothing here talks to a database; the `source` module produces
//! [`RawValue`]s and catalog rows, everything downstream consumes these types.

pub mod normalize;
pub mod schema;
pub mod types;
pub mod value;

// Re-export commonly used types for convenience
pub use normalize::{normalize, zero_value, ConversionWarning, ValueNormalizer};
pub use schema::{
    restrict_foreign_keys, DatasetMetadata, FieldMetadata, SchemaDetails, SourceDetails,
    TableMetadata, SOURCE_TYPE_RELATIONAL,
};
pub use types::{CanonicalType, StorageKind};
pub use value::{RawValue, Row, Value};
