//! Schema metadata types for exported tables and fields.
//!
//! These types are built once per run by the
//! [`SchemaIntrospector`](crate::introspect::SchemaIntrospector), drive file
//! naming and typing during export, and are persisted as `metadata.json`.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use super::types::CanonicalType;

/// Source kind recorded in the dataset metadata.
pub const SOURCE_TYPE_RELATIONAL: &str = "Relational Database";

/// Metadata for a single field (column).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldMetadata {
    /// Field name.
    pub field_name: String,

    /// Canonical type the column is exported as.
    pub data_type: CanonicalType,

    /// Whether the field is part of the primary key.
    pub is_primary_key: bool,

    /// Whether the field references another exported table.
    pub is_foreign_key: bool,

    /// Whether the column allows NULL.
    pub nullable: bool,

    /// Referenced table, set only when `is_foreign_key` is true.
    #[serde(rename = "referenced_table_or_collection")]
    pub referenced_table: Option<String>,

    /// Referenced field, set only when `is_foreign_key` is true.
    pub referenced_field: Option<String>,

    /// Always empty; present for format compatibility.
    #[serde(default)]
    pub transformed_features: Vec<String>,

    /// Catalog type name as reported by the source.
    #[serde(skip)]
    pub source_type: String,
}

impl FieldMetadata {
    /// Create a plain field with no key flags.
    pub fn new(name: impl Into<String>, data_type: CanonicalType, nullable: bool) -> Self {
        Self {
            field_name: name.into(),
            data_type,
            is_primary_key: false,
            is_foreign_key: false,
            nullable,
            referenced_table: None,
            referenced_field: None,
            transformed_features: Vec::new(),
            source_type: String::new(),
        }
    }

    /// Mark the field as referencing `table.field`.
    pub fn set_reference(&mut self, table: impl Into<String>, field: impl Into<String>) {
        self.is_foreign_key = true;
        self.referenced_table = Some(table.into());
        self.referenced_field = Some(field.into());
    }

    /// Drop any foreign-key reference.
    pub fn clear_reference(&mut self) {
        self.is_foreign_key = false;
        self.referenced_table = None;
        self.referenced_field = None;
    }
}

/// Metadata for one exported table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableMetadata {
    /// Table name.
    #[serde(rename = "table_or_collection_name")]
    pub table_name: String,

    /// Fields in catalog ordinal order.
    pub fields: Vec<FieldMetadata>,

    /// Primary-key column names in key order.
    #[serde(skip)]
    pub primary_key: Vec<String>,
}

impl TableMetadata {
    /// Create an empty table.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            table_name: name.into(),
            fields: Vec::new(),
            primary_key: Vec::new(),
        }
    }

    /// Look up a field by name.
    pub fn field(&self, name: &str) -> Option<&FieldMetadata> {
        self.fields.iter().find(|f| f.field_name == name)
    }

    /// Look up a field by name for modification.
    pub fn field_mut(&mut self, name: &str) -> Option<&mut FieldMetadata> {
        self.fields.iter_mut().find(|f| f.field_name == name)
    }

    /// Field names in export order.
    pub fn field_names(&self) -> Vec<&str> {
        self.fields.iter().map(|f| f.field_name.as_str()).collect()
    }

    /// Check if the table has a primary key.
    pub fn has_pk(&self) -> bool {
        !self.primary_key.is_empty()
    }
}

/// Details about the source the dataset was taken from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceDetails {
    /// Database engine name.
    pub database_type: String,

    /// Tables requested for export, in caller order.
    pub tables_or_collections: Vec<String>,
}

/// Dataset-level description.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetMetadata {
    pub dataset_name: String,
    pub source_type: String,
    pub source_details: SourceDetails,
}

/// Complete description of an export: dataset metadata plus every
/// selected table's schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchemaDetails {
    pub dataset_metadata: DatasetMetadata,

    #[serde(rename = "schema")]
    pub tables: Vec<TableMetadata>,
}

impl SchemaDetails {
    /// Look up a table by name.
    pub fn table(&self, name: &str) -> Option<&TableMetadata> {
        self.tables.iter().find(|t| t.table_name == name)
    }

    /// Total number of fields across all tables.
    pub fn field_count(&self) -> usize {
        self.tables.iter().map(|t| t.fields.len()).sum()
    }

    /// Serialize as pretty-printed JSON.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

/// Clear every foreign-key reference whose target table is not selected.
///
/// After this pass the schema only contains references that resolve within
/// the export itself. Returns the number of references dropped.
pub fn restrict_foreign_keys(tables: &mut [TableMetadata], selected: &HashSet<String>) -> usize {
    let mut dropped = 0;
    for table in tables.iter_mut() {
        for field in table.fields.iter_mut().filter(|f| f.is_foreign_key) {
            let resolvable = field
                .referenced_table
                .as_ref()
                .is_some_and(|t| selected.contains(t))
                && field.referenced_field.is_some();
            if !resolvable {
                field.clear_reference();
                dropped += 1;
            }
        }
    }
    dropped
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sessions() -> TableMetadata {
        let mut table = TableMetadata::new("sessions");
        let mut id = FieldMetadata::new("id", CanonicalType::Int, false);
        id.is_primary_key = true;
        let mut user_id = FieldMetadata::new("user_id", CanonicalType::Int, false);
        user_id.set_reference("users", "id");
        let mut org_id = FieldMetadata::new("org_id", CanonicalType::Int, true);
        org_id.set_reference("orgs", "id");
        table.fields = vec![id, user_id, org_id];
        table.primary_key = vec!["id".to_string()];
        table
    }

    #[test]
    fn test_restrict_foreign_keys_drops_unselected_targets() {
        let mut tables = vec![TableMetadata::new("users"), sessions()];
        let selected: HashSet<String> = ["users", "sessions"].iter().map(|s| s.to_string()).collect();

        let dropped = restrict_foreign_keys(&mut tables, &selected);
        assert_eq!(dropped, 1);

        let sessions = &tables[1];
        let org_id = sessions.field("org_id").unwrap();
        assert!(!org_id.is_foreign_key);
        assert!(org_id.referenced_table.is_none());
        assert!(org_id.referenced_field.is_none());

        let user_id = sessions.field("user_id").unwrap();
        assert!(user_id.is_foreign_key);
        assert_eq!(user_id.referenced_table.as_deref(), Some("users"));
        assert_eq!(user_id.referenced_field.as_deref(), Some("id"));
    }

    #[test]
    fn test_restrict_foreign_keys_flag_matches_pointers() {
        let mut tables = vec![sessions()];
        let selected: HashSet<String> = ["sessions".to_string()].into_iter().collect();
        restrict_foreign_keys(&mut tables, &selected);

        for field in &tables[0].fields {
            assert_eq!(
                field.is_foreign_key,
                field.referenced_table.is_some() && field.referenced_field.is_some()
            );
            assert!(!field.is_foreign_key);
        }
    }

    #[test]
    fn test_field_json_layout() {
        let mut field = FieldMetadata::new("user_id", CanonicalType::Int, false);
        field.set_reference("users", "id");
        field.source_type = "integer".to_string();

        let json = serde_json::to_value(&field).unwrap();
        assert_eq!(json["field_name"], "user_id");
        assert_eq!(json["data_type"], "int");
        assert_eq!(json["is_foreign_key"], true);
        assert_eq!(json["nullable"], false);
        assert_eq!(json["referenced_table_or_collection"], "users");
        assert_eq!(json["referenced_field"], "id");
        assert_eq!(json["transformed_features"], serde_json::json!([]));
        assert!(json.get("source_type").is_none());
    }

    #[test]
    fn test_schema_details_json_layout() {
        let details = SchemaDetails {
            dataset_metadata: DatasetMetadata {
                dataset_name: "app_db".to_string(),
                source_type: SOURCE_TYPE_RELATIONAL.to_string(),
                source_details: SourceDetails {
                    database_type: "PostgreSQL".to_string(),
                    tables_or_collections: vec!["sessions".to_string()],
                },
            },
            tables: vec![sessions()],
        };

        let json: serde_json::Value = serde_json::from_str(&details.to_json().unwrap()).unwrap();
        assert_eq!(json["dataset_metadata"]["source_type"], "Relational Database");
        assert_eq!(
            json["dataset_metadata"]["source_details"]["database_type"],
            "PostgreSQL"
        );
        assert_eq!(json["schema"][0]["table_or_collection_name"], "sessions");
        assert_eq!(json["schema"][0]["fields"].as_array().unwrap().len(), 3);
        assert!(json["schema"][0].get("primary_key").is_none());
        assert_eq!(details.field_count(), 3);
    }
}
