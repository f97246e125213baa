//! Schema discovery.
//!
//! Builds [`SchemaDetails`] for a table selection from catalog queries, then
//! runs the foreign-key closure pass so that every reference in the result
//! resolves to a table that is itself part of the export.

use std::collections::HashSet;

use tracing::{debug, info, warn};

use crate::core::{
    restrict_foreign_keys, CanonicalType, DatasetMetadata, FieldMetadata, SchemaDetails,
    SourceDetails, TableMetadata, SOURCE_TYPE_RELATIONAL,
};
use crate::error::Result;
use crate::source::CatalogReader;

/// Builds the typed schema model for a selection of tables.
pub struct SchemaIntrospector<'a, C: CatalogReader + ?Sized> {
    catalog: &'a C,
    dataset_name: Option<String>,
}

impl<'a, C: CatalogReader + ?Sized> SchemaIntrospector<'a, C> {
    pub fn new(catalog: &'a C) -> Self {
        Self {
            catalog,
            dataset_name: None,
        }
    }

    /// Override the dataset name (defaults to the database name).
    pub fn with_dataset_name(mut self, name: impl Into<String>) -> Self {
        self.dataset_name = Some(name.into());
        self
    }

    /// Discover the schema of the selected tables.
    ///
    /// Tables appear in catalog order (by name). Selected names that are not
    /// base tables of the working schema are logged and left out of the
    /// table list, but stay in the recorded selection. Any catalog failure
    /// aborts discovery; no partial schema is returned.
    pub async fn discover(&self, selected: &[String]) -> Result<SchemaDetails> {
        let selection = dedupe(selected);
        let selected_set: HashSet<String> = selection.iter().cloned().collect();

        info!(
            "Discovering schema '{}' for {} selected tables",
            self.catalog.schema_name(),
            selection.len()
        );

        let mut tables = Vec::new();
        for name in self.catalog.list_tables().await? {
            if !selected_set.contains(&name) {
                continue;
            }
            tables.push(self.load_table(&name).await?);
        }

        let found: HashSet<&str> = tables.iter().map(|t| t.table_name.as_str()).collect();
        for missing in selection.iter().filter(|t| !found.contains(t.as_str())) {
            warn!(
                "Table '{}' is not a base table in schema '{}', skipping",
                missing,
                self.catalog.schema_name()
            );
        }

        let dropped = restrict_foreign_keys(&mut tables, &selected_set);
        if dropped > 0 {
            info!(
                "Dropped {} foreign key references to tables outside the selection",
                dropped
            );
        }

        let dataset_name = self
            .dataset_name
            .clone()
            .unwrap_or_else(|| self.catalog.database_name().to_string());

        info!(
            "Discovered {} tables with {} fields",
            tables.len(),
            tables.iter().map(|t| t.fields.len()).sum::<usize>()
        );

        Ok(SchemaDetails {
            dataset_metadata: DatasetMetadata {
                dataset_name,
                source_type: SOURCE_TYPE_RELATIONAL.to_string(),
                source_details: SourceDetails {
                    database_type: self.catalog.engine_name().to_string(),
                    tables_or_collections: selection,
                },
            },
            tables,
        })
    }

    async fn load_table(&self, name: &str) -> Result<TableMetadata> {
        let mut table = TableMetadata::new(name);

        for column in self.catalog.columns(name).await? {
            let mut field = FieldMetadata::new(
                column.name,
                CanonicalType::from_pg_type(&column.data_type),
                column.is_nullable,
            );
            field.source_type = column.data_type;
            table.fields.push(field);
        }

        for pk_col in self.catalog.primary_key(name).await? {
            if let Some(field) = table.field_mut(&pk_col) {
                field.is_primary_key = true;
                table.primary_key.push(pk_col);
            }
        }

        let working_schema = self.catalog.schema_name();
        for edge in self.catalog.foreign_keys(name).await? {
            let Some(field) = table.field_mut(&edge.column) else {
                continue;
            };
            // A column in several foreign keys keeps the first one.
            if field.is_foreign_key {
                continue;
            }
            if edge.ref_schema != working_schema {
                debug!(
                    "Ignoring {}.{} -> {}.{}: referenced table is in another schema",
                    name, edge.column, edge.ref_schema, edge.ref_table
                );
                continue;
            }
            field.set_reference(edge.ref_table, edge.ref_column);
        }

        debug!(
            "Loaded {} ({} fields, pk {:?})",
            name,
            table.fields.len(),
            table.primary_key
        );
        Ok(table)
    }
}

/// Selection with duplicates removed, keeping first-seen order.
fn dedupe(selected: &[String]) -> Vec<String> {
    let mut seen = HashSet::new();
    selected
        .iter()
        .filter(|t| seen.insert(t.as_str()))
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ExportError;
    use crate::testing::{MemorySource, MemoryTable};

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    fn app_source() -> MemorySource {
        MemorySource::new("app_db")
            .with_table(
                MemoryTable::new("orgs")
                    .column("id", "integer", false)
                    .primary_key(&["id"]),
            )
            .with_table(
                MemoryTable::new("users")
                    .column("id", "integer", false)
                    .column("name", "text", false)
                    .column("deleted_at", "timestamp without time zone", true)
                    .primary_key(&["id"]),
            )
            .with_table(
                MemoryTable::new("sessions")
                    .column("id", "uuid", false)
                    .column("user_id", "integer", false)
                    .column("org_id", "integer", true)
                    .column("payload", "jsonb", true)
                    .primary_key(&["id"])
                    .foreign_key("fk_org", "org_id", "orgs", "id")
                    .foreign_key("fk_user", "user_id", "users", "id"),
            )
    }

    #[tokio::test]
    async fn test_discover_restricts_foreign_keys_to_selection() {
        let source = app_source();
        let schema = SchemaIntrospector::new(&source)
            .discover(&names(&["users", "sessions"]))
            .await
            .unwrap();

        let names: Vec<_> = schema.tables.iter().map(|t| t.table_name.as_str()).collect();
        assert_eq!(names, vec!["sessions", "users"]);

        let sessions = schema.table("sessions").unwrap();
        let org_id = sessions.field("org_id").unwrap();
        assert!(!org_id.is_foreign_key);
        assert!(org_id.referenced_table.is_none());
        assert!(org_id.referenced_field.is_none());

        let user_id = sessions.field("user_id").unwrap();
        assert!(user_id.is_foreign_key);
        assert_eq!(user_id.referenced_table.as_deref(), Some("users"));
        assert_eq!(user_id.referenced_field.as_deref(), Some("id"));

        for table in &schema.tables {
            for field in &table.fields {
                if field.is_foreign_key {
                    let target = field.referenced_table.as_deref().unwrap();
                    assert!(["users", "sessions"].contains(&target));
                }
            }
        }
    }

    #[tokio::test]
    async fn test_discover_maps_types_keys_and_order() {
        let source = app_source();
        let schema = SchemaIntrospector::new(&source)
            .discover(&names(&["sessions"]))
            .await
            .unwrap();

        let sessions = &schema.tables[0];
        assert_eq!(
            sessions.field_names(),
            vec!["id", "user_id", "org_id", "payload"]
        );
        assert_eq!(sessions.fields[0].data_type, CanonicalType::Uuid);
        assert!(sessions.fields[0].is_primary_key);
        assert!(!sessions.fields[0].nullable);
        assert_eq!(sessions.fields[3].data_type, CanonicalType::String);
        assert_eq!(sessions.fields[3].source_type, "jsonb");
        assert_eq!(sessions.primary_key, vec!["id"]);
    }

    #[tokio::test]
    async fn test_discover_records_selection_and_metadata() {
        let source = app_source();
        let schema = SchemaIntrospector::new(&source)
            .discover(&names(&["users", "ghost", "users"]))
            .await
            .unwrap();

        assert_eq!(schema.tables.len(), 1);
        let meta = &schema.dataset_metadata;
        assert_eq!(meta.dataset_name, "app_db");
        assert_eq!(meta.source_type, "Relational Database");
        assert_eq!(meta.source_details.database_type, "PostgreSQL");
        assert_eq!(meta.source_details.tables_or_collections, vec!["users", "ghost"]);
    }

    #[tokio::test]
    async fn test_dataset_name_override() {
        let source = app_source();
        let schema = SchemaIntrospector::new(&source)
            .with_dataset_name("analytics")
            .discover(&names(&["orgs"]))
            .await
            .unwrap();
        assert_eq!(schema.dataset_metadata.dataset_name, "analytics");
    }

    #[tokio::test]
    async fn test_discover_is_idempotent() {
        let source = app_source();
        let introspector = SchemaIntrospector::new(&source);
        let selection = names(&["sessions", "users", "orgs"]);

        let first = introspector.discover(&selection).await.unwrap();
        let second = introspector.discover(&selection).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(first.to_json().unwrap(), second.to_json().unwrap());
    }

    #[tokio::test]
    async fn test_first_foreign_key_wins_for_a_column() {
        let source = MemorySource::new("db")
            .with_table(MemoryTable::new("a").column("id", "integer", false))
            .with_table(MemoryTable::new("b").column("id", "integer", false))
            .with_table(
                MemoryTable::new("c")
                    .column("ref_id", "integer", false)
                    .foreign_key("fk_1", "ref_id", "a", "id")
                    .foreign_key("fk_2", "ref_id", "b", "id"),
            );
        let schema = SchemaIntrospector::new(&source)
            .discover(&names(&["a", "b", "c"]))
            .await
            .unwrap();
        let field = schema.table("c").unwrap().field("ref_id").unwrap();
        assert_eq!(field.referenced_table.as_deref(), Some("a"));
    }

    #[tokio::test]
    async fn test_catalog_failure_aborts_discovery() {
        let source = app_source().fail_catalog_for("sessions");
        let err = SchemaIntrospector::new(&source)
            .discover(&names(&["users", "sessions"]))
            .await
            .unwrap_err();
        assert!(matches!(err, ExportError::Introspection { .. }));
        assert_eq!(err.exit_code(), 4);
    }
}
