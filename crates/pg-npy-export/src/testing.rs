//! In-memory catalog and page source used by unit tests.

use std::sync::Mutex;

use async_trait::async_trait;

use crate::core::RawValue;
use crate::error::{ExportError, Result};
use crate::source::{CatalogReader, ColumnInfo, ForeignKeyEdge, PageRequest, PageSource};

/// A table held in memory. Rows are stored in the order pages return them.
#[derive(Debug, Clone)]
pub struct MemoryTable {
    name: String,
    columns: Vec<ColumnInfo>,
    primary_key: Vec<String>,
    foreign_keys: Vec<ForeignKeyEdge>,
    rows: Vec<Vec<RawValue>>,
}

impl MemoryTable {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            columns: Vec::new(),
            primary_key: Vec::new(),
            foreign_keys: Vec::new(),
            rows: Vec::new(),
        }
    }

    pub fn column(mut self, name: &str, data_type: &str, nullable: bool) -> Self {
        self.columns.push(ColumnInfo {
            name: name.to_string(),
            data_type: data_type.to_string(),
            is_nullable: nullable,
        });
        self
    }

    pub fn primary_key(mut self, cols: &[&str]) -> Self {
        self.primary_key = cols.iter().map(|c| c.to_string()).collect();
        self
    }

    pub fn foreign_key(mut self, constraint: &str, column: &str, ref_table: &str, ref_column: &str) -> Self {
        self.foreign_keys.push(ForeignKeyEdge {
            constraint: constraint.to_string(),
            column: column.to_string(),
            ref_schema: "public".to_string(),
            ref_table: ref_table.to_string(),
            ref_column: ref_column.to_string(),
        });
        self.foreign_keys
            .sort_by(|a, b| a.constraint.cmp(&b.constraint));
        self
    }

    /// Append a row; values are in column order.
    pub fn row(mut self, values: Vec<RawValue>) -> Self {
        self.rows.push(values);
        self
    }
}

/// Fake database implementing both [`CatalogReader`] and [`PageSource`].
#[derive(Debug)]
pub struct MemorySource {
    database: String,
    tables: Vec<MemoryTable>,
    fail_catalog_for: Option<String>,
    fail_fetch_at: Option<usize>,
    fetch_log: Mutex<Vec<(u64, usize)>>,
}

impl MemorySource {
    pub fn new(database: &str) -> Self {
        Self {
            database: database.to_string(),
            tables: Vec::new(),
            fail_catalog_for: None,
            fail_fetch_at: None,
            fetch_log: Mutex::new(Vec::new()),
        }
    }

    pub fn with_table(mut self, table: MemoryTable) -> Self {
        self.tables.push(table);
        self
    }

    /// Make every catalog query about `table` fail.
    pub fn fail_catalog_for(mut self, table: &str) -> Self {
        self.fail_catalog_for = Some(table.to_string());
        self
    }

    /// Make the `n`th page fetch (zero-based, across all tables) fail.
    pub fn fail_fetch_at(mut self, n: usize) -> Self {
        self.fail_fetch_at = Some(n);
        self
    }

    /// `(offset, rows returned)` for every page fetch so far.
    pub fn fetches(&self) -> Vec<(u64, usize)> {
        self.fetch_log.lock().unwrap().clone()
    }

    fn table(&self, name: &str) -> Result<&MemoryTable> {
        if self.fail_catalog_for.as_deref() == Some(name) {
            return Err(ExportError::introspection(
                "permission denied",
                format!("querying {}", name),
            ));
        }
        self.tables
            .iter()
            .find(|t| t.name == name)
            .ok_or_else(|| ExportError::introspection("no such table", name))
    }
}

#[async_trait]
impl CatalogReader for MemorySource {
    async fn list_tables(&self) -> Result<Vec<String>> {
        let mut names: Vec<String> = self.tables.iter().map(|t| t.name.clone()).collect();
        names.sort();
        Ok(names)
    }

    async fn columns(&self, table: &str) -> Result<Vec<ColumnInfo>> {
        Ok(self.table(table)?.columns.clone())
    }

    async fn primary_key(&self, table: &str) -> Result<Vec<String>> {
        Ok(self.table(table)?.primary_key.clone())
    }

    async fn foreign_keys(&self, table: &str) -> Result<Vec<ForeignKeyEdge>> {
        Ok(self.table(table)?.foreign_keys.clone())
    }

    fn schema_name(&self) -> &str {
        "public"
    }

    fn database_name(&self) -> &str {
        &self.database
    }

    fn engine_name(&self) -> &str {
        "PostgreSQL"
    }
}

#[async_trait]
impl PageSource for MemorySource {
    async fn fetch_page(&self, request: PageRequest<'_>) -> Result<Vec<Vec<RawValue>>> {
        let mut log = self.fetch_log.lock().unwrap();
        if self.fail_fetch_at == Some(log.len()) {
            log.push((request.offset, 0));
            return Err(ExportError::iteration(request.table, "connection reset"));
        }

        let table = self
            .tables
            .iter()
            .find(|t| t.name == request.table)
            .ok_or_else(|| ExportError::iteration(request.table, "relation does not exist"))?;

        let indexes: Vec<Option<usize>> = request
            .fields
            .iter()
            .map(|f| table.columns.iter().position(|c| c.name == f.field_name))
            .collect();

        let start = (request.offset as usize).min(table.rows.len());
        let end = (start + request.limit).min(table.rows.len());
        let page: Vec<Vec<RawValue>> = table.rows[start..end]
            .iter()
            .map(|row| {
                indexes
                    .iter()
                    .map(|idx| idx.and_then(|i| row.get(i).cloned()).unwrap_or(RawValue::Null))
                    .collect()
            })
            .collect();

        log.push((request.offset, page.len()));
        Ok(page)
    }

    async fn row_count(&self, table: &str) -> Result<u64> {
        let table = self
            .tables
            .iter()
            .find(|t| t.name == table)
            .ok_or_else(|| ExportError::iteration(table, "relation does not exist"))?;
        Ok(table.rows.len() as u64)
    }
}
