//! Database boundary.
//!
//! Two traits separate the pipeline from the database:
//!
//! - [`CatalogReader`]: read-only catalog queries used by schema discovery
//! - [`PageSource`]: bounded page fetches and row counts used while streaming
//!
//! [`PgSource`] implements both over a deadpool-postgres pool. Values are
//! decoded into [`RawValue`](crate::core::RawValue)s exactly once, here.

mod postgres;
mod tls;

pub use postgres::PgSource;
pub use tls::{connector, SslMode};

use async_trait::async_trait;

use crate::core::{FieldMetadata, RawValue};
use crate::error::Result;

/// A column as reported by the catalog.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnInfo {
    pub name: String,
    /// Catalog type name (`information_schema.columns.data_type`).
    pub data_type: String,
    pub is_nullable: bool,
}

/// One foreign-key edge: `column` references `ref_table.ref_column`.
#[derive(Debug, Clone, PartialEq)]
pub struct ForeignKeyEdge {
    pub constraint: String,
    pub column: String,
    pub ref_schema: String,
    pub ref_table: String,
    pub ref_column: String,
}

/// Read-only catalog queries against the working schema.
#[async_trait]
pub trait CatalogReader: Send + Sync {
    /// Base tables of the working schema, ordered by name.
    async fn list_tables(&self) -> Result<Vec<String>>;

    /// Columns of a table, ordered by ordinal position.
    async fn columns(&self, table: &str) -> Result<Vec<ColumnInfo>>;

    /// Primary-key column names, in key order.
    async fn primary_key(&self, table: &str) -> Result<Vec<String>>;

    /// Foreign-key edges, ordered by constraint name then column position.
    async fn foreign_keys(&self, table: &str) -> Result<Vec<ForeignKeyEdge>>;

    /// Working schema name.
    fn schema_name(&self) -> &str;

    /// Database name, used as the default dataset name.
    fn database_name(&self) -> &str;

    /// Engine name recorded in the dataset metadata.
    fn engine_name(&self) -> &str;
}

/// Row ordering for a page query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageOrder {
    /// Order by these primary-key columns, in key order.
    PrimaryKey(Vec<String>),
    /// No primary key: order by every selected output column by position.
    AllColumns,
}

/// A request for one page of rows.
#[derive(Debug, Clone, Copy)]
pub struct PageRequest<'a> {
    pub table: &'a str,
    /// Exactly the columns to select, in table order.
    pub fields: &'a [FieldMetadata],
    pub order: &'a PageOrder,
    pub limit: usize,
    pub offset: u64,
}

/// Bounded row fetches for streaming a table.
#[async_trait]
pub trait PageSource: Send + Sync {
    /// Fetch up to `request.limit` rows starting at `request.offset`.
    ///
    /// Each returned row holds one value per requested field, in order.
    async fn fetch_page(&self, request: PageRequest<'_>) -> Result<Vec<Vec<RawValue>>>;

    /// Current row count of a table. Used only as a capacity hint.
    async fn row_count(&self, table: &str) -> Result<u64>;
}
