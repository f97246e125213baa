//! PostgreSQL implementation of the catalog and page traits.
//!
//! Uses deadpool-postgres capped at a single connection: the export is
//! strictly sequential and reuses that connection for every query.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use deadpool_postgres::{Manager, ManagerConfig, Object, Pool, RecyclingMethod};
use tokio_postgres::Config as PgConfig;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::tls::connector;
use super::{CatalogReader, ColumnInfo, ForeignKeyEdge, PageOrder, PageRequest, PageSource};
use crate::config::SourceConfig;
use crate::core::RawValue;
use crate::error::{ExportError, Result};

/// Engine name recorded in the dataset metadata.
const ENGINE_NAME: &str = "PostgreSQL";

/// PostgreSQL source.
pub struct PgSource {
    pool: Pool,
    schema: String,
    database: String,
}

impl PgSource {
    /// Connect to the configured database and verify the connection.
    pub async fn connect(config: &SourceConfig) -> Result<Self> {
        let pg_config = pg_config(config);
        let mgr_config = ManagerConfig {
            recycling_method: RecyclingMethod::Fast,
        };

        let pool = match connector(config)? {
            None => {
                warn!("PostgreSQL TLS is disabled. Credentials will be transmitted in plaintext.");
                let mgr = Manager::from_config(pg_config, tokio_postgres::NoTls, mgr_config);
                Pool::builder(mgr)
                    .max_size(1)
                    .build()
                    .map_err(|e| ExportError::connection(e, "creating PostgreSQL pool"))?
            }
            Some(tls_connector) => {
                let mgr = Manager::from_config(pg_config, tls_connector, mgr_config);
                Pool::builder(mgr)
                    .max_size(1)
                    .build()
                    .map_err(|e| ExportError::connection(e, "creating PostgreSQL pool"))?
            }
        };

        let source = Self {
            pool,
            schema: config.schema.clone(),
            database: config.database.clone(),
        };
        source.ping().await?;

        info!(
            "Connected to PostgreSQL: {}:{}/{} (schema '{}')",
            config.host, config.port, config.database, config.schema
        );

        Ok(source)
    }

    /// Run `SELECT 1` and return the round-trip latency.
    pub async fn ping(&self) -> Result<Duration> {
        let start = Instant::now();
        let client = self
            .pool
            .get()
            .await
            .map_err(|e| ExportError::connection(e, "getting connection for SELECT 1"))?;
        client
            .simple_query("SELECT 1")
            .await
            .map_err(|e| ExportError::connection(describe(&e), "running SELECT 1"))?;
        Ok(start.elapsed())
    }

    async fn catalog_client(&self, context: &str) -> Result<Object> {
        self.pool
            .get()
            .await
            .map_err(|e| ExportError::introspection(e, format!("getting connection for {}", context)))
    }
}

#[async_trait]
impl CatalogReader for PgSource {
    async fn list_tables(&self) -> Result<Vec<String>> {
        let context = format!("listing base tables in schema '{}'", self.schema);
        let client = self.catalog_client(&context).await?;

        let query = r#"
            SELECT table_name::text
            FROM information_schema.tables
            WHERE table_type = 'BASE TABLE'
              AND table_schema = $1
            ORDER BY table_name
        "#;

        let rows = client
            .query(query, &[&self.schema])
            .await
            .map_err(|e| ExportError::introspection(describe(&e), &context))?;

        let tables: Vec<String> = rows.iter().map(|r| r.get(0)).collect();
        debug!("Found {} base tables in schema '{}'", tables.len(), self.schema);
        Ok(tables)
    }

    async fn columns(&self, table: &str) -> Result<Vec<ColumnInfo>> {
        let context = format!("querying columns for {}", table);
        let client = self.catalog_client(&context).await?;

        let query = r#"
            SELECT
                column_name::text,
                data_type::text,
                is_nullable = 'YES'
            FROM information_schema.columns
            WHERE table_schema = $1 AND table_name = $2
            ORDER BY ordinal_position
        "#;

        let rows = client
            .query(query, &[&self.schema, &table])
            .await
            .map_err(|e| ExportError::introspection(describe(&e), &context))?;

        let columns: Vec<ColumnInfo> = rows
            .iter()
            .map(|row| ColumnInfo {
                name: row.get(0),
                data_type: row.get(1),
                is_nullable: row.get(2),
            })
            .collect();

        debug!("Loaded {} columns for {}", columns.len(), table);
        Ok(columns)
    }

    async fn primary_key(&self, table: &str) -> Result<Vec<String>> {
        let context = format!("querying primary key for {}", table);
        let client = self.catalog_client(&context).await?;

        let query = r#"
            SELECT a.attname::text
            FROM pg_catalog.pg_constraint c
            JOIN pg_catalog.pg_class t ON t.oid = c.conrelid
            JOIN pg_catalog.pg_namespace n ON n.oid = t.relnamespace
            JOIN pg_catalog.pg_attribute a ON a.attrelid = t.oid
            WHERE n.nspname = $1
              AND t.relname = $2
              AND c.contype = 'p'
              AND a.attnum = ANY(c.conkey)
            ORDER BY array_position(c.conkey, a.attnum)
        "#;

        let rows = client
            .query(query, &[&self.schema, &table])
            .await
            .map_err(|e| ExportError::introspection(describe(&e), &context))?;

        let pk: Vec<String> = rows.iter().map(|r| r.get(0)).collect();
        debug!("Primary key for {}: {:?}", table, pk);
        Ok(pk)
    }

    async fn foreign_keys(&self, table: &str) -> Result<Vec<ForeignKeyEdge>> {
        let context = format!("querying foreign keys for {}", table);
        let client = self.catalog_client(&context).await?;

        let query = r#"
            SELECT
                c.conname::text,
                a.attname::text,
                rn.nspname::text,
                rt.relname::text,
                ra.attname::text
            FROM pg_catalog.pg_constraint c
            JOIN pg_catalog.pg_class t ON t.oid = c.conrelid
            JOIN pg_catalog.pg_namespace n ON n.oid = t.relnamespace
            JOIN pg_catalog.pg_class rt ON rt.oid = c.confrelid
            JOIN pg_catalog.pg_namespace rn ON rn.oid = rt.relnamespace
            CROSS JOIN LATERAL unnest(c.conkey, c.confkey)
                WITH ORDINALITY AS k(attnum, ref_attnum, ord)
            JOIN pg_catalog.pg_attribute a ON a.attrelid = t.oid AND a.attnum = k.attnum
            JOIN pg_catalog.pg_attribute ra ON ra.attrelid = rt.oid AND ra.attnum = k.ref_attnum
            WHERE n.nspname = $1
              AND t.relname = $2
              AND c.contype = 'f'
            ORDER BY c.conname, k.ord
        "#;

        let rows = client
            .query(query, &[&self.schema, &table])
            .await
            .map_err(|e| ExportError::introspection(describe(&e), &context))?;

        let edges: Vec<ForeignKeyEdge> = rows
            .iter()
            .map(|row| ForeignKeyEdge {
                constraint: row.get(0),
                column: row.get(1),
                ref_schema: row.get(2),
                ref_table: row.get(3),
                ref_column: row.get(4),
            })
            .collect();

        debug!("Loaded {} foreign key columns for {}", edges.len(), table);
        Ok(edges)
    }

    fn schema_name(&self) -> &str {
        &self.schema
    }

    fn database_name(&self) -> &str {
        &self.database
    }

    fn engine_name(&self) -> &str {
        ENGINE_NAME
    }
}

#[async_trait]
impl PageSource for PgSource {
    async fn fetch_page(&self, request: PageRequest<'_>) -> Result<Vec<Vec<RawValue>>> {
        let client = self.pool.get().await.map_err(|e| {
            ExportError::iteration(request.table, format!("getting connection: {}", e))
        })?;

        let sql = build_page_query(&self.schema, &request);
        debug!("Page query: {}", sql);

        let rows = client.query(&sql, &[]).await.map_err(|e| {
            ExportError::iteration(
                request.table,
                format!("fetching page at offset {}: {}", request.offset, describe(&e)),
            )
        })?;

        let kinds: Vec<WireKind> = request
            .fields
            .iter()
            .map(|f| WireKind::for_source_type(&f.source_type))
            .collect();

        rows.iter()
            .map(|row| {
                kinds
                    .iter()
                    .enumerate()
                    .map(|(idx, kind)| {
                        kind.decode(row, idx).map_err(|e| {
                            ExportError::iteration(
                                request.table,
                                format!(
                                    "scanning column '{}': {}",
                                    request.fields[idx].field_name,
                                    describe(&e)
                                ),
                            )
                        })
                    })
                    .collect::<Result<Vec<RawValue>>>()
            })
            .collect()
    }

    async fn row_count(&self, table: &str) -> Result<u64> {
        let client = self.pool.get().await.map_err(|e| {
            ExportError::iteration(table, format!("getting connection: {}", e))
        })?;

        let query = format!(
            "SELECT COUNT(*)::int8 FROM {}.{}",
            quote_ident(&self.schema),
            quote_ident(table)
        );

        let row = client
            .query_one(&query, &[])
            .await
            .map_err(|e| ExportError::iteration(table, format!("counting rows: {}", describe(&e))))?;
        Ok(row.get::<_, i64>(0).max(0) as u64)
    }
}

/// How a column travels over the wire and which [`RawValue`] it becomes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WireKind {
    Int2,
    Int4,
    Int8,
    Float4,
    Float8,
    /// numeric/decimal, cast to double precision in the select list.
    Numeric,
    Bool,
    Uuid,
    Date,
    Timestamp,
    TimestampTz,
    /// Everything else, cast to text in the select list.
    Text,
}

impl WireKind {
    fn for_source_type(source_type: &str) -> Self {
        match source_type.to_lowercase().as_str() {
            "smallint" | "int2" => WireKind::Int2,
            "integer" | "int" | "int4" => WireKind::Int4,
            "bigint" | "int8" => WireKind::Int8,
            "real" | "float4" => WireKind::Float4,
            "double precision" | "float8" => WireKind::Float8,
            "numeric" | "decimal" => WireKind::Numeric,
            "boolean" | "bool" => WireKind::Bool,
            "uuid" => WireKind::Uuid,
            "date" => WireKind::Date,
            "timestamp without time zone" | "timestamp" => WireKind::Timestamp,
            "timestamp with time zone" | "timestamptz" => WireKind::TimestampTz,
            _ => WireKind::Text,
        }
    }

    fn select_expr(self, column: &str) -> String {
        let quoted = quote_ident(column);
        match self {
            WireKind::Numeric => format!("{0}::float8 AS {0}", quoted),
            WireKind::Text => format!("{0}::text AS {0}", quoted),
            _ => quoted,
        }
    }

    fn decode(
        self,
        row: &tokio_postgres::Row,
        idx: usize,
    ) -> std::result::Result<RawValue, tokio_postgres::Error> {
        let value = match self {
            WireKind::Int2 => row
                .try_get::<_, Option<i16>>(idx)?
                .map(|v| RawValue::Int(v.into())),
            WireKind::Int4 => row
                .try_get::<_, Option<i32>>(idx)?
                .map(|v| RawValue::Int(v.into())),
            WireKind::Int8 => row.try_get::<_, Option<i64>>(idx)?.map(RawValue::Int),
            WireKind::Float4 => row
                .try_get::<_, Option<f32>>(idx)?
                .map(|v| RawValue::Float(v.into())),
            WireKind::Float8 | WireKind::Numeric => {
                row.try_get::<_, Option<f64>>(idx)?.map(RawValue::Float)
            }
            WireKind::Bool => row.try_get::<_, Option<bool>>(idx)?.map(RawValue::Bool),
            WireKind::Uuid => row.try_get::<_, Option<Uuid>>(idx)?.map(RawValue::Uuid),
            WireKind::Date => row.try_get::<_, Option<NaiveDate>>(idx)?.map(RawValue::Date),
            WireKind::Timestamp => row
                .try_get::<_, Option<NaiveDateTime>>(idx)?
                .map(RawValue::Timestamp),
            WireKind::TimestampTz => row
                .try_get::<_, Option<DateTime<Utc>>>(idx)?
                .map(RawValue::TimestampTz),
            WireKind::Text => row.try_get::<_, Option<String>>(idx)?.map(RawValue::Text),
        };
        Ok(value.unwrap_or(RawValue::Null))
    }
}

/// Build the page query for one request.
///
/// Selects exactly the requested fields in table order and always carries
/// an explicit ORDER BY so that offset paging is deterministic.
fn build_page_query(schema: &str, request: &PageRequest<'_>) -> String {
    let select_list = request
        .fields
        .iter()
        .map(|f| WireKind::for_source_type(&f.source_type).select_expr(&f.field_name))
        .collect::<Vec<_>>()
        .join(", ");

    let order_by = match request.order {
        PageOrder::PrimaryKey(cols) => cols
            .iter()
            .map(|c| quote_ident(c))
            .collect::<Vec<_>>()
            .join(", "),
        PageOrder::AllColumns => (1..=request.fields.len())
            .map(|i| i.to_string())
            .collect::<Vec<_>>()
            .join(", "),
    };

    let mut sql = format!(
        "SELECT {} FROM {}.{}",
        select_list,
        quote_ident(schema),
        quote_ident(request.table)
    );
    if !order_by.is_empty() {
        sql.push_str(" ORDER BY ");
        sql.push_str(&order_by);
    }
    sql.push_str(&format!(" LIMIT {} OFFSET {}", request.limit, request.offset));
    sql
}

/// Quote a PostgreSQL identifier.
fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Connection parameters, passed field by field so no value needs quoting.
fn pg_config(config: &SourceConfig) -> PgConfig {
    let mut pg = PgConfig::new();
    pg.host(&config.host)
        .port(config.port)
        .dbname(&config.database)
        .user(&config.user)
        .password(&config.password)
        .application_name("pg-npy-export");
    pg
}

/// Render a driver error, preferring the server's message when there is one.
fn describe(e: &tokio_postgres::Error) -> String {
    match e.as_db_error() {
        Some(db) => format!("{} ({})", db.message(), db.code().code()),
        None => e.to_string(),
    }
}
