//! Export orchestrator - main workflow coordinator.
//!
//! Runs the export strictly sequentially: discover the schema, write
//! `metadata.json`, then for each table stream its rows, transpose them into
//! column arrays and hand every array to the [`ArrayWriter`]. Any error
//! aborts the whole run.

use std::path::{Path, PathBuf};
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::config::{Config, SourceConfig};
use crate::core::SchemaDetails;
use crate::error::{ExportError, Result};
use crate::introspect::SchemaIntrospector;
use crate::npy::{ArrayWriter, NpyWriter};
use crate::pipeline::{ColumnTransposer, PagedRowIterator};
use crate::source::{CatalogReader, PageSource, PgSource};

/// File name of the schema document inside the output directory.
pub const METADATA_FILE: &str = "metadata.json";

/// Export orchestrator.
pub struct Orchestrator {
    config: Config,
    source: PgSource,
}

/// Per-table outcome.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableExport {
    pub table: String,
    pub rows: u64,
    pub columns: usize,
    pub pages: u64,
    pub conversion_warnings: u64,
}

/// Result of an export run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportResult {
    /// Final status: "completed" or "dry_run".
    pub status: String,

    pub dataset_name: String,

    /// Total duration in seconds.
    pub duration_seconds: f64,

    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,

    /// Tables exported (or planned, for a dry run).
    pub tables_total: usize,

    /// Total rows exported.
    pub rows_exported: u64,

    /// Column files written.
    pub columns_written: usize,

    /// Values replaced by their zero value.
    pub conversion_warnings: u64,

    pub output_dir: PathBuf,

    pub tables: Vec<TableExport>,
}

impl ExportResult {
    /// Serialize as pretty-printed JSON.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Result of a connection health check.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthCheckResult {
    pub connected: bool,
    pub latency_ms: u64,
    pub error: Option<String>,
    pub healthy: bool,
}

impl Orchestrator {
    /// Connect to the source described by `config`.
    pub async fn new(config: Config) -> Result<Self> {
        config.validate()?;
        let source = PgSource::connect(&config.source).await?;
        Ok(Self { config, source })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Discover the schema of the configured selection.
    pub async fn discover(&self) -> Result<SchemaDetails> {
        discover(&self.source, &self.config).await
    }

    /// Run the export. A dry run stops after discovery and writes nothing.
    pub async fn run(&self, dry_run: bool) -> Result<ExportResult> {
        let writer = NpyWriter::new(&self.config.export.output_dir);
        run_export(&self.source, &writer, &self.config, dry_run).await
    }
}

/// Connect to `source` and time a `SELECT 1`.
///
/// Connection failures are reported in the result rather than returned.
pub async fn health_check(source: &SourceConfig) -> HealthCheckResult {
    let outcome = match PgSource::connect(source).await {
        Ok(pg) => pg.ping().await,
        Err(e) => Err(e),
    };

    match outcome {
        Ok(latency) => HealthCheckResult {
            connected: true,
            latency_ms: latency.as_millis() as u64,
            error: None,
            healthy: true,
        },
        Err(e) => {
            warn!("Health check failed: {}", e);
            HealthCheckResult {
                connected: false,
                latency_ms: 0,
                error: Some(e.to_string()),
                healthy: false,
            }
        }
    }
}

/// Discover the schema for the configured selection.
pub async fn discover<C>(catalog: &C, config: &Config) -> Result<SchemaDetails>
where
    C: CatalogReader + ?Sized,
{
    let introspector =
        SchemaIntrospector::new(catalog).with_dataset_name(config.dataset_name());
    introspector.discover(&config.export.selected_tables()).await
}

/// Run a complete export against any source and writer.
pub async fn run_export<S, W>(
    source: &S,
    writer: &W,
    config: &Config,
    dry_run: bool,
) -> Result<ExportResult>
where
    S: CatalogReader + PageSource + ?Sized,
    W: ArrayWriter + ?Sized,
{
    config.validate()?;

    let started_at = Utc::now();
    let timer = Instant::now();
    let output_dir = config.export.output_dir.clone();

    info!("Phase 1: Discovering schema");
    let schema = discover(source, config).await?;

    if dry_run {
        for table in &schema.tables {
            info!(
                "Would export {} ({} columns) to {}",
                table.table_name,
                table.fields.len(),
                output_dir.join(&table.table_name).display()
            );
        }
        return Ok(ExportResult {
            status: "dry_run".to_string(),
            dataset_name: schema.dataset_metadata.dataset_name.clone(),
            duration_seconds: timer.elapsed().as_secs_f64(),
            started_at,
            completed_at: Utc::now(),
            tables_total: schema.tables.len(),
            rows_exported: 0,
            columns_written: 0,
            conversion_warnings: 0,
            output_dir,
            tables: Vec::new(),
        });
    }

    info!("Phase 2: Writing schema metadata");
    write_metadata(&output_dir, &schema)?;

    info!("Phase 3: Exporting {} tables", schema.tables.len());
    let page_size = config.export.page_size;
    let mut tables = Vec::with_capacity(schema.tables.len());

    for table in &schema.tables {
        let capacity = match source.row_count(&table.table_name).await {
            Ok(n) => n as usize,
            Err(e) => {
                warn!(
                    "Could not count rows of {}: {}; arrays will grow as rows arrive",
                    table.table_name, e
                );
                0
            }
        };
        info!("Exporting {} (~{} rows)", table.table_name, capacity);

        let mut iter = PagedRowIterator::new(source, table, page_size);
        let mut transposer = ColumnTransposer::new(table, capacity);

        while let Some(row) = iter.next_row().await {
            transposer.push_row(row);
            if transposer.rows() % page_size as u64 == 0 {
                info!("{}: {} rows read", table.table_name, transposer.rows());
            }
        }

        let pages = iter.pages_fetched();
        let warnings = iter.warnings() + transposer.warnings();
        if let Some(e) = iter.into_error() {
            return Err(e);
        }

        let rows = transposer.rows();
        let columns = transposer.finish();
        for column in &columns {
            writer.write_column(&table.table_name, column)?;
        }

        info!(
            "Exported {}: {} rows, {} columns, {} pages",
            table.table_name,
            rows,
            columns.len(),
            pages
        );
        if warnings > 0 {
            warn!(
                "{}: {} values replaced by their zero value",
                table.table_name, warnings
            );
        }

        tables.push(TableExport {
            table: table.table_name.clone(),
            rows,
            columns: columns.len(),
            pages,
            conversion_warnings: warnings,
        });
    }

    let result = ExportResult {
        status: "completed".to_string(),
        dataset_name: schema.dataset_metadata.dataset_name.clone(),
        duration_seconds: timer.elapsed().as_secs_f64(),
        started_at,
        completed_at: Utc::now(),
        tables_total: tables.len(),
        rows_exported: tables.iter().map(|t| t.rows).sum(),
        columns_written: tables.iter().map(|t| t.columns).sum(),
        conversion_warnings: tables.iter().map(|t| t.conversion_warnings).sum(),
        output_dir,
        tables,
    };

    info!(
        "Export completed: {} tables, {} rows in {:.2}s",
        result.tables_total, result.rows_exported, result.duration_seconds
    );
    Ok(result)
}

/// Write `metadata.json` into `output_dir`, creating the directory if needed.
pub fn write_metadata(output_dir: &Path, schema: &SchemaDetails) -> Result<PathBuf> {
    std::fs::create_dir_all(output_dir).map_err(|e| ExportError::write(output_dir, e))?;
    let path = output_dir.join(METADATA_FILE);
    let json = schema.to_json()?;
    std::fs::write(&path, json).map_err(|e| ExportError::write(&path, e))?;
    info!("Wrote schema metadata to {}", path.display());
    Ok(path)
}
