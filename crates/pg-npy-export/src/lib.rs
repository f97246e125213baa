//! # pg-npy-export
//!
//! Export PostgreSQL tables as per-column NumPy arrays.
//!
//! For every selected table the library writes one `.npy` file per column
//! under `<output_dir>/<table>/`, plus a single `metadata.json` describing
//! the dataset:
//!
//! - **Schema discovery** with canonical types, primary keys and foreign
//!   keys restricted to the exported table set
//! - **Paged streaming** of rows with a deterministic `ORDER BY`
//! - **Null normalization** to per-type zero values so arrays stay dense
//! - **Column transposition** into fixed-dtype NumPy arrays
//!
//! ## Example
//!
//! ```rust,no_run
//! use pg_npy_export::{Config, Orchestrator};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::load("config.yaml")?;
//!     let orchestrator = Orchestrator::new(config).await?;
//!     let result = orchestrator.run(false).await?;
//!     println!("Exported {} rows", result.rows_exported);
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod core;
pub mod error;
pub mod introspect;
pub mod npy;
pub mod orchestrator;
pub mod pipeline;
pub mod source;

#[cfg(test)]
mod testing;

// Re-exports for convenient access
pub use config::{Config, ExportConfig, SourceConfig};
pub use core::{CanonicalType, FieldMetadata, Row, SchemaDetails, TableMetadata, Value};
pub use error::{ExportError, Result};
pub use introspect::SchemaIntrospector;
pub use npy::{ArrayWriter, NpyWriter};
pub use orchestrator::{health_check, ExportResult, HealthCheckResult, Orchestrator, TableExport};
pub use pipeline::{ColumnArray, ColumnTransposer, PagedRowIterator};
pub use source::{CatalogReader, PageSource, PgSource};
