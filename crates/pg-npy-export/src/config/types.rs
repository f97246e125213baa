//! Configuration type definitions.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Root configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Source database configuration (PostgreSQL).
    pub source: SourceConfig,

    /// Export behavior configuration.
    #[serde(default)]
    pub export: ExportConfig,
}

impl Config {
    /// Dataset name written to the schema metadata.
    ///
    /// Falls back to the source database name when not configured.
    pub fn dataset_name(&self) -> &str {
        self.export
            .dataset_name
            .as_deref()
            .filter(|name| !name.is_empty())
            .unwrap_or(&self.source.database)
    }
}

/// Source database (PostgreSQL) configuration.
#[derive(Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Database host.
    pub host: String,

    /// Database port (default: 5432).
    #[serde(default = "default_pg_port")]
    pub port: u16,

    /// Database name.
    pub database: String,

    /// Username.
    pub user: String,

    /// Password.
    #[serde(default)]
    pub password: String,

    /// Working schema (default: "public").
    #[serde(default = "default_public_schema")]
    pub schema: String,

    /// SSL mode (default: "disable").
    #[serde(default = "default_disable")]
    pub ssl_mode: String,
}

impl fmt::Debug for SourceConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SourceConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("database", &self.database)
            .field("user", &self.user)
            .field("password", &"[REDACTED]")
            .field("schema", &self.schema)
            .field("ssl_mode", &self.ssl_mode)
            .finish()
    }
}

/// Export behavior configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportConfig {
    /// Tables to export, in the order given. Required; there is no
    /// "export everything" default.
    #[serde(default)]
    pub tables: Vec<String>,

    /// Rows fetched per page while streaming a table (default: 10000).
    #[serde(default = "default_page_size")]
    pub page_size: usize,

    /// Directory receiving `metadata.json` and one sub-directory per table.
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,

    /// Dataset name for the schema metadata. Defaults to the database name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dataset_name: Option<String>,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            tables: Vec::new(),
            page_size: default_page_size(),
            output_dir: default_output_dir(),
            dataset_name: None,
        }
    }
}

impl ExportConfig {
    /// Requested tables with duplicates removed, keeping first-seen order.
    pub fn selected_tables(&self) -> Vec<String> {
        let mut seen = std::collections::HashSet::new();
        self.tables
            .iter()
            .map(|t| t.trim().to_string())
            .filter(|t| seen.insert(t.clone()))
            .collect()
    }
}

fn default_pg_port() -> u16 {
    5432
}

fn default_public_schema() -> String {
    "public".to_string()
}

fn default_disable() -> String {
    "disable".to_string()
}

fn default_page_size() -> usize {
    10_000
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("data")
}
