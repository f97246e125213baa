//! Error types for the export library.

use std::path::Path;

use thiserror::Error;

/// Main error type for export operations.
///
/// Every variant is fatal for the run. Value conversion problems are not
/// errors; see [`ConversionWarning`](crate::core::ConversionWarning).
#[derive(Error, Debug)]
pub enum ExportError {
    /// Configuration error (invalid YAML, missing fields, etc.)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Cannot establish or verify the database connection
    #[error("Connection error: {message}\n  Context: {context}")]
    Connection { message: String, context: String },

    /// Catalog query or scan failed during schema discovery
    #[error("Introspection failed: {message}\n  Context: {context}")]
    Introspection { message: String, context: String },

    /// Row fetch or scan failed while streaming a table
    #[error("Iteration failed for table {table}: {message}")]
    Iteration { table: String, message: String },

    /// Array artifact creation or encoding failed
    #[error("Write failed for {path}: {message}")]
    Write { path: String, message: String },

    /// IO error (file operations)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML serialization/deserialization error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ExportError {
    /// Create a Connection error with context about where it occurred
    pub fn connection(message: impl ToString, context: impl Into<String>) -> Self {
        ExportError::Connection {
            message: message.to_string(),
            context: context.into(),
        }
    }

    /// Create an Introspection error with context about the failing query
    pub fn introspection(message: impl ToString, context: impl Into<String>) -> Self {
        ExportError::Introspection {
            message: message.to_string(),
            context: context.into(),
        }
    }

    /// Create an Iteration error
    pub fn iteration(table: impl Into<String>, message: impl ToString) -> Self {
        ExportError::Iteration {
            table: table.into(),
            message: message.to_string(),
        }
    }

    /// Create a Write error for an output path
    pub fn write(path: &Path, message: impl ToString) -> Self {
        ExportError::Write {
            path: path.display().to_string(),
            message: message.to_string(),
        }
    }

    /// Process exit code for this error class.
    pub fn exit_code(&self) -> u8 {
        match self {
            ExportError::Config(_) => 2,
            ExportError::Connection { .. } => 3,
            ExportError::Introspection { .. } => 4,
            ExportError::Iteration { .. } => 5,
            ExportError::Write { .. }
            | ExportError::Io(_)
            | ExportError::Yaml(_)
            | ExportError::Json(_) => 6,
        }
    }

    /// Format error with full details including error chain
    pub fn format_detailed(&self) -> String {
        let mut output = format!("Error: {}\n", self);

        let mut source = std::error::Error::source(self);
        let mut depth = 1;
        while let Some(err) = source {
            output.push_str(&format!("\nCaused by:\n  {}: {}", depth, err));
            source = err.source();
            depth += 1;
        }

        output
    }
}

/// Result type alias for export operations.
pub type Result<T> = std::result::Result<T, ExportError>;
