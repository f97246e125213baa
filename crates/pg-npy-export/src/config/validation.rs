//! Configuration validation.

use super::Config;
use crate::error::{ExportError, Result};
use crate::source::SslMode;

/// Validate the configuration.
pub fn validate(config: &Config) -> Result<()> {
    // Source validation
    if config.source.host.is_empty() {
        return Err(ExportError::Config("source.host is required".into()));
    }
    if config.source.database.is_empty() {
        return Err(ExportError::Config("source.database is required".into()));
    }
    if config.source.user.is_empty() {
        return Err(ExportError::Config("source.user is required".into()));
    }
    if config.source.schema.is_empty() {
        return Err(ExportError::Config("source.schema cannot be empty".into()));
    }
    config.source.ssl_mode.parse::<SslMode>()?;

    // Export validation
    if config.export.tables.is_empty() {
        return Err(ExportError::Config(
            "export.tables must name at least one table".into(),
        ));
    }
    if config.export.tables.iter().any(|t| t.trim().is_empty()) {
        return Err(ExportError::Config(
            "export.tables cannot contain empty names".into(),
        ));
    }
    if config.export.page_size == 0 {
        return Err(ExportError::Config(
            "export.page_size must be at least 1".into(),
        ));
    }

    Ok(())
}
