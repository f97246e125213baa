//! Configuration loading and validation.

mod types;
mod validation;

pub use types::*;

use crate::error::{ExportError, Result};
use std::path::Path;

impl Config {
    /// Load and validate configuration from a YAML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let config = Self::read(path)?;
        config.validate()?;
        Ok(config)
    }

    /// Read configuration from a YAML file without validating it.
    ///
    /// Used by callers that apply overrides before validation.
    pub fn read<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::parse_yaml(&content)
    }

    /// Parse and validate configuration from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config = Self::parse_yaml(yaml)?;
        config.validate()?;
        Ok(config)
    }

    fn parse_yaml(yaml: &str) -> Result<Self> {
        serde_yaml::from_str(yaml)
            .map_err(|e| ExportError::Config(format!("invalid configuration file: {}", e)))
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        validation::validate(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"
source:
  host: localhost
  database: app_db
  user: postgres
  password: secret
export:
  tables: [users, sessions]
"#;

    #[test]
    fn test_from_yaml_applies_defaults() {
        let config = Config::from_yaml(MINIMAL).unwrap();
        assert_eq!(config.source.port, 5432);
        assert_eq!(config.source.schema, "public");
        assert_eq!(config.source.ssl_mode, "disable");
        assert_eq!(config.export.page_size, 10_000);
        assert_eq!(config.export.output_dir, std::path::PathBuf::from("data"));
        assert_eq!(config.dataset_name(), "app_db");
    }

    #[test]
    fn test_dataset_name_override() {
        let yaml = format!("{}  dataset_name: analytics\n", MINIMAL);
        let config = Config::from_yaml(&yaml).unwrap();
        assert_eq!(config.dataset_name(), "analytics");
    }

    #[test]
    fn test_invalid_yaml_is_config_error() {
        let err = Config::from_yaml("source: [unterminated").unwrap_err();
        assert!(matches!(err, ExportError::Config(_)));
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn test_empty_document_is_config_error() {
        let err = Config::from_yaml("").unwrap_err();
        assert!(matches!(err, ExportError::Config(_)));
    }

    #[test]
    fn test_read_skips_validation() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        std::fs::write(
            &path,
            "source:\n  host: localhost\n  database: db\n  user: u\n",
        )
        .unwrap();

        let config = Config::read(&path).unwrap();
        assert!(config.export.tables.is_empty());
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_selected_tables_dedupes_in_order() {
        let mut config = Config::from_yaml(MINIMAL).unwrap();
        config.export.tables = vec![
            "sessions".into(),
            "users".into(),
            "sessions".into(),
            " users ".into(),
        ];
        assert_eq!(config.export.selected_tables(), vec!["sessions", "users"]);
    }
}
