//! # Configuration File Loading
//!
//! Loads fixture engine configuration from TOML or YAML files.
//!
//! Supports automatic format detection based on file extension.

use crate::config::FixtureConfig;
use std::path::Path;

/// Configuration file loading error.
#[derive(Debug, thiserror::Error)]
pub enum ConfigFileError {
    #[error("File not found: {0}")]
    FileNotFound(String),

    #[error("Failed to parse TOML: {0}")]
    TomlParse(String),

    #[error("Failed to parse YAML: {0}")]
    YamlParse(String),

    #[error("Config file has no extension")]
    NoExtension,

    #[error("Unsupported config file format: {0}")]
    UnsupportedFormat(String),
}

/// Load configuration from a TOML file.
///
/// ```toml
/// [reuse]
/// enabled = true
///
/// [reuse.overrides]
/// BROKER-KAFKA = false
///
/// [[tags]]
/// name = "orders-db"
/// meta_tags = [{ tag = "request-postgres" }]
/// attributes = { image = { default = "postgres" }, version = { default = "15.6" } }
/// ```
pub fn load_from_toml(path: &Path) -> Result<FixtureConfig, ConfigFileError> {
    let contents = std::fs::read_to_string(path)
        .map_err(|_e| ConfigFileError::FileNotFound(path.display().to_string()))?;

    toml::from_str(&contents).map_err(|e| ConfigFileError::TomlParse(e.to_string()))
}

/// Load configuration from a YAML file.
pub fn load_from_yaml(path: &Path) -> Result<FixtureConfig, ConfigFileError> {
    let contents = std::fs::read_to_string(path)
        .map_err(|_e| ConfigFileError::FileNotFound(path.display().to_string()))?;

    serde_yaml::from_str(&contents).map_err(|e| ConfigFileError::YamlParse(e.to_string()))
}

/// Load configuration from file, detecting the format from its extension
/// (`.toml`, `.yaml`, `.yml`).
pub fn load_from_file(path: &Path) -> Result<FixtureConfig, ConfigFileError> {
    let extension = path
        .extension()
        .and_then(|s| s.to_str())
        .ok_or(ConfigFileError::NoExtension)?;

    match extension.to_lowercase().as_str() {
        "toml" => load_from_toml(path),
        "yaml" | "yml" => load_from_yaml(path),
        other => Err(ConfigFileError::UnsupportedFormat(other.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fixture_core::ResourceKind;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_load_from_toml() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("fixtures.toml");

        let toml_content = r#"
[reuse]
enabled = true

[reuse.overrides]
BROKER-KAFKA = false

[logging]
forward_container_logs = true
level = "debug"

[[tags]]
name = "orders-db"
meta_tags = [{ tag = "request-postgres", values = { version = "15" } }]

[tags.attributes.image]
default = "postgres"

[tags.attributes.version]
default = "15.6"
"#;
        fs::write(&path, toml_content).unwrap();

        let config = load_from_toml(&path).unwrap();
        assert!(config.reuse.enabled);
        assert!(!config.reuse.reuse_for(ResourceKind::BrokerKafka));
        assert!(config.logging.forward_container_logs);
        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.tags.len(), 1);
        assert_eq!(config.tags[0].name, "orders-db");
        assert!(config.tags[0].carries("request-postgres").is_some());
        assert!(config.tags[0].declares("version"));
    }

    #[test]
    fn test_load_from_yaml() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("fixtures.yaml");

        let yaml_content = r#"
reuse:
  enabled: false
  overrides:
    RELATIONAL-POSTGRES: true
tags:
  - name: local-llm
    meta_tags:
      - tag: request-ollama
        values:
          model: llama3
          options:
            temperature: "0.1"
"#;
        fs::write(&path, yaml_content).unwrap();

        let config = load_from_yaml(&path).unwrap();
        assert!(config.reuse.reuse_for(ResourceKind::RelationalPostgres));
        assert!(!config.reuse.reuse_for(ResourceKind::RelationalMysql));
        let usage = config.tags[0].carries("request-ollama").unwrap();
        assert_eq!(
            usage
                .value("options")
                .and_then(|o| o.get("temperature"))
                .and_then(|t| t.as_text()),
            Some("0.1")
        );
    }

    #[test]
    fn test_load_from_file_unsupported() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("fixtures.json");
        fs::write(&path, "{}").unwrap();

        let result = load_from_file(&path);
        assert!(matches!(result, Err(ConfigFileError::UnsupportedFormat(_))));
    }

    #[test]
    fn test_load_from_file_no_extension() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("fixtures");
        fs::write(&path, "").unwrap();

        let result = load_from_file(&path);
        assert!(matches!(result, Err(ConfigFileError::NoExtension)));
    }

    #[test]
    fn test_load_from_toml_invalid() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("fixtures.toml");
        fs::write(&path, "[reuse\n").unwrap();

        let result = load_from_toml(&path);
        assert!(matches!(result, Err(ConfigFileError::TomlParse(_))));
    }

    #[test]
    fn test_load_from_toml_not_found() {
        let path = Path::new("/nonexistent/path/fixtures.toml");
        let result = load_from_toml(path);
        assert!(matches!(result, Err(ConfigFileError::FileNotFound(_))));
    }
}
