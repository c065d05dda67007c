//! # Configuration Structures
//!
//! Configuration of the fixture engine itself (not of the code under test).
//!
//! All configuration structures:
//! - Use `serde` for serialization/deserialization
//! - Use `validator` for input validation
//! - Default to the conservative setting (no reuse, no log forwarding)

use fixture_core::{ProvisionOptions, ResourceKind, TagDefinition};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use validator::{Validate, ValidationError};

/// Top-level fixture engine configuration.
///
/// ## Usage
/// ```rust,no_run
/// use config::FixtureConfig;
/// use fixture_core::ResourceKind;
///
/// let config = FixtureConfig::default();
/// assert!(!config.reuse.reuse_for(ResourceKind::RelationalPostgres));
/// ```
///
/// ## Fields
/// - `reuse`: cross-run reuse policy, global with per-kind overrides
/// - `logging`: engine log level and container log forwarding
/// - `tags`: additional tag definitions registered next to the built-in ones
#[derive(Debug, Clone, Serialize, Deserialize, Validate, Default, PartialEq)]
pub struct FixtureConfig {
    #[serde(default)]
    pub reuse: ReuseConfig,

    #[serde(default)]
    #[validate(nested)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub tags: Vec<TagDefinition>,
}

impl FixtureConfig {
    /// Options handed to a provider of `kind` at initialisation.
    pub fn provision_options(&self, kind: ResourceKind) -> ProvisionOptions {
        ProvisionOptions {
            reuse: self.reuse.reuse_for(kind),
            forward_logs: self.logging.forward_container_logs,
        }
    }
}

/// Cross-run reuse policy.
///
/// `enabled` is the process-wide default; `overrides` pins individual
/// resource kinds either way.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct ReuseConfig {
    #[serde(default)]
    pub enabled: bool,

    #[serde(default)]
    pub overrides: BTreeMap<ResourceKind, bool>,
}

impl ReuseConfig {
    pub fn reuse_for(&self, kind: ResourceKind) -> bool {
        self.overrides.get(&kind).copied().unwrap_or(self.enabled)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate, PartialEq)]
pub struct LoggingConfig {
    /// Forward container stdout/stderr into `tracing`.
    #[serde(default)]
    pub forward_container_logs: bool,

    #[serde(default = "default_log_level")]
    #[validate(custom(function = "validate_log_level"))]
    pub level: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            forward_container_logs: false,
            level: default_log_level(),
        }
    }
}

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

fn validate_log_level(level: &String) -> Result<(), ValidationError> {
    if LOG_LEVELS.contains(&level.to_lowercase().as_str()) {
        Ok(())
    } else {
        Err(ValidationError::new("unknown_log_level"))
    }
}
