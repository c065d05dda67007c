//! # Configuration System
//!
//! Configuration for the fixture provisioning engine.
//!
//! This crate provides:
//! - `FixtureConfig`: reuse policy, logging and extra tag definitions
//! - Environment variable loading (`FX_*`)
//! - Configuration file loading (TOML/YAML)
//! - Configuration precedence (env > file > defaults)
//! - `PropertySources`: the layered key-value sink fixture parameters are
//!   published into

pub mod config;
pub mod environment;
pub mod file_loader;
pub mod loader;
pub mod precedence;

pub use config::{FixtureConfig, LoggingConfig, ReuseConfig};
pub use environment::{PropertySource, PropertySources};
pub use file_loader::{ConfigFileError, load_from_file, load_from_toml, load_from_yaml};
pub use loader::{EnvOverrides, load_from_env};
pub use precedence::merge_configs;
pub use validator::Validate;

use errors::{FixtureError, FixtureResult};
use std::path::Path;

/// Resolve the effective configuration: defaults, then the file named by
/// `FX_CONFIG_FILE` (if set), then the remaining `FX_*` variables.
pub fn load() -> FixtureResult<FixtureConfig> {
    let file_config = match std::env::var(loader::ENV_CONFIG_FILE) {
        Ok(path) => Some(load_from_file(Path::new(&path)).map_err(|e| {
            FixtureError::Configuration {
                message: format!("{path}: {e}"),
            }
        })?),
        Err(_) => None,
    };

    let config = merge_configs(
        FixtureConfig::default(),
        file_config,
        "file",
        load_from_env()?,
        "env",
    );

    config.validate().map_err(|e| FixtureError::Configuration {
        message: e.to_string(),
    })?;

    Ok(config)
}
