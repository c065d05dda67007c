//! # Environment Variable Loader
//!
//! Reads fixture engine settings from the environment.
//!
//! # Variables
//! - `FX_REUSE_ENABLE`: process-wide reuse default (`true`/`false`). Falls back
//!   to `TESTCONTAINERS_REUSE_ENABLE` when unset.
//! - `FX_REUSE_OVERRIDES`: per-kind pins, e.g.
//!   `RELATIONAL-POSTGRES=true,BROKER-KAFKA=false`
//! - `FX_FORWARD_CONTAINER_LOGS`: forward container output into `tracing`
//! - `FX_LOG_LEVEL`: engine log level
//! - `FX_CONFIG_FILE`: optional TOML/YAML file read by [`crate::load`]

use errors::{FixtureError, FixtureResult};
use fixture_core::ResourceKind;
use std::collections::BTreeMap;
use std::env;
use std::str::FromStr;

pub const ENV_REUSE_ENABLE: &str = "FX_REUSE_ENABLE";
pub const ENV_TESTCONTAINERS_REUSE_ENABLE: &str = "TESTCONTAINERS_REUSE_ENABLE";
pub const ENV_REUSE_OVERRIDES: &str = "FX_REUSE_OVERRIDES";
pub const ENV_FORWARD_CONTAINER_LOGS: &str = "FX_FORWARD_CONTAINER_LOGS";
pub const ENV_LOG_LEVEL: &str = "FX_LOG_LEVEL";
pub const ENV_CONFIG_FILE: &str = "FX_CONFIG_FILE";

/// Settings found in the environment. Unset variables stay `None` so they
/// never mask values coming from a configuration file.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EnvOverrides {
    pub reuse_enabled: Option<bool>,
    pub reuse_overrides: BTreeMap<ResourceKind, bool>,
    pub forward_container_logs: Option<bool>,
    pub log_level: Option<String>,
}

/// Load fixture settings from environment variables.
///
/// ## Usage
/// ```rust,no_run
/// use config::load_from_env;
///
/// fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let overrides = load_from_env()?;
///     println!("reuse: {:?}", overrides.reuse_enabled);
///     Ok(())
/// }
/// ```
///
/// ## Error Handling
/// Values that are present but unparsable fail with
/// `FixtureError::Configuration` instead of silently falling back.
pub fn load_from_env() -> FixtureResult<EnvOverrides> {
    let reuse_enabled = match parse_env::<bool>(ENV_REUSE_ENABLE)? {
        Some(value) => Some(value),
        None => parse_env::<bool>(ENV_TESTCONTAINERS_REUSE_ENABLE)?,
    };

    let reuse_overrides = match env::var(ENV_REUSE_OVERRIDES) {
        Ok(raw) => parse_reuse_overrides(&raw)?,
        Err(_) => BTreeMap::new(),
    };

    Ok(EnvOverrides {
        reuse_enabled,
        reuse_overrides,
        forward_container_logs: parse_env(ENV_FORWARD_CONTAINER_LOGS)?,
        log_level: env::var(ENV_LOG_LEVEL).ok(),
    })
}

/// Parses `KIND=bool` pairs separated by commas.
pub fn parse_reuse_overrides(raw: &str) -> FixtureResult<BTreeMap<ResourceKind, bool>> {
    let mut overrides = BTreeMap::new();
    for pair in raw.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        let (kind, flag) = pair.split_once('=').ok_or_else(|| FixtureError::Configuration {
            message: format!("{ENV_REUSE_OVERRIDES}: expected KIND=bool, got '{pair}'"),
        })?;
        let kind = ResourceKind::from_str(kind.trim()).map_err(|_| FixtureError::Configuration {
            message: format!("{ENV_REUSE_OVERRIDES}: unknown resource kind '{}'", kind.trim()),
        })?;
        let flag = flag
            .trim()
            .parse::<bool>()
            .map_err(|e| FixtureError::Configuration {
                message: format!("{ENV_REUSE_OVERRIDES}: {kind}: {e}"),
            })?;
        overrides.insert(kind, flag);
    }
    Ok(overrides)
}

fn parse_env<T>(key: &str) -> FixtureResult<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(key) {
        Ok(s) => s
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|e| FixtureError::Configuration {
                message: format!("{key}: {e}"),
            }),
        Err(_) => Ok(None),
    }
}
