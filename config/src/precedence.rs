//! # Configuration Precedence
//!
//! Merges fixture configuration from multiple sources.
//!
//! # Precedence Order
//! 1. Environment variables (highest priority)
//! 2. Configuration file
//! 3. Default values (lowest priority)

use crate::config::{FixtureConfig, LoggingConfig, ReuseConfig};
use crate::loader::EnvOverrides;

/// Merge the configuration sources.
///
/// ## Usage
/// ```rust,no_run
/// use config::{FixtureConfig, load_from_env, load_from_file, merge_configs};
/// use std::path::Path;
///
/// fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let from_file = load_from_file(Path::new("fixtures.toml"))?;
///     let from_env = load_from_env()?;
///
///     let _config =
///         merge_configs(FixtureConfig::default(), Some(from_file), "file", from_env, "env");
///     Ok(())
/// }
/// ```
///
/// ## Merge Rules
/// - File values replace defaults when they differ from the built-in default.
/// - Reuse overrides merge per kind; the later source wins for a kind.
/// - Tag definitions from the file are appended to the defaults' tags.
/// - Environment values apply only when the variable was set.
pub fn merge_configs(
    defaults: FixtureConfig,
    file_config: Option<FixtureConfig>,
    file_source_name: &str,
    env: EnvOverrides,
    env_source_name: &str,
) -> FixtureConfig {
    let mut config = defaults;

    if let Some(file) = file_config {
        config = merge_with_logging(config, file, file_source_name);
    }

    apply_env(&mut config, env, env_source_name);
    config
}

fn merge_with_logging(
    mut base: FixtureConfig,
    override_config: FixtureConfig,
    source_name: &str,
) -> FixtureConfig {
    let mut changes = Vec::new();

    merge_reuse(&mut base.reuse, &override_config.reuse, &mut changes);
    merge_logging(&mut base.logging, &override_config.logging, &mut changes);

    for tag in override_config.tags {
        changes.push(format!("tags += {}", tag.name));
        base.tags.push(tag);
    }

    if !changes.is_empty() {
        tracing::info!("Fixture configuration from {}: {:?}", source_name, changes);
    }

    base
}

fn merge_reuse(base: &mut ReuseConfig, override_config: &ReuseConfig, changes: &mut Vec<String>) {
    if override_config.enabled && !base.enabled {
        changes.push("reuse.enabled = true".to_string());
        base.enabled = true;
    }
    for (kind, flag) in &override_config.overrides {
        if base.overrides.get(kind) != Some(flag) {
            changes.push(format!("reuse.overrides.{kind} = {flag}"));
            base.overrides.insert(*kind, *flag);
        }
    }
}

fn merge_logging(
    base: &mut LoggingConfig,
    override_config: &LoggingConfig,
    changes: &mut Vec<String>,
) {
    if override_config.forward_container_logs && !base.forward_container_logs {
        changes.push("logging.forward_container_logs = true".to_string());
        base.forward_container_logs = true;
    }
    if override_config.level != LoggingConfig::default().level
        && override_config.level != base.level
    {
        changes.push(format!("logging.level = {}", override_config.level));
        base.level.clone_from(&override_config.level);
    }
}

fn apply_env(base: &mut FixtureConfig, env: EnvOverrides, source_name: &str) {
    let mut changes = Vec::new();

    if let Some(enabled) = env.reuse_enabled {
        if enabled != base.reuse.enabled {
            changes.push(format!("reuse.enabled = {enabled}"));
            base.reuse.enabled = enabled;
        }
    }
    for (kind, flag) in env.reuse_overrides {
        if base.reuse.overrides.get(&kind) != Some(&flag) {
            changes.push(format!("reuse.overrides.{kind} = {flag}"));
            base.reuse.overrides.insert(kind, flag);
        }
    }
    if let Some(forward) = env.forward_container_logs {
        if forward != base.logging.forward_container_logs {
            changes.push(format!("logging.forward_container_logs = {forward}"));
            base.logging.forward_container_logs = forward;
        }
    }
    if let Some(level) = env.log_level {
        if level != base.logging.level {
            changes.push(format!("logging.level = {level}"));
            base.logging.level = level;
        }
    }

    if !changes.is_empty() {
        tracing::info!("Fixture configuration from {}: {:?}", source_name, changes);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fixture_core::{ResourceKind, TagDefinition};

    #[test]
    fn test_merge_configs_precedence() {
        let mut file = FixtureConfig::default();
        file.reuse.enabled = true;
        file.logging.level = "debug".to_string();
        file.reuse
            .overrides
            .insert(ResourceKind::RelationalMysql, true);

        let env = EnvOverrides {
            reuse_enabled: Some(false),
            log_level: Some("warn".to_string()),
            ..Default::default()
        };

        let merged = merge_configs(FixtureConfig::default(), Some(file), "file", env, "env");

        assert!(!merged.reuse.enabled);
        assert!(merged.reuse.reuse_for(ResourceKind::RelationalMysql));
        assert_eq!(merged.logging.level, "warn");
    }

    #[test]
    fn test_unset_env_keeps_file_values() {
        let mut file = FixtureConfig::default();
        file.reuse.enabled = true;
        file.logging.forward_container_logs = true;

        let merged = merge_configs(
            FixtureConfig::default(),
            Some(file),
            "file",
            EnvOverrides::default(),
            "env",
        );

        assert!(merged.reuse.enabled);
        assert!(merged.logging.forward_container_logs);
    }

    #[test]
    fn test_env_override_per_kind_beats_file() {
        let mut file = FixtureConfig::default();
        file.reuse.overrides.insert(ResourceKind::BrokerKafka, true);

        let mut env = EnvOverrides::default();
        env.reuse_overrides.insert(ResourceKind::BrokerKafka, false);

        let merged = merge_configs(FixtureConfig::default(), Some(file), "file", env, "env");
        assert!(!merged.reuse.reuse_for(ResourceKind::BrokerKafka));
    }

    #[test]
    fn test_file_tags_appended() {
        let mut defaults = FixtureConfig::default();
        defaults.tags.push(TagDefinition::new("a"));
        let mut file = FixtureConfig::default();
        file.tags.push(TagDefinition::new("b"));

        let merged = merge_configs(defaults, Some(file), "file", EnvOverrides::default(), "env");
        let names: Vec<&str> = merged.tags.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["a", "b"]);
    }
}
