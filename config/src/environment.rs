//! # Layered Property Sources
//!
//! An ordered stack of named key-value sources. Lookups walk the stack from
//! the front, so a source added with [`PropertySources::add_first`] overrides
//! every source already present. This is the in-process configuration sink
//! fixture parameters are published into.

use fixture_core::{ConfigSink, FixtureParameters};
use parking_lot::RwLock;
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq)]
pub struct PropertySource {
    pub name: String,
    pub properties: FixtureParameters,
}

#[derive(Debug, Default)]
pub struct PropertySources {
    sources: RwLock<Vec<PropertySource>>,
}

impl PropertySources {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a source with the highest precedence, replacing any source with
    /// the same name.
    pub fn add_first(&self, name: &str, properties: FixtureParameters) {
        let mut sources = self.sources.write();
        sources.retain(|s| s.name != name);
        sources.insert(
            0,
            PropertySource {
                name: name.to_string(),
                properties,
            },
        );
    }

    /// Adds a source with the lowest precedence, replacing any source with
    /// the same name.
    pub fn add_last(&self, name: &str, properties: FixtureParameters) {
        let mut sources = self.sources.write();
        sources.retain(|s| s.name != name);
        sources.push(PropertySource {
            name: name.to_string(),
            properties,
        });
    }

    pub fn remove(&self, name: &str) -> bool {
        let mut sources = self.sources.write();
        let before = sources.len();
        sources.retain(|s| s.name != name);
        sources.len() != before
    }

    pub fn contains_source(&self, name: &str) -> bool {
        self.sources.read().iter().any(|s| s.name == name)
    }

    /// Source names, highest precedence first.
    pub fn source_names(&self) -> Vec<String> {
        self.sources.read().iter().map(|s| s.name.clone()).collect()
    }

    pub fn get(&self, key: &str) -> Option<String> {
        self.sources
            .read()
            .iter()
            .find_map(|s| s.properties.get(key).map(str::to_string))
    }

    /// Every key resolved against the stack.
    pub fn snapshot(&self) -> BTreeMap<String, String> {
        let mut resolved = BTreeMap::new();
        for source in self.sources.read().iter().rev() {
            for (key, value) in source.properties.iter() {
                resolved.insert(key.to_string(), value.to_string());
            }
        }
        resolved
    }
}

impl ConfigSink for PropertySources {
    fn add_first(&self, source: &str, overrides: &FixtureParameters) {
        PropertySources::add_first(self, source, overrides.clone());
    }

    fn remove_source(&self, source: &str) -> bool {
        self.remove(source)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn application_properties() -> FixtureParameters {
        FixtureParameters::new()
            .with("datasource.url", "jdbc:postgresql://prod:5432/app")
            .with("server.port", "8080")
    }

    #[test]
    fn test_add_first_overrides_existing_sources() {
        let env = PropertySources::new();
        env.add_last("application", application_properties());
        env.add_first(
            "fixtures:orders",
            FixtureParameters::new()
                .with("datasource.url", "jdbc:postgresql://localhost:49153/test"),
        );

        assert_eq!(
            env.get("datasource.url").as_deref(),
            Some("jdbc:postgresql://localhost:49153/test")
        );
        assert_eq!(env.get("server.port").as_deref(), Some("8080"));
        assert_eq!(env.source_names(), vec!["fixtures:orders", "application"]);
    }

    #[test]
    fn test_remove_restores_lower_precedence_value() {
        let env = PropertySources::new();
        env.add_last("application", application_properties());
        env.add_first(
            "fixtures:orders",
            FixtureParameters::new().with("datasource.url", "jdbc:postgresql://localhost:1/test"),
        );

        assert!(env.remove("fixtures:orders"));
        assert!(!env.remove("fixtures:orders"));
        assert_eq!(
            env.get("datasource.url").as_deref(),
            Some("jdbc:postgresql://prod:5432/app")
        );
    }

    #[test]
    fn test_readding_source_replaces_it() {
        let env = PropertySources::new();
        env.add_first("fixtures:a", FixtureParameters::new().with("k", "1"));
        env.add_first("fixtures:b", FixtureParameters::new().with("k", "2"));
        env.add_first("fixtures:a", FixtureParameters::new().with("k", "3"));

        assert_eq!(env.source_names(), vec!["fixtures:a", "fixtures:b"]);
        assert_eq!(env.get("k").as_deref(), Some("3"));
    }

    #[test]
    fn test_snapshot_resolves_precedence() {
        let env = PropertySources::new();
        env.add_last("application", application_properties());
        ConfigSink::add_first(
            &env,
            "fixtures:orders",
            &FixtureParameters::new().with("datasource.url", "override"),
        );

        let snapshot = env.snapshot();
        assert_eq!(snapshot.get("datasource.url").map(String::as_str), Some("override"));
        assert_eq!(snapshot.get("server.port").map(String::as_str), Some("8080"));
    }
}
