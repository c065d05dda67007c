//! Publishes fixture parameters into the host configuration.

use fixture_core::{ConfigSink, FixtureParameters, TestClassId};
use std::sync::Arc;
use tracing::debug;

/// Prefix of every property source created for a test group.
pub const SOURCE_PREFIX: &str = "fixtures:";

#[derive(Clone)]
pub struct ConfigurationPublisher {
    sink: Arc<dyn ConfigSink>,
}

impl ConfigurationPublisher {
    pub fn new(sink: Arc<dyn ConfigSink>) -> Self {
        Self { sink }
    }

    pub fn source_name(class: &TestClassId) -> String {
        format!("{SOURCE_PREFIX}{class}")
    }

    /// Adds `parameters` as the highest-precedence source for `class`.
    pub fn publish(&self, class: &TestClassId, parameters: &FixtureParameters) {
        publish_into(self.sink.as_ref(), class, parameters);
    }

    pub fn retract(&self, class: &TestClassId) -> bool {
        let removed = self.sink.remove_source(&Self::source_name(class));
        debug!("Retracted fixture parameters of {} (present: {})", class, removed);
        removed
    }
}

impl std::fmt::Debug for ConfigurationPublisher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConfigurationPublisher").finish_non_exhaustive()
    }
}

pub(crate) fn publish_into(
    sink: &dyn ConfigSink,
    class: &TestClassId,
    parameters: &FixtureParameters,
) {
    let source = ConfigurationPublisher::source_name(class);
    debug!(
        "Publishing {} parameter(s) as source {}",
        parameters.len(),
        source
    );
    sink.add_first(&source, parameters);
}

/// Environment-variable form of the parameters, for child processes:
/// `datasource.url` becomes `DATASOURCE_URL`.
pub fn to_env_vars(parameters: &FixtureParameters) -> Vec<(String, String)> {
    parameters
        .iter()
        .map(|(key, value)| {
            let name: String = key
                .chars()
                .map(|c| match c {
                    '.' | '-' => '_',
                    c => c.to_ascii_uppercase(),
                })
                .collect();
            (name, value.to_string())
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use config::PropertySources;

    #[test]
    fn test_publish_and_retract() {
        let sources = Arc::new(PropertySources::new());
        sources.add_last(
            "application",
            FixtureParameters::new().with("datasource.url", "jdbc:postgresql://prod/app"),
        );
        let publisher = ConfigurationPublisher::new(sources.clone());
        let class = TestClassId::new("orders::RepositoryTest");

        publisher.publish(
            &class,
            &FixtureParameters::new().with("datasource.url", "jdbc:postgresql://localhost:5/test"),
        );
        assert_eq!(
            sources.get("datasource.url").as_deref(),
            Some("jdbc:postgresql://localhost:5/test")
        );
        assert!(sources.contains_source("fixtures:orders::RepositoryTest"));

        assert!(publisher.retract(&class));
        assert!(!publisher.retract(&class));
        assert_eq!(
            sources.get("datasource.url").as_deref(),
            Some("jdbc:postgresql://prod/app")
        );
    }

    #[test]
    fn test_to_env_vars() {
        let params = FixtureParameters::new()
            .with("broker.bootstrap-servers", "localhost:9092")
            .with("ai.chat.options.top-p", "0.8");

        assert_eq!(
            to_env_vars(&params),
            vec![
                ("BROKER_BOOTSTRAP_SERVERS".to_string(), "localhost:9092".to_string()),
                ("AI_CHAT_OPTIONS_TOP_P".to_string(), "0.8".to_string()),
            ]
        );
    }
}
