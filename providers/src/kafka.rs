//! Kafka backend on the official `apache/kafka` image.

use crate::container::{ContainerHandle, prepare};
use errors::FixtureResult;
use fixture_core::{Backend, FixtureParameters, ResourceKind, ResourceSpec};
use testcontainers::ImageExt;
use testcontainers_modules::kafka::apache::Kafka as Apache;

/// Plaintext listener advertised to the host.
pub const KAFKA_PORT: u16 = 9092;

pub fn bootstrap_parameters(address: &str) -> FixtureParameters {
    FixtureParameters::new().with("broker.bootstrap-servers", address)
}

#[derive(Debug, Clone, Copy, Default)]
pub struct KafkaBackend;

impl Backend for KafkaBackend {
    type Handle = ContainerHandle<Apache>;

    fn kind(&self) -> ResourceKind {
        ResourceKind::BrokerKafka
    }

    fn default_image(&self) -> Option<&str> {
        Some("apache/kafka")
    }

    fn default_version(&self) -> Option<&str> {
        Some("3.9.1")
    }

    fn create_handle(&self, spec: &ResourceSpec) -> FixtureResult<Self::Handle> {
        let request = Apache::default()
            .with_name(spec.image.as_str())
            .with_tag(spec.version.as_str());

        Ok(ContainerHandle::new(
            format!("kafka container {}", spec.image_ref()),
            prepare(request, spec),
            &[KAFKA_PORT],
        ))
    }

    fn export_parameters(
        &self,
        handle: &Self::Handle,
        _spec: &ResourceSpec,
    ) -> FixtureResult<FixtureParameters> {
        Ok(bootstrap_parameters(&handle.address(KAFKA_PORT)?))
    }
}
