//! # Fixture Providers
//!
//! Container-backed backends for the built-in resource kinds, built on
//! `testcontainers`:
//! - `postgres`: `RELATIONAL-POSTGRES`, exports `datasource.*`
//! - `mysql`: `RELATIONAL-MYSQL`, exports `datasource.*`
//! - `kafka`: `BROKER-KAFKA`, exports `broker.bootstrap-servers`
//! - `ollama`: `INFERENCE-OLLAMA`, pulls the model when missing and exports
//!   `ai.*`
//!
//! Call [`install`] once per process to register them with
//! `ProviderRegistry::global()`, or [`register_builtin_providers`] for a
//! registry of your own.

pub mod container;
pub mod kafka;
pub mod mysql;
pub mod ollama;
pub mod postgres;

pub use container::{ContainerHandle, TracingLogConsumer};
pub use kafka::KafkaBackend;
pub use mysql::MysqlBackend;
pub use ollama::{ModelStatus, OllamaBackend, OllamaClient};
pub use postgres::PostgresBackend;

use lifecycle::ProviderRegistry;
use std::sync::Once;

static INSTALL: Once = Once::new();

pub fn register_builtin_providers(registry: &ProviderRegistry) {
    registry.register_backend(PostgresBackend);
    registry.register_backend(MysqlBackend);
    registry.register_backend(KafkaBackend);
    registry.register_backend(OllamaBackend);
}

/// Registers the built-in backends with the global registry. Later calls are
/// no-ops.
pub fn install() {
    INSTALL.call_once(|| register_builtin_providers(&ProviderRegistry::global()));
}
