//! Shared test helpers for the fixture workspace.
//!
//! - `FakeBackend` / `FakeHandle`: in-memory backends with observable start
//!   and stop counters and switchable failures, exporting the same keys the
//!   container backends export
//! - `unique_id`: process-unique names for test groups
//! - `init_tracing`: test-writer subscriber honouring `RUST_LOG`, else the
//!   configured `logging.level`
//! - `assert_exported_keys`: the exact parameter keys each resource kind exports
//! - `docker_available`: lets container tests skip on hosts without Docker

mod fakes;

pub use fakes::*;

use config::LoggingConfig;
use fixture_core::{FixtureParameters, ResourceKind};
use std::sync::Once;
use std::sync::atomic::{AtomicU32, Ordering};
use tracing_subscriber::EnvFilter;

static TEST_COUNTER: AtomicU32 = AtomicU32::new(0);
static TRACING: Once = Once::new();

pub fn unique_id(prefix: &str) -> String {
    let id = TEST_COUNTER.fetch_add(1, Ordering::SeqCst);
    format!("{}-{}", prefix, id)
}

/// Installs the test subscriber once per process, filtered by `RUST_LOG`
/// or, when unset, the level from `FX_CONFIG_FILE` / `FX_LOG_LEVEL`.
pub fn init_tracing() {
    let logging = config::load().map(|c| c.logging).unwrap_or_default();
    init_tracing_with(&logging);
}

pub fn init_tracing_with(logging: &LoggingConfig) {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(
                EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| EnvFilter::new(default_directive(logging))),
            )
            .with_test_writer()
            .try_init();
    });
}

fn default_directive(logging: &LoggingConfig) -> String {
    logging.level.to_lowercase()
}

/// Keys a provider of `kind` exports, in export order.
pub fn exported_keys(kind: ResourceKind) -> &'static [&'static str] {
    match kind {
        ResourceKind::RelationalPostgres | ResourceKind::RelationalMysql => &[
            "datasource.url",
            "datasource.username",
            "datasource.password",
        ],
        ResourceKind::BrokerKafka => &["broker.bootstrap-servers"],
        ResourceKind::InferenceOllama => &[
            "ai.base-url",
            "ai.chat.model",
            "ai.chat.options.temperature",
            "ai.chat.options.top-p",
        ],
    }
}

/// Asserts `params` holds exactly the keys of `kind`, each with a value.
pub fn assert_exported_keys(kind: ResourceKind, params: &FixtureParameters) {
    let keys: Vec<&str> = params.keys().collect();
    assert_eq!(keys, exported_keys(kind), "{kind} exported unexpected keys");
    for (key, value) in params.iter() {
        assert!(!value.is_empty(), "{kind} exported an empty {key}");
    }
}

/// Whether a Docker daemon looks reachable, via `DOCKER_HOST` or the default
/// unix socket.
pub fn docker_available() -> bool {
    if std::env::var_os("DOCKER_HOST").is_some() {
        return true;
    }
    std::path::Path::new("/var/run/docker.sock").exists()
}
