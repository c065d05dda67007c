use async_trait::async_trait;
use errors::{FixtureError, FixtureResult};
use fixture_core::{
    AttributeValue, Backend, FixtureParameters, ResourceHandle, ResourceKind, ResourceSpec,
};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU16, AtomicUsize, Ordering};

static NEXT_PORT: AtomicU16 = AtomicU16::new(41000);

#[derive(Debug, Default)]
struct Counters {
    creates: AtomicUsize,
    starts: AtomicUsize,
    stops: AtomicUsize,
    fail_start: AtomicBool,
    fail_after_start: AtomicBool,
    fail_stop: AtomicBool,
}

/// Shared view on what fake handles did. Clones observe the same counters.
#[derive(Debug, Clone, Default)]
pub struct FakeCounters {
    inner: Arc<Counters>,
}

impl FakeCounters {
    pub fn creates(&self) -> usize {
        self.inner.creates.load(Ordering::SeqCst)
    }

    pub fn starts(&self) -> usize {
        self.inner.starts.load(Ordering::SeqCst)
    }

    pub fn stops(&self) -> usize {
        self.inner.stops.load(Ordering::SeqCst)
    }

    /// The next `start` of any handle sharing these counters fails.
    pub fn fail_next_start(&self) {
        self.inner.fail_start.store(true, Ordering::SeqCst);
    }

    pub fn fail_next_stop(&self) {
        self.inner.fail_stop.store(true, Ordering::SeqCst);
    }

    /// The next post-start hook fails after its handle has started.
    pub fn fail_next_after_start(&self) {
        self.inner.fail_after_start.store(true, Ordering::SeqCst);
    }
}

#[derive(Debug, Clone)]
pub struct FakeBackend {
    kind: ResourceKind,
    counters: FakeCounters,
    defaults: Option<(String, String)>,
}

impl FakeBackend {
    pub fn new(kind: ResourceKind) -> Self {
        Self {
            kind,
            counters: FakeCounters::default(),
            defaults: None,
        }
    }

    pub fn with_counters(mut self, counters: FakeCounters) -> Self {
        self.counters = counters;
        self
    }

    pub fn with_defaults(mut self, image: &str, version: &str) -> Self {
        self.defaults = Some((image.to_string(), version.to_string()));
        self
    }

    pub fn counters(&self) -> &FakeCounters {
        &self.counters
    }
}

#[derive(Debug)]
pub struct FakeHandle {
    label: String,
    port: u16,
    running: bool,
    counters: FakeCounters,
}

impl FakeHandle {
    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn is_running(&self) -> bool {
        self.running
    }
}

#[async_trait]
impl ResourceHandle for FakeHandle {
    async fn start(&mut self) -> FixtureResult<()> {
        if self.counters.inner.fail_start.swap(false, Ordering::SeqCst) {
            return Err(FixtureError::ResourceStartFailure {
                resource: self.label.clone(),
                reason: "simulated start failure".to_string(),
            });
        }
        self.counters.inner.starts.fetch_add(1, Ordering::SeqCst);
        self.running = true;
        Ok(())
    }

    async fn stop(&mut self) -> FixtureResult<()> {
        if self.counters.inner.fail_stop.swap(false, Ordering::SeqCst) {
            return Err(FixtureError::ResourceStopFailure {
                resource: self.label.clone(),
                reason: "simulated stop failure".to_string(),
            });
        }
        self.counters.inner.stops.fetch_add(1, Ordering::SeqCst);
        self.running = false;
        Ok(())
    }

    fn describe(&self) -> String {
        format!("{} on port {}", self.label, self.port)
    }
}

#[async_trait]
impl Backend for FakeBackend {
    type Handle = FakeHandle;

    fn kind(&self) -> ResourceKind {
        self.kind
    }

    fn default_image(&self) -> Option<&str> {
        self.defaults.as_ref().map(|(image, _)| image.as_str())
    }

    fn default_version(&self) -> Option<&str> {
        self.defaults.as_ref().map(|(_, version)| version.as_str())
    }

    fn create_handle(&self, spec: &ResourceSpec) -> FixtureResult<FakeHandle> {
        if spec.kind == ResourceKind::InferenceOllama && spec.text_attribute("model").is_none() {
            return Err(FixtureError::MissingRequiredAttribute {
                kind: spec.kind.to_string(),
                attribute: "model".to_string(),
            });
        }
        self.counters.inner.creates.fetch_add(1, Ordering::SeqCst);
        Ok(FakeHandle {
            label: format!("fake {}", spec.image_ref()),
            port: NEXT_PORT.fetch_add(1, Ordering::SeqCst),
            running: false,
            counters: self.counters.clone(),
        })
    }

    async fn after_start(
        &self,
        handle: &mut FakeHandle,
        spec: &ResourceSpec,
    ) -> FixtureResult<()> {
        if self.counters.inner.fail_after_start.swap(false, Ordering::SeqCst) {
            return Err(FixtureError::ModelProvisioningFailed {
                model: spec.text_attribute("model").unwrap_or("none").to_string(),
                reason: format!("simulated hook failure on {}", handle.label),
            });
        }
        Ok(())
    }

    fn export_parameters(
        &self,
        handle: &FakeHandle,
        spec: &ResourceSpec,
    ) -> FixtureResult<FixtureParameters> {
        let port = handle.port;
        let params = match spec.kind {
            ResourceKind::RelationalPostgres => FixtureParameters::new()
                .with("datasource.url", format!("jdbc:postgresql://localhost:{port}/test"))
                .with("datasource.username", "test")
                .with("datasource.password", "test"),
            ResourceKind::RelationalMysql => FixtureParameters::new()
                .with("datasource.url", format!("jdbc:mysql://localhost:{port}/test"))
                .with("datasource.username", "test")
                .with("datasource.password", "test"),
            ResourceKind::BrokerKafka => FixtureParameters::new()
                .with("broker.bootstrap-servers", format!("localhost:{port}")),
            ResourceKind::InferenceOllama => {
                let option = |key: &str| {
                    spec.attribute("options")
                        .and_then(|o| o.get(key))
                        .and_then(AttributeValue::as_text)
                        .unwrap_or_default()
                        .to_string()
                };
                FixtureParameters::new()
                    .with("ai.base-url", format!("http://localhost:{port}"))
                    .with("ai.chat.model", spec.text_attribute("model").unwrap_or_default())
                    .with("ai.chat.options.temperature", option("temperature"))
                    .with("ai.chat.options.top-p", option("topP"))
            }
        };
        Ok(params)
    }
}
