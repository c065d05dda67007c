//! Provider discovery.
//!
//! Providers are registered explicitly as factories. Lookup walks the
//! registration order and takes the first factory whose kind satisfies the
//! predicate, handing back a fresh provider per call.

use crate::provider::ManagedProvider;
use errors::{FixtureError, FixtureResult};
use fixture_core::{Backend, ProviderContract, ProviderFactory, ResourceKind};
use parking_lot::RwLock;
use std::sync::{Arc, LazyLock};
use tracing::{debug, info};

static GLOBAL: LazyLock<Arc<ProviderRegistry>> =
    LazyLock::new(|| Arc::new(ProviderRegistry::new()));

#[derive(Default)]
pub struct ProviderRegistry {
    factories: RwLock<Vec<Arc<dyn ProviderFactory>>>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The process-wide registry.
    pub fn global() -> Arc<ProviderRegistry> {
        Arc::clone(&GLOBAL)
    }

    pub fn register(&self, factory: Arc<dyn ProviderFactory>) {
        info!("Registered provider factory for {}", factory.kind());
        self.factories.write().push(factory);
    }

    /// Registers a backend wrapped in the generic provider state machine.
    pub fn register_backend<B: Backend>(&self, backend: B) {
        self.register(Arc::new(BackendFactory {
            backend: Arc::new(backend),
        }));
    }

    /// A fresh provider from the first factory whose kind satisfies
    /// `predicate`.
    pub fn find(
        &self,
        predicate: impl Fn(ResourceKind) -> bool,
    ) -> FixtureResult<Box<dyn ProviderContract>> {
        self.find_described("a kind accepted by the lookup", predicate)
    }

    pub fn find_for_kind(&self, kind: ResourceKind) -> FixtureResult<Box<dyn ProviderContract>> {
        let provider = self.find_described(&kind.to_string(), |k| k == kind)?;
        debug!("Discovered provider for {}", kind);
        Ok(provider)
    }

    fn find_described(
        &self,
        requested: &str,
        predicate: impl Fn(ResourceKind) -> bool,
    ) -> FixtureResult<Box<dyn ProviderContract>> {
        let factories = self.factories.read();
        if let Some(factory) = factories.iter().find(|factory| predicate(factory.kind())) {
            return Ok(factory.create());
        }

        let registered: Vec<String> = factories.iter().map(|f| f.kind().to_string()).collect();
        Err(FixtureError::NoMatchingProvider {
            requested: format!("{requested} (registered: [{}])", registered.join(", ")),
        })
    }

    /// Kinds in registration order, duplicates included.
    pub fn kinds(&self) -> Vec<ResourceKind> {
        self.factories.read().iter().map(|f| f.kind()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.factories.read().is_empty()
    }
}

impl std::fmt::Debug for ProviderRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderRegistry")
            .field("kinds", &self.kinds())
            .finish()
    }
}

struct BackendFactory<B: Backend> {
    backend: Arc<B>,
}

impl<B: Backend> ProviderFactory for BackendFactory<B> {
    fn kind(&self) -> ResourceKind {
        self.backend.kind()
    }

    fn create(&self) -> Box<dyn ProviderContract> {
        Box::new(ManagedProvider::new(Arc::clone(&self.backend)))
    }
}
