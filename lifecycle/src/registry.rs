//! Per test-group fixture registry.

use dashmap::DashMap;
use fixture_core::{FixtureParameters, ProviderContract, RequestDescriptor, TestClassId};
use std::sync::Arc;
use tokio::sync::Mutex;

/// A provisioned, started resource together with what it exported.
pub struct Fixture {
    descriptor: RequestDescriptor,
    provider: Mutex<Box<dyn ProviderContract>>,
    parameters: FixtureParameters,
    shared: bool,
}

impl Fixture {
    pub fn new(
        descriptor: RequestDescriptor,
        provider: Box<dyn ProviderContract>,
        parameters: FixtureParameters,
        shared: bool,
    ) -> Self {
        Self {
            descriptor,
            provider: Mutex::new(provider),
            parameters,
            shared,
        }
    }

    pub fn descriptor(&self) -> &RequestDescriptor {
        &self.descriptor
    }

    pub fn parameters(&self) -> &FixtureParameters {
        &self.parameters
    }

    /// Whether the fixture lives in the shared pool rather than belonging to
    /// a single group.
    pub fn is_shared(&self) -> bool {
        self.shared
    }

    pub fn provider(&self) -> &Mutex<Box<dyn ProviderContract>> {
        &self.provider
    }
}

impl std::fmt::Debug for Fixture {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Fixture")
            .field("descriptor", &self.descriptor)
            .field("parameters", &self.parameters)
            .field("shared", &self.shared)
            .finish()
    }
}

#[derive(Debug, Default)]
pub struct FixtureRegistry {
    fixtures: DashMap<TestClassId, Arc<Fixture>>,
}

impl FixtureRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `fixture` unless one is present, returning the fixture that
    /// ends up registered.
    pub fn insert(&self, class: TestClassId, fixture: Arc<Fixture>) -> Arc<Fixture> {
        Arc::clone(self.fixtures.entry(class).or_insert(fixture).value())
    }

    pub fn get(&self, class: &TestClassId) -> Option<Arc<Fixture>> {
        self.fixtures.get(class).map(|entry| Arc::clone(entry.value()))
    }

    pub fn contains(&self, class: &TestClassId) -> bool {
        self.fixtures.contains_key(class)
    }

    pub fn remove(&self, class: &TestClassId) -> Option<Arc<Fixture>> {
        self.fixtures.remove(class).map(|(_, fixture)| fixture)
    }

    pub fn len(&self) -> usize {
        self.fixtures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fixtures.is_empty()
    }

    pub fn classes(&self) -> Vec<TestClassId> {
        self.fixtures.iter().map(|entry| entry.key().clone()).collect()
    }

    pub fn clear_all(&self) {
        self.fixtures.clear();
    }
}
