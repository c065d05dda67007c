//! # Lifecycle Coordinator
//!
//! Drives one fixture per test group through
//! `IDLE -> PROVISIONING -> READY -> TEARDOWN -> IDLE`.
//!
//! `before_group` resolves the group's tags, discovers a provider, starts it
//! and publishes what it exports. Repeated calls for a registered group hand
//! back the same parameters without starting anything. `after_group` stops,
//! unregisters and retracts, logging rather than raising stop failures.
//!
//! When reuse is engaged for a kind, fixtures are pooled by request
//! descriptor so groups asking for the same resource share one instance.

use crate::discovery::ProviderRegistry;
use crate::publisher::{ConfigurationPublisher, publish_into};
use crate::registry::{Fixture, FixtureRegistry};
use crate::resolver::TagResolver;
use crate::tags::TagCatalog;
use config::{FixtureConfig, PropertySources};
use dashmap::DashMap;
use errors::{FixtureError, FixtureResult};
use fixture_core::{
    ConfigSink, FixtureParameters, ProvisionOptions, RequestDescriptor, StopOutcome, TagDefinition,
    TagUsage, TestClassId,
};
use std::sync::Arc;
use strum::Display;
use tokio::sync::{Mutex, OnceCell};
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum GroupPhase {
    Idle,
    Provisioning,
    Ready,
    Teardown,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TeardownOutcome {
    /// The group never had a fixture.
    NotRegistered,
    Stopped,
    /// Reuse kept the resource running.
    Retained,
    /// Stop failed; the fixture was unregistered anyway.
    Failed { reason: String },
}

type SharedSlot = Arc<OnceCell<Arc<Fixture>>>;

pub struct LifecycleCoordinator {
    resolver: TagResolver,
    discovery: Arc<ProviderRegistry>,
    fixtures: FixtureRegistry,
    publisher: ConfigurationPublisher,
    config: FixtureConfig,
    phases: DashMap<TestClassId, GroupPhase>,
    group_locks: DashMap<TestClassId, Arc<Mutex<()>>>,
    shared: DashMap<RequestDescriptor, SharedSlot>,
}

impl LifecycleCoordinator {
    pub fn builder() -> CoordinatorBuilder {
        CoordinatorBuilder::default()
    }

    /// Coordinator over the global provider registry, configured from
    /// `FX_CONFIG_FILE` and the `FX_*` variables.
    pub fn from_env(sink: Arc<dyn ConfigSink>) -> FixtureResult<Self> {
        Self::builder().config(config::load()?).sink(sink).build()
    }

    pub async fn before_group(
        &self,
        class: &TestClassId,
        tags: &[TagUsage],
    ) -> FixtureResult<Option<FixtureParameters>> {
        let Some(descriptor) = self.resolver.resolve(tags)? else {
            debug!("No fixture requested by {}", class);
            return Ok(None);
        };

        let lock = Arc::clone(self.group_locks.entry(class.clone()).or_default().value());
        let _guard = lock.lock().await;

        if let Some(existing) = self.fixtures.get(class) {
            debug!("Reusing registered fixture {} for {}", existing.descriptor(), class);
            return Ok(Some(existing.parameters().clone()));
        }

        self.phases.insert(class.clone(), GroupPhase::Provisioning);
        let options = self.config.provision_options(descriptor.kind());

        let provisioned = if options.reuse {
            self.provision_shared(&descriptor, options).await
        } else {
            self.provision(&descriptor, options, false).await.map(Arc::new)
        };

        let fixture = match provisioned {
            Ok(fixture) => fixture,
            Err(e) => {
                self.phases.remove(class);
                return Err(e);
            }
        };

        let fixture = self.fixtures.insert(class.clone(), fixture);
        self.publisher.publish(class, fixture.parameters());
        self.phases.insert(class.clone(), GroupPhase::Ready);
        info!(
            "Fixture {} ready for {} ({} parameter(s))",
            fixture.descriptor(),
            class,
            fixture.parameters().len()
        );

        Ok(Some(fixture.parameters().clone()))
    }

    pub async fn after_group(&self, class: &TestClassId) -> TeardownOutcome {
        let Some(lock) = self.group_locks.get(class).map(|l| Arc::clone(l.value())) else {
            return self.teardown(class).await;
        };

        let outcome = {
            let _guard = lock.lock().await;
            self.teardown(class).await
        };
        // kept while another call for the group still holds a clone
        self.group_locks.remove_if(class, |_, current| {
            Arc::ptr_eq(current, &lock) && Arc::strong_count(current) == 2
        });
        outcome
    }

    async fn teardown(&self, class: &TestClassId) -> TeardownOutcome {
        let Some(fixture) = self.fixtures.get(class) else {
            debug!("No fixture registered for {}; nothing to tear down", class);
            return TeardownOutcome::NotRegistered;
        };

        self.phases.insert(class.clone(), GroupPhase::Teardown);

        let outcome = {
            let mut provider = fixture.provider().lock().await;
            match provider.stop().await {
                Ok(StopOutcome::Retained) => TeardownOutcome::Retained,
                Ok(StopOutcome::Stopped | StopOutcome::AlreadyStopped) => TeardownOutcome::Stopped,
                Err(e) => {
                    warn!("Failed to stop fixture {} of {}: {}", fixture.descriptor(), class, e);
                    TeardownOutcome::Failed {
                        reason: e.to_string(),
                    }
                }
            }
        };

        self.fixtures.remove(class);
        self.publisher.retract(class);
        self.phases.remove(class);
        info!("Fixture of {} torn down: {:?}", class, outcome);
        outcome
    }

    /// Publishes the parameters of a registered group into another sink.
    pub fn apply_to(&self, class: &TestClassId, sink: &dyn ConfigSink) -> FixtureResult<()> {
        let fixture = self
            .fixtures
            .get(class)
            .ok_or_else(|| FixtureError::FixtureNotRegistered {
                class: class.to_string(),
            })?;
        publish_into(sink, class, fixture.parameters());
        Ok(())
    }

    pub fn phase(&self, class: &TestClassId) -> GroupPhase {
        self.phases
            .get(class)
            .map(|phase| *phase.value())
            .unwrap_or(GroupPhase::Idle)
    }

    pub fn parameters(&self, class: &TestClassId) -> Option<FixtureParameters> {
        self.fixtures.get(class).map(|f| f.parameters().clone())
    }

    pub fn fixtures(&self) -> &FixtureRegistry {
        &self.fixtures
    }

    pub fn resolver(&self) -> &TagResolver {
        &self.resolver
    }

    pub fn config(&self) -> &FixtureConfig {
        &self.config
    }

    /// Number of descriptors currently held in the shared pool.
    pub fn shared_len(&self) -> usize {
        self.shared.iter().filter(|slot| slot.value().initialized()).count()
    }

    async fn provision(
        &self,
        descriptor: &RequestDescriptor,
        options: ProvisionOptions,
        shared: bool,
    ) -> FixtureResult<Fixture> {
        let mut provider = self.discovery.find_for_kind(descriptor.kind())?;
        provider.initialize(descriptor, options)?;
        provider.start().await?;

        let parameters = match provider.export_parameters() {
            Ok(parameters) => parameters,
            Err(e) => {
                if let Err(stop_err) = provider.stop().await {
                    warn!("Failed to stop {} after export failure: {}", descriptor, stop_err);
                }
                return Err(e);
            }
        };

        Ok(Fixture::new(descriptor.clone(), provider, parameters, shared))
    }

    async fn provision_shared(
        &self,
        descriptor: &RequestDescriptor,
        options: ProvisionOptions,
    ) -> FixtureResult<Arc<Fixture>> {
        let slot = Arc::clone(self.shared.entry(descriptor.clone()).or_default().value());

        if slot.initialized() {
            debug!("Sharing pooled fixture {}", descriptor);
        }

        let result = slot
            .get_or_try_init(|| async move {
                self.provision(descriptor, options, true).await.map(Arc::new)
            })
            .await
            .map(Arc::clone);

        if result.is_err() {
            self.shared.remove_if(descriptor, |_, current| Arc::ptr_eq(current, &slot));
        }
        result
    }
}

impl std::fmt::Debug for LifecycleCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LifecycleCoordinator")
            .field("discovery", &self.discovery)
            .field("fixtures", &self.fixtures.len())
            .field("shared", &self.shared.len())
            .finish()
    }
}

pub struct CoordinatorBuilder {
    catalog: TagCatalog,
    discovery: Option<Arc<ProviderRegistry>>,
    sink: Option<Arc<dyn ConfigSink>>,
    config: FixtureConfig,
}

impl Default for CoordinatorBuilder {
    fn default() -> Self {
        Self {
            catalog: TagCatalog::builtin(),
            discovery: None,
            sink: None,
            config: FixtureConfig::default(),
        }
    }
}

impl CoordinatorBuilder {
    pub fn catalog(mut self, catalog: TagCatalog) -> Self {
        self.catalog = catalog;
        self
    }

    pub fn tag(mut self, definition: TagDefinition) -> Self {
        self.catalog.register(definition);
        self
    }

    /// Defaults to [`ProviderRegistry::global`].
    pub fn discovery(mut self, discovery: Arc<ProviderRegistry>) -> Self {
        self.discovery = Some(discovery);
        self
    }

    /// Defaults to a fresh [`PropertySources`].
    pub fn sink(mut self, sink: Arc<dyn ConfigSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    pub fn config(mut self, config: FixtureConfig) -> Self {
        self.config = config;
        self
    }

    /// Fails when the configuration redefines a meta tag, which would switch
    /// off the direct-use check.
    pub fn build(self) -> FixtureResult<LifecycleCoordinator> {
        let mut catalog = self.catalog;
        if let Some(tag) = self
            .config
            .tags
            .iter()
            .find(|tag| catalog.get(&tag.name).is_some_and(|existing| existing.meta))
        {
            return Err(FixtureError::Configuration {
                message: format!(
                    "tag '{}' is a built-in meta tag and cannot be redefined",
                    tag.name
                ),
            });
        }
        catalog.extend(self.config.tags.iter().cloned());

        let sink = self
            .sink
            .unwrap_or_else(|| Arc::new(PropertySources::new()) as Arc<dyn ConfigSink>);

        Ok(LifecycleCoordinator {
            resolver: TagResolver::new(Arc::new(catalog)),
            discovery: self.discovery.unwrap_or_else(ProviderRegistry::global),
            fixtures: FixtureRegistry::new(),
            publisher: ConfigurationPublisher::new(sink),
            config: self.config,
            phases: DashMap::new(),
            group_locks: DashMap::new(),
            shared: DashMap::new(),
        })
    }
}
