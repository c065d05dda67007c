//! # Fixture Lifecycle
//!
//! The engine behind declarative test fixtures:
//! - `tags`: the static table of tag definitions, built-ins included
//! - `resolver`: finds the resource a group requests through any number of
//!   tag indirections
//! - `discovery`: explicit provider registration and lookup by kind
//! - `provider`: the generic provider state machine over a `Backend`
//! - `registry`: one live fixture per test group
//! - `publisher`: pushes exported parameters into a `ConfigSink`
//! - `coordinator`: `before_group` / `after_group` hooks for the test host

pub mod coordinator;
pub mod discovery;
pub mod provider;
pub mod publisher;
pub mod registry;
pub mod resolver;
pub mod tags;

pub use coordinator::{CoordinatorBuilder, GroupPhase, LifecycleCoordinator, TeardownOutcome};
pub use discovery::ProviderRegistry;
pub use provider::ManagedProvider;
pub use publisher::{ConfigurationPublisher, to_env_vars};
pub use registry::{Fixture, FixtureRegistry};
pub use resolver::TagResolver;
pub use tags::TagCatalog;
