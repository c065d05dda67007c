//! Core traits for the fixture provisioning engine

use async_trait::async_trait;
use errors::FixtureResult;

use crate::types::{
    FixtureParameters, ProviderState, ProvisionOptions, RequestDescriptor, ResourceKind,
    ResourceSpec, StopOutcome,
};

/// Lifecycle of one external resource (a container, a process, a fake).
#[async_trait]
pub trait ResourceHandle: Send + Sync {
    async fn start(&mut self) -> FixtureResult<()>;

    async fn stop(&mut self) -> FixtureResult<()>;

    /// Human readable label used in logs and error messages.
    fn describe(&self) -> String;
}

/// Backend-specific half of a provider.
///
/// A backend knows how to build a handle for one resource kind and how to
/// read connection parameters off a started handle. The generic state
/// machine wrapping it lives in `lifecycle::provider::ManagedProvider`.
#[async_trait]
pub trait Backend: Send + Sync + 'static {
    type Handle: ResourceHandle + 'static;

    fn kind(&self) -> ResourceKind;

    fn default_image(&self) -> Option<&str> {
        None
    }

    fn default_version(&self) -> Option<&str> {
        None
    }

    /// Builds the handle without starting it.
    fn create_handle(&self, spec: &ResourceSpec) -> FixtureResult<Self::Handle>;

    /// Runs once the handle is started, before `start` returns.
    async fn after_start(
        &self,
        _handle: &mut Self::Handle,
        _spec: &ResourceSpec,
    ) -> FixtureResult<()> {
        Ok(())
    }

    fn export_parameters(
        &self,
        handle: &Self::Handle,
        spec: &ResourceSpec,
    ) -> FixtureResult<FixtureParameters>;
}

/// Contract every resource provider satisfies.
#[async_trait]
pub trait ProviderContract: Send + Sync {
    fn kind(&self) -> ResourceKind;

    fn state(&self) -> ProviderState;

    /// Stores the request and builds, but does not start, the handle.
    fn initialize(
        &mut self,
        request: &RequestDescriptor,
        options: ProvisionOptions,
    ) -> FixtureResult<()>;

    /// Starts the handle. No-op when already started.
    async fn start(&mut self) -> FixtureResult<()>;

    /// Stops the handle unless reuse is engaged. No-op when already stopped.
    async fn stop(&mut self) -> FixtureResult<StopOutcome>;

    fn export_parameters(&self) -> FixtureResult<FixtureParameters>;
}

/// Registration entry of the provider plugin surface.
pub trait ProviderFactory: Send + Sync {
    fn kind(&self) -> ResourceKind;

    /// A fresh, uninitialised provider.
    fn create(&self) -> Box<dyn ProviderContract>;
}

/// Host configuration sink receiving fixture parameters.
pub trait ConfigSink: Send + Sync {
    /// Adds `overrides` as a named source with precedence over every
    /// existing source. Re-adding a name replaces the previous source.
    fn add_first(&self, source: &str, overrides: &FixtureParameters);

    fn remove_source(&self, source: &str) -> bool;
}
