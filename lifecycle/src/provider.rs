//! Generic provider state machine.
//!
//! [`ManagedProvider`] wraps a [`Backend`] and enforces the
//! `UNINITIALIZED -> CREATED -> STARTED -> STOPPED` transitions, so that
//! backends only describe how to build a handle and what to export.

use async_trait::async_trait;
use errors::{FixtureError, FixtureResult};
use fixture_core::{
    Backend, FixtureParameters, ProviderContract, ProviderState, ProvisionOptions,
    RequestDescriptor, ResourceHandle, ResourceKind, ResourceSpec, StopOutcome,
};
use std::sync::Arc;
use tracing::{debug, info, warn};

pub struct ManagedProvider<B: Backend> {
    backend: Arc<B>,
    state: ProviderState,
    spec: Option<ResourceSpec>,
    handle: Option<B::Handle>,
}

impl<B: Backend> ManagedProvider<B> {
    pub fn new(backend: Arc<B>) -> Self {
        Self {
            backend,
            state: ProviderState::Uninitialized,
            spec: None,
            handle: None,
        }
    }

    /// The settled request, once initialised.
    pub fn spec(&self) -> Option<&ResourceSpec> {
        self.spec.as_ref()
    }

    pub fn handle(&self) -> Option<&B::Handle> {
        self.handle.as_ref()
    }

    fn settle(
        &self,
        request: &RequestDescriptor,
        options: ProvisionOptions,
    ) -> FixtureResult<ResourceSpec> {
        let kind = self.backend.kind();
        let missing = |attribute: &str| FixtureError::MissingRequiredAttribute {
            kind: kind.to_string(),
            attribute: attribute.to_string(),
        };

        let image = request
            .image()
            .or(self.backend.default_image())
            .ok_or_else(|| missing("image"))?;
        let version = request
            .version()
            .or(self.backend.default_version())
            .ok_or_else(|| missing("version"))?;

        Ok(ResourceSpec {
            kind,
            image: image.to_string(),
            version: version.to_string(),
            attributes: request.attributes().clone(),
            options,
        })
    }
}

fn invalid(state: ProviderState, operation: &str) -> FixtureError {
    FixtureError::InvalidState {
        operation: operation.to_string(),
        state: state.to_string(),
    }
}

#[async_trait]
impl<B: Backend> ProviderContract for ManagedProvider<B> {
    fn kind(&self) -> ResourceKind {
        self.backend.kind()
    }

    fn state(&self) -> ProviderState {
        self.state
    }

    fn initialize(
        &mut self,
        request: &RequestDescriptor,
        options: ProvisionOptions,
    ) -> FixtureResult<()> {
        if self.state != ProviderState::Uninitialized {
            return Err(invalid(self.state, "initialize"));
        }
        if request.kind() != self.backend.kind() {
            return Err(FixtureError::NoMatchingProvider {
                requested: request.to_string(),
            });
        }

        let spec = self.settle(request, options)?;
        let handle = self.backend.create_handle(&spec)?;
        info!(
            "Initialized {} provider for {} (reuse: {})",
            spec.kind,
            spec.image_ref(),
            spec.options.reuse
        );

        self.spec = Some(spec);
        self.handle = Some(handle);
        self.state = ProviderState::Created;
        Ok(())
    }

    async fn start(&mut self) -> FixtureResult<()> {
        match self.state {
            ProviderState::Started => {
                debug!("{} provider already started", self.backend.kind());
                Ok(())
            }
            ProviderState::Created => {
                let (Some(handle), Some(spec)) = (self.handle.as_mut(), self.spec.as_ref()) else {
                    return Err(invalid(self.state, "start"));
                };
                handle.start().await?;

                if let Err(e) = self.backend.after_start(handle, spec).await {
                    let label = handle.describe();
                    self.state = match handle.stop().await {
                        Ok(()) => {
                            debug!("Stopped {} after failed start hook", label);
                            ProviderState::Stopped
                        }
                        Err(stop_err) => {
                            warn!(
                                "Failed to stop {} after failed start hook: {}",
                                label, stop_err
                            );
                            // still running, so a later stop reaches the handle
                            ProviderState::Started
                        }
                    };
                    return Err(e);
                }

                info!("Started {}", handle.describe());
                self.state = ProviderState::Started;
                Ok(())
            }
            ProviderState::Uninitialized | ProviderState::Stopped => {
                Err(invalid(self.state, "start"))
            }
        }
    }

    async fn stop(&mut self) -> FixtureResult<StopOutcome> {
        if self.spec.as_ref().is_some_and(|s| s.options.reuse) {
            debug!(
                "Reuse engaged; leaving {} provider {}",
                self.backend.kind(),
                self.state
            );
            return Ok(StopOutcome::Retained);
        }

        match self.state {
            ProviderState::Stopped => Ok(StopOutcome::AlreadyStopped),
            ProviderState::Uninitialized => Err(invalid(self.state, "stop")),
            ProviderState::Created => {
                self.state = ProviderState::Stopped;
                Ok(StopOutcome::Stopped)
            }
            ProviderState::Started => {
                let Some(handle) = self.handle.as_mut() else {
                    return Err(invalid(self.state, "stop"));
                };
                let label = handle.describe();
                handle.stop().await?;
                info!("Stopped {}", label);
                self.state = ProviderState::Stopped;
                Ok(StopOutcome::Stopped)
            }
        }
    }

    fn export_parameters(&self) -> FixtureResult<FixtureParameters> {
        match (self.state, self.handle.as_ref(), self.spec.as_ref()) {
            (ProviderState::Started, Some(handle), Some(spec)) => {
                self.backend.export_parameters(handle, spec)
            }
            _ => Err(invalid(self.state, "export parameters of")),
        }
    }
}
