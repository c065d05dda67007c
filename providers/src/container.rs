//! Container-backed resource handle.
//!
//! [`ContainerHandle`] owns a testcontainers request until started, then the
//! running container. Mapped ports and the host are captured at start so
//! exports need no further Docker round-trips.

use async_trait::async_trait;
use errors::{FixtureError, FixtureResult};
use fixture_core::{ResourceHandle, ResourceSpec};
use futures_util::FutureExt;
use futures_util::future::BoxFuture;
use std::collections::BTreeMap;
use testcontainers::core::ReuseDirective;
use testcontainers::core::logs::LogFrame;
use testcontainers::core::logs::consumer::LogConsumer;
use testcontainers::runners::AsyncRunner;
use testcontainers::{ContainerAsync, ContainerRequest, Image, ImageExt};
use tracing::{debug, info};

/// Target container output is logged under.
pub const CONTAINER_LOG_TARGET: &str = "fixtures::container";

enum ContainerState<I: Image> {
    Pending(ContainerRequest<I>),
    Running(ContainerAsync<I>),
    Removed,
}

pub struct ContainerHandle<I: Image> {
    label: String,
    state: ContainerState<I>,
    ports: Vec<u16>,
    host: Option<String>,
    mapped: BTreeMap<u16, u16>,
}

impl<I: Image> ContainerHandle<I> {
    /// `ports` are the container ports whose host mapping is captured on start.
    pub fn new(label: impl Into<String>, request: ContainerRequest<I>, ports: &[u16]) -> Self {
        Self {
            label: label.into(),
            state: ContainerState::Pending(request),
            ports: ports.to_vec(),
            host: None,
            mapped: BTreeMap::new(),
        }
    }

    pub fn is_running(&self) -> bool {
        matches!(self.state, ContainerState::Running(_))
    }

    pub fn host(&self) -> FixtureResult<&str> {
        self.host.as_deref().ok_or_else(|| self.not_running("host"))
    }

    pub fn mapped_port(&self, port: u16) -> FixtureResult<u16> {
        self.mapped
            .get(&port)
            .copied()
            .ok_or_else(|| self.not_running(&format!("port {port}")))
    }

    /// `host:port` for a container port.
    pub fn address(&self, port: u16) -> FixtureResult<String> {
        Ok(format!("{}:{}", self.host()?, self.mapped_port(port)?))
    }

    fn not_running(&self, what: &str) -> FixtureError {
        FixtureError::InvalidState {
            operation: format!("read {what} of"),
            state: if self.is_running() {
                "RUNNING".to_string()
            } else {
                "NOT_RUNNING".to_string()
            },
        }
    }

    fn start_failure(&self, reason: impl ToString) -> FixtureError {
        FixtureError::ResourceStartFailure {
            resource: self.label.clone(),
            reason: reason.to_string(),
        }
    }
}

#[async_trait]
impl<I: Image + 'static> ResourceHandle for ContainerHandle<I> {
    async fn start(&mut self) -> FixtureResult<()> {
        let request = match std::mem::replace(&mut self.state, ContainerState::Removed) {
            ContainerState::Pending(request) => request,
            ContainerState::Running(container) => {
                self.state = ContainerState::Running(container);
                return Ok(());
            }
            ContainerState::Removed => {
                return Err(self.start_failure("container request already consumed"));
            }
        };

        info!("Starting {}", self.label);
        let container = request.start().await.map_err(|e| self.start_failure(e))?;

        let host = container.get_host().await.map_err(|e| self.start_failure(e))?;
        self.host = Some(host.to_string());
        for port in self.ports.clone() {
            let mapped = container
                .get_host_port_ipv4(port)
                .await
                .map_err(|e| self.start_failure(e))?;
            debug!("{}: container port {} mapped to {}", self.label, port, mapped);
            self.mapped.insert(port, mapped);
        }

        self.state = ContainerState::Running(container);
        Ok(())
    }

    async fn stop(&mut self) -> FixtureResult<()> {
        match std::mem::replace(&mut self.state, ContainerState::Removed) {
            ContainerState::Running(container) => {
                container
                    .rm()
                    .await
                    .map_err(|e| FixtureError::ResourceStopFailure {
                        resource: self.label.clone(),
                        reason: e.to_string(),
                    })?;
                self.mapped.clear();
                self.host = None;
                Ok(())
            }
            ContainerState::Pending(_) | ContainerState::Removed => Ok(()),
        }
    }

    fn describe(&self) -> String {
        match self.mapped.values().next() {
            Some(port) => format!("{} on port {}", self.label, port),
            None => self.label.clone(),
        }
    }
}

/// Applies the reuse and log-forwarding options of `spec` to a request.
pub fn prepare<I: Image>(request: ContainerRequest<I>, spec: &ResourceSpec) -> ContainerRequest<I> {
    let mut request = request;
    if spec.options.reuse {
        request = request.with_reuse(ReuseDirective::Always);
    }
    if spec.options.forward_logs {
        request = request.with_log_consumer(TracingLogConsumer::new(spec.image_ref()));
    }
    request
}

/// Forwards container stdout/stderr to `tracing`.
#[derive(Debug, Clone)]
pub struct TracingLogConsumer {
    resource: String,
}

impl TracingLogConsumer {
    pub fn new(resource: impl Into<String>) -> Self {
        Self {
            resource: resource.into(),
        }
    }
}

impl LogConsumer for TracingLogConsumer {
    fn accept<'a>(&'a self, record: &'a LogFrame) -> BoxFuture<'a, ()> {
        async move {
            let text = String::from_utf8_lossy(record.bytes());
            let stream = match record {
                LogFrame::StdOut(_) => "stdout",
                LogFrame::StdErr(_) => "stderr",
            };
            for line in text.lines().filter(|l| !l.trim().is_empty()) {
                info!(
                    target: CONTAINER_LOG_TARGET,
                    resource = %self.resource,
                    stream,
                    "{}",
                    line
                );
            }
        }
        .boxed()
    }
}
