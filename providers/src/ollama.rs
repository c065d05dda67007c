//! Ollama inference backend.
//!
//! Runs the `ollama/ollama` image and, once the server listens, makes sure
//! the requested model is resident. Pulling happens only when the model is
//! missing; the pull is awaited without timeout and never retried.

use crate::container::{ContainerHandle, prepare};
use async_trait::async_trait;
use errors::{FixtureError, FixtureResult};
use fixture_core::{AttributeValue, Backend, FixtureParameters, ResourceKind, ResourceSpec};
use serde::Deserialize;
use strum::Display;
use testcontainers::{ContainerRequest, GenericImage};
use testcontainers::core::{IntoContainerPort, WaitFor};
use tracing::{debug, info};

pub const OLLAMA_PORT: u16 = 11434;
const READY_MESSAGE: &str = "Listening on";

const ATTR_MODEL: &str = "model";
const ATTR_OPTIONS: &str = "options";

/// What [`OllamaClient::ensure_model`] had to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "snake_case")]
pub enum ModelStatus {
    AlreadyPresent,
    Pulled,
}

#[derive(Debug, Deserialize)]
struct TagsResponse {
    #[serde(default)]
    models: Vec<ModelEntry>,
}

#[derive(Debug, Deserialize)]
struct ModelEntry {
    name: String,
}

/// Minimal client for the Ollama model API.
#[derive(Debug, Clone)]
pub struct OllamaClient {
    base_url: String,
    client: reqwest::Client,
}

impl OllamaClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client: reqwest::Client::new(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Names of the resident models (`GET /api/tags`).
    pub async fn list_models(&self) -> Result<Vec<String>, reqwest::Error> {
        let response: TagsResponse = self
            .client
            .get(format!("{}/api/tags", self.base_url))
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(response.models.into_iter().map(|m| m.name).collect())
    }

    /// Pulls `model` unless it is already resident.
    pub async fn ensure_model(&self, model: &str) -> FixtureResult<ModelStatus> {
        let failed = |e: reqwest::Error| FixtureError::ModelProvisioningFailed {
            model: model.to_string(),
            reason: e.to_string(),
        };

        let resident = self.list_models().await.map_err(failed)?;
        if resident.iter().any(|name| is_same_model(name, model)) {
            debug!("Model {} already resident at {}", model, self.base_url);
            return Ok(ModelStatus::AlreadyPresent);
        }

        info!("Pulling model {} into {}", model, self.base_url);
        self.client
            .post(format!("{}/api/pull", self.base_url))
            .json(&serde_json::json!({ "model": model, "stream": false }))
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(failed)?;

        Ok(ModelStatus::Pulled)
    }
}

/// `llama3` and `llama3:latest` name the same model.
fn is_same_model(resident: &str, requested: &str) -> bool {
    let normalize = |name: &str| {
        if name.contains(':') {
            name.to_string()
        } else {
            format!("{name}:latest")
        }
    };
    normalize(resident) == normalize(requested)
}

#[derive(Debug, Clone, Copy, Default)]
pub struct OllamaBackend;

impl OllamaBackend {
    fn model<'a>(&self, spec: &'a ResourceSpec) -> FixtureResult<&'a str> {
        spec.text_attribute(ATTR_MODEL)
            .filter(|m| !m.is_empty())
            .ok_or_else(|| FixtureError::MissingRequiredAttribute {
                kind: spec.kind.to_string(),
                attribute: ATTR_MODEL.to_string(),
            })
    }

    fn base_url(handle: &ContainerHandle<GenericImage>) -> FixtureResult<String> {
        Ok(format!("http://{}", handle.address(OLLAMA_PORT)?))
    }

    /// Chat parameters for a server at `base_url`. Missing options export
    /// as empty values.
    pub fn chat_parameters(
        &self,
        base_url: &str,
        spec: &ResourceSpec,
    ) -> FixtureResult<FixtureParameters> {
        let option = |key: &str| {
            spec.attribute(ATTR_OPTIONS)
                .and_then(|options| options.get(key))
                .and_then(AttributeValue::as_text)
                .unwrap_or_default()
                .to_string()
        };

        Ok(FixtureParameters::new()
            .with("ai.base-url", base_url)
            .with("ai.chat.model", self.model(spec)?)
            .with("ai.chat.options.temperature", option("temperature"))
            .with("ai.chat.options.top-p", option("topP")))
    }
}

#[async_trait]
impl Backend for OllamaBackend {
    type Handle = ContainerHandle<GenericImage>;

    fn kind(&self) -> ResourceKind {
        ResourceKind::InferenceOllama
    }

    fn default_image(&self) -> Option<&str> {
        Some("ollama/ollama")
    }

    fn default_version(&self) -> Option<&str> {
        Some("latest")
    }

    fn create_handle(&self, spec: &ResourceSpec) -> FixtureResult<Self::Handle> {
        self.model(spec)?;

        let image = GenericImage::new(spec.image.as_str(), spec.version.as_str())
            .with_exposed_port(OLLAMA_PORT.tcp())
            .with_wait_for(WaitFor::message_on_stderr(READY_MESSAGE));

        Ok(ContainerHandle::new(
            format!("ollama container {}", spec.image_ref()),
            prepare(ContainerRequest::from(image), spec),
            &[OLLAMA_PORT],
        ))
    }

    async fn after_start(
        &self,
        handle: &mut Self::Handle,
        spec: &ResourceSpec,
    ) -> FixtureResult<()> {
        let model = self.model(spec)?;
        let status = OllamaClient::new(Self::base_url(handle)?)
            .ensure_model(model)
            .await?;
        info!("Model {} ready ({})", model, status);
        Ok(())
    }

    fn export_parameters(
        &self,
        handle: &Self::Handle,
        spec: &ResourceSpec,
    ) -> FixtureResult<FixtureParameters> {
        self.chat_parameters(&Self::base_url(handle)?, spec)
    }
}
