//! # Fixture Errors
//!
//! Error taxonomy for fixture resolution, provisioning and teardown.
//!
//! - Uses `thiserror` for structured error definitions
//! - Named fields on every variant so messages carry their context
//! - No variant is retried anywhere in the workspace; callers surface them as
//!   setup failures of the owning test group

use thiserror::Error;

/// Errors raised while resolving, provisioning or publishing a fixture.
#[derive(Debug, Error)]
pub enum FixtureError {
    #[error(
        "Tag '{tag}' is a meta-tag and must not be applied to a test group directly; \
         use a concrete tag such as request-postgres or request-mysql instead"
    )]
    DirectMetaTagUsage { tag: String },

    #[error("Malformed resource tag '{tag}': {reason}")]
    MalformedResourceTag { tag: String, reason: String },

    #[error("No matching provider found for {requested}")]
    NoMatchingProvider { requested: String },

    #[error("Missing required attribute '{attribute}' for {kind} fixture")]
    MissingRequiredAttribute { kind: String, attribute: String },

    #[error("Failed to start {resource}: {reason}")]
    ResourceStartFailure { resource: String, reason: String },

    #[error("Failed to stop {resource}: {reason}")]
    ResourceStopFailure { resource: String, reason: String },

    #[error("Failed to provision model '{model}': {reason}")]
    ModelProvisioningFailed { model: String, reason: String },

    #[error("Cannot {operation} provider in state {state}")]
    InvalidState { operation: String, state: String },

    #[error("No fixture registered for test group {class}")]
    FixtureNotRegistered { class: String },

    #[error("Configuration error: {message}")]
    Configuration { message: String },
}

impl FixtureError {
    /// Whether the error is a misuse of the tag surface rather than an
    /// environment problem.
    pub fn is_misuse(&self) -> bool {
        matches!(
            self,
            FixtureError::DirectMetaTagUsage { .. }
                | FixtureError::MalformedResourceTag { .. }
                | FixtureError::MissingRequiredAttribute { .. }
        )
    }
}

pub type FixtureResult<T> = std::result::Result<T, FixtureError>;
