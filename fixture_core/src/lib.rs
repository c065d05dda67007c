//! # Fixture Core
//!
//! Shared types and traits for the fixture provisioning engine.
//!
//! This crate provides:
//! - The tag data model (`TagDefinition`, `TagUsage`, `AttributeValue`)
//! - The resolved request (`RequestDescriptor`) and its effective form
//!   (`ResourceSpec`)
//! - The provider seams (`ResourceHandle`, `Backend`, `ProviderContract`,
//!   `ProviderFactory`) and the configuration sink (`ConfigSink`)
//!
//! Nothing here performs I/O. Backends live in the `providers` crate and the
//! lifecycle engine in `lifecycle`.

pub mod traits;
pub mod types;

pub use traits::{Backend, ConfigSink, ProviderContract, ProviderFactory, ResourceHandle};
pub use types::{
    AttributeSpec, AttributeValue, FixtureParameters, ProviderState, ProvisionOptions,
    RequestDescriptor, ResourceKind, ResourceSpec, StopOutcome, TagDefinition, TagUsage,
    TestClassId
};
