//! PostgreSQL backend.

use crate::container::{ContainerHandle, prepare};
use errors::FixtureResult;
use fixture_core::{Backend, FixtureParameters, ResourceKind, ResourceSpec};
use testcontainers::ImageExt;
use testcontainers_modules::postgres::Postgres;

pub const POSTGRES_PORT: u16 = 5432;
const DATABASE: &str = "test";
const USERNAME: &str = "test";
const PASSWORD: &str = "test";

/// Connection parameters for a server reachable at `address` (`host:port`).
pub fn connection_parameters(address: &str) -> FixtureParameters {
    FixtureParameters::new()
        .with("datasource.url", format!("jdbc:postgresql://{address}/{DATABASE}"))
        .with("datasource.username", USERNAME)
        .with("datasource.password", PASSWORD)
}

#[derive(Debug, Clone, Copy, Default)]
pub struct PostgresBackend;

impl Backend for PostgresBackend {
    type Handle = ContainerHandle<Postgres>;

    fn kind(&self) -> ResourceKind {
        ResourceKind::RelationalPostgres
    }

    fn default_image(&self) -> Option<&str> {
        Some("postgres")
    }

    fn default_version(&self) -> Option<&str> {
        Some("16.3")
    }

    fn create_handle(&self, spec: &ResourceSpec) -> FixtureResult<Self::Handle> {
        let request = Postgres::default()
            .with_db_name(DATABASE)
            .with_user(USERNAME)
            .with_password(PASSWORD)
            .with_name(spec.image.as_str())
            .with_tag(spec.version.as_str());

        Ok(ContainerHandle::new(
            format!("postgres container {}", spec.image_ref()),
            prepare(request, spec),
            &[POSTGRES_PORT],
        ))
    }

    fn export_parameters(
        &self,
        handle: &Self::Handle,
        _spec: &ResourceSpec,
    ) -> FixtureResult<FixtureParameters> {
        Ok(connection_parameters(&handle.address(POSTGRES_PORT)?))
    }
}
