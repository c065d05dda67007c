//! MySQL backend.

use crate::container::{ContainerHandle, prepare};
use errors::FixtureResult;
use fixture_core::{Backend, FixtureParameters, ResourceKind, ResourceSpec};
use testcontainers::ImageExt;
use testcontainers_modules::mysql::Mysql;

pub const MYSQL_PORT: u16 = 3306;
// the module image creates this database
const DATABASE: &str = "test";
const USERNAME: &str = "test";
const PASSWORD: &str = "test";

/// Connection parameters for a server reachable at `address` (`host:port`).
pub fn connection_parameters(address: &str) -> FixtureParameters {
    FixtureParameters::new()
        .with("datasource.url", format!("jdbc:mysql://{address}/{DATABASE}"))
        .with("datasource.username", USERNAME)
        .with("datasource.password", PASSWORD)
}

#[derive(Debug, Clone, Copy, Default)]
pub struct MysqlBackend;

impl Backend for MysqlBackend {
    type Handle = ContainerHandle<Mysql>;

    fn kind(&self) -> ResourceKind {
        ResourceKind::RelationalMysql
    }

    fn default_image(&self) -> Option<&str> {
        Some("mysql")
    }

    fn default_version(&self) -> Option<&str> {
        Some("latest")
    }

    fn create_handle(&self, spec: &ResourceSpec) -> FixtureResult<Self::Handle> {
        let request = Mysql::default()
            .with_name(spec.image.as_str())
            .with_tag(spec.version.as_str())
            .with_env_var("MYSQL_USER", USERNAME)
            .with_env_var("MYSQL_PASSWORD", PASSWORD);

        Ok(ContainerHandle::new(
            format!("mysql container {}", spec.image_ref()),
            prepare(request, spec),
            &[MYSQL_PORT],
        ))
    }

    fn export_parameters(
        &self,
        handle: &Self::Handle,
        _spec: &ResourceSpec,
    ) -> FixtureResult<FixtureParameters> {
        Ok(connection_parameters(&handle.address(MYSQL_PORT)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use testing::assert_exported_keys;

    #[test]
    fn test_connection_parameters() {
        let params = connection_parameters("127.0.0.1:33060");
        assert_exported_keys(ResourceKind::RelationalMysql, &params);
        assert_eq!(params.get("datasource.url"), Some("jdbc:mysql://127.0.0.1:33060/test"));
        assert_eq!(params.get("datasource.username"), Some("test"));
    }
}
