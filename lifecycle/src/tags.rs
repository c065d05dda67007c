//! Static tag table.
//!
//! Each row describes a tag type: whether it is meta-only, which tags are
//! attached to its definition and which attributes it declares. The resolver
//! walks this table instead of reflecting over annotations.

use fixture_core::{AttributeValue, ResourceKind, TagDefinition, TagUsage};
use std::collections::HashMap;

/// The generic resource-request meta-tag. Concrete tags carry it with a
/// `kind` value; test groups never use it directly.
pub const RESOURCE_REQUEST: &str = "resource-request";

pub const REQUEST_POSTGRES: &str = "request-postgres";
pub const REQUEST_MYSQL: &str = "request-mysql";
pub const REQUEST_KAFKA: &str = "request-kafka";
pub const REQUEST_OLLAMA: &str = "request-ollama";

pub const ATTR_KIND: &str = "kind";
pub const ATTR_IMAGE: &str = "image";
pub const ATTR_VERSION: &str = "version";
pub const ATTR_MODEL: &str = "model";
pub const ATTR_OPTIONS: &str = "options";

#[derive(Debug, Clone)]
pub struct TagCatalog {
    tags: HashMap<String, TagDefinition>,
}

impl TagCatalog {
    /// A catalog holding only the generic resource-request tag.
    pub fn empty() -> Self {
        let mut catalog = Self {
            tags: HashMap::new(),
        };
        catalog.register(resource_request_tag());
        catalog
    }

    /// The generic tag plus the concrete tags for every built-in kind.
    pub fn builtin() -> Self {
        let mut catalog = Self::empty();
        catalog.register(concrete_tag(
            REQUEST_POSTGRES,
            ResourceKind::RelationalPostgres,
            "postgres",
            "16.3",
        ));
        catalog.register(concrete_tag(
            REQUEST_MYSQL,
            ResourceKind::RelationalMysql,
            "mysql",
            "latest",
        ));
        catalog.register(concrete_tag(
            REQUEST_KAFKA,
            ResourceKind::BrokerKafka,
            "apache/kafka",
            "3.9.1",
        ));
        catalog.register(
            concrete_tag(
                REQUEST_OLLAMA,
                ResourceKind::InferenceOllama,
                "ollama/ollama",
                "latest",
            )
            .required_attribute(ATTR_MODEL)
            .attribute(
                ATTR_OPTIONS,
                AttributeValue::from([("temperature", "0.5"), ("topP", "0.8")]),
            ),
        );
        catalog
    }

    /// Adds or replaces a tag definition, returning the replaced one.
    pub fn register(&mut self, definition: TagDefinition) -> Option<TagDefinition> {
        self.tags.insert(definition.name.clone(), definition)
    }

    pub fn extend(&mut self, definitions: impl IntoIterator<Item = TagDefinition>) {
        for definition in definitions {
            self.register(definition);
        }
    }

    pub fn get(&self, name: &str) -> Option<&TagDefinition> {
        self.tags.get(name)
    }

    pub fn len(&self) -> usize {
        self.tags.len()
    }
}

impl Default for TagCatalog {
    fn default() -> Self {
        Self::builtin()
    }
}

fn resource_request_tag() -> TagDefinition {
    TagDefinition::new(RESOURCE_REQUEST)
        .meta_only()
        .required_attribute(ATTR_KIND)
        .attribute(ATTR_IMAGE, "")
        .attribute(ATTR_VERSION, "latest")
}

fn concrete_tag(name: &str, kind: ResourceKind, image: &str, version: &str) -> TagDefinition {
    TagDefinition::new(name)
        .annotated_with(TagUsage::new(RESOURCE_REQUEST).with(ATTR_KIND, kind.to_string()))
        .attribute(ATTR_IMAGE, image)
        .attribute(ATTR_VERSION, version)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_catalog_rows() {
        let catalog = TagCatalog::builtin();
        assert_eq!(catalog.len(), 5);

        let generic = catalog.get(RESOURCE_REQUEST).unwrap();
        assert!(generic.meta);

        let postgres = catalog.get(REQUEST_POSTGRES).unwrap();
        assert!(!postgres.meta);
        let request = postgres.carries(RESOURCE_REQUEST).unwrap();
        assert_eq!(
            request.value(ATTR_KIND).and_then(AttributeValue::as_text),
            Some("RELATIONAL-POSTGRES")
        );
        assert_eq!(
            postgres.attributes[ATTR_VERSION].default,
            Some(AttributeValue::from("16.3"))
        );
    }

    #[test]
    fn test_ollama_tag_requires_model() {
        let catalog = TagCatalog::builtin();
        let ollama = catalog.get(REQUEST_OLLAMA).unwrap();
        assert!(ollama.attributes[ATTR_MODEL].default.is_none());
        let options = ollama.attributes[ATTR_OPTIONS].default.as_ref().unwrap();
        assert_eq!(options.get("topP").and_then(AttributeValue::as_text), Some("0.8"));
    }

    #[test]
    fn test_register_replaces_definition() {
        let mut catalog = TagCatalog::empty();
        assert!(catalog.register(TagDefinition::new("custom")).is_none());
        assert!(catalog.register(TagDefinition::new("custom")).is_some());
        assert_eq!(catalog.len(), 2);
    }
}
