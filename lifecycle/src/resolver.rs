//! Tag resolution.
//!
//! Finds, among the tags applied to a test group, the nearest tag whose
//! definition carries the generic resource-request meta-tag, and flattens it
//! into a [`RequestDescriptor`].

use crate::tags::{ATTR_IMAGE, ATTR_KIND, ATTR_VERSION, RESOURCE_REQUEST, TagCatalog};
use errors::{FixtureError, FixtureResult};
use fixture_core::{AttributeValue, RequestDescriptor, ResourceKind, TagUsage};
use std::collections::{BTreeMap, HashSet};
use std::str::FromStr;
use std::sync::Arc;
use tracing::{debug, trace};

#[derive(Debug, Clone)]
pub struct TagResolver {
    catalog: Arc<TagCatalog>,
}

impl TagResolver {
    pub fn new(catalog: Arc<TagCatalog>) -> Self {
        Self { catalog }
    }

    pub fn catalog(&self) -> &TagCatalog {
        &self.catalog
    }

    /// Resolves the tags applied to a test group.
    ///
    /// Returns `Ok(None)` when no tag in the closure requests a resource.
    /// Fails with `DirectMetaTagUsage` when a meta-only tag is applied to the
    /// group itself, and with `MalformedResourceTag` when the matched tag
    /// cannot be flattened.
    ///
    /// The search is depth-first over each applied tag in order. The first
    /// match wins; later siblings are not inspected, even if they would
    /// resolve to a different request.
    pub fn resolve(&self, tags: &[TagUsage]) -> FixtureResult<Option<RequestDescriptor>> {
        if let Some(direct) = tags
            .iter()
            .find(|usage| self.catalog.get(&usage.tag).is_some_and(|def| def.meta))
        {
            return Err(FixtureError::DirectMetaTagUsage {
                tag: direct.tag.clone(),
            });
        }

        for usage in tags {
            let mut visited = HashSet::new();
            if let Some(path) = self.find_nearest(usage, &mut visited) {
                let descriptor = self.flatten(&path)?;
                debug!(
                    "Tag {} resolved to {} via {:?}",
                    usage.tag,
                    descriptor,
                    path.iter().map(|u| u.tag.as_str()).collect::<Vec<_>>()
                );
                return Ok(Some(descriptor));
            }
        }

        trace!("No resource request among {} tag(s)", tags.len());
        Ok(None)
    }

    /// Path from the tag carrying the meta-tag (first) out to `candidate`
    /// (last). A tag seen before on this walk ends the branch.
    fn find_nearest<'a>(
        &'a self,
        candidate: &'a TagUsage,
        visited: &mut HashSet<&'a str>,
    ) -> Option<Vec<&'a TagUsage>> {
        if !visited.insert(candidate.tag.as_str()) {
            trace!("Tag {} already visited", candidate.tag);
            return None;
        }

        let Some(definition) = self.catalog.get(&candidate.tag) else {
            trace!("Tag {} is not in the catalog; treating it as a marker", candidate.tag);
            return None;
        };

        if definition.carries(RESOURCE_REQUEST).is_some() {
            return Some(vec![candidate]);
        }

        for meta in &definition.meta_tags {
            if let Some(mut path) = self.find_nearest(meta, visited) {
                path.push(candidate);
                return Some(path);
            }
        }

        None
    }

    fn flatten(&self, path: &[&TagUsage]) -> FixtureResult<RequestDescriptor> {
        let concrete = path[0];
        let definition = self
            .catalog
            .get(&concrete.tag)
            .ok_or_else(|| malformed(&concrete.tag, "definition disappeared from the catalog"))?;

        let kind = self.kind_of(&concrete.tag, definition.carries(RESOURCE_REQUEST))?;

        if !definition.declares(ATTR_IMAGE) || !definition.declares(ATTR_VERSION) {
            return Err(malformed(
                &concrete.tag,
                "must declare attributes image and version",
            ));
        }

        let mut values: BTreeMap<String, AttributeValue> = BTreeMap::new();
        for usage in path {
            let layer = self
                .catalog
                .get(&usage.tag)
                .ok_or_else(|| malformed(&usage.tag, "definition disappeared from the catalog"))?;
            if let Some(undeclared) = usage.values.keys().find(|name| !layer.declares(name)) {
                return Err(malformed(
                    &usage.tag,
                    &format!("does not declare attribute '{undeclared}'"),
                ));
            }
            for (name, value) in layer.effective_values(usage) {
                match values.get_mut(&name) {
                    Some(existing) => existing.overlay(&value),
                    None => {
                        values.insert(name, value);
                    }
                }
            }
        }

        let image = take_text(&mut values, ATTR_IMAGE, &concrete.tag)?;
        let version = take_text(&mut values, ATTR_VERSION, &concrete.tag)?;

        let mut descriptor = RequestDescriptor::new(kind);
        if let Some(image) = image {
            descriptor = descriptor.with_image(image);
        }
        if let Some(version) = version {
            descriptor = descriptor.with_version(version);
        }
        for (name, value) in values {
            descriptor = descriptor.with_attribute(name, value);
        }
        Ok(descriptor)
    }

    fn kind_of(&self, tag: &str, request: Option<&TagUsage>) -> FixtureResult<ResourceKind> {
        let request = request.ok_or_else(|| malformed(tag, "does not carry resource-request"))?;
        let values = match self.catalog.get(RESOURCE_REQUEST) {
            Some(generic) => generic.effective_values(request),
            None => request.values.clone(),
        };
        let raw = values
            .get(ATTR_KIND)
            .and_then(AttributeValue::as_text)
            .ok_or_else(|| malformed(tag, "resource-request carries no kind"))?;
        ResourceKind::from_str(raw)
            .map_err(|_| malformed(tag, &format!("unknown resource kind '{raw}'")))
    }
}

fn take_text(
    values: &mut BTreeMap<String, AttributeValue>,
    name: &str,
    tag: &str,
) -> FixtureResult<Option<String>> {
    match values.remove(name) {
        None => Ok(None),
        Some(AttributeValue::Text(text)) if text.is_empty() => Ok(None),
        Some(AttributeValue::Text(text)) => Ok(Some(text)),
        Some(AttributeValue::Nested(_)) => Err(malformed(
            tag,
            &format!("attribute '{name}' must be a plain value"),
        )),
    }
}

fn malformed(tag: &str, reason: &str) -> FixtureError {
    FixtureError::MalformedResourceTag {
        tag: tag.to_string(),
        reason: reason.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tags::{ATTR_MODEL, ATTR_OPTIONS, REQUEST_OLLAMA, REQUEST_POSTGRES};
    use fixture_core::TagDefinition;
    use proptest::prelude::*;

    fn resolver(catalog: TagCatalog) -> TagResolver {
        TagResolver::new(Arc::new(catalog))
    }

    #[test]
    fn test_concrete_tag_with_defaults() {
        let descriptor = resolver(TagCatalog::builtin())
            .resolve(&[TagUsage::new(REQUEST_POSTGRES)])
            .unwrap()
            .unwrap();

        assert_eq!(descriptor.kind(), ResourceKind::RelationalPostgres);
        assert_eq!(descriptor.image(), Some("postgres"));
        assert_eq!(descriptor.version(), Some("16.3"));
        assert!(descriptor.attributes().is_empty());
    }

    #[test]
    fn test_usage_values_override_defaults() {
        let descriptor = resolver(TagCatalog::builtin())
            .resolve(&[TagUsage::new(REQUEST_POSTGRES).with(ATTR_VERSION, "15.7")])
            .unwrap()
            .unwrap();
        assert_eq!(descriptor.version(), Some("15.7"));
    }

    #[test]
    fn test_direct_meta_tag_usage_fails() {
        let result = resolver(TagCatalog::builtin()).resolve(&[
            TagUsage::new(RESOURCE_REQUEST).with(ATTR_KIND, "RELATIONAL-POSTGRES")
        ]);
        assert!(matches!(
            result,
            Err(FixtureError::DirectMetaTagUsage { tag }) if tag == RESOURCE_REQUEST
        ));
    }

    #[test]
    fn test_direct_meta_tag_fails_even_after_a_match() {
        let result = resolver(TagCatalog::builtin()).resolve(&[
            TagUsage::new(REQUEST_POSTGRES),
            TagUsage::new(RESOURCE_REQUEST),
        ]);
        assert!(matches!(result, Err(FixtureError::DirectMetaTagUsage { .. })));
    }

    #[test]
    fn test_no_request_returns_none() {
        let mut catalog = TagCatalog::builtin();
        catalog.register(TagDefinition::new("slow"));
        let result = resolver(catalog)
            .resolve(&[TagUsage::new("slow"), TagUsage::new("unknown-marker")])
            .unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn test_two_levels_use_outer_values_and_inner_kind() {
        let mut catalog = TagCatalog::builtin();
        catalog.register(
            TagDefinition::new("orders-db")
                .annotated_with(TagUsage::new(REQUEST_POSTGRES).with(ATTR_VERSION, "14"))
                .attribute(ATTR_IMAGE, "postgis/postgis")
                .attribute(ATTR_VERSION, "15-3.4"),
        );

        let descriptor = resolver(catalog)
            .resolve(&[TagUsage::new("orders-db")])
            .unwrap()
            .unwrap();

        assert_eq!(descriptor.kind(), ResourceKind::RelationalPostgres);
        assert_eq!(descriptor.image(), Some("postgis/postgis"));
        assert_eq!(descriptor.version(), Some("15-3.4"));
    }

    #[test]
    fn test_outer_tag_without_own_attributes_keeps_inner_values() {
        let mut catalog = TagCatalog::builtin();
        catalog.register(
            TagDefinition::new("legacy-db")
                .annotated_with(TagUsage::new(REQUEST_POSTGRES).with(ATTR_VERSION, "12")),
        );

        let descriptor = resolver(catalog)
            .resolve(&[TagUsage::new("legacy-db")])
            .unwrap()
            .unwrap();
        assert_eq!(descriptor.image(), Some("postgres"));
        assert_eq!(descriptor.version(), Some("12"));
    }

    #[test]
    fn test_first_match_wins() {
        let descriptor = resolver(TagCatalog::builtin())
            .resolve(&[
                TagUsage::new("unrelated"),
                TagUsage::new(REQUEST_POSTGRES).with(ATTR_VERSION, "16.1"),
                TagUsage::new(REQUEST_POSTGRES).with(ATTR_VERSION, "13"),
            ])
            .unwrap()
            .unwrap();
        assert_eq!(descriptor.version(), Some("16.1"));
    }

    #[test]
    fn test_cycle_without_request_returns_none() {
        let mut catalog = TagCatalog::builtin();
        catalog.register(TagDefinition::new("a").annotated_with(TagUsage::new("b")));
        catalog.register(TagDefinition::new("b").annotated_with(TagUsage::new("a")));

        assert!(resolver(catalog).resolve(&[TagUsage::new("a")]).unwrap().is_none());
    }

    #[test]
    fn test_cycle_with_request_behind_it_resolves() {
        let mut catalog = TagCatalog::builtin();
        catalog.register(
            TagDefinition::new("a")
                .annotated_with(TagUsage::new("b"))
                .annotated_with(TagUsage::new(REQUEST_POSTGRES)),
        );
        catalog.register(TagDefinition::new("b").annotated_with(TagUsage::new("a")));

        let descriptor = resolver(catalog)
            .resolve(&[TagUsage::new("a")])
            .unwrap()
            .unwrap();
        assert_eq!(descriptor.kind(), ResourceKind::RelationalPostgres);
    }

    #[test]
    fn test_missing_image_or_version_is_malformed() {
        let mut catalog = TagCatalog::builtin();
        catalog.register(
            TagDefinition::new("bare-broker")
                .annotated_with(TagUsage::new(RESOURCE_REQUEST).with(ATTR_KIND, "BROKER-KAFKA"))
                .attribute(ATTR_IMAGE, "apache/kafka"),
        );

        let result = resolver(catalog).resolve(&[TagUsage::new("bare-broker")]);
        assert!(matches!(
            result,
            Err(FixtureError::MalformedResourceTag { tag, .. }) if tag == "bare-broker"
        ));
    }

    #[test]
    fn test_unknown_kind_is_malformed() {
        let mut catalog = TagCatalog::builtin();
        catalog.register(
            TagDefinition::new("oracle")
                .annotated_with(
                    TagUsage::new(RESOURCE_REQUEST).with(ATTR_KIND, "RELATIONAL-ORACLE"),
                )
                .attribute(ATTR_IMAGE, "gvenzl/oracle-free")
                .attribute(ATTR_VERSION, "23"),
        );

        let result = resolver(catalog).resolve(&[TagUsage::new("oracle")]);
        assert!(matches!(result, Err(FixtureError::MalformedResourceTag { .. })));
    }

    #[test]
    fn test_undeclared_attribute_is_malformed() {
        let result = resolver(TagCatalog::builtin())
            .resolve(&[TagUsage::new(REQUEST_POSTGRES).with("schema", "public")]);
        assert!(matches!(result, Err(FixtureError::MalformedResourceTag { .. })));
    }

    #[test]
    fn test_ollama_options_merge_with_defaults() {
        let descriptor = resolver(TagCatalog::builtin())
            .resolve(&[TagUsage::new(REQUEST_OLLAMA)
                .with(ATTR_MODEL, "llama3")
                .with(ATTR_OPTIONS, [("temperature", "0.2")])])
            .unwrap()
            .unwrap();

        assert_eq!(descriptor.kind(), ResourceKind::InferenceOllama);
        assert_eq!(
            descriptor.attribute(ATTR_MODEL).and_then(AttributeValue::as_text),
            Some("llama3")
        );
        let options = descriptor.attribute(ATTR_OPTIONS).unwrap();
        assert_eq!(options.get("temperature").and_then(AttributeValue::as_text), Some("0.2"));
        assert_eq!(options.get("topP").and_then(AttributeValue::as_text), Some("0.8"));
    }

    #[test]
    fn test_ollama_without_model_resolves_without_model() {
        let descriptor = resolver(TagCatalog::builtin())
            .resolve(&[TagUsage::new(REQUEST_OLLAMA)])
            .unwrap()
            .unwrap();
        assert!(descriptor.attribute(ATTR_MODEL).is_none());
    }

    #[test]
    fn test_empty_image_means_unset() {
        let descriptor = resolver(TagCatalog::builtin())
            .resolve(&[TagUsage::new(REQUEST_POSTGRES).with(ATTR_IMAGE, "")])
            .unwrap()
            .unwrap();
        assert_eq!(descriptor.image(), None);
    }

    /// Random catalog of plain tags named `t0..tN` wired to each other,
    /// cycles included, none of them carrying the resource-request tag.
    fn plain_catalog(edges: &[(usize, usize)], size: usize) -> TagCatalog {
        let mut catalog = TagCatalog::empty();
        for i in 0..size {
            let mut def = TagDefinition::new(format!("t{i}"));
            for (from, to) in edges {
                if *from % size == i {
                    def = def.annotated_with(TagUsage::new(format!("t{}", to % size)));
                }
            }
            catalog.register(def);
        }
        catalog
    }

    proptest! {
        #[test]
        fn test_hierarchies_without_request_never_match(
            size in 1usize..8,
            edges in prop::collection::vec((0usize..8, 0usize..8), 0..24),
            applied in prop::collection::vec(0usize..8, 0..4),
        ) {
            let resolver = resolver(plain_catalog(&edges, size));
            let tags: Vec<TagUsage> = applied
                .iter()
                .map(|i| TagUsage::new(format!("t{}", i % size)))
                .collect();
            prop_assert!(resolver.resolve(&tags).unwrap().is_none());
        }

        #[test]
        fn test_request_reachable_through_chain_always_matches(depth in 1usize..6) {
            let mut catalog = TagCatalog::builtin();
            for i in 0..depth {
                let inner = if i == 0 {
                    REQUEST_POSTGRES.to_string()
                } else {
                    format!("c{}", i - 1)
                };
                catalog.register(
                    TagDefinition::new(format!("c{i}")).annotated_with(TagUsage::new(inner)),
                );
            }
            let resolver = resolver(catalog);
            let descriptor = resolver
                .resolve(&[TagUsage::new(format!("c{}", depth - 1))])
                .unwrap()
                .unwrap();
            prop_assert_eq!(descriptor.kind(), ResourceKind::RelationalPostgres);
            prop_assert_eq!(descriptor.version(), Some("16.3"));
        }
    }
}
