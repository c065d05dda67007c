use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use strum::{Display, EnumString};

/// Category of external dependency a fixture can provide.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    EnumString,
    Display,
)]
#[serde(rename_all = "SCREAMING-KEBAB-CASE")]
#[strum(serialize_all = "SCREAMING-KEBAB-CASE")]
pub enum ResourceKind {
    RelationalPostgres,
    RelationalMysql,
    BrokerKafka,
    InferenceOllama,
}

impl ResourceKind {
    pub const ALL: [ResourceKind; 4] = [
        ResourceKind::RelationalPostgres,
        ResourceKind::RelationalMysql,
        ResourceKind::BrokerKafka,
        ResourceKind::InferenceOllama,
    ];
}

/// Identity of a test group ("test class").
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TestClassId(String);

impl TestClassId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Identity derived from a type, typically a marker struct declared in
    /// the test module.
    pub fn of<T: ?Sized>() -> Self {
        Self(std::any::type_name::<T>().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TestClassId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TestClassId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// Value of a tag attribute: plain text or a nested attribute structure.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttributeValue {
    Text(String),
    Nested(BTreeMap<String, AttributeValue>),
}

impl AttributeValue {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            AttributeValue::Text(text) => Some(text),
            AttributeValue::Nested(_) => None,
        }
    }

    pub fn as_nested(&self) -> Option<&BTreeMap<String, AttributeValue>> {
        match self {
            AttributeValue::Text(_) => None,
            AttributeValue::Nested(map) => Some(map),
        }
    }

    /// Member of a nested value.
    pub fn get(&self, key: &str) -> Option<&AttributeValue> {
        self.as_nested().and_then(|map| map.get(key))
    }

    /// Lays `other` over `self`. Nested maps merge key by key, anything else
    /// is replaced.
    pub fn overlay(&mut self, other: &AttributeValue) {
        match (self, other) {
            (AttributeValue::Nested(base), AttributeValue::Nested(top)) => {
                for (key, value) in top {
                    match base.get_mut(key) {
                        Some(existing) => existing.overlay(value),
                        None => {
                            base.insert(key.clone(), value.clone());
                        }
                    }
                }
            }
            (base, top) => *base = top.clone(),
        }
    }
}

impl From<&str> for AttributeValue {
    fn from(value: &str) -> Self {
        AttributeValue::Text(value.to_string())
    }
}

impl From<String> for AttributeValue {
    fn from(value: String) -> Self {
        AttributeValue::Text(value)
    }
}

impl From<BTreeMap<String, AttributeValue>> for AttributeValue {
    fn from(value: BTreeMap<String, AttributeValue>) -> Self {
        AttributeValue::Nested(value)
    }
}

impl<const N: usize> From<[(&str, &str); N]> for AttributeValue {
    fn from(entries: [(&str, &str); N]) -> Self {
        AttributeValue::Nested(
            entries
                .into_iter()
                .map(|(k, v)| (k.to_string(), AttributeValue::from(v)))
                .collect(),
        )
    }
}

/// A tag applied to a test group or to another tag's definition, with the
/// attribute values given at that point of use.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagUsage {
    pub tag: String,
    #[serde(default)]
    pub values: BTreeMap<String, AttributeValue>,
}

impl TagUsage {
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            values: BTreeMap::new(),
        }
    }

    pub fn with(mut self, attribute: impl Into<String>, value: impl Into<AttributeValue>) -> Self {
        self.values.insert(attribute.into(), value.into());
        self
    }

    pub fn value(&self, attribute: &str) -> Option<&AttributeValue> {
        self.values.get(attribute)
    }
}

/// Declared attribute of a tag. An attribute without default is required.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributeSpec {
    #[serde(default)]
    pub default: Option<AttributeValue>,
}

impl AttributeSpec {
    pub fn required() -> Self {
        Self { default: None }
    }

    pub fn with_default(value: impl Into<AttributeValue>) -> Self {
        Self {
            default: Some(value.into()),
        }
    }
}

/// Static metadata of a tag type: the row of the tag table that the resolver
/// walks instead of reflecting over annotations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagDefinition {
    pub name: String,
    /// Meta-only tags may never be applied to a test group directly.
    #[serde(default)]
    pub meta: bool,
    /// Tags attached to this tag's definition.
    #[serde(default)]
    pub meta_tags: Vec<TagUsage>,
    #[serde(default)]
    pub attributes: BTreeMap<String, AttributeSpec>,
}

impl TagDefinition {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            meta: false,
            meta_tags: Vec::new(),
            attributes: BTreeMap::new(),
        }
    }

    pub fn meta_only(mut self) -> Self {
        self.meta = true;
        self
    }

    pub fn annotated_with(mut self, usage: TagUsage) -> Self {
        self.meta_tags.push(usage);
        self
    }

    pub fn attribute(
        mut self,
        name: impl Into<String>,
        default: impl Into<AttributeValue>,
    ) -> Self {
        self.attributes
            .insert(name.into(), AttributeSpec::with_default(default));
        self
    }

    pub fn required_attribute(mut self, name: impl Into<String>) -> Self {
        self.attributes.insert(name.into(), AttributeSpec::required());
        self
    }

    pub fn declares(&self, attribute: &str) -> bool {
        self.attributes.contains_key(attribute)
    }

    /// The usage of `tag` attached to this definition, if any.
    pub fn carries(&self, tag: &str) -> Option<&TagUsage> {
        self.meta_tags.iter().find(|usage| usage.tag == tag)
    }

    /// Declared defaults overlaid with the values given at `usage`.
    pub fn effective_values(&self, usage: &TagUsage) -> BTreeMap<String, AttributeValue> {
        let mut values: BTreeMap<String, AttributeValue> = self
            .attributes
            .iter()
            .filter_map(|(name, spec)| spec.default.clone().map(|d| (name.clone(), d)))
            .collect();
        for (name, value) in &usage.values {
            match values.get_mut(name) {
                Some(existing) => existing.overlay(value),
                None => {
                    values.insert(name.clone(), value.clone());
                }
            }
        }
        values
    }
}

/// Flattened result of tag resolution. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct RequestDescriptor {
    kind: ResourceKind,
    image: Option<String>,
    version: Option<String>,
    attributes: BTreeMap<String, AttributeValue>,
}

impl RequestDescriptor {
    pub fn new(kind: ResourceKind) -> Self {
        Self {
            kind,
            image: None,
            version: None,
            attributes: BTreeMap::new(),
        }
    }

    pub fn with_image(mut self, image: impl Into<String>) -> Self {
        self.image = Some(image.into());
        self
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    pub fn with_attribute(
        mut self,
        name: impl Into<String>,
        value: impl Into<AttributeValue>,
    ) -> Self {
        self.attributes.insert(name.into(), value.into());
        self
    }

    pub fn kind(&self) -> ResourceKind {
        self.kind
    }

    pub fn image(&self) -> Option<&str> {
        self.image.as_deref()
    }

    pub fn version(&self) -> Option<&str> {
        self.version.as_deref()
    }

    pub fn attributes(&self) -> &BTreeMap<String, AttributeValue> {
        &self.attributes
    }

    pub fn attribute(&self, name: &str) -> Option<&AttributeValue> {
        self.attributes.get(name)
    }
}

impl fmt::Display for RequestDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {}:{}",
            self.kind,
            self.image.as_deref().unwrap_or("<default>"),
            self.version.as_deref().unwrap_or("<default>")
        )
    }
}

/// Provider lifecycle states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum ProviderState {
    Uninitialized,
    Created,
    Started,
    Stopped,
}

/// What `stop` actually did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "snake_case")]
pub enum StopOutcome {
    Stopped,
    /// Reuse is engaged; the handle was left running.
    Retained,
    AlreadyStopped,
}

/// Policy knobs handed to a provider when it is initialised.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProvisionOptions {
    pub reuse: bool,
    pub forward_logs: bool,
}

/// A request with image and version settled against the backend defaults.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceSpec {
    pub kind: ResourceKind,
    pub image: String,
    pub version: String,
    pub attributes: BTreeMap<String, AttributeValue>,
    pub options: ProvisionOptions,
}

impl ResourceSpec {
    /// `image:version` reference.
    pub fn image_ref(&self) -> String {
        format!("{}:{}", self.image, self.version)
    }

    pub fn attribute(&self, name: &str) -> Option<&AttributeValue> {
        self.attributes.get(name)
    }

    pub fn text_attribute(&self, name: &str) -> Option<&str> {
        self.attribute(name).and_then(AttributeValue::as_text)
    }
}

/// Ordered connection parameters exported by a started provider.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct FixtureParameters(Vec<(String, String)>);

impl FixtureParameters {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends or replaces `key`, keeping the first insertion position.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        match self.0.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = value,
            None => self.0.push((key, value)),
        }
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(|(k, _)| k.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for FixtureParameters {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        let mut params = FixtureParameters::new();
        for (k, v) in iter {
            params.insert(k, v);
        }
        params
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_resource_kind_text_form() {
        assert_eq!(ResourceKind::RelationalPostgres.to_string(), "RELATIONAL-POSTGRES");
        assert_eq!(
            ResourceKind::from_str("BROKER-KAFKA").unwrap(),
            ResourceKind::BrokerKafka
        );
        assert!(ResourceKind::from_str("postgres").is_err());

        let json = serde_json::to_string(&ResourceKind::InferenceOllama).unwrap();
        assert_eq!(json, "\"INFERENCE-OLLAMA\"");
    }

    #[test]
    fn test_overlay_merges_nested_values() {
        let mut base = AttributeValue::from([("temperature", "0.5"), ("topP", "0.8")]);
        base.overlay(&AttributeValue::from([("temperature", "0.1")]));

        assert_eq!(base.get("temperature").and_then(AttributeValue::as_text), Some("0.1"));
        assert_eq!(base.get("topP").and_then(AttributeValue::as_text), Some("0.8"));
    }

    #[test]
    fn test_overlay_replaces_text() {
        let mut base = AttributeValue::from("16.3");
        base.overlay(&AttributeValue::from("15"));
        assert_eq!(base.as_text(), Some("15"));
    }

    #[test]
    fn test_effective_values_skips_required_without_value() {
        let def = TagDefinition::new("request-ollama")
            .attribute("version", "latest")
            .required_attribute("model");

        let values = def.effective_values(&TagUsage::new("request-ollama"));
        assert_eq!(values.get("version").and_then(AttributeValue::as_text), Some("latest"));
        assert!(!values.contains_key("model"));

        let values = def.effective_values(&TagUsage::new("request-ollama").with("model", "llama3"));
        assert_eq!(values.get("model").and_then(AttributeValue::as_text), Some("llama3"));
    }

    #[test]
    fn test_fixture_parameters_keep_order_and_replace() {
        let mut params = FixtureParameters::new()
            .with("datasource.url", "a")
            .with("datasource.username", "b");
        params.insert("datasource.url", "c");

        let keys: Vec<&str> = params.keys().collect();
        assert_eq!(keys, vec!["datasource.url", "datasource.username"]);
        assert_eq!(params.get("datasource.url"), Some("c"));
    }

    #[test]
    fn test_test_class_id_of_type() {
        struct OrderRepositoryTests;
        let id = TestClassId::of::<OrderRepositoryTests>();
        assert!(id.as_str().ends_with("OrderRepositoryTests"));
    }

    #[test]
    fn test_tag_definition_deserializes_from_yaml_like_json() {
        let json = r#"{
            "name": "company-db",
            "meta_tags": [{ "tag": "request-postgres", "values": { "version": "15" } }],
            "attributes": { "version": { "default": "15.4" }, "image": { "default": "postgres" } }
        }"#;
        let def: TagDefinition = serde_json::from_str(json).unwrap();
        assert!(!def.meta);
        assert!(def.carries("request-postgres").is_some());
        assert!(def.declares("version"));
    }
}
