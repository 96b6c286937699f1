use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use super::{ResourceElement, ResourceMap, ResourceRef};
use crate::config::ConfigError;

#[derive(Debug, Clone, PartialEq, Eq)]
/// Layout of a resource tree, as it's written down in a config file.
///
/// In a config a leaf is written as `null` (or `None {}` in dhall), anything that is a
/// map of names is a nested group.
pub enum ResourceSpec {
    /// A single resource element
    Leaf,
    /// A named group of further resources
    Nested(IndexMap<String, ResourceSpec>),
}

impl ResourceSpec {
    pub fn nested<K: Into<String>>(entries: impl IntoIterator<Item = (K, ResourceSpec)>) -> Self {
        ResourceSpec::Nested(
            entries
                .into_iter()
                .map(|(name, spec)| (name.into(), spec))
                .collect(),
        )
    }

    pub fn is_leaf(&self) -> bool {
        matches!(self, ResourceSpec::Leaf)
    }

    pub fn build(&self) -> Result<Arc<ResourceMap>, ConfigError> {
        build(self)
    }
}

/// Builds a fresh tree of resources from `spec`.
///
/// The top level has to be a map; every call returns new resources.
pub fn build(spec: &ResourceSpec) -> Result<Arc<ResourceMap>, ConfigError> {
    match spec {
        ResourceSpec::Nested(entries) => Ok(build_map(entries)),
        ResourceSpec::Leaf => Err(ConfigError::NotAMapping),
    }
}

pub fn build_map(entries: &IndexMap<String, ResourceSpec>) -> Arc<ResourceMap> {
    let children = entries
        .iter()
        .map(|(name, spec)| {
            let child: ResourceRef = match spec {
                ResourceSpec::Leaf => ResourceElement::new().into(),
                ResourceSpec::Nested(nested) => build_map(nested).into(),
            };
            (name.clone(), child)
        })
        .collect();
    ResourceMap::new(children)
}

impl Serialize for ResourceSpec {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            ResourceSpec::Leaf => serializer.serialize_none(),
            ResourceSpec::Nested(entries) => {
                let mut map = serializer.serialize_map(Some(entries.len()))?;
                for (name, spec) in entries {
                    map.serialize_entry(name, spec)?;
                }
                map.end()
            }
        }
    }
}

impl<'de> Deserialize<'de> for ResourceSpec {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(ResourceSpecVisitor)
    }
}

struct ResourceSpecVisitor;

impl<'de> Visitor<'de> for ResourceSpecVisitor {
    type Value = ResourceSpec;

    fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        write!(formatter, "null for a single resource or a map of named resources")
    }

    fn visit_unit<E: serde::de::Error>(self) -> Result<Self::Value, E> {
        Ok(ResourceSpec::Leaf)
    }

    fn visit_none<E: serde::de::Error>(self) -> Result<Self::Value, E> {
        Ok(ResourceSpec::Leaf)
    }

    fn visit_some<D: Deserializer<'de>>(self, deserializer: D) -> Result<Self::Value, D::Error> {
        ResourceSpec::deserialize(deserializer)
    }

    fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Self::Value, A::Error> {
        let mut entries = IndexMap::with_capacity(map.size_hint().unwrap_or(0));
        while let Some((name, spec)) = map.next_entry::<String, ResourceSpec>()? {
            entries.insert(name, spec);
        }
        Ok(ResourceSpec::Nested(entries))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_mirrors_layout() {
        let spec: ResourceSpec = serde_json::from_str(r#"{"x": null, "y": {"z": null}}"#).unwrap();
        let map = build(&spec).unwrap();

        assert_eq!(map.keys().collect::<Vec<_>>(), ["x", "y"]);
        assert!(map["x"].downcast_ref::<ResourceElement>().is_some());

        let y = map["y"].downcast_ref::<ResourceMap>().unwrap();
        assert_eq!(y.keys().collect::<Vec<_>>(), ["z"]);
        assert!(y["z"].downcast_ref::<ResourceElement>().is_some());
    }

    #[test]
    fn build_never_reuses_resources() {
        let spec = ResourceSpec::nested([
            ("x", ResourceSpec::Leaf),
            ("y", ResourceSpec::nested([("z", ResourceSpec::Leaf)])),
        ]);
        let first = build(&spec).unwrap();
        let second = build(&spec).unwrap();

        assert_ne!(first["x"], second["x"]);
        assert_ne!(first["y"], second["y"]);
    }

    #[test]
    fn build_keeps_input_order() {
        let spec: ResourceSpec =
            serde_json::from_str(r#"{"DIO3": null, "DIO1": null, "AI0": null, "DIO2": null}"#)
                .unwrap();
        let map = spec.build().unwrap();
        assert_eq!(
            map.keys().collect::<Vec<_>>(),
            ["DIO3", "DIO1", "AI0", "DIO2"]
        );
    }

    #[test]
    fn build_rejects_leaf_at_top() {
        let spec: ResourceSpec = serde_json::from_str("null").unwrap();
        assert!(spec.is_leaf());
        assert!(matches!(build(&spec), Err(ConfigError::NotAMapping)));
    }

    #[test]
    fn empty_nested_map_is_an_empty_group() {
        let spec: ResourceSpec = serde_json::from_str(r#"{"bus": {}}"#).unwrap();
        let map = build(&spec).unwrap();
        let bus = map["bus"].downcast_ref::<ResourceMap>().unwrap();
        assert!(bus.is_empty());
        assert!(ResourceRef::from(map.clone()).is_available(None));
    }

    #[test]
    fn scalars_are_rejected() {
        assert!(serde_json::from_str::<ResourceSpec>(r#"{"x": 3}"#).is_err());
        assert!(serde_json::from_str::<ResourceSpec>(r#"{"x": "pin"}"#).is_err());
    }

    #[test]
    fn serializes_back_to_the_same_layout() {
        let text = r#"{"x":null,"y":{"z":null}}"#;
        let spec: ResourceSpec = serde_json::from_str(text).unwrap();
        assert_eq!(serde_json::to_string(&spec).unwrap(), text);
    }
}
