use std::collections::BTreeMap;
use std::ops::{Deref, DerefMut};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Desired properties of a resource or a provider, as declared by the caller.
///
/// Values are kept as JSON so that nested objects, arrays and numbers survive
/// the trip to a remote provider unchanged.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Config(pub Map<String, Value>);

impl Config {
    pub fn new() -> Self {
        Config(Map::new())
    }

    /// Build a configuration from a JSON value, which must be an object.
    pub fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Object(map) => Some(Config(map)),
            _ => None,
        }
    }
}

impl Deref for Config {
    type Target = Map<String, Value>;
    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl DerefMut for Config {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.0
    }
}

impl<K: Into<String>> FromIterator<(K, Value)> for Config {
    fn from_iter<T: IntoIterator<Item = (K, Value)>>(iter: T) -> Self {
        Config(iter.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }
}

/// The last known concrete attributes of one resource instance.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceState {
    /// The resource type, e.g. `"test_instance"`
    #[serde(rename = "type")]
    pub type_: String,
    /// Identifier assigned by the provider. Empty when the resource does not
    /// exist (yet).
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub attributes: BTreeMap<String, String>,
    /// Provider specific data. The orchestrator never looks inside.
    #[serde(default)]
    pub meta: Value,
}

impl ResourceState {
    /// The state of a resource of the given type that has not been created.
    pub fn absent(type_: impl Into<String>) -> Self {
        ResourceState {
            type_: type_.into(),
            ..Default::default()
        }
    }

    pub fn is_present(&self) -> bool {
        !self.id.is_empty()
    }
}

/// The change to a single attribute.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceAttrDiff {
    #[serde(default)]
    pub old: String,
    #[serde(default)]
    pub new: String,
    /// The new value is only known after apply.
    #[serde(default)]
    pub new_computed: bool,
    /// Changing this attribute replaces the resource.
    #[serde(default)]
    pub requires_new: bool,
}

/// The changes a provider intends to make to converge a resource.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceDiff {
    #[serde(default)]
    pub attributes: BTreeMap<String, ResourceAttrDiff>,
    /// The resource is to be removed.
    #[serde(default)]
    pub destroy: bool,
}

impl ResourceDiff {
    pub fn is_empty(&self) -> bool {
        self.attributes.is_empty() && !self.destroy
    }

    pub fn requires_new(&self) -> bool {
        self.attributes.values().any(|a| a.requires_new)
    }
}

/// A kind of resource that a provider manages.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ResourceType {
    pub name: String,
}

impl ResourceType {
    pub fn new(name: impl Into<String>) -> Self {
        ResourceType { name: name.into() }
    }
}
