//! The running state snapshot: every resource touched so far, by address.

use std::collections::BTreeMap;
use std::fmt::Display;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::ResourceState;

/// Address of a resource, `<type>.<name>`, e.g. `test_instance.foo`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ResourceAddress {
    type_: String,
    name: String,
}

impl ResourceAddress {
    pub fn new(type_: impl Into<String>, name: impl Into<String>) -> Self {
        ResourceAddress {
            type_: type_.into(),
            name: name.into(),
        }
    }

    pub fn type_(&self) -> &str {
        &self.type_
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The provider responsible for this resource by naming convention: the
    /// type up to the first `_`, so `test_instance` belongs to `test`.
    pub fn provider(&self) -> &str {
        self.type_
            .split_once('_')
            .map(|(p, _)| p)
            .unwrap_or(&self.type_)
    }
}

impl Display for ResourceAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}", self.type_, self.name)
    }
}

impl FromStr for ResourceAddress {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once('.') {
            Some((t, n)) if !t.is_empty() && !n.is_empty() && !n.contains('.') => {
                Ok(ResourceAddress::new(t, n))
            }
            _ => Err(format!(
                "invalid resource address {:?}, expected <type>.<name>",
                s
            )),
        }
    }
}

impl TryFrom<String> for ResourceAddress {
    type Error = String;
    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<ResourceAddress> for String {
    fn from(a: ResourceAddress) -> Self {
        a.to_string()
    }
}

/// Resource states accumulated over a run.
///
/// `serial` counts the mutations, so that an observer can tell two snapshots
/// apart without comparing their contents.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct State {
    pub serial: u64,
    pub resources: BTreeMap<ResourceAddress, ResourceState>,
}

impl State {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, address: &ResourceAddress) -> Option<&ResourceState> {
        self.resources.get(address)
    }

    /// Replace the state of `address` wholesale.
    pub fn set(&mut self, address: ResourceAddress, state: ResourceState) {
        self.resources.insert(address, state);
        self.serial += 1;
    }

    /// Whether `address` exists, i.e. carries a non-empty id.
    pub fn is_present(&self, address: &ResourceAddress) -> bool {
        self.get(address).is_some_and(ResourceState::is_present)
    }

    /// Resources that exist and must be accounted for by a teardown.
    pub fn present(&self) -> impl Iterator<Item = (&ResourceAddress, &ResourceState)> {
        self.resources.iter().filter(|(_, r)| r.is_present())
    }
}
