//! Routing keys that shard tasks into ordered lanes

use serde::{Deserialize, Serialize};
use std::fmt;

/// Selects the lane a task is appended to.
///
/// `Index` keys address a fixed slot table allocated up front; `Key` keys
/// address an open, growing map. Tasks under equal keys run in submission
/// order and never concurrently.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoutingKey {
    /// Bounded integer index
    Index(u16),
    /// Open string key
    Key(String),
}

impl RoutingKey {
    /// Returns the index if this is an index key.
    pub fn as_index(&self) -> Option<u16> {
        match self {
            RoutingKey::Index(index) => Some(*index),
            RoutingKey::Key(_) => None,
        }
    }

    /// Returns the string if this is an open key.
    pub fn as_key(&self) -> Option<&str> {
        match self {
            RoutingKey::Index(_) => None,
            RoutingKey::Key(key) => Some(key),
        }
    }
}

impl fmt::Display for RoutingKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RoutingKey::Index(index) => write!(f, "#{}", index),
            RoutingKey::Key(key) => f.write_str(key),
        }
    }
}

impl From<u16> for RoutingKey {
    fn from(index: u16) -> Self {
        RoutingKey::Index(index)
    }
}

impl From<&str> for RoutingKey {
    fn from(key: &str) -> Self {
        RoutingKey::Key(key.to_owned())
    }
}

impl From<String> for RoutingKey {
    fn from(key: String) -> Self {
        RoutingKey::Key(key)
    }
}

impl From<&String> for RoutingKey {
    fn from(key: &String) -> Self {
        RoutingKey::Key(key.clone())
    }
}

impl From<&RoutingKey> for RoutingKey {
    fn from(key: &RoutingKey) -> Self {
        key.clone()
    }
}
