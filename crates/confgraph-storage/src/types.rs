//! Storage-layer types for instance identity and atomic writes.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identity of one opened [`crate::GraphInstance`] handle.
///
/// Every call to a backend's `open` produces a fresh id, so two handles onto
/// the same namespace are distinguishable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct InstanceId(pub Uuid);

impl InstanceId {
    pub fn new() -> Self {
        InstanceId(Uuid::new_v4())
    }
}

impl Default for InstanceId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for InstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One write inside an atomic [`crate::GraphInstance::apply`] batch.
#[derive(Debug, Clone, PartialEq)]
pub enum VertexMutation {
    /// Inserts the vertex or replaces its properties wholesale.
    Upsert {
        label: String,
        key: String,
        properties: serde_json::Value,
    },
    /// Removes the vertex. Removing an absent vertex is not an error.
    Delete { label: String, key: String },
}

impl VertexMutation {
    pub fn upsert(label: &str, key: &str, properties: serde_json::Value) -> Self {
        VertexMutation::Upsert {
            label: label.to_string(),
            key: key.to_string(),
            properties,
        }
    }

    pub fn delete(label: &str, key: &str) -> Self {
        VertexMutation::Delete {
            label: label.to_string(),
            key: key.to_string(),
        }
    }
}
