//! The [`GraphConfig`] option map.
//!
//! Options keep insertion order so that a record read back from storage lists
//! its options the way they were written. Values are plain JSON values; typed
//! accessors exist for the options the manager itself interprets.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::options;

/// A single option value.
pub type ConfigValue = serde_json::Value;

/// Ordered mapping of option names to values describing one graph.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GraphConfig {
    options: IndexMap<String, ConfigValue>,
}

impl GraphConfig {
    /// Creates an empty configuration.
    pub fn new() -> Self {
        GraphConfig {
            options: IndexMap::new(),
        }
    }

    /// Builder-style [`set`](Self::set).
    pub fn with(mut self, key: impl Into<String>, value: impl Into<ConfigValue>) -> Self {
        self.set(key, value);
        self
    }

    /// Sets an option, returning the previous value.
    ///
    /// Overwriting an existing key keeps its original position.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<ConfigValue>) -> Option<ConfigValue> {
        self.options.insert(key.into(), value.into())
    }

    pub fn get(&self, key: &str) -> Option<&ConfigValue> {
        self.options.get(key)
    }

    /// Removes an option, preserving the order of the remaining ones.
    pub fn remove(&mut self, key: &str) -> Option<ConfigValue> {
        self.options.shift_remove(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.options.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.options.len()
    }

    pub fn is_empty(&self) -> bool {
        self.options.is_empty()
    }

    /// Iterates options in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &ConfigValue)> {
        self.options.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Returns the option as a string slice if it is a JSON string.
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.options.get(key).and_then(ConfigValue::as_str)
    }

    /// The graph name, if present and non-empty.
    pub fn graph_name(&self) -> Option<&str> {
        self.get_str(options::GRAPH_NAME).filter(|name| !name.is_empty())
    }

    /// The graph name, or [`CoreError::MissingOption`].
    pub fn require_graph_name(&self) -> Result<&str, CoreError> {
        self.graph_name().ok_or_else(|| CoreError::MissingOption {
            key: options::GRAPH_NAME.to_string(),
        })
    }

    /// The backend identifier, if present and non-empty.
    pub fn backend(&self) -> Option<&str> {
        self.get_str(options::STORAGE_BACKEND)
            .filter(|backend| !backend.is_empty())
    }

    /// The backend identifier, or [`CoreError::MissingOption`].
    pub fn require_backend(&self) -> Result<&str, CoreError> {
        self.backend().ok_or_else(|| CoreError::MissingOption {
            key: options::STORAGE_BACKEND.to_string(),
        })
    }

    /// Storage endpoints.
    ///
    /// Accepts either a JSON array of strings or a single comma-separated
    /// string. An absent option yields an empty list.
    pub fn hostnames(&self) -> Result<Vec<String>, CoreError> {
        let key = options::STORAGE_HOSTNAME;
        match self.options.get(key) {
            None => Ok(Vec::new()),
            Some(ConfigValue::String(hosts)) => Ok(hosts
                .split(',')
                .map(str::trim)
                .filter(|h| !h.is_empty())
                .map(str::to_string)
                .collect()),
            Some(ConfigValue::Array(items)) => items
                .iter()
                .map(|item| {
                    item.as_str().map(str::to_string).ok_or_else(|| {
                        CoreError::InvalidOption {
                            key: key.to_string(),
                            reason: format!("expected a string host, got {}", item),
                        }
                    })
                })
                .collect(),
            Some(other) => Err(CoreError::InvalidOption {
                key: key.to_string(),
                reason: format!("expected a string or list of strings, got {}", other),
            }),
        }
    }

    /// Storage port, if configured. Numeric strings are accepted.
    pub fn port(&self) -> Result<Option<u16>, CoreError> {
        let key = options::STORAGE_PORT;
        let invalid = |value: &ConfigValue| CoreError::InvalidOption {
            key: key.to_string(),
            reason: format!("expected a port number, got {}", value),
        };
        match self.options.get(key) {
            None => Ok(None),
            Some(value @ ConfigValue::Number(n)) => n
                .as_u64()
                .and_then(|p| u16::try_from(p).ok())
                .map(Some)
                .ok_or_else(|| invalid(value)),
            Some(value @ ConfigValue::String(s)) => {
                s.trim().parse::<u16>().map(Some).map_err(|_| invalid(value))
            }
            Some(other) => Err(invalid(other)),
        }
    }

    /// Storage namespace this configuration addresses.
    ///
    /// Resolution order: `storage.namespace`, then the graph name, then
    /// [`options::DEFAULT_NAMESPACE`].
    pub fn namespace(&self) -> &str {
        self.get_str(options::STORAGE_NAMESPACE)
            .filter(|ns| !ns.is_empty())
            .or_else(|| self.graph_name())
            .unwrap_or(options::DEFAULT_NAMESPACE)
    }

    /// Copies every option and sets the graph name to `graph_name`.
    ///
    /// If the source already carries a graph name it is overwritten in place,
    /// otherwise the name is appended.
    pub fn with_graph_name(&self, graph_name: &str) -> GraphConfig {
        let mut derived = self.clone();
        derived.set(options::GRAPH_NAME, graph_name);
        derived
    }
}

impl<K, V> FromIterator<(K, V)> for GraphConfig
where
    K: Into<String>,
    V: Into<ConfigValue>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        GraphConfig {
            options: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}
