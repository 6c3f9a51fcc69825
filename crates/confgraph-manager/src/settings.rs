//! Settings for bootstrapping a manager in an embedding process.
//!
//! Reads configuration from environment variables:
//! - `CONFGRAPH_BACKEND`: management graph backend (default: "inmemory")
//! - `CONFGRAPH_DATA_DIR`: base directory for file-backed graphs
//! - `CONFGRAPH_HOSTS`: comma-separated storage endpoints
//! - `CONFGRAPH_PORT`: storage port
//! - `CONFGRAPH_NAMESPACE`: management graph namespace
//!   (default: "configuration_management")
//!
//! or from a JSON document via [`ManagerSettings::from_json`].

use std::path::PathBuf;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use confgraph_core::{options, GraphConfig};
use confgraph_storage::{BackendRegistry, StorageBackend};

use crate::error::ManagerError;
use crate::lifecycle::LifecycleManager;
use crate::management::ConfigurationManager;

/// Namespace of the management graph unless configured otherwise.
pub const DEFAULT_MANAGEMENT_NAMESPACE: &str = "configuration_management";

/// How to reach the management graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ManagerSettings {
    /// Backend identifier of the management graph.
    pub backend: String,
    /// Base directory for file-backed graphs.
    pub data_dir: Option<PathBuf>,
    /// Storage endpoints of the management graph.
    pub hosts: Vec<String>,
    pub port: Option<u16>,
    /// Namespace holding the management graph.
    pub namespace: String,
    /// Extra backend-specific options passed through to the management graph.
    pub options: GraphConfig,
}

impl Default for ManagerSettings {
    fn default() -> Self {
        ManagerSettings {
            backend: "inmemory".to_string(),
            data_dir: None,
            hosts: Vec::new(),
            port: None,
            namespace: DEFAULT_MANAGEMENT_NAMESPACE.to_string(),
            options: GraphConfig::new(),
        }
    }
}

impl ManagerSettings {
    /// Reads settings from the process environment.
    pub fn from_env() -> Result<Self, ManagerError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Reads settings through `lookup`, using the same keys as
    /// [`from_env`](Self::from_env).
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ManagerError> {
        let defaults = Self::default();
        let port = match lookup("CONFGRAPH_PORT") {
            Some(raw) => Some(raw.trim().parse::<u16>().map_err(|e| {
                ManagerError::InvalidSettings(format!("CONFGRAPH_PORT '{}': {}", raw, e))
            })?),
            None => None,
        };
        Ok(ManagerSettings {
            backend: lookup("CONFGRAPH_BACKEND").unwrap_or(defaults.backend),
            data_dir: lookup("CONFGRAPH_DATA_DIR").map(PathBuf::from),
            hosts: lookup("CONFGRAPH_HOSTS")
                .map(|hosts| {
                    hosts
                        .split(',')
                        .map(str::trim)
                        .filter(|h| !h.is_empty())
                        .map(str::to_string)
                        .collect()
                })
                .unwrap_or_default(),
            port,
            namespace: lookup("CONFGRAPH_NAMESPACE").unwrap_or(defaults.namespace),
            options: defaults.options,
        })
    }

    /// Parses settings from JSON; missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self, ManagerError> {
        serde_json::from_str(json).map_err(|e| ManagerError::InvalidSettings(e.to_string()))
    }

    /// Configuration used to open the management graph.
    pub fn bootstrap_config(&self) -> GraphConfig {
        let mut config = self.options.clone();
        config.set(options::STORAGE_BACKEND, self.backend.as_str());
        config.set(options::STORAGE_NAMESPACE, self.namespace.as_str());
        if let Some(dir) = &self.data_dir {
            config.set(
                options::STORAGE_DIRECTORY,
                dir.to_string_lossy().into_owned(),
            );
        }
        if !self.hosts.is_empty() {
            config.set(options::STORAGE_HOSTNAME, self.hosts.clone());
        }
        if let Some(port) = self.port {
            config.set(options::STORAGE_PORT, port);
        }
        config
    }

    /// The standard backend registry, with SQLite files defaulting to
    /// `data_dir` when set.
    pub fn storage_backend(&self) -> BackendRegistry {
        match &self.data_dir {
            Some(dir) => BackendRegistry::with_data_dir(dir),
            None => BackendRegistry::with_defaults(),
        }
    }

    /// Builds a manager over [`storage_backend`](Self::storage_backend) and
    /// bootstraps it.
    pub fn start(&self) -> Result<LifecycleManager, ManagerError> {
        self.start_with(Arc::new(self.storage_backend()))
    }

    /// Builds a manager over `backend` and bootstraps it.
    pub fn start_with(
        &self,
        backend: Arc<dyn StorageBackend>,
    ) -> Result<LifecycleManager, ManagerError> {
        let management = Arc::new(ConfigurationManager::new(backend));
        management.bootstrap(&self.bootstrap_config())?;
        Ok(LifecycleManager::new(management))
    }
}
