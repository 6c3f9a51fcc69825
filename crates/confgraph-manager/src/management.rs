//! Bootstrap of the configuration management graph.
//!
//! The management graph stores every other graph's configuration, so it has
//! to be opened first, from a configuration supplied out of band. A
//! [`ConfigurationManager`] is constructed once at process start and shared
//! by `Arc`; it bootstraps at most once.

use std::sync::{Arc, Mutex, PoisonError};

use confgraph_core::GraphConfig;
use confgraph_storage::{GraphInstance, StorageBackend};

use crate::error::ManagerError;
use crate::record_store::ConfigRecordStore;

/// The bootstrapped management graph and the record store over it.
#[derive(Debug)]
pub struct ManagementState {
    graph: Arc<dyn GraphInstance>,
    records: ConfigRecordStore,
}

impl ManagementState {
    fn new(graph: Arc<dyn GraphInstance>) -> Self {
        let records = ConfigRecordStore::new(Arc::clone(&graph));
        ManagementState { graph, records }
    }

    pub fn graph(&self) -> &Arc<dyn GraphInstance> {
        &self.graph
    }

    pub fn records(&self) -> &ConfigRecordStore {
        &self.records
    }

    /// Namespace holding the management graph. No managed graph may use it.
    pub fn namespace(&self) -> &str {
        self.graph.namespace()
    }
}

/// Owner of the management graph.
pub struct ConfigurationManager {
    backend: Arc<dyn StorageBackend>,
    state: Mutex<Option<Arc<ManagementState>>>,
}

impl ConfigurationManager {
    /// Creates a manager that has not been bootstrapped.
    pub fn new(backend: Arc<dyn StorageBackend>) -> Self {
        ConfigurationManager {
            backend,
            state: Mutex::new(None),
        }
    }

    /// The backend used for the management graph and every managed graph.
    pub fn backend(&self) -> &Arc<dyn StorageBackend> {
        &self.backend
    }

    /// Opens the management graph from `config`.
    ///
    /// Fails with [`ManagerError::AlreadyBootstrapped`] if a management graph
    /// already exists. Concurrent callers are serialized: exactly one opens
    /// the graph and the rest observe `AlreadyBootstrapped`.
    pub fn bootstrap(&self, config: &GraphConfig) -> Result<Arc<ManagementState>, ManagerError> {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if state.is_some() {
            tracing::warn!("rejected second bootstrap of the configuration management graph");
            return Err(ManagerError::AlreadyBootstrapped);
        }

        let graph = self.backend.open(config).map_err(ManagerError::from_open)?;
        tracing::info!(
            "configuration management graph bootstrapped on namespace '{}' ({})",
            graph.namespace(),
            graph.id()
        );
        let management = Arc::new(ManagementState::new(graph));
        *state = Some(Arc::clone(&management));
        Ok(management)
    }

    /// Returns the management state, or [`ManagerError::NotEnabled`] if
    /// [`bootstrap`](Self::bootstrap) has not succeeded yet.
    pub fn get_instance(&self) -> Result<Arc<ManagementState>, ManagerError> {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
            .ok_or(ManagerError::NotEnabled)
    }

    pub fn is_bootstrapped(&self) -> bool {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    /// Record store over the management graph.
    pub fn records(&self) -> Result<ConfigRecordStore, ManagerError> {
        Ok(self.get_instance()?.records().clone())
    }

    /// Closes the management graph.
    ///
    /// The manager stays bootstrapped; record operations afterwards fail with
    /// a persistence error.
    pub fn shutdown(&self) -> Result<(), ManagerError> {
        if let Ok(management) = self.get_instance() {
            management.graph().close()?;
            tracing::info!("configuration management graph closed");
        }
        Ok(())
    }
}
