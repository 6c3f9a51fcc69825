//! In-memory implementation of [`BackendFactory`].
//!
//! [`InMemoryBackend`] is a first-class backend for tests, the management
//! graph of single-node deployments, and anywhere persistence isn't needed.
//! Namespaces live as long as the factory: reopening a namespace sees the
//! data written by earlier handles, and `destroy` discards it.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use dashmap::DashMap;

use confgraph_core::GraphConfig;

use crate::error::StorageError;
use crate::traits::{BackendFactory, GraphInstance};
use crate::types::{InstanceId, VertexMutation};

/// Vertices of one namespace keyed by (label, key).
type VertexTable = BTreeMap<(String, String), serde_json::Value>;

/// Identifier of the in-memory backend.
pub const BACKEND_NAME: &str = "inmemory";

/// Process-local backend keeping every namespace in a shared map.
pub struct InMemoryBackend {
    namespaces: DashMap<String, Arc<RwLock<VertexTable>>>,
}

impl InMemoryBackend {
    pub fn new() -> Self {
        InMemoryBackend {
            namespaces: DashMap::new(),
        }
    }

    /// Names of all namespaces that currently hold storage, sorted.
    pub fn namespaces(&self) -> Vec<String> {
        let mut names: Vec<String> = self.namespaces.iter().map(|e| e.key().clone()).collect();
        names.sort();
        names
    }
}

impl Default for InMemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl BackendFactory for InMemoryBackend {
    fn name(&self) -> &str {
        BACKEND_NAME
    }

    fn open(&self, config: &GraphConfig) -> Result<Arc<dyn GraphInstance>, StorageError> {
        let namespace = config.namespace().to_string();
        let data = Arc::clone(
            self.namespaces
                .entry(namespace.clone())
                .or_insert_with(|| Arc::new(RwLock::new(VertexTable::new())))
                .value(),
        );
        Ok(Arc::new(InMemoryGraph {
            id: InstanceId::new(),
            namespace,
            config: config.clone(),
            data,
            closed: AtomicBool::new(false),
        }))
    }

    fn destroy(&self, config: &GraphConfig) -> Result<(), StorageError> {
        if let Some((_, data)) = self.namespaces.remove(config.namespace()) {
            // Handles still holding the table must not observe old data.
            data.write().unwrap_or_else(PoisonError::into_inner).clear();
        }
        Ok(())
    }

    fn exists(&self, config: &GraphConfig) -> Result<bool, StorageError> {
        Ok(self.namespaces.contains_key(config.namespace()))
    }
}

/// A handle onto one in-memory namespace.
#[derive(Debug)]
pub struct InMemoryGraph {
    id: InstanceId,
    namespace: String,
    config: GraphConfig,
    data: Arc<RwLock<VertexTable>>,
    closed: AtomicBool,
}

impl InMemoryGraph {
    fn ensure_open(&self) -> Result<(), StorageError> {
        if self.is_closed() {
            return Err(StorageError::InstanceClosed {
                namespace: self.namespace.clone(),
            });
        }
        Ok(())
    }
}

impl GraphInstance for InMemoryGraph {
    fn id(&self) -> InstanceId {
        self.id
    }

    fn namespace(&self) -> &str {
        &self.namespace
    }

    fn effective_configuration(&self) -> &GraphConfig {
        &self.config
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    fn close(&self) -> Result<(), StorageError> {
        self.closed.store(true, Ordering::Release);
        Ok(())
    }

    fn read_vertex(
        &self,
        label: &str,
        key: &str,
    ) -> Result<Option<serde_json::Value>, StorageError> {
        self.ensure_open()?;
        let data = self.data.read().unwrap_or_else(PoisonError::into_inner);
        Ok(data.get(&(label.to_string(), key.to_string())).cloned())
    }

    fn scan_vertices(&self, label: &str) -> Result<Vec<(String, serde_json::Value)>, StorageError> {
        self.ensure_open()?;
        let data = self.data.read().unwrap_or_else(PoisonError::into_inner);
        Ok(data
            .iter()
            .filter(|((l, _), _)| l == label)
            .map(|((_, k), v)| (k.clone(), v.clone()))
            .collect())
    }

    fn apply(&self, mutations: &[VertexMutation]) -> Result<(), StorageError> {
        self.ensure_open()?;
        // Holding the write lock for the whole batch makes it one unit.
        let mut data = self.data.write().unwrap_or_else(PoisonError::into_inner);
        for mutation in mutations {
            match mutation {
                VertexMutation::Upsert {
                    label,
                    key,
                    properties,
                } => {
                    data.insert((label.clone(), key.clone()), properties.clone());
                }
                VertexMutation::Delete { label, key } => {
                    data.remove(&(label.clone(), key.clone()));
                }
            }
        }
        Ok(())
    }
}
