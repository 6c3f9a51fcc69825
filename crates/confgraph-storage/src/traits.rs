//! The capabilities the lifecycle manager consumes from storage.
//!
//! - [`GraphInstance`]: an opened database handle. Besides lifecycle queries
//!   it exposes a minimal property-vertex API, which is all the management
//!   graph needs to persist configuration records.
//! - [`BackendFactory`]: one backend implementation (in-memory, SQLite, ...).
//! - [`StorageBackend`]: resolves a backend identifier to a factory and
//!   dispatches open/destroy to it.
//!
//! All traits are `Send + Sync`: handles are shared across caller threads
//! through `Arc`.

use std::fmt;
use std::sync::Arc;

use confgraph_core::GraphConfig;

use crate::error::StorageError;
use crate::types::{InstanceId, VertexMutation};

/// An opened graph database handle.
pub trait GraphInstance: Send + Sync + fmt::Debug {
    /// Identity of this handle.
    fn id(&self) -> InstanceId;

    /// Storage namespace the handle is bound to.
    fn namespace(&self) -> &str;

    /// The configuration this handle was opened with.
    fn effective_configuration(&self) -> &GraphConfig;

    fn is_closed(&self) -> bool;

    /// Closes the handle. Closing an already-closed handle is a no-op.
    fn close(&self) -> Result<(), StorageError>;

    /// Reads the properties of one vertex.
    fn read_vertex(&self, label: &str, key: &str)
        -> Result<Option<serde_json::Value>, StorageError>;

    /// Lists all vertices carrying `label`, ordered by key.
    fn scan_vertices(&self, label: &str) -> Result<Vec<(String, serde_json::Value)>, StorageError>;

    /// Applies `mutations` as one committed unit.
    ///
    /// Either every mutation is visible afterwards or, on error, none is.
    fn apply(&self, mutations: &[VertexMutation]) -> Result<(), StorageError>;
}

/// A single backend implementation.
pub trait BackendFactory: Send + Sync {
    /// Identifier this factory is registered under (`storage.backend`).
    fn name(&self) -> &str;

    /// Opens a new handle onto the namespace described by `config`.
    fn open(&self, config: &GraphConfig) -> Result<Arc<dyn GraphInstance>, StorageError>;

    /// Irrecoverably deletes all data in the namespace described by `config`.
    ///
    /// Destroying a namespace that does not exist succeeds.
    fn destroy(&self, config: &GraphConfig) -> Result<(), StorageError>;

    /// Whether backing storage currently exists for the namespace.
    fn exists(&self, config: &GraphConfig) -> Result<bool, StorageError>;
}

/// Resolves backend identifiers and dispatches to the matching factory.
pub trait StorageBackend: Send + Sync {
    /// Looks up the factory for `backend`.
    fn resolve(&self, backend: &str) -> Result<Arc<dyn BackendFactory>, StorageError>;

    /// Opens a graph using the backend named in `config`.
    fn open(&self, config: &GraphConfig) -> Result<Arc<dyn GraphInstance>, StorageError> {
        let backend = config.require_backend()?;
        self.resolve(backend)?.open(config)
    }

    /// Destroys all storage for the namespace named in `config`.
    fn destroy_all(&self, config: &GraphConfig) -> Result<(), StorageError> {
        let backend = config.require_backend()?;
        self.resolve(backend)?.destroy(config)
    }

    /// Whether storage exists for the namespace named in `config`.
    fn namespace_exists(&self, config: &GraphConfig) -> Result<bool, StorageError> {
        let backend = config.require_backend()?;
        self.resolve(backend)?.exists(config)
    }
}
