//! [`BackendRegistry`]: the standard [`StorageBackend`].
//!
//! Maps `storage.backend` identifiers to [`BackendFactory`] instances. A
//! factory is shared by every graph opened through it, which is what lets the
//! in-memory backend keep namespaces alive between opens.

use std::path::PathBuf;
use std::sync::Arc;

use dashmap::DashMap;

use crate::error::StorageError;
use crate::memory::InMemoryBackend;
use crate::sqlite::SqliteBackend;
use crate::traits::{BackendFactory, StorageBackend};

/// Registry of backend factories keyed by identifier.
pub struct BackendRegistry {
    factories: DashMap<String, Arc<dyn BackendFactory>>,
}

impl BackendRegistry {
    /// Creates a registry with no backends.
    pub fn new() -> Self {
        BackendRegistry {
            factories: DashMap::new(),
        }
    }

    /// Creates a registry with the `inmemory` and `sqlite` backends.
    ///
    /// The SQLite backend requires `storage.directory` in every config.
    pub fn with_defaults() -> Self {
        let registry = Self::new();
        registry.register(Arc::new(InMemoryBackend::new()));
        registry.register(Arc::new(SqliteBackend::new()));
        registry
    }

    /// Like [`with_defaults`](Self::with_defaults), with SQLite files placed
    /// under `data_dir` unless a config names its own directory.
    pub fn with_data_dir(data_dir: impl Into<PathBuf>) -> Self {
        let registry = Self::new();
        registry.register(Arc::new(InMemoryBackend::new()));
        registry.register(Arc::new(SqliteBackend::with_default_directory(data_dir)));
        registry
    }

    /// Registers `factory` under its own name, returning any factory it replaced.
    pub fn register(&self, factory: Arc<dyn BackendFactory>) -> Option<Arc<dyn BackendFactory>> {
        self.factories.insert(factory.name().to_string(), factory)
    }

    /// Registered identifiers, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.factories.iter().map(|e| e.key().clone()).collect();
        names.sort();
        names
    }
}

impl Default for BackendRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl StorageBackend for BackendRegistry {
    fn resolve(&self, backend: &str) -> Result<Arc<dyn BackendFactory>, StorageError> {
        self.factories
            .get(backend)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or_else(|| StorageError::UnknownBackend(backend.to_string()))
    }
}
