//! Storage capabilities consumed by the confgraph lifecycle manager.
//!
//! Defines the [`GraphInstance`] and [`StorageBackend`] traits, the
//! [`BackendRegistry`] that resolves backend identifiers to
//! [`BackendFactory`] implementations, and two first-class backends:
//! [`InMemoryBackend`] and [`SqliteBackend`].
//!
//! # Modules
//!
//! - [`error`]: StorageError enum with all failure modes
//! - [`types`]: InstanceId and VertexMutation storage-layer types
//! - [`traits`]: GraphInstance, BackendFactory and StorageBackend
//! - [`registry`]: BackendRegistry, the standard StorageBackend
//! - [`memory`]: InMemoryBackend implementation
//! - [`schema`]: SQL migration setup
//! - [`sqlite`]: SqliteBackend implementation

pub mod error;
pub mod memory;
pub mod registry;
pub mod schema;
pub mod sqlite;
pub mod traits;
pub mod types;

// Re-export key types for ergonomic use.
pub use error::StorageError;
pub use memory::InMemoryBackend;
pub use registry::BackendRegistry;
pub use sqlite::SqliteBackend;
pub use traits::{BackendFactory, GraphInstance, StorageBackend};
pub use types::{InstanceId, VertexMutation};
