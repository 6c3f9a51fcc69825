//! Storage error types for confgraph-storage.
//!
//! [`StorageError`] covers every failure mode of the storage layer: SQLite
//! and migration failures, serialization, filesystem errors, backend
//! resolution, and use of a closed instance.

use confgraph_core::CoreError;
use thiserror::Error;

/// Errors produced by storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
    /// An underlying SQLite operation failed.
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// Applying schema migrations failed.
    #[error("migration error: {0}")]
    Migration(String),

    /// JSON serialization or deserialization failed.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Filesystem access failed.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// No backend is registered under the given identifier.
    #[error("Could not find implementation class: {0}")]
    UnknownBackend(String),

    /// The configuration cannot be used to open a graph.
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(#[from] CoreError),

    /// The instance was closed before the operation.
    #[error("graph instance for namespace '{namespace}' is closed")]
    InstanceClosed { namespace: String },

    /// A unit of work could not be committed; nothing was applied.
    #[error("commit failed: {reason}")]
    CommitFailed { reason: String },
}
