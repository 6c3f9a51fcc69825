//! Well-known configuration option keys.
//!
//! Any key not listed here is passed through to the storage backend untouched.

/// Unique name of the graph a configuration describes.
pub const GRAPH_NAME: &str = "graph.graphname";

/// Backend identifier, resolved at open time (e.g. `inmemory`, `sqlite`).
pub const STORAGE_BACKEND: &str = "storage.backend";

/// Endpoints of the storage cluster.
pub const STORAGE_HOSTNAME: &str = "storage.hostname";

/// Port of the storage cluster.
pub const STORAGE_PORT: &str = "storage.port";

/// Base directory for file-backed storage.
pub const STORAGE_DIRECTORY: &str = "storage.directory";

/// Explicit storage namespace; defaults to the graph name.
pub const STORAGE_NAMESPACE: &str = "storage.namespace";

/// Namespace used when neither a namespace nor a graph name is configured.
pub const DEFAULT_NAMESPACE: &str = "default";
