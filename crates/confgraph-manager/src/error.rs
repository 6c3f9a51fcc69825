//! Manager error types.
//!
//! [`ManagerError`] is the unified error type for every lifecycle and
//! configuration operation. Two variants carry fixed, user-facing guidance
//! text that embedding servers surface verbatim.

use std::fmt;

use confgraph_core::options;
use confgraph_storage::StorageError;

/// Step of [`crate::LifecycleManager::drop`] that failed.
///
/// Steps before the failing one have already taken effect and are not rolled
/// back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropStage {
    /// Opening the graph before destroying it.
    Open,
    /// Deleting the backing storage.
    DestroyStorage,
    /// Closing the graph handle.
    Close,
    /// Deleting the configuration record.
    RemoveConfiguration,
}

impl fmt::Display for DropStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            DropStage::Open => "opening the graph",
            DropStage::DestroyStorage => "destroying backing storage",
            DropStage::Close => "closing the graph",
            DropStage::RemoveConfiguration => "removing the configuration",
        };
        f.write_str(text)
    }
}

/// Errors from configuration management and graph lifecycle operations.
#[derive(Debug, thiserror::Error)]
pub enum ManagerError {
    /// The management graph has not been bootstrapped yet.
    #[error("the configuration management graph is not enabled; bootstrap it first")]
    NotEnabled,

    /// A management graph already exists for this manager.
    #[error("the configuration management graph has already been bootstrapped")]
    AlreadyBootstrapped,

    /// The configuration lacks a non-empty graph name.
    #[error("Please include in your configuration the option: {}", options::GRAPH_NAME)]
    MissingGraphName,

    /// No configuration is stored for the graph.
    #[error("Please create configuration for this graph using the ConfigurationManagementGraph#createConfiguration API.")]
    ConfigurationDoesNotExist { graph_name: String },

    /// No template configuration is stored.
    #[error("Please create a template Configuration using the ConfigurationManagementGraph#createTemplateConfiguration API.")]
    TemplateConfigurationDoesNotExist,

    /// The backend named by a configuration cannot be resolved or used.
    #[error("{0}")]
    BackendResolution(String),

    /// An update names a different graph than the one being updated.
    #[error("configuration names graph '{found}' but was submitted for graph '{expected}'")]
    GraphNameMismatch { expected: String, found: String },

    /// The configuration resolves to the namespace holding the management
    /// graph.
    #[error("graph '{graph_name}' cannot use namespace '{namespace}': it holds the configuration management graph")]
    ReservedNamespace {
        graph_name: String,
        namespace: String,
    },

    /// Settings could not be parsed.
    #[error("invalid settings: {0}")]
    InvalidSettings(String),

    /// Reading or writing the management graph failed.
    #[error("persistence error: {0}")]
    Persistence(#[from] StorageError),

    /// `drop` failed partway through.
    ///
    /// Callers should follow up with `remove_configuration` and `close` to
    /// clean up whatever the earlier steps left behind.
    #[error("drop of graph '{graph_name}' failed while {stage}: {source}")]
    DropIncomplete {
        graph_name: String,
        stage: DropStage,
        source: Box<ManagerError>,
    },
}

impl ManagerError {
    /// Classifies a storage error raised while opening a graph.
    ///
    /// Resolution and configuration problems are argument errors; anything
    /// else is a persistence failure.
    pub fn from_open(err: StorageError) -> Self {
        match err {
            StorageError::UnknownBackend(_) | StorageError::InvalidConfiguration(_) => {
                ManagerError::BackendResolution(err.to_string())
            }
            other => ManagerError::Persistence(other),
        }
    }

    pub(crate) fn drop_failed(graph_name: &str, stage: DropStage, source: ManagerError) -> Self {
        ManagerError::DropIncomplete {
            graph_name: graph_name.to_string(),
            stage,
            source: Box::new(source),
        }
    }
}
