//! Configuration records persisted inside the management graph.
//!
//! Each named configuration is one vertex labelled [`CONFIGURATION_LABEL`],
//! keyed by graph name. The template is a single vertex under
//! [`TEMPLATE_LABEL`]. Every call is one committed unit against the
//! management graph; nothing is cached here.

use std::sync::Arc;

use confgraph_core::GraphConfig;
use confgraph_storage::{GraphInstance, StorageError, VertexMutation};

use crate::error::ManagerError;

/// Vertex label of named configuration records.
pub const CONFIGURATION_LABEL: &str = "Configuration";

/// Vertex label of the template record.
pub const TEMPLATE_LABEL: &str = "TemplateConfiguration";

/// Key of the single template vertex.
const TEMPLATE_KEY: &str = "template";

/// Thin persistence layer over the bootstrap graph.
#[derive(Debug, Clone)]
pub struct ConfigRecordStore {
    graph: Arc<dyn GraphInstance>,
}

impl ConfigRecordStore {
    pub fn new(graph: Arc<dyn GraphInstance>) -> Self {
        ConfigRecordStore { graph }
    }

    /// Upserts `record` keyed by its graph name.
    pub fn put(&self, record: &GraphConfig) -> Result<(), ManagerError> {
        let graph_name = record.graph_name().ok_or(ManagerError::MissingGraphName)?;
        let properties = encode(record)?;
        self.graph.apply(&[VertexMutation::upsert(
            CONFIGURATION_LABEL,
            graph_name,
            properties,
        )])?;
        Ok(())
    }

    pub fn get(&self, graph_name: &str) -> Result<Option<GraphConfig>, ManagerError> {
        self.graph
            .read_vertex(CONFIGURATION_LABEL, graph_name)?
            .map(decode)
            .transpose()
    }

    /// Deletes the record for `graph_name`; absent records are ignored.
    pub fn delete(&self, graph_name: &str) -> Result<(), ManagerError> {
        self.graph
            .apply(&[VertexMutation::delete(CONFIGURATION_LABEL, graph_name)])?;
        Ok(())
    }

    /// All named records, ordered by graph name.
    pub fn list(&self) -> Result<Vec<GraphConfig>, ManagerError> {
        self.graph
            .scan_vertices(CONFIGURATION_LABEL)?
            .into_iter()
            .map(|(_, properties)| decode(properties))
            .collect()
    }

    /// Names of all configured graphs, sorted.
    pub fn graph_names(&self) -> Result<Vec<String>, ManagerError> {
        Ok(self
            .graph
            .scan_vertices(CONFIGURATION_LABEL)?
            .into_iter()
            .map(|(key, _)| key)
            .collect())
    }

    /// Creates or replaces the template.
    pub fn put_template(&self, record: &GraphConfig) -> Result<(), ManagerError> {
        let properties = encode(record)?;
        self.graph.apply(&[VertexMutation::upsert(
            TEMPLATE_LABEL,
            TEMPLATE_KEY,
            properties,
        )])?;
        Ok(())
    }

    pub fn get_template(&self) -> Result<Option<GraphConfig>, ManagerError> {
        self.graph
            .read_vertex(TEMPLATE_LABEL, TEMPLATE_KEY)?
            .map(decode)
            .transpose()
    }

    /// Deletes the template; a missing template is ignored.
    pub fn delete_template(&self) -> Result<(), ManagerError> {
        self.graph
            .apply(&[VertexMutation::delete(TEMPLATE_LABEL, TEMPLATE_KEY)])?;
        Ok(())
    }
}

fn encode(record: &GraphConfig) -> Result<serde_json::Value, ManagerError> {
    serde_json::to_value(record).map_err(|e| StorageError::from(e).into())
}

fn decode(properties: serde_json::Value) -> Result<GraphConfig, ManagerError> {
    serde_json::from_value(properties).map_err(|e| StorageError::from(e).into())
}
