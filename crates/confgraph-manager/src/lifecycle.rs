//! LifecycleManager: the single coordinator between callers, the
//! configuration records, the instance registry and the storage backend.
//!
//! Per graph name, "configured" and "open" are independent: a name can have
//! a stored configuration without an open handle, and during `drop` a handle
//! briefly outlives its configuration.

use std::sync::Arc;

use confgraph_core::{options, GraphConfig};
use confgraph_storage::{GraphInstance, StorageBackend};

use crate::error::{DropStage, ManagerError};
use crate::management::{ConfigurationManager, ManagementState};
use crate::record_store::ConfigRecordStore;
use crate::registry::InstanceRegistry;

/// Opens, creates, updates, removes, drops and closes named graphs.
///
/// Cheap to share behind an `Arc`; every method takes `&self` and may be
/// called from any thread.
pub struct LifecycleManager {
    management: Arc<ConfigurationManager>,
    registry: Arc<InstanceRegistry>,
}

impl LifecycleManager {
    /// Creates a manager with an empty registry.
    pub fn new(management: Arc<ConfigurationManager>) -> Self {
        Self::with_registry(management, Arc::new(InstanceRegistry::new()))
    }

    /// Creates a manager sharing an existing registry.
    pub fn with_registry(
        management: Arc<ConfigurationManager>,
        registry: Arc<InstanceRegistry>,
    ) -> Self {
        LifecycleManager {
            management,
            registry,
        }
    }

    pub fn management(&self) -> &Arc<ConfigurationManager> {
        &self.management
    }

    pub fn registry(&self) -> &Arc<InstanceRegistry> {
        &self.registry
    }

    fn backend(&self) -> &Arc<dyn StorageBackend> {
        self.management.backend()
    }

    fn records(&self) -> Result<ConfigRecordStore, ManagerError> {
        self.management.records()
    }

    /// Rejects a configuration addressing the management graph's namespace.
    fn check_namespace(
        management: &ManagementState,
        graph_name: &str,
        config: &GraphConfig,
    ) -> Result<(), ManagerError> {
        if config.namespace() == management.namespace() {
            return Err(ManagerError::ReservedNamespace {
                graph_name: graph_name.to_string(),
                namespace: config.namespace().to_string(),
            });
        }
        Ok(())
    }

    /// Persists a named configuration.
    ///
    /// The backend is not validated here; a bogus backend surfaces on `open`.
    /// Fails with [`ManagerError::ReservedNamespace`] if the configuration
    /// would address the management graph's storage.
    pub fn create_configuration(&self, config: &GraphConfig) -> Result<(), ManagerError> {
        let management = self.management.get_instance()?;
        let graph_name = config.graph_name().ok_or(ManagerError::MissingGraphName)?;
        Self::check_namespace(&management, graph_name, config)?;
        management.records().put(config)?;
        tracing::info!("stored configuration for graph '{}'", graph_name);
        Ok(())
    }

    /// Replaces the configuration of `graph_name` and evicts its cached
    /// handle. Holders of the old handle keep using it; it is not closed.
    ///
    /// A `config` without a graph name is stored under `graph_name`.
    pub fn update_configuration(
        &self,
        graph_name: &str,
        config: &GraphConfig,
    ) -> Result<(), ManagerError> {
        let management = self.management.get_instance()?;
        let records = management.records();
        if records.get(graph_name)?.is_none() {
            return Err(ManagerError::ConfigurationDoesNotExist {
                graph_name: graph_name.to_string(),
            });
        }

        let mut config = config.clone();
        match config.graph_name().map(str::to_string) {
            None => {
                config.set(options::GRAPH_NAME, graph_name);
            }
            Some(found) if found != graph_name => {
                return Err(ManagerError::GraphNameMismatch {
                    expected: graph_name.to_string(),
                    found,
                });
            }
            Some(_) => {}
        }
        Self::check_namespace(&management, graph_name, &config)?;

        records.put(&config)?;
        self.registry.invalidate(graph_name);
        tracing::info!("updated configuration for graph '{}'", graph_name);
        Ok(())
    }

    /// Deletes the configuration of `graph_name` and evicts its cached
    /// handle. Succeeds whether or not the configuration exists.
    pub fn remove_configuration(&self, graph_name: &str) -> Result<(), ManagerError> {
        self.records()?.delete(graph_name)?;
        self.registry.invalidate(graph_name);
        tracing::info!("removed configuration for graph '{}'", graph_name);
        Ok(())
    }

    pub fn get_configuration(&self, graph_name: &str) -> Result<GraphConfig, ManagerError> {
        self.records()?
            .get(graph_name)?
            .ok_or_else(|| ManagerError::ConfigurationDoesNotExist {
                graph_name: graph_name.to_string(),
            })
    }

    /// All stored configurations, ordered by graph name.
    pub fn get_configurations(&self) -> Result<Vec<GraphConfig>, ManagerError> {
        self.records()?.list()
    }

    /// Names of all configured graphs, sorted.
    pub fn graph_names(&self) -> Result<Vec<String>, ManagerError> {
        self.records()?.graph_names()
    }

    /// Creates or replaces the template. A graph name in `config` is dropped.
    pub fn create_template_configuration(&self, config: &GraphConfig) -> Result<(), ManagerError> {
        let mut template = config.clone();
        template.remove(options::GRAPH_NAME);
        self.records()?.put_template(&template)?;
        tracing::info!("stored template configuration");
        Ok(())
    }

    /// Replaces an existing template.
    ///
    /// Configurations already derived from the old template are unaffected.
    pub fn update_template_configuration(&self, config: &GraphConfig) -> Result<(), ManagerError> {
        let records = self.records()?;
        if records.get_template()?.is_none() {
            return Err(ManagerError::TemplateConfigurationDoesNotExist);
        }
        let mut template = config.clone();
        template.remove(options::GRAPH_NAME);
        records.put_template(&template)?;
        tracing::info!("updated template configuration");
        Ok(())
    }

    pub fn remove_template_configuration(&self) -> Result<(), ManagerError> {
        self.records()?.delete_template()?;
        tracing::info!("removed template configuration");
        Ok(())
    }

    pub fn get_template_configuration(&self) -> Result<GraphConfig, ManagerError> {
        self.records()?
            .get_template()?
            .ok_or(ManagerError::TemplateConfigurationDoesNotExist)
    }

    /// Returns the open handle for `graph_name`, opening it from its stored
    /// configuration on a cache miss.
    ///
    /// Repeated calls return the same handle until it is evicted or closed.
    /// An open racing a configuration change retries, so it never caches a
    /// handle built from a superseded configuration.
    pub fn open(&self, graph_name: &str) -> Result<Arc<dyn GraphInstance>, ManagerError> {
        loop {
            if let Some(graph) = self.registry.lookup(graph_name) {
                return Ok(graph);
            }

            let generation = self.registry.generation(graph_name);
            let config = self.records()?.get(graph_name)?.ok_or_else(|| {
                ManagerError::ConfigurationDoesNotExist {
                    graph_name: graph_name.to_string(),
                }
            })?;

            let opened = self
                .backend()
                .open(&config)
                .map_err(ManagerError::from_open)?;

            match self
                .registry
                .put_if_current(graph_name, Arc::clone(&opened), generation)
            {
                Some((installed, true)) => {
                    tracing::info!("opened graph '{}' ({})", graph_name, installed.id());
                    return Ok(installed);
                }
                Some((installed, false)) => {
                    // Another caller won the race; don't leak our connection.
                    tracing::debug!(
                        "discarding duplicate handle {} for graph '{}'",
                        opened.id(),
                        graph_name
                    );
                    discard(graph_name, &opened);
                    return Ok(installed);
                }
                None => {
                    tracing::debug!(
                        "configuration of graph '{}' changed while opening; retrying",
                        graph_name
                    );
                    discard(graph_name, &opened);
                }
            }
        }
    }

    /// Derives a configuration for `graph_name` from the template, stores it
    /// and opens the graph.
    ///
    /// The template is required even when `graph_name` already has its own
    /// configuration; that configuration is then replaced by the derived one.
    pub fn create(&self, graph_name: &str) -> Result<Arc<dyn GraphInstance>, ManagerError> {
        let template = self
            .records()?
            .get_template()?
            .ok_or(ManagerError::TemplateConfigurationDoesNotExist)?;
        let config = template.with_graph_name(graph_name);
        self.create_configuration(&config)?;
        self.open(graph_name)
    }

    /// Destroys `graph_name`: its backing storage, its handle and its
    /// configuration.
    ///
    /// The steps run in order and are not atomic. A failure is reported as
    /// [`ManagerError::DropIncomplete`] naming the failed step; earlier steps
    /// stay applied. Callers clean up with
    /// [`remove_configuration`](Self::remove_configuration) and
    /// [`close`](Self::close).
    pub fn drop(&self, graph_name: &str) -> Result<(), ManagerError> {
        let failed =
            |stage: DropStage, err: ManagerError| ManagerError::drop_failed(graph_name, stage, err);

        let graph = self
            .open(graph_name)
            .map_err(|e| failed(DropStage::Open, e))?;
        let config = graph.effective_configuration().clone();

        self.management
            .get_instance()
            .and_then(|management| Self::check_namespace(&management, graph_name, &config))
            .map_err(|e| failed(DropStage::DestroyStorage, e))?;
        self.backend()
            .destroy_all(&config)
            .map_err(|e| failed(DropStage::DestroyStorage, e.into()))?;
        graph
            .close()
            .map_err(|e| failed(DropStage::Close, e.into()))?;
        self.records()
            .and_then(|records| records.delete(graph_name))
            .map_err(|e| failed(DropStage::RemoveConfiguration, e))?;
        // A handle installed by a racing open after the close stays cached.
        self.registry.invalidate_if_same(graph_name, graph.id());

        tracing::info!("dropped graph '{}' ({})", graph_name, graph.id());
        Ok(())
    }

    /// Closes and evicts the open handle for `graph_name`, if any.
    pub fn close(&self, graph_name: &str) -> Result<(), ManagerError> {
        if let Some(graph) = self.registry.evict(graph_name) {
            if !graph.is_closed() {
                graph.close()?;
                tracing::info!("closed graph '{}' ({})", graph_name, graph.id());
            }
        }
        Ok(())
    }

    /// Closes and evicts every cached handle. Returns how many were closed.
    ///
    /// Close failures are logged and do not stop the sweep.
    pub fn close_all(&self) -> usize {
        let mut closed = 0;
        for (graph_name, graph) in self.registry.drain() {
            if graph.is_closed() {
                continue;
            }
            match graph.close() {
                Ok(()) => closed += 1,
                Err(err) => {
                    tracing::warn!("failed to close graph '{}': {}", graph_name, err)
                }
            }
        }
        if closed > 0 {
            tracing::info!("closed {} graph(s)", closed);
        }
        closed
    }

    /// Whether a live handle is cached for `graph_name`.
    pub fn is_open(&self, graph_name: &str) -> bool {
        self.registry.lookup(graph_name).is_some()
    }

    /// Names with a live cached handle, sorted.
    pub fn open_graph_names(&self) -> Vec<String> {
        self.registry.open_names()
    }
}

/// Closes a handle that lost its install, logging rather than surfacing
/// failures.
fn discard(graph_name: &str, graph: &Arc<dyn GraphInstance>) {
    if let Err(err) = graph.close() {
        tracing::warn!(
            "failed to close discarded handle for graph '{}': {}",
            graph_name,
            err
        );
    }
}
