//! Integration tests for graph lifecycle operations against real backends.

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use confgraph_core::{options, GraphConfig};
use confgraph_manager::{
    ConfigurationManager, DropStage, LifecycleManager, ManagerError, ManagerSettings,
};
use confgraph_storage::{
    BackendFactory, BackendRegistry, GraphInstance, InMemoryBackend, InstanceId, StorageBackend,
    StorageError, VertexMutation,
};

// ---------------------------------------------------------------------------
// Test helpers
// ---------------------------------------------------------------------------

fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

fn start(backend: Arc<dyn StorageBackend>, bootstrap: &GraphConfig) -> LifecycleManager {
    init_tracing();
    let management = Arc::new(ConfigurationManager::new(backend));
    management
        .bootstrap(bootstrap)
        .expect("failed to bootstrap management graph");
    LifecycleManager::new(management)
}

fn inmemory_manager() -> LifecycleManager {
    start(
        Arc::new(BackendRegistry::with_defaults()),
        &GraphConfig::new()
            .with(options::STORAGE_BACKEND, "inmemory")
            .with(options::STORAGE_NAMESPACE, "configuration_management"),
    )
}

fn inmemory(graph_name: &str) -> GraphConfig {
    GraphConfig::new()
        .with(options::STORAGE_BACKEND, "inmemory")
        .with(options::GRAPH_NAME, graph_name)
}

fn sqlite(dir: &Path, graph_name: &str) -> GraphConfig {
    GraphConfig::new()
        .with(options::STORAGE_BACKEND, "sqlite")
        .with(options::STORAGE_DIRECTORY, dir.to_string_lossy().into_owned())
        .with(options::GRAPH_NAME, graph_name)
}

// ---------------------------------------------------------------------------
// Open
// ---------------------------------------------------------------------------

#[test]
fn open_returns_same_handle_until_evicted() {
    let manager = inmemory_manager();
    manager.create_configuration(&inmemory("graph1")).unwrap();

    let first = manager.open("graph1").unwrap();
    let second = manager.open("graph1").unwrap();
    assert_eq!(first.id(), second.id());
    assert_eq!(first.namespace(), "graph1");

    let effective = first.effective_configuration();
    assert_eq!(effective.graph_name(), Some("graph1"));
    assert_eq!(effective.backend(), Some("inmemory"));
    assert_eq!(manager.open_graph_names(), vec!["graph1"]);
}

#[test]
fn open_without_configuration_fails_with_guidance() {
    let manager = inmemory_manager();
    let err = manager.open("graph1").unwrap_err();
    assert!(matches!(err, ManagerError::ConfigurationDoesNotExist { .. }));
    assert_eq!(
        err.to_string(),
        "Please create configuration for this graph using the \
         ConfigurationManagementGraph#createConfiguration API."
    );
    assert!(!manager.is_open("graph1"));
}

#[test]
fn directly_closed_handle_is_replaced_on_next_open() {
    let manager = inmemory_manager();
    manager.create_configuration(&inmemory("graph1")).unwrap();

    let first = manager.open("graph1").unwrap();
    first.close().unwrap();
    assert!(!manager.is_open("graph1"));

    let second = manager.open("graph1").unwrap();
    assert_ne!(first.id(), second.id());
    assert!(!second.is_closed());
}

#[test]
fn graph_data_survives_reopen_on_same_backend() {
    let manager = inmemory_manager();
    manager.create_configuration(&inmemory("graph1")).unwrap();

    let first = manager.open("graph1").unwrap();
    first
        .apply(&[VertexMutation::upsert(
            "person",
            "alice",
            serde_json::json!({"age": 30}),
        )])
        .unwrap();
    manager.close("graph1").unwrap();
    assert!(first.is_closed());

    let second = manager.open("graph1").unwrap();
    assert_eq!(
        second.read_vertex("person", "alice").unwrap(),
        Some(serde_json::json!({"age": 30}))
    );
}

// ---------------------------------------------------------------------------
// Create / templates
// ---------------------------------------------------------------------------

#[test]
fn create_without_template_fails_with_guidance() {
    let manager = inmemory_manager();
    let err = manager.create("graph1").unwrap_err();
    assert!(matches!(err, ManagerError::TemplateConfigurationDoesNotExist));
    assert_eq!(
        err.to_string(),
        "Please create a template Configuration using the \
         ConfigurationManagementGraph#createTemplateConfiguration API."
    );
    assert!(manager.graph_names().unwrap().is_empty());
}

#[test]
fn create_with_existing_configuration_still_needs_template() {
    let manager = inmemory_manager();
    manager.create_configuration(&inmemory("graph1")).unwrap();
    assert!(matches!(
        manager.create("graph1"),
        Err(ManagerError::TemplateConfigurationDoesNotExist)
    ));
}

#[test]
fn removed_template_cannot_create() {
    let manager = inmemory_manager();
    manager
        .create_template_configuration(&GraphConfig::new().with(options::STORAGE_BACKEND, "inmemory"))
        .unwrap();
    manager.remove_template_configuration().unwrap();
    assert!(matches!(
        manager.create("graph1"),
        Err(ManagerError::TemplateConfigurationDoesNotExist)
    ));
}

#[test]
fn two_graphs_from_one_template_are_independent() {
    let manager = inmemory_manager();
    manager
        .create_template_configuration(
            &GraphConfig::new()
                .with(options::STORAGE_BACKEND, "inmemory")
                .with("cache.db-cache", true),
        )
        .unwrap();

    let graph1 = manager.create("graph1").unwrap();
    let graph2 = manager.create("graph2").unwrap();
    assert_ne!(graph1.id(), graph2.id());
    assert_eq!(graph1.namespace(), "graph1");
    assert_eq!(graph2.namespace(), "graph2");

    for name in ["graph1", "graph2"] {
        let stored = manager.get_configuration(name).unwrap();
        assert_eq!(stored.graph_name(), Some(name));
        assert_eq!(stored.get("cache.db-cache"), Some(&serde_json::json!(true)));
    }
    for (graph, name) in [(&graph1, "graph1"), (&graph2, "graph2")] {
        let effective = graph.effective_configuration();
        assert_eq!(effective.graph_name(), Some(name));
        assert_eq!(effective.backend(), Some("inmemory"));
        assert_eq!(
            effective.get("cache.db-cache"),
            Some(&serde_json::json!(true))
        );
    }

    graph1
        .apply(&[VertexMutation::upsert("v", "1", serde_json::json!({}))])
        .unwrap();
    assert!(graph2.read_vertex("v", "1").unwrap().is_none());
    assert_eq!(manager.graph_names().unwrap(), vec!["graph1", "graph2"]);
}

#[test]
fn template_update_does_not_touch_derived_configurations() {
    let manager = inmemory_manager();
    manager
        .create_template_configuration(&GraphConfig::new().with(options::STORAGE_BACKEND, "inmemory"))
        .unwrap();
    manager.create("graph1").unwrap();

    manager
        .update_template_configuration(
            &GraphConfig::new()
                .with(options::STORAGE_BACKEND, "inmemory")
                .with("cache.size", 500),
        )
        .unwrap();
    assert!(!manager
        .get_configuration("graph1")
        .unwrap()
        .contains("cache.size"));
}

// ---------------------------------------------------------------------------
// Update / remove
// ---------------------------------------------------------------------------

#[test]
fn update_to_bogus_backend_evicts_and_next_open_fails() {
    let manager = inmemory_manager();
    manager.create_configuration(&inmemory("graph1")).unwrap();
    let before = manager.open("graph1").unwrap();

    manager
        .update_configuration(
            "graph1",
            &GraphConfig::new()
                .with(options::STORAGE_BACKEND, "bogusBackend")
                .with(options::GRAPH_NAME, "graph1"),
        )
        .unwrap();
    assert!(!manager.is_open("graph1"));
    assert!(!before.is_closed());

    let err = manager.open("graph1").unwrap_err();
    assert!(matches!(err, ManagerError::BackendResolution(_)));
    assert_eq!(
        err.to_string(),
        "Could not find implementation class: bogusBackend"
    );
}

#[test]
fn bogus_configuration_can_be_removed() {
    let manager = inmemory_manager();
    manager
        .create_configuration(
            &GraphConfig::new()
                .with(options::STORAGE_BACKEND, "bogusBackend")
                .with(options::GRAPH_NAME, "graph1"),
        )
        .unwrap();
    assert!(manager.open("graph1").is_err());

    manager.remove_configuration("graph1").unwrap();
    assert!(matches!(
        manager.get_configuration("graph1"),
        Err(ManagerError::ConfigurationDoesNotExist { .. })
    ));
}

#[test]
fn remove_configuration_evicts_and_open_then_fails() {
    let manager = inmemory_manager();
    manager.create_configuration(&inmemory("graph1")).unwrap();
    let handle = manager.open("graph1").unwrap();

    manager.remove_configuration("graph1").unwrap();
    assert!(manager.open_graph_names().is_empty());
    // Eviction leaves existing holders alone.
    assert!(!handle.is_closed());
    assert!(matches!(
        manager.open("graph1"),
        Err(ManagerError::ConfigurationDoesNotExist { .. })
    ));

    // Removing again is a no-op.
    manager.remove_configuration("graph1").unwrap();
}

#[test]
fn create_configuration_requires_graph_name() {
    let manager = inmemory_manager();
    let err = manager
        .create_configuration(&GraphConfig::new().with(options::STORAGE_BACKEND, "inmemory"))
        .unwrap_err();
    assert_eq!(
        err.to_string(),
        "Please include in your configuration the option: graph.graphname"
    );
}

// ---------------------------------------------------------------------------
// Management namespace
// ---------------------------------------------------------------------------

#[test]
fn configurations_cannot_address_management_namespace() {
    let manager = inmemory_manager();
    manager
        .create_template_configuration(&GraphConfig::new().with(options::STORAGE_BACKEND, "inmemory"))
        .unwrap();

    // By graph name, which doubles as the default namespace.
    assert!(matches!(
        manager.create_configuration(&inmemory("configuration_management")),
        Err(ManagerError::ReservedNamespace { .. })
    ));
    assert!(matches!(
        manager.create("configuration_management"),
        Err(ManagerError::ReservedNamespace { .. })
    ));
    // By explicit namespace.
    assert!(matches!(
        manager.create_configuration(
            &inmemory("graph1").with(options::STORAGE_NAMESPACE, "configuration_management")
        ),
        Err(ManagerError::ReservedNamespace { .. })
    ));

    manager.create_configuration(&inmemory("graph1")).unwrap();
    assert!(matches!(
        manager.update_configuration(
            "graph1",
            &inmemory("graph1").with(options::STORAGE_NAMESPACE, "configuration_management")
        ),
        Err(ManagerError::ReservedNamespace { .. })
    ));
    assert_eq!(manager.graph_names().unwrap(), vec!["graph1"]);
    assert!(!manager
        .get_configuration("graph1")
        .unwrap()
        .contains(options::STORAGE_NAMESPACE));
}

#[test]
fn drop_refuses_to_destroy_management_storage() {
    let manager = inmemory_manager();
    manager.create_configuration(&inmemory("other")).unwrap();
    manager
        .create_template_configuration(&GraphConfig::new().with(options::STORAGE_BACKEND, "inmemory"))
        .unwrap();
    // A record written straight to the store bypasses the manager's checks.
    manager
        .management()
        .records()
        .unwrap()
        .put(&inmemory("configuration_management"))
        .unwrap();

    match manager.drop("configuration_management") {
        Err(ManagerError::DropIncomplete { stage, source, .. }) => {
            assert_eq!(stage, DropStage::DestroyStorage);
            assert!(matches!(*source, ManagerError::ReservedNamespace { .. }));
        }
        other => panic!("expected DropIncomplete, got {:?}", other),
    }

    assert_eq!(
        manager.graph_names().unwrap(),
        vec!["configuration_management", "other"]
    );
    assert!(manager.get_configuration("other").is_ok());
    assert!(manager.get_template_configuration().is_ok());

    manager.remove_configuration("configuration_management").unwrap();
    manager.close("configuration_management").unwrap();
    assert_eq!(manager.graph_names().unwrap(), vec!["other"]);
}

// ---------------------------------------------------------------------------
// Drop
// ---------------------------------------------------------------------------

#[test]
fn drop_sqlite_graph_removes_storage_handle_and_record() {
    let dir = tempfile::tempdir().unwrap();
    let manager = start(
        Arc::new(BackendRegistry::with_defaults()),
        &GraphConfig::new()
            .with(options::STORAGE_BACKEND, "sqlite")
            .with(options::STORAGE_DIRECTORY, dir.path().to_string_lossy().into_owned())
            .with(options::STORAGE_NAMESPACE, "configuration_management"),
    );
    manager
        .create_configuration(&sqlite(dir.path(), "graph1"))
        .unwrap();

    let graph = manager.open("graph1").unwrap();
    graph
        .apply(&[VertexMutation::upsert("v", "1", serde_json::json!({"x": 1}))])
        .unwrap();
    let db_file = dir.path().join("graph1.db");
    assert!(db_file.exists());

    manager.drop("graph1").unwrap();

    assert!(graph.is_closed());
    assert!(manager.registry().is_empty());
    assert!(!db_file.exists());
    assert!(matches!(
        manager.get_configuration("graph1"),
        Err(ManagerError::ConfigurationDoesNotExist { .. })
    ));
    // The management graph lives in its own file and is untouched.
    assert!(dir.path().join("configuration_management.db").exists());
}

#[test]
fn drop_without_configuration_fails_at_open() {
    let manager = inmemory_manager();
    match manager.drop("graph1") {
        Err(ManagerError::DropIncomplete { stage, source, .. }) => {
            assert_eq!(stage, DropStage::Open);
            assert!(matches!(
                *source,
                ManagerError::ConfigurationDoesNotExist { .. }
            ));
        }
        other => panic!("expected DropIncomplete, got {:?}", other),
    }
}

#[test]
fn drop_inmemory_graph_discards_data() {
    let backend = Arc::new(BackendRegistry::with_defaults());
    let manager = start(
        Arc::clone(&backend) as Arc<dyn StorageBackend>,
        &GraphConfig::new()
            .with(options::STORAGE_BACKEND, "inmemory")
            .with(options::STORAGE_NAMESPACE, "configuration_management"),
    );
    manager.create_configuration(&inmemory("graph1")).unwrap();
    manager
        .open("graph1")
        .unwrap()
        .apply(&[VertexMutation::upsert("v", "1", serde_json::json!({}))])
        .unwrap();

    manager.drop("graph1").unwrap();
    assert!(!backend.namespace_exists(&inmemory("graph1")).unwrap());

    // Recreating the graph starts from empty storage.
    manager.create_configuration(&inmemory("graph1")).unwrap();
    assert!(manager
        .open("graph1")
        .unwrap()
        .read_vertex("v", "1")
        .unwrap()
        .is_none());
}

// ---------------------------------------------------------------------------
// Restart
// ---------------------------------------------------------------------------

#[test]
fn sqlite_records_survive_restart_but_registry_starts_empty() {
    let dir = tempfile::tempdir().unwrap();
    let settings = ManagerSettings {
        backend: "sqlite".to_string(),
        data_dir: Some(dir.path().to_path_buf()),
        ..ManagerSettings::default()
    };

    let first = settings.start().unwrap();
    first
        .create_configuration(&sqlite(dir.path(), "graph1"))
        .unwrap();
    first.open("graph1").unwrap();
    assert_eq!(first.close_all(), 1);
    first.management().shutdown().unwrap();

    let second = settings.start().unwrap();
    assert!(second.open_graph_names().is_empty());
    assert_eq!(second.graph_names().unwrap(), vec!["graph1"]);
    assert_eq!(
        second.get_configuration("graph1").unwrap(),
        sqlite(dir.path(), "graph1")
    );
    assert!(second.open("graph1").is_ok());
}

// ---------------------------------------------------------------------------
// Failure injection
// ---------------------------------------------------------------------------

/// Switches shared by a [`FlakyBackend`] and every graph it opens.
#[derive(Debug, Default)]
struct Faults {
    fail_commits: AtomicBool,
    fail_destroy: AtomicBool,
}

/// In-memory backend whose commits and destroys can be made to fail.
struct FlakyBackend {
    inner: InMemoryBackend,
    faults: Arc<Faults>,
}

#[derive(Debug)]
struct FlakyGraph {
    inner: Arc<dyn GraphInstance>,
    faults: Arc<Faults>,
}

impl BackendFactory for FlakyBackend {
    fn name(&self) -> &str {
        "flaky"
    }

    fn open(&self, config: &GraphConfig) -> Result<Arc<dyn GraphInstance>, StorageError> {
        Ok(Arc::new(FlakyGraph {
            inner: self.inner.open(config)?,
            faults: Arc::clone(&self.faults),
        }))
    }

    fn destroy(&self, config: &GraphConfig) -> Result<(), StorageError> {
        if self.faults.fail_destroy.load(Ordering::SeqCst) {
            return Err(StorageError::Io(std::io::Error::other("disk unavailable")));
        }
        self.inner.destroy(config)
    }

    fn exists(&self, config: &GraphConfig) -> Result<bool, StorageError> {
        self.inner.exists(config)
    }
}

impl GraphInstance for FlakyGraph {
    fn id(&self) -> InstanceId {
        self.inner.id()
    }

    fn namespace(&self) -> &str {
        self.inner.namespace()
    }

    fn effective_configuration(&self) -> &GraphConfig {
        self.inner.effective_configuration()
    }

    fn is_closed(&self) -> bool {
        self.inner.is_closed()
    }

    fn close(&self) -> Result<(), StorageError> {
        self.inner.close()
    }

    fn read_vertex(
        &self,
        label: &str,
        key: &str,
    ) -> Result<Option<serde_json::Value>, StorageError> {
        self.inner.read_vertex(label, key)
    }

    fn scan_vertices(&self, label: &str) -> Result<Vec<(String, serde_json::Value)>, StorageError> {
        self.inner.scan_vertices(label)
    }

    fn apply(&self, mutations: &[VertexMutation]) -> Result<(), StorageError> {
        if self.faults.fail_commits.load(Ordering::SeqCst) {
            return Err(StorageError::CommitFailed {
                reason: "injected".to_string(),
            });
        }
        self.inner.apply(mutations)
    }
}

fn flaky_manager() -> (LifecycleManager, Arc<Faults>) {
    let faults = Arc::new(Faults::default());
    let registry = BackendRegistry::with_defaults();
    registry.register(Arc::new(FlakyBackend {
        inner: InMemoryBackend::new(),
        faults: Arc::clone(&faults),
    }));
    let manager = start(
        Arc::new(registry),
        &GraphConfig::new()
            .with(options::STORAGE_BACKEND, "flaky")
            .with(options::STORAGE_NAMESPACE, "configuration_management"),
    );
    (manager, faults)
}

fn flaky(graph_name: &str) -> GraphConfig {
    GraphConfig::new()
        .with(options::STORAGE_BACKEND, "flaky")
        .with(options::GRAPH_NAME, graph_name)
}

#[test]
fn failed_commit_keeps_prior_record() {
    let (manager, faults) = flaky_manager();
    manager
        .create_configuration(&inmemory("graph1").with("cache.size", 1))
        .unwrap();
    manager.open("graph1").unwrap();

    faults.fail_commits.store(true, Ordering::SeqCst);
    let err = manager
        .update_configuration("graph1", &inmemory("graph1").with("cache.size", 2))
        .unwrap_err();
    assert!(matches!(
        err,
        ManagerError::Persistence(StorageError::CommitFailed { .. })
    ));
    faults.fail_commits.store(false, Ordering::SeqCst);

    let stored = manager.get_configuration("graph1").unwrap();
    assert_eq!(stored.get("cache.size"), Some(&serde_json::json!(1)));
    // A failed update leaves the cached handle in place.
    assert!(manager.is_open("graph1"));
}

#[test]
fn drop_failing_to_destroy_storage_reports_stage_and_leaves_record() {
    let (manager, faults) = flaky_manager();
    manager.create_configuration(&flaky("graph1")).unwrap();
    let graph = manager.open("graph1").unwrap();

    faults.fail_destroy.store(true, Ordering::SeqCst);
    match manager.drop("graph1") {
        Err(ManagerError::DropIncomplete {
            graph_name,
            stage,
            source,
        }) => {
            assert_eq!(graph_name, "graph1");
            assert_eq!(stage, DropStage::DestroyStorage);
            assert!(matches!(*source, ManagerError::Persistence(StorageError::Io(_))));
        }
        other => panic!("expected DropIncomplete, got {:?}", other),
    }

    // Nothing after the failing step ran.
    assert!(!graph.is_closed());
    assert!(manager.get_configuration("graph1").is_ok());

    faults.fail_destroy.store(false, Ordering::SeqCst);
    manager.remove_configuration("graph1").unwrap();
    manager.close("graph1").unwrap();
    assert!(graph.is_closed());
    assert!(manager.registry().is_empty());
}

#[test]
fn drop_failing_to_remove_record_reports_stage() {
    let (manager, faults) = flaky_manager();
    manager.create_configuration(&inmemory("graph1")).unwrap();
    let graph = manager.open("graph1").unwrap();

    faults.fail_commits.store(true, Ordering::SeqCst);
    match manager.drop("graph1") {
        Err(ManagerError::DropIncomplete { stage, .. }) => {
            assert_eq!(stage, DropStage::RemoveConfiguration);
        }
        other => panic!("expected DropIncomplete, got {:?}", other),
    }
    // Storage is gone and the handle closed; the record remains.
    assert!(graph.is_closed());
    faults.fail_commits.store(false, Ordering::SeqCst);
    assert!(manager.get_configuration("graph1").is_ok());
}
