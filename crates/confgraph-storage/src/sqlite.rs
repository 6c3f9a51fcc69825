//! SQLite implementation of [`BackendFactory`].
//!
//! [`SqliteBackend`] keeps each namespace in its own database file,
//! `<storage.directory>/<namespace>.db`, with WAL mode, atomic transactions
//! on every write, and automatic schema migrations. Vertex properties are
//! stored as JSON TEXT columns via serde_json. Destroying a namespace deletes
//! its files.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use rusqlite::{params, Connection, OptionalExtension};

use confgraph_core::{options, CoreError, GraphConfig};

use crate::error::StorageError;
use crate::traits::{BackendFactory, GraphInstance};
use crate::types::{InstanceId, VertexMutation};

/// Identifier of the SQLite backend.
pub const BACKEND_NAME: &str = "sqlite";

/// File-per-namespace SQLite backend.
pub struct SqliteBackend {
    default_directory: Option<PathBuf>,
    /// Serializes open + migrate so concurrent opens of a fresh file don't
    /// race on schema creation.
    open_lock: Mutex<()>,
}

impl SqliteBackend {
    /// Creates a backend that requires `storage.directory` in every config.
    pub fn new() -> Self {
        SqliteBackend {
            default_directory: None,
            open_lock: Mutex::new(()),
        }
    }

    /// Creates a backend that falls back to `dir` when a config has no
    /// `storage.directory`.
    pub fn with_default_directory(dir: impl Into<PathBuf>) -> Self {
        SqliteBackend {
            default_directory: Some(dir.into()),
            open_lock: Mutex::new(()),
        }
    }

    /// Path of the database file backing the namespace in `config`.
    pub fn database_path(&self, config: &GraphConfig) -> Result<PathBuf, StorageError> {
        let dir = match config.get_str(options::STORAGE_DIRECTORY) {
            Some(dir) if !dir.is_empty() => PathBuf::from(dir),
            _ => self
                .default_directory
                .clone()
                .ok_or_else(|| CoreError::MissingOption {
                    key: options::STORAGE_DIRECTORY.to_string(),
                })?,
        };
        let namespace = config.namespace();
        validate_namespace(namespace)?;
        Ok(dir.join(format!("{}.db", namespace)))
    }
}

impl Default for SqliteBackend {
    fn default() -> Self {
        Self::new()
    }
}

/// Namespaces become file names, so only a conservative character set is allowed.
fn validate_namespace(namespace: &str) -> Result<(), StorageError> {
    let valid = !namespace.starts_with('.')
        && namespace
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'));
    if !valid {
        return Err(CoreError::InvalidOption {
            key: options::STORAGE_NAMESPACE.to_string(),
            reason: format!("'{}' is not usable as a database file name", namespace),
        }
        .into());
    }
    Ok(())
}

/// The main database file plus its WAL companions.
fn database_files(path: &Path) -> [PathBuf; 3] {
    let mut wal = path.as_os_str().to_owned();
    wal.push("-wal");
    let mut shm = path.as_os_str().to_owned();
    shm.push("-shm");
    [path.to_path_buf(), PathBuf::from(wal), PathBuf::from(shm)]
}

impl BackendFactory for SqliteBackend {
    fn name(&self) -> &str {
        BACKEND_NAME
    }

    fn open(&self, config: &GraphConfig) -> Result<Arc<dyn GraphInstance>, StorageError> {
        let path = self.database_path(config)?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = {
            let _guard = self.open_lock.lock().unwrap_or_else(PoisonError::into_inner);
            crate::schema::open_database(&path)?
        };
        Ok(Arc::new(SqliteGraph {
            id: InstanceId::new(),
            namespace: config.namespace().to_string(),
            config: config.clone(),
            path,
            conn: Mutex::new(Some(conn)),
            closed: AtomicBool::new(false),
        }))
    }

    fn destroy(&self, config: &GraphConfig) -> Result<(), StorageError> {
        let path = self.database_path(config)?;
        let _guard = self.open_lock.lock().unwrap_or_else(PoisonError::into_inner);
        for file in database_files(&path) {
            match std::fs::remove_file(&file) {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
        }
        Ok(())
    }

    fn exists(&self, config: &GraphConfig) -> Result<bool, StorageError> {
        Ok(self.database_path(config)?.exists())
    }
}

/// A handle onto one SQLite namespace file.
///
/// The connection is dropped on close; every later data access fails with
/// [`StorageError::InstanceClosed`].
#[derive(Debug)]
pub struct SqliteGraph {
    id: InstanceId,
    namespace: String,
    config: GraphConfig,
    path: PathBuf,
    conn: Mutex<Option<Connection>>,
    closed: AtomicBool,
}

impl SqliteGraph {
    /// Path of the backing database file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Runs `f` with the live connection.
    fn with_conn<T>(
        &self,
        f: impl FnOnce(&mut Connection) -> Result<T, StorageError>,
    ) -> Result<T, StorageError> {
        let mut guard = self.conn.lock().unwrap_or_else(PoisonError::into_inner);
        match guard.as_mut() {
            Some(conn) => f(conn),
            None => Err(StorageError::InstanceClosed {
                namespace: self.namespace.clone(),
            }),
        }
    }
}

impl GraphInstance for SqliteGraph {
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
        let conn = self
            .conn
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        self.closed.store(true, Ordering::Release);
        if let Some(conn) = conn {
            conn.close().map_err(|(_, e)| StorageError::Sqlite(e))?;
        }
        Ok(())
    }

    fn read_vertex(
        &self,
        label: &str,
        key: &str,
    ) -> Result<Option<serde_json::Value>, StorageError> {
        self.with_conn(|conn| {
            let json: Option<String> = conn
                .query_row(
                    "SELECT properties_json FROM vertices WHERE label = ?1 AND key = ?2",
                    params![label, key],
                    |row| row.get(0),
                )
                .optional()?;
            match json {
                Some(json) => Ok(Some(serde_json::from_str(&json)?)),
                None => Ok(None),
            }
        })
    }

    fn scan_vertices(&self, label: &str) -> Result<Vec<(String, serde_json::Value)>, StorageError> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare_cached(
                "SELECT key, properties_json FROM vertices WHERE label = ?1 ORDER BY key",
            )?;
            let rows = stmt.query_map(params![label], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
            })?;
            let mut result = Vec::new();
            for row in rows {
                let (key, json) = row?;
                result.push((key, serde_json::from_str(&json)?));
            }
            Ok(result)
        })
    }

    fn apply(&self, mutations: &[VertexMutation]) -> Result<(), StorageError> {
        self.with_conn(|conn| {
            let tx = conn.transaction()?;
            for mutation in mutations {
                match mutation {
                    VertexMutation::Upsert {
                        label,
                        key,
                        properties,
                    } => {
                        let json = serde_json::to_string(properties)?;
                        tx.execute(
                            "INSERT INTO vertices (label, key, properties_json) VALUES (?1, ?2, ?3)
                             ON CONFLICT(label, key) DO UPDATE SET
                                 properties_json = excluded.properties_json,
                                 updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')",
                            params![label, key, json],
                        )?;
                    }
                    VertexMutation::Delete { label, key } => {
                        tx.execute(
                            "DELETE FROM vertices WHERE label = ?1 AND key = ?2",
                            params![label, key],
                        )?;
                    }
                }
            }
            tx.commit()?;
            Ok(())
        })
    }
}
