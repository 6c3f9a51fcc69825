//! Process-wide cache of open graph handles.
//!
//! [`InstanceRegistry`] maps a graph name to the [`GraphInstance`] currently
//! serving it. At most one live handle per name is ever visible. A handle
//! that was closed behind the registry's back is stale: lookups treat it as
//! absent and evict it.
//!
//! Each name also carries a generation, bumped whenever its configuration
//! changes. An open reads the generation before it reads the configuration
//! and installs its handle only if the generation has not moved since.

use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use confgraph_storage::{GraphInstance, InstanceId};

/// Registry of open graph handles keyed by graph name.
///
/// Backed by `DashMap`: operations on one name are atomic, and operations on
/// different names do not block each other.
pub struct InstanceRegistry {
    graphs: DashMap<String, Arc<dyn GraphInstance>>,
    /// Lock order: a `graphs` entry first, then `generations`.
    generations: DashMap<String, u64>,
}

impl InstanceRegistry {
    /// Creates a new empty registry.
    pub fn new() -> Self {
        InstanceRegistry {
            graphs: DashMap::new(),
            generations: DashMap::new(),
        }
    }

    /// Returns the live handle for `graph_name`, evicting it if it was closed.
    pub fn lookup(&self, graph_name: &str) -> Option<Arc<dyn GraphInstance>> {
        match self.graphs.get(graph_name) {
            None => return None,
            Some(entry) if !entry.is_closed() => return Some(Arc::clone(entry.value())),
            Some(_) => {}
        }
        // Re-checked under the shard lock: a live handle installed in the
        // meantime stays.
        self.graphs.remove_if(graph_name, |_, graph| graph.is_closed());
        None
    }

    /// Current configuration generation of `graph_name`.
    pub fn generation(&self, graph_name: &str) -> u64 {
        self.generations
            .get(graph_name)
            .map(|generation| *generation)
            .unwrap_or(0)
    }

    /// Installs `graph` unless a live handle is already registered.
    ///
    /// Returns `None`, installing nothing, if the generation of `graph_name`
    /// is no longer `generation`. Otherwise returns the handle now registered
    /// and whether it is `graph`. A stale (closed) incumbent is replaced.
    pub fn put_if_current(
        &self,
        graph_name: &str,
        graph: Arc<dyn GraphInstance>,
        generation: u64,
    ) -> Option<(Arc<dyn GraphInstance>, bool)> {
        let entry = self.graphs.entry(graph_name.to_string());
        if self.generation(graph_name) != generation {
            return None;
        }
        Some(match entry {
            Entry::Occupied(mut occupied) => {
                if occupied.get().is_closed() {
                    occupied.insert(Arc::clone(&graph));
                    (graph, true)
                } else {
                    (Arc::clone(occupied.get()), false)
                }
            }
            Entry::Vacant(vacant) => {
                vacant.insert(Arc::clone(&graph));
                (graph, true)
            }
        })
    }

    /// Removes the entry for `graph_name` without closing it.
    pub fn evict(&self, graph_name: &str) -> Option<Arc<dyn GraphInstance>> {
        self.graphs.remove(graph_name).map(|(_, graph)| graph)
    }

    /// Bumps the generation of `graph_name` and evicts its entry without
    /// closing it.
    pub fn invalidate(&self, graph_name: &str) -> Option<Arc<dyn GraphInstance>> {
        let entry = self.graphs.entry(graph_name.to_string());
        self.bump(graph_name);
        match entry {
            Entry::Occupied(occupied) => Some(occupied.remove()),
            Entry::Vacant(_) => None,
        }
    }

    /// Like [`invalidate`](Self::invalidate), but evicts only if the entry is
    /// still the handle identified by `id`.
    pub fn invalidate_if_same(
        &self,
        graph_name: &str,
        id: InstanceId,
    ) -> Option<Arc<dyn GraphInstance>> {
        let entry = self.graphs.entry(graph_name.to_string());
        self.bump(graph_name);
        match entry {
            Entry::Occupied(occupied) if occupied.get().id() == id => Some(occupied.remove()),
            _ => None,
        }
    }

    fn bump(&self, graph_name: &str) {
        *self
            .generations
            .entry(graph_name.to_string())
            .or_insert(0) += 1;
    }

    /// Names with a live handle, sorted.
    pub fn open_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .graphs
            .iter()
            .filter(|entry| !entry.value().is_closed())
            .map(|entry| entry.key().clone())
            .collect();
        names.sort();
        names
    }

    /// Number of entries, stale ones included.
    pub fn len(&self) -> usize {
        self.graphs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.graphs.is_empty()
    }

    /// Removes and returns every entry.
    pub fn drain(&self) -> Vec<(String, Arc<dyn GraphInstance>)> {
        let names: Vec<String> = self.graphs.iter().map(|e| e.key().clone()).collect();
        names
            .into_iter()
            .filter_map(|name| self.graphs.remove(&name))
            .collect()
    }
}

impl Default for InstanceRegistry {
    fn default() -> Self {
        Self::new()
    }
}
