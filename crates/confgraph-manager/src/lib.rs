//! Lifecycle and cache manager for named, configured graphs.
//!
//! A [`ConfigurationManager`] owns the bootstrap ("management") graph in
//! which every tenant's configuration is stored. The [`LifecycleManager`]
//! turns a graph name into a live [`GraphInstance`] handle, caches it in the
//! [`InstanceRegistry`], and keeps that cache consistent as configurations
//! are created, updated, removed or dropped.
//!
//! [`GraphInstance`]: confgraph_storage::GraphInstance

pub mod error;
pub mod lifecycle;
pub mod management;
pub mod record_store;
pub mod registry;
pub mod settings;

pub use error::{DropStage, ManagerError};
pub use lifecycle::LifecycleManager;
pub use management::{ConfigurationManager, ManagementState};
pub use record_store::ConfigRecordStore;
pub use registry::InstanceRegistry;
pub use settings::ManagerSettings;
