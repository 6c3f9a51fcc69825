//! Configuration data model shared by the confgraph crates.
//!
//! A [`GraphConfig`] is the ordered option map that describes how to open one
//! tenant's graph instance. The well-known option keys live in [`options`].

pub mod config;
pub mod error;
pub mod options;

// Re-export commonly used types
pub use config::{ConfigValue, GraphConfig};
pub use error::CoreError;
