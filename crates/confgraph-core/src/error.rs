//! Core error types for confgraph-core.
//!
//! Uses `thiserror` for structured, matchable variants covering malformed
//! or missing configuration options.

use thiserror::Error;

/// Errors produced when reading typed values out of a [`crate::GraphConfig`].
#[derive(Debug, Error)]
pub enum CoreError {
    /// A required option is absent or empty.
    #[error("missing configuration option: '{key}'")]
    MissingOption { key: String },

    /// An option is present but its value has the wrong shape.
    #[error("invalid value for option '{key}': {reason}")]
    InvalidOption { key: String, reason: String },
}
