//! Store Error Types
//!
//! Errors raised by `NodeStore` implementations. Per-node validation failures
//! are kept distinct from lookup failures so the persistence coordinator can
//! record them and keep going.

use crate::models::ValidationError;
use thiserror::Error;

/// Storage operation errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// Node ID does not resolve
    #[error("Node not found: {id}")]
    NotFound { id: String },

    /// Node with this ID already exists
    #[error("Node already exists: {id}")]
    AlreadyExists { id: String },

    /// The merged field values were rejected
    #[error("Validation failed: {0}")]
    Validation(#[from] ValidationError),

    /// Backend-level failure (I/O, lock poisoning, serialization)
    #[error("Storage backend error: {0}")]
    Backend(String),
}

impl StoreError {
    /// Create a not found error
    pub fn not_found(id: impl Into<String>) -> Self {
        Self::NotFound { id: id.into() }
    }

    /// Create an already exists error
    pub fn already_exists(id: impl Into<String>) -> Self {
        Self::AlreadyExists { id: id.into() }
    }

    /// Create a backend error
    pub fn backend(msg: impl Into<String>) -> Self {
        Self::Backend(msg.into())
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        StoreError::backend(format!("JSON serialization error: {}", err))
    }
}

impl From<std::io::Error> for StoreError {
    fn from(err: std::io::Error) -> Self {
        StoreError::backend(err.to_string())
    }
}
