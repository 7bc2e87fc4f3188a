//! Storage Layer
//!
//! The repository/object store that persists nodes is an external
//! collaborator. This module defines its interface and ships an in-memory
//! implementation:
//!
//! - [`NodeStore`] - async lookup / update / create / delete seam
//! - [`InMemoryStore`] - arena-backed implementation with pluggable validation rules
//! - [`StoreError`] - NotFound, AlreadyExists, Validation and backend failures

mod error;
mod memory_store;
mod node_store;

pub use error::StoreError;
pub use memory_store::{InMemoryStore, ValidationRule};
pub use node_store::NodeStore;
