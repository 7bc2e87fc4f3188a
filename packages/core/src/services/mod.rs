//! Business Services
//!
//! - `OrderService` - reorder pipeline, ordered reads and chain-preserving
//!   append/delete for paged documents
//!
//! Services coordinate between the storage layer and the ordering engine.

pub mod order_service;

pub use order_service::{OrderService, OrderedTree, TreeEntry};
