//! PageOrder Core
//!
//! Ordering engine for paged documents: a `Paged` root holding `Section`
//! containers and `Page` leaves, where every sibling group is persisted as a
//! doubly linked list (`prev_sibling_id` / `next_sibling_id`, a
//! `first_child_id` head on the container and a 1-based `logical_number`).
//!
//! # Architecture
//!
//! - **Linked lists, not indexes**: order lives only in per-node link fields
//! - **Pure planning**: reconciliation and link building run on an in-memory
//!   snapshot; all writes happen in one persistence phase
//! - **Partial-failure tolerant**: each node is saved independently and failures
//!   are aggregated, never rolled back
//!
//! # Modules
//!
//! - [`models`] - Node data structures and validation
//! - [`db`] - Storage seam (`NodeStore`) and the in-memory store
//! - [`ordering`] - Submission parsing, traversal, reconciliation, linking, persistence
//! - [`services`] - `OrderService`, the pipeline entry point
//! - [`config`] - Limits and switches (`OrderingConfig`)

pub mod config;
pub mod db;
pub mod models;
pub mod ordering;
pub mod services;

// Re-export commonly used types
pub use config::OrderingConfig;
pub use models::*;
pub use services::*;
