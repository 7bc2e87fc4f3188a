//! NodeStore Trait - Storage Abstraction Layer
//!
//! The ordering engine never talks to a concrete repository. It reads and
//! writes nodes through `NodeStore`, which is the whole of the storage
//! collaborator's interface:
//!
//! - lookup by identifier (`get_node`, `None` when it does not resolve)
//! - sparse field update (`update_node`, rejects with `StoreError::Validation`)
//! - create / delete / list for the surrounding CRUD plumbing
//!
//! # Design Decisions
//!
//! 1. **Async-First**: repository calls may block on I/O, so every method is async
//! 2. **Per-node atomicity**: `update_node` applies all fields of one update or
//!    none of them; there is no multi-node transaction
//! 3. **Typed errors**: `StoreError` instead of `anyhow` so callers can tell a
//!    validation rejection from a missing node

use crate::db::StoreError;
use crate::models::{DeleteResult, Node, NodeUpdate};
use async_trait::async_trait;

/// Abstraction over node persistence
///
/// Implementations must be `Send + Sync` so a store can be shared through
/// `Arc<dyn NodeStore>` across tasks.
#[async_trait]
pub trait NodeStore: Send + Sync {
    /// Insert a new node. Fails with `AlreadyExists` on duplicate IDs and with
    /// `Validation` when `Node::validate` rejects it.
    async fn create_node(&self, node: Node) -> Result<Node, StoreError>;

    /// Get node by ID
    ///
    /// - `Ok(Some(node))` if node exists
    /// - `Ok(None)` if node doesn't exist (not an error)
    async fn get_node(&self, id: &str) -> Result<Option<Node>, StoreError>;

    /// Apply a sparse update and return the stored node
    ///
    /// The merged node is validated before it is written; on rejection the
    /// stored node is left exactly as it was.
    async fn update_node(&self, id: &str, update: NodeUpdate) -> Result<Node, StoreError>;

    /// Remove a node. Missing nodes succeed with `DeleteResult::not_found()`.
    ///
    /// This is the raw storage delete; the orphan precondition for containers
    /// is enforced one level up by `OrderService::delete_node`.
    async fn delete_node(&self, id: &str) -> Result<DeleteResult, StoreError>;

    /// All stored nodes, in no particular order
    async fn list_nodes(&self) -> Result<Vec<Node>, StoreError>;
}
