//! In-memory NodeStore
//!
//! Arena of nodes keyed by identifier behind a `tokio::sync::RwLock`. Used by
//! the dev binary, the benchmarks and the test suites, and as the reference
//! behaviour for real repository bindings.
//!
//! Extra validation rules can be attached with [`InMemoryStore::with_rule`];
//! they run after `Node::validate` on every create and update, which is how the
//! tests simulate a repository rejecting one node's new field values.

use crate::db::{NodeStore, StoreError};
use crate::models::{DeleteResult, Node, NodeUpdate, ValidationError};
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;

/// Validation hook applied to the merged node before it is written
pub type ValidationRule = Arc<dyn Fn(&Node) -> Result<(), ValidationError> + Send + Sync>;

pub struct InMemoryStore {
    nodes: RwLock<HashMap<String, Node>>,
    rules: Vec<ValidationRule>,
    /// Successful `update_node` calls since construction
    update_count: AtomicUsize,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            nodes: RwLock::new(HashMap::new()),
            rules: Vec::new(),
            update_count: AtomicUsize::new(0),
        }
    }

    /// Seed the store with existing nodes, bypassing validation
    ///
    /// Seeding is how tests and the dev binary load persisted state, including
    /// deliberately broken chains, so nothing is rejected here.
    pub fn with_nodes(nodes: impl IntoIterator<Item = Node>) -> Self {
        let map = nodes.into_iter().map(|n| (n.id.clone(), n)).collect();
        Self {
            nodes: RwLock::new(map),
            rules: Vec::new(),
            update_count: AtomicUsize::new(0),
        }
    }

    /// Load a JSON array of nodes from disk
    pub async fn from_json_file(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let raw = tokio::fs::read_to_string(path.as_ref()).await?;
        let nodes: Vec<Node> = serde_json::from_str(&raw)?;
        tracing::debug!(
            "Loaded {} nodes from {}",
            nodes.len(),
            path.as_ref().display()
        );
        Ok(Self::with_nodes(nodes))
    }

    /// Attach an extra validation rule
    pub fn with_rule<F>(mut self, rule: F) -> Self
    where
        F: Fn(&Node) -> Result<(), ValidationError> + Send + Sync + 'static,
    {
        self.rules.push(Arc::new(rule));
        self
    }

    pub fn update_count(&self) -> usize {
        self.update_count.load(Ordering::SeqCst)
    }

    fn check(&self, node: &Node) -> Result<(), StoreError> {
        node.validate()?;
        for rule in &self.rules {
            rule(node)?;
        }
        Ok(())
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl NodeStore for InMemoryStore {
    async fn create_node(&self, node: Node) -> Result<Node, StoreError> {
        self.check(&node)?;
        let mut nodes = self.nodes.write().await;
        if nodes.contains_key(&node.id) {
            return Err(StoreError::already_exists(&node.id));
        }
        nodes.insert(node.id.clone(), node.clone());
        Ok(node)
    }

    async fn get_node(&self, id: &str) -> Result<Option<Node>, StoreError> {
        Ok(self.nodes.read().await.get(id).cloned())
    }

    async fn update_node(&self, id: &str, update: NodeUpdate) -> Result<Node, StoreError> {
        let mut nodes = self.nodes.write().await;
        let current = nodes.get(id).ok_or_else(|| StoreError::not_found(id))?;

        let mut merged = current.clone();
        merged.apply_update(&update);
        self.check(&merged)?;

        nodes.insert(id.to_string(), merged.clone());
        self.update_count.fetch_add(1, Ordering::SeqCst);
        Ok(merged)
    }

    async fn delete_node(&self, id: &str) -> Result<DeleteResult, StoreError> {
        match self.nodes.write().await.remove(id) {
            Some(_) => Ok(DeleteResult::existed()),
            None => Ok(DeleteResult::not_found()),
        }
    }

    async fn list_nodes(&self) -> Result<Vec<Node>, StoreError> {
        Ok(self.nodes.read().await.values().cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::NodeKind;
    use std::io::Write;

    fn page(id: &str) -> Node {
        Node::new_with_id(id.to_string(), NodeKind::Page, format!("Page {}", id))
    }

    #[tokio::test]
    async fn test_create_and_get() {
        let store = InMemoryStore::new();
        store.create_node(page("p1")).await.unwrap();

        let fetched = store.get_node("p1").await.unwrap().unwrap();
        assert_eq!(fetched.title, "Page p1");
        assert!(store.get_node("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_create_duplicate_rejected() {
        let store = InMemoryStore::new();
        store.create_node(page("p1")).await.unwrap();
        let err = store.create_node(page("p1")).await.unwrap_err();
        assert_eq!(err, StoreError::already_exists("p1"));
    }

    #[tokio::test]
    async fn test_update_missing_node() {
        let store = InMemoryStore::new();
        let err = store
            .update_node(
                "ghost",
                NodeUpdate {
                    title: Some("x".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert_eq!(err, StoreError::not_found("ghost"));
        assert_eq!(store.update_count(), 0);
    }

    #[tokio::test]
    async fn test_rejected_update_leaves_node_unchanged() {
        let store = InMemoryStore::with_nodes(vec![page("p1")]).with_rule(|node| {
            if node.logical_number.as_deref() == Some("2") {
                Err(ValidationError::Rule("position 2 is reserved".to_string()))
            } else {
                Ok(())
            }
        });

        let update = NodeUpdate {
            logical_number: Some(Some("2".to_string())),
            next_sibling_id: Some(Some("p2".to_string())),
            ..Default::default()
        };
        let err = store.update_node("p1", update).await.unwrap_err();
        assert!(matches!(err, StoreError::Validation(ValidationError::Rule(_))));

        let stored = store.get_node("p1").await.unwrap().unwrap();
        assert_eq!(stored.logical_number, None);
        assert_eq!(stored.next_sibling_id, None);
        assert_eq!(store.update_count(), 0);
    }

    #[tokio::test]
    async fn test_delete_is_idempotent() {
        let store = InMemoryStore::with_nodes(vec![page("p1")]);
        assert!(store.delete_node("p1").await.unwrap().existed);
        assert!(!store.delete_node("p1").await.unwrap().existed);
    }

    #[tokio::test]
    async fn test_from_json_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"[{{"id": "book", "kind": "paged", "firstChildId": "p1"}},
                {{"id": "p1", "kind": "page", "parentId": "book", "logicalNumber": "1"}}]"#
        )
        .unwrap();

        let store = InMemoryStore::from_json_file(file.path()).await.unwrap();
        let nodes = store.list_nodes().await.unwrap();
        assert_eq!(nodes.len(), 2);
        let p1 = store.get_node("p1").await.unwrap().unwrap();
        assert_eq!(p1.parent_id.as_deref(), Some("book"));
    }

    #[tokio::test]
    async fn test_from_json_file_malformed() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "not json").unwrap();
        let result = InMemoryStore::from_json_file(file.path()).await;
        assert!(matches!(result, Err(StoreError::Backend(_))));
    }
}
