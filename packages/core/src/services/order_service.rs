//! Order Service
//!
//! Entry point for everything that reads or changes the order of a paged
//! document:
//!
//! - Read side: [`OrderService::order_children`], [`OrderService::order_child_objects`]
//!   and [`OrderService::document_tree`]
//! - Reorder pipeline: [`OrderService::reorder`] (parse, snapshot, reconcile,
//!   build links, persist)
//! - Lifecycle: [`OrderService::append_child`] and [`OrderService::delete_node`],
//!   which keep sibling chains consistent when nodes enter or leave a document
//!
//! # Concurrency
//!
//! One reorder per document is assumed to be in flight at a time. Nothing here
//! locks a document; concurrent reorders of the same tree may interleave their
//! saves.

use crate::config::OrderingConfig;
use crate::db::NodeStore;
use crate::models::{DeleteResult, Node, NodeKind};
use crate::ordering::{
    apply, build_links, order_child_objects, order_children, parse_submission, reconcile,
    ChildOrder, GroupPlan, OrderedForest, OrderingError, ReorderOutcome, ReorderPlan,
    Submission, TraversalIssue, TreeSnapshot,
};
use serde::{Serialize, Serializer};
use std::collections::HashSet;
use std::sync::Arc;

/// One node of a materialized document tree
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TreeEntry {
    pub id: String,
    pub kind: NodeKind,
    pub title: String,
    pub logical_number: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<TreeEntry>,
}

impl TreeEntry {
    /// Child ids in order
    pub fn child_ids(&self) -> Vec<&str> {
        self.children.iter().map(|c| c.id.as_str()).collect()
    }

    /// Depth-first lookup by id
    pub fn find(&self, id: &str) -> Option<&TreeEntry> {
        if self.id == id {
            return Some(self);
        }
        self.children.iter().find_map(|c| c.find(id))
    }
}

/// A whole document in chain order, plus whatever traversal problems were met
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OrderedTree {
    pub root: TreeEntry,
    #[serde(serialize_with = "issues_as_text")]
    pub issues: Vec<TraversalIssue>,
}

impl OrderedTree {
    pub fn is_clean(&self) -> bool {
        self.issues.is_empty()
    }
}

fn issues_as_text<S: Serializer>(
    issues: &[TraversalIssue],
    serializer: S,
) -> Result<S::Ok, S::Error> {
    serializer.collect_seq(issues.iter().map(|issue| issue.to_string()))
}

pub struct OrderService {
    store: Arc<dyn NodeStore>,
    config: OrderingConfig,
}

impl OrderService {
    pub fn new(store: Arc<dyn NodeStore>) -> Self {
        Self::with_config(store, OrderingConfig::default())
    }

    pub fn with_config(store: Arc<dyn NodeStore>, config: OrderingConfig) -> Self {
        Self { store, config }
    }

    pub fn store(&self) -> &Arc<dyn NodeStore> {
        &self.store
    }

    pub fn config(&self) -> &OrderingConfig {
        &self.config
    }

    async fn require_node(&self, id: &str) -> Result<Node, OrderingError> {
        self.store
            .get_node(id)
            .await?
            .ok_or_else(|| OrderingError::node_not_found(id))
    }

    async fn require_container(&self, id: &str) -> Result<Node, OrderingError> {
        let node = self.require_node(id).await?;
        if !node.is_container() {
            return Err(OrderingError::invalid_operation(format!(
                "'{}' is a {} and has no children",
                id, node.kind
            )));
        }
        Ok(node)
    }

    /// Child ids of `container_id` in chain order
    ///
    /// Broken chains come back as the walked prefix plus an issue; only a
    /// missing container or a failing store is an error.
    pub async fn order_children(
        &self,
        container_id: &str,
    ) -> Result<ChildOrder<String>, OrderingError> {
        let container = self.require_node(container_id).await?;
        Ok(order_children(self.store.as_ref(), &container).await?)
    }

    /// Child nodes of `container_id` in chain order
    pub async fn order_child_objects(
        &self,
        container_id: &str,
    ) -> Result<ChildOrder<Node>, OrderingError> {
        let container = self.require_node(container_id).await?;
        Ok(order_child_objects(self.store.as_ref(), &container).await?)
    }

    /// Materialize the document rooted at `root_id` as a nested tree
    pub async fn document_tree(&self, root_id: &str) -> Result<OrderedTree, OrderingError> {
        let root = self.require_node(root_id).await?;
        let snapshot = TreeSnapshot::load(self.store.as_ref(), &root, None).await?;

        let mut expanded = HashSet::new();
        let tree = OrderedTree {
            root: tree_entry(&snapshot, &root, &mut expanded),
            issues: snapshot.issues().to_vec(),
        };

        for issue in &tree.issues {
            tracing::warn!("Ordering items of '{}': {}", root_id, issue);
        }
        Ok(tree)
    }

    /// Run a raw submission against the document rooted at `root_id`
    ///
    /// # Errors
    ///
    /// `MalformedSubmission` and `NodeNotFound` abort before anything is
    /// saved. Per-node save failures do not fail the call; they come back as
    /// [`ReorderOutcome::Partial`].
    ///
    /// # Examples
    ///
    /// ```rust
    /// # #[tokio::main]
    /// # async fn main() {
    /// use pageorder_core::db::InMemoryStore;
    /// use pageorder_core::ordering::ReorderOutcome;
    /// use pageorder_core::services::OrderService;
    /// use std::sync::Arc;
    ///
    /// let service = OrderService::new(Arc::new(InMemoryStore::new()));
    /// let outcome = service.reorder("book", Some("  ")).await.unwrap();
    /// assert_eq!(outcome, ReorderOutcome::NoChanges);
    /// # }
    /// ```
    pub async fn reorder(
        &self,
        root_id: &str,
        raw: Option<&str>,
    ) -> Result<ReorderOutcome, OrderingError> {
        let submission = parse_submission(raw, &self.config)?;
        self.reorder_submission(root_id, submission).await
    }

    /// Run an already parsed submission
    pub async fn reorder_submission(
        &self,
        root_id: &str,
        submission: Submission,
    ) -> Result<ReorderOutcome, OrderingError> {
        let Submission::Forest(forest) = submission else {
            tracing::info!("No changes submitted for '{}'", root_id);
            return Ok(ReorderOutcome::NoChanges);
        };

        let root = self.require_container(root_id).await?;
        let snapshot = TreeSnapshot::load(self.store.as_ref(), &root, Some(&forest)).await?;
        for issue in snapshot.issues() {
            tracing::warn!("Reordering over a broken chain: {}", issue);
        }

        let plan = reconcile(&forest, &snapshot)?;
        Ok(self.persist(&plan, &snapshot, &forest).await)
    }

    async fn persist(
        &self,
        plan: &ReorderPlan,
        snapshot: &TreeSnapshot,
        forest: &OrderedForest,
    ) -> ReorderOutcome {
        let assignments = build_links(plan, snapshot);
        tracing::info!(
            "Reorder of '{}': {} entries submitted, {} groups touched, {} reparented, {} nodes to save",
            snapshot.root_id(),
            forest.len(),
            plan.groups.len(),
            plan.reparents.len(),
            assignments.len()
        );

        let outcome = apply(self.store.as_ref(), assignments).await;
        if outcome.is_partial() {
            tracing::warn!(
                "Reorder of '{}' partially applied: {} saved, {} failed",
                snapshot.root_id(),
                outcome.updated().len(),
                outcome.failures().len()
            );
        }

        if self.config.verify_after_apply {
            let remaining = self
                .verify_groups(plan.groups.iter().map(|g| g.parent_id.as_str()))
                .await;
            for issue in remaining {
                tracing::warn!("Still broken after reorder: {}", issue);
            }
        }

        outcome
    }

    /// Re-walk the given containers and log what is still broken
    async fn verify_groups<'a>(
        &self,
        container_ids: impl Iterator<Item = &'a str>,
    ) -> Vec<TraversalIssue> {
        let mut issues = Vec::new();
        for id in container_ids {
            match self.order_children(id).await {
                Ok(order) => issues.extend(order.issue),
                Err(e) => tracing::warn!("Could not verify '{}' after reorder: {}", id, e),
            }
        }
        if issues.is_empty() {
            tracing::debug!("All touched groups walk cleanly");
        }
        issues
    }

    /// Place a node that is not in any chain at the end of `parent_id`'s chain
    pub async fn append_child(
        &self,
        parent_id: &str,
        child_id: &str,
    ) -> Result<ReorderOutcome, OrderingError> {
        let parent = self.require_container(parent_id).await?;
        let child = self.require_node(child_id).await?;

        if child.kind == NodeKind::Paged || child.id == parent.id {
            return Err(OrderingError::invalid_operation(format!(
                "'{}' cannot be placed under '{}'",
                child_id, parent_id
            )));
        }
        if child.parent_id.is_some()
            || child.prev_sibling_id.is_some()
            || child.next_sibling_id.is_some()
        {
            return Err(OrderingError::invalid_operation(format!(
                "'{}' is already placed; move it with a reorder submission",
                child_id
            )));
        }

        let siblings = order_child_objects(self.store.as_ref(), &parent).await?;
        if let Some(issue) = &siblings.issue {
            tracing::warn!("Appending to a broken chain: {}", issue);
        }

        let mut ordered: Vec<String> = siblings.items.iter().map(|n| n.id.clone()).collect();
        ordered.push(child.id.clone());

        let plan = ReorderPlan {
            groups: vec![GroupPlan {
                parent_id: parent.id.clone(),
                ordered,
                arrived: vec![child.id.clone()],
                departed: Vec::new(),
            }],
            reparents: Vec::new(),
        };
        let snapshot = TreeSnapshot::from_nodes(
            parent.id.clone(),
            siblings.items.into_iter().chain([parent, child]),
        );

        let assignments = build_links(&plan, &snapshot);
        tracing::debug!(
            "Appending '{}' to '{}' ({} nodes to save)",
            child_id,
            parent_id,
            assignments.len()
        );
        Ok(apply(self.store.as_ref(), assignments).await)
    }

    /// Delete a node, refusing containers that still hold children
    ///
    /// A node that sits in a chain is unlinked first: its neighbours are
    /// joined and the rest of the group renumbered. Deleting an id that does
    /// not exist succeeds with `existed: false`.
    pub async fn delete_node(&self, id: &str) -> Result<DeleteResult, OrderingError> {
        let Some(node) = self.store.get_node(id).await? else {
            return Ok(DeleteResult::not_found());
        };

        if node.is_container() {
            let children = order_children(self.store.as_ref(), &node).await?;
            if !children.items.is_empty() {
                return Err(OrderingError::orphan(id, children.items));
            }
        }

        if let Some(parent_id) = &node.parent_id {
            self.unlink(&node, parent_id).await?;
        }

        let result = self.store.delete_node(id).await?;
        tracing::info!("Deleted '{}'", id);
        Ok(result)
    }

    async fn unlink(&self, node: &Node, parent_id: &str) -> Result<(), OrderingError> {
        let Some(parent) = self.store.get_node(parent_id).await? else {
            tracing::warn!("Parent '{}' of '{}' is gone; nothing to unlink", parent_id, node.id);
            return Ok(());
        };

        let siblings = order_child_objects(self.store.as_ref(), &parent).await?;
        if !siblings.items.iter().any(|n| n.id == node.id) {
            tracing::warn!("'{}' is not in the chain of '{}'", node.id, parent_id);
            return Ok(());
        }

        let ordered: Vec<String> = siblings
            .items
            .iter()
            .filter(|n| n.id != node.id)
            .map(|n| n.id.clone())
            .collect();
        let plan = ReorderPlan {
            groups: vec![GroupPlan {
                parent_id: parent.id.clone(),
                ordered,
                arrived: Vec::new(),
                departed: vec![node.id.clone()],
            }],
            reparents: Vec::new(),
        };
        let snapshot =
            TreeSnapshot::from_nodes(parent.id.clone(), siblings.items.into_iter().chain([parent]));

        let outcome = apply(self.store.as_ref(), build_links(&plan, &snapshot)).await;
        if outcome.is_partial() {
            return Err(OrderingError::invalid_operation(format!(
                "could not unlink '{}': {}",
                node.id,
                outcome.notice()
            )));
        }
        Ok(())
    }
}

fn tree_entry(snapshot: &TreeSnapshot, node: &Node, expanded: &mut HashSet<String>) -> TreeEntry {
    let mut children = Vec::new();
    if node.is_container() && expanded.insert(node.id.clone()) {
        for child_id in snapshot.children(&node.id) {
            if let Some(child) = snapshot.node(child_id) {
                children.push(tree_entry(snapshot, child, expanded));
            }
        }
    }

    TreeEntry {
        id: node.id.clone(),
        kind: node.kind,
        title: node.title.clone(),
        logical_number: node.logical_number.clone(),
        children,
    }
}

#[cfg(test)]
#[path = "order_service_test.rs"]
mod order_service_test;
