//! Ordered Traversal
//!
//! Walks a container's sibling chain from `first_child_id` along
//! `next_sibling_id` links to materialize the persisted order.
//!
//! Broken chains are reported, not raised: every walk returns the ids (or
//! nodes) collected so far together with an optional [`TraversalIssue`].
//! Only a failing storage call aborts a walk.
//!
//! The same walk backs three entry points:
//!
//! - [`order_children`] / [`order_child_objects`] against a [`NodeStore`]
//! - [`order_children_in`] against an in-memory arena (pure)
//! - [`TreeSnapshot`], the arena of the whole document handed to the reconciler

use crate::db::{NodeStore, StoreError};
use crate::models::Node;
use crate::ordering::{OrderedForest, OrderingError, TraversalIssue};
use std::collections::{HashMap, HashSet, VecDeque};

/// Result of walking one sibling chain
#[derive(Debug, Clone, PartialEq)]
pub struct ChildOrder<T> {
    /// Chain members in walk order (the clean prefix when `issue` is set)
    pub items: Vec<T>,
    /// First problem met while walking, if any
    pub issue: Option<TraversalIssue>,
}

impl<T> ChildOrder<T> {
    pub fn is_clean(&self) -> bool {
        self.issue.is_none()
    }

    /// Human-readable error text, as surfaced by a display layer
    pub fn error_message(&self) -> Option<String> {
        self.issue.as_ref().map(|issue| issue.to_string())
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> ChildOrder<U> {
        ChildOrder {
            items: self.items.into_iter().map(f).collect(),
            issue: self.issue,
        }
    }
}

/// Walk state shared by the async and in-memory drivers
struct ChainWalk<'a> {
    container: &'a Node,
    cursor: Option<String>,
    /// Id whose link produced `cursor` (the container itself for the head)
    previous: String,
    visited: HashSet<String>,
    issue: Option<TraversalIssue>,
    parent_mismatch: Option<TraversalIssue>,
}

impl<'a> ChainWalk<'a> {
    fn new(container: &'a Node) -> Self {
        let cursor = if container.is_container() {
            container.first_child_id.clone()
        } else {
            None
        };
        Self {
            container,
            cursor,
            previous: container.id.clone(),
            visited: HashSet::new(),
            issue: None,
            parent_mismatch: None,
        }
    }

    /// Next id to resolve, or `None` once the chain terminates or cycles
    fn advance(&mut self) -> Option<String> {
        let id = self.cursor.take()?;
        if !self.visited.insert(id.clone()) {
            self.issue = Some(TraversalIssue::CycleDetected {
                container_id: self.container.id.clone(),
                node_id: id,
            });
            return None;
        }
        Some(id)
    }

    /// Feed the lookup result for `id`; returns the node when the walk continues
    fn resolved(&mut self, id: &str, node: Option<Node>) -> Option<Node> {
        let Some(node) = node else {
            self.issue = Some(TraversalIssue::BrokenLink {
                container_id: self.container.id.clone(),
                from_id: self.previous.clone(),
                missing_id: id.to_string(),
            });
            return None;
        };

        if self.parent_mismatch.is_none() && node.parent_id.as_deref() != Some(&self.container.id)
        {
            self.parent_mismatch = Some(TraversalIssue::ParentMismatch {
                container_id: self.container.id.clone(),
                node_id: node.id.clone(),
                parent_id: node.parent_id.clone(),
            });
        }

        self.cursor = node.next_sibling_id.clone();
        self.previous = id.to_string();
        Some(node)
    }

    fn finish<T>(self, items: Vec<T>) -> ChildOrder<T> {
        let issue = self
            .issue
            .or_else(|| match self.container.child_count {
                Some(expected) if expected != items.len() => Some(TraversalIssue::CountMismatch {
                    container_id: self.container.id.clone(),
                    expected,
                    actual: items.len(),
                }),
                _ => None,
            })
            .or(self.parent_mismatch);

        ChildOrder { items, issue }
    }
}

/// Walk `container`'s chain and return the resolved child nodes
///
/// A leaf, or a container with no `first_child_id`, yields an empty order.
pub async fn order_child_objects(
    store: &dyn NodeStore,
    container: &Node,
) -> Result<ChildOrder<Node>, StoreError> {
    let mut walk = ChainWalk::new(container);
    let mut items = Vec::new();

    while let Some(id) = walk.advance() {
        let node = store.get_node(&id).await?;
        match walk.resolved(&id, node) {
            Some(node) => items.push(node),
            None => break,
        }
    }

    let order = walk.finish(items);
    if let Some(issue) = &order.issue {
        tracing::warn!("Ordering issue while walking '{}': {}", container.id, issue);
    }
    Ok(order)
}

/// Walk `container`'s chain and return the child ids
pub async fn order_children(
    store: &dyn NodeStore,
    container: &Node,
) -> Result<ChildOrder<String>, StoreError> {
    Ok(order_child_objects(store, container)
        .await?
        .map(|node| node.id))
}

/// Walk `container`'s chain inside an in-memory arena
pub fn order_children_in(nodes: &HashMap<String, Node>, container: &Node) -> ChildOrder<String> {
    let mut walk = ChainWalk::new(container);
    let mut items = Vec::new();

    while let Some(id) = walk.advance() {
        match walk.resolved(&id, nodes.get(&id).cloned()) {
            Some(node) => items.push(node.id),
            None => break,
        }
    }

    walk.finish(items)
}

/// Arena of a document's persisted state, addressed by id
///
/// Built by walking every container reachable from the root (plus any
/// submitted node not yet in the document), so the reconciler can work on
/// plain data without touching the store.
#[derive(Debug, Clone, Default)]
pub struct TreeSnapshot {
    root_id: String,
    nodes: HashMap<String, Node>,
    /// Walked chain per loaded container
    groups: HashMap<String, Vec<String>>,
    /// Container whose chain holds each node
    chained_under: HashMap<String, String>,
    issues: Vec<TraversalIssue>,
}

impl TreeSnapshot {
    /// Load the document rooted at `root`, plus every node `forest` mentions
    ///
    /// Fails with `NodeNotFound` when a submitted id does not resolve and with
    /// `MalformedSubmission` when a submitted node belongs to a different
    /// document. Traversal issues are collected, not raised.
    pub async fn load(
        store: &dyn NodeStore,
        root: &Node,
        forest: Option<&OrderedForest>,
    ) -> Result<Self, OrderingError> {
        let mut snapshot = Self {
            root_id: root.id.clone(),
            ..Default::default()
        };
        snapshot.nodes.insert(root.id.clone(), root.clone());
        snapshot.load_subtree(store, root.clone()).await?;

        let Some(forest) = forest else {
            return Ok(snapshot);
        };

        let mut unplaced = Vec::new();
        for id in forest.ids() {
            if snapshot.nodes.contains_key(id) {
                continue;
            }

            let node = store
                .get_node(id)
                .await?
                .ok_or_else(|| OrderingError::node_not_found(id))?;

            tracing::debug!("Loaded unplaced node '{}' named by submission", id);
            snapshot.nodes.insert(node.id.clone(), node.clone());
            unplaced.push(node);
        }

        for node in unplaced.iter().filter(|n| n.is_container()) {
            snapshot.load_subtree(store, node.clone()).await?;
        }

        // Parents are checked once every submitted node is loaded, so a node
        // may name an unplaced container that comes later in the submission
        for node in &unplaced {
            if let Some(parent_id) = &node.parent_id {
                if !snapshot.nodes.contains_key(parent_id) {
                    return Err(OrderingError::malformed(format!(
                        "'{}' belongs to container '{}' outside document '{}'",
                        node.id, parent_id, snapshot.root_id
                    )));
                }
            }
        }

        Ok(snapshot)
    }

    async fn load_subtree(&mut self, store: &dyn NodeStore, top: Node) -> Result<(), StoreError> {
        let mut queue = VecDeque::from([top]);

        while let Some(container) = queue.pop_front() {
            if self.groups.contains_key(&container.id) {
                continue;
            }

            let order = order_child_objects(store, &container).await?;
            let mut ids = Vec::with_capacity(order.items.len());
            for child in order.items {
                ids.push(child.id.clone());
                self.chained_under
                    .entry(child.id.clone())
                    .or_insert_with(|| container.id.clone());
                if child.is_container() {
                    queue.push_back(child.clone());
                }
                self.nodes.insert(child.id.clone(), child);
            }
            self.groups.insert(container.id.clone(), ids);
            self.issues.extend(order.issue);
        }

        Ok(())
    }

    /// Build a snapshot from plain nodes (every node becomes addressable;
    /// groups are walked from `root_id` down)
    pub fn from_nodes(root_id: impl Into<String>, nodes: impl IntoIterator<Item = Node>) -> Self {
        let mut snapshot = Self {
            root_id: root_id.into(),
            nodes: nodes.into_iter().map(|n| (n.id.clone(), n)).collect(),
            ..Default::default()
        };

        let mut queue = VecDeque::from([snapshot.root_id.clone()]);
        while let Some(container_id) = queue.pop_front() {
            if snapshot.groups.contains_key(&container_id) {
                continue;
            }
            let Some(container) = snapshot.nodes.get(&container_id) else {
                continue;
            };

            let order = order_children_in(&snapshot.nodes, container);
            for child_id in &order.items {
                snapshot
                    .chained_under
                    .entry(child_id.clone())
                    .or_insert_with(|| container_id.clone());
                if snapshot.nodes.get(child_id).is_some_and(Node::is_container) {
                    queue.push_back(child_id.clone());
                }
            }
            snapshot.groups.insert(container_id, order.items);
            snapshot.issues.extend(order.issue);
        }

        // Unplaced containers still expose their own chains
        let unplaced: Vec<String> = snapshot
            .nodes
            .values()
            .filter(|n| n.is_container() && !snapshot.groups.contains_key(&n.id))
            .map(|n| n.id.clone())
            .collect();
        for id in unplaced {
            let order = order_children_in(&snapshot.nodes, &snapshot.nodes[&id]);
            for child_id in &order.items {
                snapshot
                    .chained_under
                    .entry(child_id.clone())
                    .or_insert_with(|| id.clone());
            }
            snapshot.groups.insert(id, order.items);
        }

        snapshot
    }

    pub fn root_id(&self) -> &str {
        &self.root_id
    }

    pub fn node(&self, id: &str) -> Option<&Node> {
        self.nodes.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.nodes.contains_key(id)
    }

    /// Walked chain of `container_id` (empty when it has none or was not loaded)
    pub fn children(&self, container_id: &str) -> &[String] {
        self.groups
            .get(container_id)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// The container a node currently hangs from
    ///
    /// Chain membership wins over a disagreeing `parent_id`; a node in no
    /// chain falls back to its recorded `parent_id`.
    pub fn current_parent(&self, id: &str) -> Option<&str> {
        self.chained_under
            .get(id)
            .map(String::as_str)
            .or_else(|| self.nodes.get(id).and_then(|n| n.parent_id.as_deref()))
    }

    /// Traversal issues met while loading
    pub fn issues(&self) -> &[TraversalIssue] {
        &self.issues
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}
