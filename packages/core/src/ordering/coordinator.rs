//! Persistence Coordinator
//!
//! Applies node assignments one at a time through the [`NodeStore`]. A failed
//! save is recorded against the node and the loop moves on; nothing already
//! written is rolled back.

use crate::db::NodeStore;
use crate::ordering::NodeAssignment;
use std::fmt;

pub const NO_CHANGES_NOTICE: &str = "No changes to the page order were submitted.";
pub const APPLIED_NOTICE: &str = "Page order was successfully updated.";

/// One assignment the store refused
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeFailure {
    pub node_id: String,
    /// Position the node was meant to take
    pub logical_number: Option<String>,
    pub message: String,
}

impl fmt::Display for NodeFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}. {} save error: {}",
            self.logical_number.as_deref().unwrap_or("-"),
            self.node_id,
            self.message
        )
    }
}

/// Result of a reorder request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReorderOutcome {
    /// The submission was absent or blank
    NoChanges,
    /// Every planned assignment was saved (possibly none were needed)
    Applied { updated: Vec<String> },
    /// Some assignments failed; the others stay applied
    Partial {
        updated: Vec<String>,
        failures: Vec<NodeFailure>,
    },
}

impl ReorderOutcome {
    /// User-facing notice
    ///
    /// ```rust
    /// use pageorder_core::ordering::{NodeFailure, ReorderOutcome};
    ///
    /// let outcome = ReorderOutcome::Partial {
    ///     updated: vec!["p1".to_string()],
    ///     failures: vec![NodeFailure {
    ///         node_id: "p2".to_string(),
    ///         logical_number: Some("2".to_string()),
    ///         message: "title is required".to_string(),
    ///     }],
    /// };
    /// assert_eq!(outcome.notice(), "2. p2 save error: title is required");
    /// ```
    pub fn notice(&self) -> String {
        match self {
            ReorderOutcome::NoChanges => NO_CHANGES_NOTICE.to_string(),
            ReorderOutcome::Applied { .. } => APPLIED_NOTICE.to_string(),
            ReorderOutcome::Partial { failures, .. } => failures
                .iter()
                .map(NodeFailure::to_string)
                .collect::<Vec<_>>()
                .join("\n"),
        }
    }

    pub fn is_partial(&self) -> bool {
        matches!(self, ReorderOutcome::Partial { .. })
    }

    /// Ids whose save succeeded, in apply order
    pub fn updated(&self) -> &[String] {
        match self {
            ReorderOutcome::NoChanges => &[],
            ReorderOutcome::Applied { updated } | ReorderOutcome::Partial { updated, .. } => {
                updated
            }
        }
    }

    pub fn failures(&self) -> &[NodeFailure] {
        match self {
            ReorderOutcome::Partial { failures, .. } => failures,
            _ => &[],
        }
    }
}

/// Save every assignment, continuing past failures
pub async fn apply(store: &dyn NodeStore, assignments: Vec<NodeAssignment>) -> ReorderOutcome {
    let mut updated = Vec::with_capacity(assignments.len());
    let mut failures = Vec::new();

    for assignment in assignments {
        let fields = assignment.update.changed_fields();
        match store
            .update_node(&assignment.node_id, assignment.update)
            .await
        {
            Ok(_) => {
                tracing::debug!("Saved '{}' ({})", assignment.node_id, fields.join(", "));
                updated.push(assignment.node_id);
            }
            Err(e) => {
                tracing::warn!("Failed to save '{}': {}", assignment.node_id, e);
                failures.push(NodeFailure {
                    node_id: assignment.node_id,
                    logical_number: assignment.logical_number,
                    message: e.to_string(),
                });
            }
        }
    }

    if failures.is_empty() {
        ReorderOutcome::Applied { updated }
    } else {
        ReorderOutcome::Partial { updated, failures }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::InMemoryStore;
    use crate::models::{Node, NodeKind, NodeUpdate, ValidationError};

    fn page(id: &str) -> Node {
        Node::new_with_id(id.to_string(), NodeKind::Page, id.to_string())
    }

    fn renumber(id: &str, n: &str) -> NodeAssignment {
        NodeAssignment {
            node_id: id.to_string(),
            logical_number: Some(n.to_string()),
            update: NodeUpdate {
                logical_number: Some(Some(n.to_string())),
                ..Default::default()
            },
        }
    }

    #[test]
    fn test_failure_display() {
        let failure = NodeFailure {
            node_id: "p7".to_string(),
            logical_number: None,
            message: "boom".to_string(),
        };
        assert_eq!(failure.to_string(), "-. p7 save error: boom");
    }

    #[test]
    fn test_notices() {
        assert_eq!(ReorderOutcome::NoChanges.notice(), NO_CHANGES_NOTICE);
        assert_eq!(
            ReorderOutcome::Applied { updated: vec![] }.notice(),
            APPLIED_NOTICE
        );
        assert!(ReorderOutcome::NoChanges.updated().is_empty());
    }

    #[tokio::test]
    async fn test_apply_all() {
        let store = InMemoryStore::with_nodes(vec![page("a"), page("b")]);
        let outcome = apply(&store, vec![renumber("a", "2"), renumber("b", "1")]).await;

        assert_eq!(
            outcome,
            ReorderOutcome::Applied {
                updated: vec!["a".to_string(), "b".to_string()]
            }
        );
        let a = store.get_node("a").await.unwrap().unwrap();
        assert_eq!(a.logical_number.as_deref(), Some("2"));
    }

    #[tokio::test]
    async fn test_apply_continues_past_failures() {
        let store = InMemoryStore::with_nodes(vec![page("x"), page("y"), page("z")]).with_rule(
            |node| {
                if node.id == "y" && node.logical_number.is_some() {
                    Err(ValidationError::Rule("y is locked".to_string()))
                } else {
                    Ok(())
                }
            },
        );

        let outcome = apply(
            &store,
            vec![
                renumber("y", "1"),
                renumber("x", "2"),
                renumber("ghost", "3"),
                renumber("z", "4"),
            ],
        )
        .await;

        assert!(outcome.is_partial());
        assert_eq!(outcome.updated(), ["x", "z"]);
        assert_eq!(
            outcome.notice(),
            "1. y save error: Validation failed: y is locked\n\
             3. ghost save error: Node not found: ghost"
        );

        let z = store.get_node("z").await.unwrap().unwrap();
        assert_eq!(z.logical_number.as_deref(), Some("4"));
        let y = store.get_node("y").await.unwrap().unwrap();
        assert_eq!(y.logical_number, None);
    }
}
