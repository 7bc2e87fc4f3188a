//! Error types for the order reconciliation pipeline
//!
//! Two families live here:
//!
//! - [`OrderingError`]: hard failures that abort a reorder before anything is
//!   persisted (malformed submission, unresolvable ids, storage breakdowns)
//!   plus the orphan refusal raised by the delete precondition.
//! - [`TraversalIssue`]: problems found while walking a sibling chain. These
//!   are reported as values next to the (partial) sequence and never raised.

use crate::db::StoreError;
use thiserror::Error;

/// Errors that abort an ordering operation
///
/// # Examples
///
/// ```rust
/// use pageorder_core::ordering::OrderingError;
///
/// let err = OrderingError::malformed("duplicate id 'p1' in submission");
/// assert_eq!(
///     err.to_string(),
///     "Malformed submission: duplicate id 'p1' in submission"
/// );
/// ```
#[derive(Error, Debug)]
pub enum OrderingError {
    /// Structurally invalid input, rejected before any mutation
    #[error("Malformed submission: {reason}")]
    MalformedSubmission { reason: String },

    /// A referenced id does not resolve to a stored node
    #[error("Node '{node_id}' does not exist")]
    NodeNotFound { node_id: String },

    /// Deleting this container would orphan its children
    #[error("Cannot delete '{}': it still contains {}", .node_id, .children.join(", "))]
    Orphan {
        node_id: String,
        children: Vec<String>,
    },

    /// The requested operation does not apply to this node
    #[error("Invalid operation: {reason}")]
    InvalidOperation { reason: String },

    /// Storage collaborator failed outside the per-node save path
    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

impl OrderingError {
    /// Create a MalformedSubmission error
    pub fn malformed(reason: impl Into<String>) -> Self {
        Self::MalformedSubmission {
            reason: reason.into(),
        }
    }

    /// Create a NodeNotFound error
    pub fn node_not_found(node_id: impl Into<String>) -> Self {
        Self::NodeNotFound {
            node_id: node_id.into(),
        }
    }

    /// Create an Orphan error
    pub fn orphan(node_id: impl Into<String>, children: Vec<String>) -> Self {
        Self::Orphan {
            node_id: node_id.into(),
            children,
        }
    }

    /// Create an InvalidOperation error
    pub fn invalid_operation(reason: impl Into<String>) -> Self {
        Self::InvalidOperation {
            reason: reason.into(),
        }
    }
}

/// A sibling chain that cannot be walked cleanly
///
/// Returned alongside whatever prefix of the chain was collected, so a display
/// layer can show the partial order together with a warning.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TraversalIssue {
    /// The chain revisits a node (broken ordering)
    #[error("Broken ordering under '{container_id}': '{node_id}' is reached twice (cycle)")]
    CycleDetected {
        container_id: String,
        node_id: String,
    },

    /// A link points at a node that does not exist
    #[error(
        "Broken ordering under '{container_id}': '{from_id}' links to missing node '{missing_id}'"
    )]
    BrokenLink {
        container_id: String,
        from_id: String,
        missing_id: String,
    },

    /// The walk visited a different number of nodes than the container records
    #[error("Child count mismatch under '{container_id}': expected {expected}, found {actual}")]
    CountMismatch {
        container_id: String,
        expected: usize,
        actual: usize,
    },

    /// A chain member claims a different parent than the container it hangs from
    #[error(
        "'{}' is chained under '{}' but records parent {}",
        .node_id,
        .container_id,
        .parent_id.as_deref().unwrap_or("(none)")
    )]
    ParentMismatch {
        container_id: String,
        node_id: String,
        parent_id: Option<String>,
    },
}

impl TraversalIssue {
    pub fn container_id(&self) -> &str {
        match self {
            TraversalIssue::CycleDetected { container_id, .. }
            | TraversalIssue::BrokenLink { container_id, .. }
            | TraversalIssue::CountMismatch { container_id, .. }
            | TraversalIssue::ParentMismatch { container_id, .. } => container_id,
        }
    }
}
