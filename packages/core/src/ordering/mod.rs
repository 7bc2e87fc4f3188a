//! Order Reconciliation Engine
//!
//! Pipeline stages, each usable on its own:
//!
//! 1. [`parse_submission`] - raw client input to an [`OrderedForest`]
//! 2. [`TreeSnapshot`] - persisted state, materialized by chain traversal
//! 3. [`reconcile`] - final membership of every touched sibling group
//! 4. [`build_links`] - minimal per-node field assignments
//! 5. [`apply`] - node-by-node persistence with failure aggregation
//!
//! [`OrderService`](crate::services::OrderService) wires them together.

mod coordinator;
mod error;
mod linker;
mod reconciler;
mod submission;
mod traversal;

pub use coordinator::{apply, NodeFailure, ReorderOutcome, APPLIED_NOTICE, NO_CHANGES_NOTICE};
pub use error::{OrderingError, TraversalIssue};
pub use linker::{build_links, NodeAssignment};
pub use reconciler::{reconcile, GroupPlan, ReorderPlan, Reparent};
pub use submission::{
    parse_submission, parse_submission_value, OrderedForest, Submission, SubmissionEntry,
};
pub use traversal::{
    order_child_objects, order_children, order_children_in, ChildOrder, TreeSnapshot,
};
