//! Linked-List Builder
//!
//! Turns a [`ReorderPlan`] into per-node field assignments. For each group the
//! member at position `i` (1-based) of `n` gets:
//!
//! - `logical_number = i`
//! - `prev_sibling_id` = member `i - 1`, cleared for the head
//! - `next_sibling_id` = member `i + 1`, cleared for the tail
//! - `parent_id` = the group's container
//!
//! and the container gets `first_child_id` (plus `child_count` when it tracks
//! one). Only fields whose value differs from the snapshot are emitted, so a
//! plan that reproduces the persisted order yields no assignments at all.

use crate::models::{Node, NodeUpdate};
use crate::ordering::{ReorderPlan, TreeSnapshot};
use std::collections::HashMap;

/// Field changes for one node
#[derive(Debug, Clone, PartialEq)]
pub struct NodeAssignment {
    pub node_id: String,
    /// Planned position, used when reporting a failed save
    pub logical_number: Option<String>,
    pub update: NodeUpdate,
}

/// Compute the minimal set of assignments realizing `plan`
///
/// A node that is both a group member and a touched container receives a
/// single merged assignment. Assignments come out in plan order.
pub fn build_links(plan: &ReorderPlan, snapshot: &TreeSnapshot) -> Vec<NodeAssignment> {
    let mut pending = PendingAssignments::default();

    for group in &plan.groups {
        let members = &group.ordered;

        for (i, id) in members.iter().enumerate() {
            let current = snapshot.node(id);
            let position = (i + 1).to_string();
            let prev = i.checked_sub(1).map(|p| members[p].clone());
            let next = members.get(i + 1).cloned();

            let assignment = pending.entry(id, current);
            assignment.logical_number = Some(position.clone());

            let update = &mut assignment.update;
            set_if_changed(
                &mut update.logical_number,
                current.and_then(|n| n.logical_number.as_ref()),
                Some(position),
            );
            set_if_changed(
                &mut update.prev_sibling_id,
                current.and_then(|n| n.prev_sibling_id.as_ref()),
                prev,
            );
            set_if_changed(
                &mut update.next_sibling_id,
                current.and_then(|n| n.next_sibling_id.as_ref()),
                next,
            );
            set_if_changed(
                &mut update.parent_id,
                current.and_then(|n| n.parent_id.as_ref()),
                Some(group.parent_id.clone()),
            );
        }

        let container = snapshot.node(&group.parent_id);
        let update = &mut pending.entry(&group.parent_id, container).update;
        set_if_changed(
            &mut update.first_child_id,
            container.and_then(|n| n.first_child_id.as_ref()),
            members.first().cloned(),
        );

        if let Some(recorded) = container.and_then(|n| n.child_count) {
            if recorded != members.len() {
                update.child_count = Some(Some(members.len()));
            }
        }
    }

    let mut assignments = pending.list;
    let before = assignments.len();
    assignments.retain(|a| !a.update.is_empty());
    tracing::debug!(
        "Built {} node assignments ({} already in place)",
        assignments.len(),
        before - assignments.len()
    );

    assignments
}

/// Assignments in first-touch order, one per node
#[derive(Default)]
struct PendingAssignments {
    list: Vec<NodeAssignment>,
    index: HashMap<String, usize>,
}

impl PendingAssignments {
    fn entry(&mut self, id: &str, current: Option<&Node>) -> &mut NodeAssignment {
        let at = match self.index.get(id) {
            Some(&at) => at,
            None => {
                self.list.push(NodeAssignment {
                    node_id: id.to_string(),
                    logical_number: current.and_then(|n| n.logical_number.clone()),
                    update: NodeUpdate::new(),
                });
                self.index.insert(id.to_string(), self.list.len() - 1);
                self.list.len() - 1
            }
        };
        &mut self.list[at]
    }
}

fn set_if_changed(
    field: &mut Option<Option<String>>,
    current: Option<&String>,
    desired: Option<String>,
) {
    if current != desired.as_ref() {
        *field = Some(desired);
    }
}
