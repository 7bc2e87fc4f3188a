//! Tree Reconciler
//!
//! Diffs a submitted [`OrderedForest`] against the persisted [`TreeSnapshot`]
//! and decides, per sibling group, the final ordered membership.
//!
//! # Rules
//!
//! - Every submitted id gets a new parent: the document root for top-level
//!   entries, otherwise the entry whose `children` list names it.
//! - A node whose new parent differs from its current one is reparented; it
//!   carries its own subtree along untouched.
//! - The submission is a set of group-level patches. Submitted members take
//!   positions 1..n in submission order. A group member that the submission
//!   does not mention anywhere keeps its membership and follows them, in its
//!   prior relative order.
//! - A group that only loses members (they were moved elsewhere) keeps the
//!   relative order of whoever stays.
//!
//! Reconciliation is pure: it reads the snapshot and returns a plan.

use crate::models::NodeKind;
use crate::ordering::{OrderedForest, OrderingError, SubmissionEntry, TreeSnapshot};
use std::collections::{HashMap, HashSet};

/// Final membership of one sibling group
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupPlan {
    /// Container owning the group
    pub parent_id: String,
    /// Members in their final order
    pub ordered: Vec<String>,
    /// Members that were reparented into this group
    pub arrived: Vec<String>,
    /// Former members that were reparented out of this group
    pub departed: Vec<String>,
}

impl GroupPlan {
    pub fn is_arrival(&self, id: &str) -> bool {
        self.arrived.iter().any(|a| a == id)
    }
}

/// One node changing containers
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reparent {
    pub node_id: String,
    pub from: Option<String>,
    pub to: String,
}

/// Everything the linked-list builder needs
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ReorderPlan {
    /// Touched groups: submitted groups in submission order, then groups that
    /// only lost members
    pub groups: Vec<GroupPlan>,
    pub reparents: Vec<Reparent>,
}

impl ReorderPlan {
    pub fn group(&self, parent_id: &str) -> Option<&GroupPlan> {
        self.groups.iter().find(|g| g.parent_id == parent_id)
    }
}

/// Reconcile a submission against the persisted tree
///
/// # Errors
///
/// - `NodeNotFound` when a submitted id is not in the snapshot
/// - `MalformedSubmission` when the submission names the document root, nests
///   another paged document, gives children to a page, or would make a
///   container its own ancestor
pub fn reconcile(
    forest: &OrderedForest,
    snapshot: &TreeSnapshot,
) -> Result<ReorderPlan, OrderingError> {
    let root_id = snapshot.root_id();

    // Submitted groups in submission order, and the new parent of every id
    let mut submitted: Vec<(String, Vec<String>)> = Vec::new();
    let mut new_parent: HashMap<String, String> = HashMap::new();
    collect_groups(root_id, &forest.entries, snapshot, &mut submitted, &mut new_parent)?;

    ensure_acyclic(&new_parent, snapshot)?;

    let submitted_parents: HashSet<&str> = submitted.iter().map(|(p, _)| p.as_str()).collect();
    let mut plan = ReorderPlan::default();

    for (parent_id, members) in &submitted {
        let existing = snapshot.children(parent_id);
        let untouched: Vec<&String> = existing
            .iter()
            .filter(|id| !new_parent.contains_key(id.as_str()))
            .collect();

        let ordered: Vec<String> = members
            .iter()
            .chain(untouched.iter().copied())
            .cloned()
            .collect();
        let arrived: Vec<String> = members
            .iter()
            .filter(|id| snapshot.current_parent(id) != Some(parent_id.as_str()))
            .cloned()
            .collect();
        let departed: Vec<String> = existing
            .iter()
            .filter(|id| {
                new_parent
                    .get(id.as_str())
                    .is_some_and(|p| p != parent_id)
            })
            .cloned()
            .collect();

        tracing::debug!(
            "Group '{}': {} submitted, {} unmentioned kept, {} arrived, {} departed",
            parent_id,
            members.len(),
            untouched.len(),
            arrived.len(),
            departed.len()
        );

        plan.groups.push(GroupPlan {
            parent_id: parent_id.clone(),
            ordered,
            arrived,
            departed,
        });
    }

    // Groups that only lose members, discovered in submission order
    let mut source_groups: Vec<String> = Vec::new();
    for (_, members) in &submitted {
        for id in members {
            let to = &new_parent[id];
            let from = snapshot.current_parent(id).map(str::to_string);
            if from.as_deref() == Some(to.as_str()) {
                continue;
            }

            plan.reparents.push(Reparent {
                node_id: id.clone(),
                from: from.clone(),
                to: to.clone(),
            });

            if let Some(from) = from {
                if !submitted_parents.contains(from.as_str()) && !source_groups.contains(&from) {
                    source_groups.push(from);
                }
            }
        }
    }

    for parent_id in source_groups {
        let existing = snapshot.children(&parent_id);
        let (departed, ordered): (Vec<String>, Vec<String>) = existing
            .iter()
            .cloned()
            .partition(|id| new_parent.get(id).is_some_and(|p| p != &parent_id));

        tracing::debug!(
            "Group '{}': {} departed, {} remain",
            parent_id,
            departed.len(),
            ordered.len()
        );

        plan.groups.push(GroupPlan {
            parent_id,
            ordered,
            arrived: Vec::new(),
            departed,
        });
    }

    Ok(plan)
}

fn collect_groups(
    parent_id: &str,
    entries: &[SubmissionEntry],
    snapshot: &TreeSnapshot,
    submitted: &mut Vec<(String, Vec<String>)>,
    new_parent: &mut HashMap<String, String>,
) -> Result<(), OrderingError> {
    let mut members = Vec::with_capacity(entries.len());

    for entry in entries {
        let id = entry.id();
        if id == snapshot.root_id() {
            return Err(OrderingError::malformed(format!(
                "document root '{}' cannot be placed inside itself",
                id
            )));
        }

        let node = snapshot
            .node(id)
            .ok_or_else(|| OrderingError::node_not_found(id))?;
        if node.kind == NodeKind::Paged {
            return Err(OrderingError::malformed(format!(
                "'{}' is a paged document and cannot be nested",
                id
            )));
        }

        if new_parent
            .insert(id.to_string(), parent_id.to_string())
            .is_some()
        {
            return Err(OrderingError::malformed(format!(
                "id '{}' appears more than once",
                id
            )));
        }
        members.push(id.to_string());
    }
    submitted.push((parent_id.to_string(), members));

    for entry in entries {
        let Some(children) = entry.children() else {
            continue;
        };
        let id = entry.id();
        let is_container = snapshot.node(id).is_some_and(|n| n.is_container());

        if !is_container {
            if children.is_empty() {
                continue;
            }
            return Err(OrderingError::malformed(format!(
                "page '{}' cannot hold children",
                id
            )));
        }
        collect_groups(id, children, snapshot, submitted, new_parent)?;
    }

    Ok(())
}

/// Parent chains of every placed node must reach the root
fn ensure_acyclic(
    new_parent: &HashMap<String, String>,
    snapshot: &TreeSnapshot,
) -> Result<(), OrderingError> {
    let parent_of = |id: &str| -> Option<String> {
        new_parent
            .get(id)
            .cloned()
            .or_else(|| snapshot.current_parent(id).map(str::to_string))
    };

    for start in new_parent.keys() {
        let mut seen = HashSet::from([start.clone()]);
        let mut cursor = parent_of(start);
        while let Some(id) = cursor {
            if id == snapshot.root_id() {
                break;
            }
            if !seen.insert(id.clone()) {
                return Err(OrderingError::malformed(format!(
                    "'{}' would become its own ancestor",
                    id
                )));
            }
            cursor = parent_of(&id);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Node;
    use crate::ordering::SubmissionEntry::{LeafRef, NodeRef};

    /// Build a document from `(container, kind, "child child ...")` rows
    fn document(rows: &[(&str, NodeKind, &str)]) -> TreeSnapshot {
        let mut nodes: HashMap<String, Node> = HashMap::new();
        for (id, kind, children) in rows {
            let children: Vec<&str> = children.split_whitespace().collect();
            let node = nodes
                .entry(id.to_string())
                .or_insert_with(|| Node::new_with_id(id.to_string(), *kind, String::new()));
            node.kind = *kind;
            node.first_child_id = children.first().map(|c| c.to_string());

            for (i, child) in children.iter().enumerate() {
                let child_node = nodes.entry(child.to_string()).or_insert_with(|| {
                    Node::new_with_id(child.to_string(), NodeKind::Page, String::new())
                });
                child_node.parent_id = Some(id.to_string());
                child_node.logical_number = Some((i + 1).to_string());
                child_node.prev_sibling_id = i.checked_sub(1).map(|p| children[p].to_string());
                child_node.next_sibling_id = children.get(i + 1).map(|n| n.to_string());
            }
        }
        TreeSnapshot::from_nodes(rows[0].0, nodes.into_values())
    }

    fn leaf(id: &str) -> SubmissionEntry {
        LeafRef(id.to_string())
    }

    fn group(id: &str, children: Vec<SubmissionEntry>) -> SubmissionEntry {
        NodeRef {
            id: id.to_string(),
            children,
        }
    }

    fn two_sections() -> TreeSnapshot {
        document(&[
            ("book", NodeKind::Paged, "s1 s2"),
            ("s1", NodeKind::Section, "p q"),
            ("s2", NodeKind::Section, "r"),
        ])
    }

    #[test]
    fn test_flat_reorder() {
        let snapshot = document(&[("book", NodeKind::Paged, "a b c")]);
        let forest = OrderedForest::new(vec![leaf("c"), leaf("b"), leaf("a")]);

        let plan = reconcile(&forest, &snapshot).unwrap();
        assert_eq!(plan.groups.len(), 1);
        assert_eq!(plan.groups[0].parent_id, "book");
        assert_eq!(plan.groups[0].ordered, vec!["c", "b", "a"]);
        assert!(plan.groups[0].arrived.is_empty());
        assert!(plan.reparents.is_empty());
    }

    #[test]
    fn test_move_page_between_sections() {
        let snapshot = two_sections();
        let forest = OrderedForest::new(vec![
            group("s1", vec![leaf("q")]),
            group("s2", vec![leaf("r"), leaf("p")]),
        ]);

        let plan = reconcile(&forest, &snapshot).unwrap();
        assert_eq!(plan.group("book").unwrap().ordered, vec!["s1", "s2"]);
        assert_eq!(plan.group("s1").unwrap().ordered, vec!["q"]);
        assert_eq!(plan.group("s1").unwrap().departed, vec!["p"]);

        let s2 = plan.group("s2").unwrap();
        assert_eq!(s2.ordered, vec!["r", "p"]);
        assert!(s2.is_arrival("p"));
        assert!(!s2.is_arrival("r"));

        assert_eq!(
            plan.reparents,
            vec![Reparent {
                node_id: "p".to_string(),
                from: Some("s1".to_string()),
                to: "s2".to_string(),
            }]
        );
    }

    #[test]
    fn test_source_group_without_entry_is_touched() {
        let snapshot = two_sections();
        // s1 is listed without children, so its group is only touched by p leaving
        let forest = OrderedForest::new(vec![leaf("s1"), group("s2", vec![leaf("p"), leaf("r")])]);

        let plan = reconcile(&forest, &snapshot).unwrap();
        let parents: Vec<_> = plan.groups.iter().map(|g| g.parent_id.as_str()).collect();
        assert_eq!(parents, vec!["book", "s2", "s1"]);
        assert_eq!(plan.group("s1").unwrap().ordered, vec!["q"]);
        assert_eq!(plan.group("s2").unwrap().ordered, vec!["p", "r"]);
    }

    #[test]
    fn test_reparent_section_keeps_its_subtree() {
        let snapshot = document(&[
            ("book", NodeKind::Paged, "s1 s2 s3"),
            ("s1", NodeKind::Section, "a"),
            ("s2", NodeKind::Section, "b c"),
            ("s3", NodeKind::Section, "d"),
        ]);
        let forest = OrderedForest::new(vec![
            group("s1", vec![leaf("a"), leaf("s2")]),
            group("s3", vec![leaf("d")]),
        ]);

        let plan = reconcile(&forest, &snapshot).unwrap();
        assert_eq!(plan.group("book").unwrap().ordered, vec!["s1", "s3"]);
        assert_eq!(plan.group("s1").unwrap().ordered, vec!["a", "s2"]);
        // s2's own group is not part of the plan
        assert!(plan.group("s2").is_none());
    }

    #[test]
    fn test_unmentioned_siblings_follow_submitted() {
        let snapshot = document(&[("book", NodeKind::Paged, "a b c d")]);

        let forest = OrderedForest::new(vec![leaf("d"), leaf("a")]);
        let plan = reconcile(&forest, &snapshot).unwrap();
        assert_eq!(plan.groups[0].ordered, vec!["d", "a", "b", "c"]);

        let forest = OrderedForest::new(vec![leaf("c")]);
        let plan = reconcile(&forest, &snapshot).unwrap();
        assert_eq!(plan.groups[0].ordered, vec!["c", "a", "b", "d"]);
    }

    #[test]
    fn test_unmentioned_siblings_kept_when_group_shrinks() {
        let snapshot = document(&[
            ("book", NodeKind::Paged, "s1 s2"),
            ("s1", NodeKind::Section, "a b c d"),
            ("s2", NodeKind::Section, ""),
        ]);
        // a, b, c move out; d stays behind as the only member
        let forest = OrderedForest::new(vec![
            group("s1", vec![]),
            group("s2", vec![leaf("c"), leaf("b"), leaf("a")]),
        ]);

        let plan = reconcile(&forest, &snapshot).unwrap();
        assert_eq!(plan.group("s1").unwrap().ordered, vec!["d"]);
        assert_eq!(plan.group("s2").unwrap().ordered, vec!["c", "b", "a"]);
        assert_eq!(plan.group("s2").unwrap().arrived, vec!["c", "b", "a"]);
    }

    #[test]
    fn test_unmentioned_member_follows_arrivals() {
        let snapshot = two_sections();
        let forest = OrderedForest::new(vec![group("s2", vec![leaf("p")])]);

        let plan = reconcile(&forest, &snapshot).unwrap();
        assert_eq!(plan.group("s2").unwrap().ordered, vec!["p", "r"]);
        assert_eq!(plan.group("s1").unwrap().ordered, vec!["q"]);
    }

    #[test]
    fn test_unplaced_node_arrives() {
        let snapshot = TreeSnapshot::from_nodes(
            "book",
            vec![
                Node::new_with_id("book".to_string(), NodeKind::Paged, String::new()),
                Node::new_with_id("new".to_string(), NodeKind::Page, String::new()),
            ],
        );

        let plan = reconcile(&OrderedForest::new(vec![leaf("new")]), &snapshot).unwrap();
        assert_eq!(plan.groups[0].ordered, vec!["new"]);
        assert_eq!(plan.groups[0].arrived, vec!["new"]);
        assert_eq!(plan.reparents[0].from, None);
    }

    #[test]
    fn test_unknown_id_is_not_found() {
        let snapshot = document(&[("book", NodeKind::Paged, "x")]);
        let err = reconcile(&OrderedForest::new(vec![leaf("x"), leaf("y")]), &snapshot)
            .unwrap_err();
        assert!(matches!(err, OrderingError::NodeNotFound { ref node_id } if node_id == "y"));
    }

    #[test]
    fn test_root_in_submission_is_malformed() {
        let snapshot = document(&[("book", NodeKind::Paged, "a")]);
        let forest = OrderedForest::new(vec![group("a", vec![]), leaf("book")]);
        let err = reconcile(&forest, &snapshot).unwrap_err();
        assert!(matches!(err, OrderingError::MalformedSubmission { .. }));
    }

    #[test]
    fn test_page_with_children_is_malformed() {
        let snapshot = document(&[("book", NodeKind::Paged, "a b")]);
        let forest = OrderedForest::new(vec![group("a", vec![leaf("b")])]);
        let err = reconcile(&forest, &snapshot).unwrap_err();
        assert!(err.to_string().contains("cannot hold children"));

        // an explicit empty list on a page is harmless
        let forest = OrderedForest::new(vec![group("a", vec![]), leaf("b")]);
        assert!(reconcile(&forest, &snapshot).is_ok());
    }

    #[test]
    fn test_duplicate_across_groups_is_malformed() {
        let snapshot = two_sections();
        let forest = OrderedForest::new(vec![
            group("s1", vec![leaf("p")]),
            group("s2", vec![leaf("p")]),
        ]);
        assert!(matches!(
            reconcile(&forest, &snapshot),
            Err(OrderingError::MalformedSubmission { .. })
        ));
    }

    #[test]
    fn test_current_order_is_identity() {
        let snapshot = two_sections();
        let forest = OrderedForest::new(vec![
            group("s1", vec![leaf("p"), leaf("q")]),
            group("s2", vec![leaf("r")]),
        ]);

        let plan = reconcile(&forest, &snapshot).unwrap();
        for group in &plan.groups {
            assert_eq!(group.ordered, snapshot.children(&group.parent_id));
            assert!(group.arrived.is_empty());
            assert!(group.departed.is_empty());
        }
        assert!(plan.reparents.is_empty());
    }
}
