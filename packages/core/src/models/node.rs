//! Node Data Structures
//!
//! This module defines the `Node` struct shared by every member of a paged
//! document: the root `Paged` container, intermediate `Section` containers and
//! `Page` leaves.
//!
//! # Ordering Fields
//!
//! Order is never stored as an index. Each node carries:
//!
//! - `logical_number`: stringified 1-based position among its siblings
//! - `prev_sibling_id` / `next_sibling_id`: a doubly linked list per sibling group
//! - `parent_id`: the owning container
//!
//! Containers additionally hold `first_child_id` (the head of their chain) and an
//! optional `child_count` used to detect chains that lost or gained members.
//!
//! # Examples
//!
//! ```rust
//! use pageorder_core::models::{Node, NodeKind};
//!
//! let book = Node::new(NodeKind::Paged, "Herbarium Vol. 1".to_string());
//! let page = Node::new(NodeKind::Page, "Plate 1".to_string());
//!
//! assert!(book.is_container());
//! assert!(!page.is_container());
//! assert!(page.prev_sibling_id.is_none());
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Validation errors for Node field values
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("Invalid parent reference: {0}")]
    InvalidParent(String),

    #[error("Invalid sibling reference: {0}")]
    InvalidSibling(String),

    #[error("Invalid child reference: {0}")]
    InvalidChild(String),

    #[error("Invalid logical number: {0}")]
    InvalidLogicalNumber(String),

    #[error("Properties validation failed: {0}")]
    InvalidProperties(String),

    /// Rejected by a storage-level rule (see `InMemoryStore::with_rule`)
    #[error("{0}")]
    Rule(String),
}

/// Structural role of a node inside a paged document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    /// Root object representing a whole scanned work
    Paged,
    /// Intermediate container grouping pages or nested sections
    Section,
    /// Leaf holding one scanned image/content unit
    Page,
}

impl NodeKind {
    pub fn is_container(self) -> bool {
        matches!(self, NodeKind::Paged | NodeKind::Section)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            NodeKind::Paged => "paged",
            NodeKind::Section => "section",
            NodeKind::Page => "page",
        }
    }
}

impl std::fmt::Display for NodeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A member of a paged document.
///
/// # Fields
///
/// - `id`: Stable unique identifier, immutable after creation
/// - `kind`: Paged, Section or Page
/// - `title`: Display title (not used for ordering)
/// - `logical_number`: Stringified 1-based position among siblings
/// - `parent_id`: Owning container, `None` for the document root and for
///   nodes that have not entered the ordering structure yet
/// - `prev_sibling_id` / `next_sibling_id`: Sibling chain links
/// - `first_child_id`: Head of this container's child chain (containers only)
/// - `child_count`: Recorded number of children (containers only, when tracked)
/// - `properties`: Free-form JSON metadata untouched by ordering
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Node {
    pub id: String,

    pub kind: NodeKind,

    #[serde(default)]
    pub title: String,

    #[serde(default)]
    pub logical_number: Option<String>,

    #[serde(default)]
    pub parent_id: Option<String>,

    #[serde(default)]
    pub prev_sibling_id: Option<String>,

    #[serde(default)]
    pub next_sibling_id: Option<String>,

    #[serde(default)]
    pub first_child_id: Option<String>,

    #[serde(default)]
    pub child_count: Option<usize>,

    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,

    #[serde(default = "Utc::now")]
    pub modified_at: DateTime<Utc>,

    #[serde(default = "empty_properties")]
    pub properties: serde_json::Value,
}

fn empty_properties() -> serde_json::Value {
    serde_json::Value::Object(Default::default())
}

impl Node {
    /// Create a new unlinked node with an auto-generated UUID
    pub fn new(kind: NodeKind, title: String) -> Self {
        Self::new_with_id(Uuid::new_v4().to_string(), kind, title)
    }

    /// Create a new unlinked node with a caller-provided ID
    ///
    /// Nodes start outside any sibling chain. They enter the ordering structure
    /// only when a reorder submission (or `OrderService::append_child`) places them.
    pub fn new_with_id(id: String, kind: NodeKind, title: String) -> Self {
        let now = Utc::now();
        Self {
            id,
            kind,
            title,
            logical_number: None,
            parent_id: None,
            prev_sibling_id: None,
            next_sibling_id: None,
            first_child_id: None,
            child_count: None,
            created_at: now,
            modified_at: now,
            properties: empty_properties(),
        }
    }

    pub fn is_container(&self) -> bool {
        self.kind.is_container()
    }

    /// True for the document root (a `Paged` node, never parented)
    pub fn is_root(&self) -> bool {
        self.kind == NodeKind::Paged && self.parent_id.is_none()
    }

    /// Apply a sparse update in place and bump `modified_at`
    pub fn apply_update(&mut self, update: &NodeUpdate) {
        if let Some(title) = &update.title {
            self.title = title.clone();
        }
        if let Some(value) = &update.logical_number {
            self.logical_number = value.clone();
        }
        if let Some(value) = &update.parent_id {
            self.parent_id = value.clone();
        }
        if let Some(value) = &update.prev_sibling_id {
            self.prev_sibling_id = value.clone();
        }
        if let Some(value) = &update.next_sibling_id {
            self.next_sibling_id = value.clone();
        }
        if let Some(value) = &update.first_child_id {
            self.first_child_id = value.clone();
        }
        if let Some(value) = update.child_count {
            self.child_count = value;
        }
        if let Some(properties) = &update.properties {
            self.properties = properties.clone();
        }
        self.modified_at = Utc::now();
    }

    /// Validate structural field values
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.id.is_empty() {
            return Err(ValidationError::MissingField("id".to_string()));
        }

        if self.parent_id.as_deref() == Some(self.id.as_str()) {
            return Err(ValidationError::InvalidParent(
                "Node cannot be its own parent".to_string(),
            ));
        }

        if self.kind == NodeKind::Paged && self.parent_id.is_some() {
            return Err(ValidationError::InvalidParent(
                "A paged document cannot be nested in another container".to_string(),
            ));
        }

        for sibling in [&self.prev_sibling_id, &self.next_sibling_id]
            .into_iter()
            .flatten()
        {
            if sibling == &self.id {
                return Err(ValidationError::InvalidSibling(
                    "Node cannot be its own sibling".to_string(),
                ));
            }
        }

        if let (Some(prev), Some(next)) = (&self.prev_sibling_id, &self.next_sibling_id) {
            if prev == next {
                return Err(ValidationError::InvalidSibling(format!(
                    "prev and next both point to '{}'",
                    prev
                )));
            }
        }

        if !self.is_container() && (self.first_child_id.is_some() || self.child_count.is_some())
        {
            return Err(ValidationError::InvalidChild(format!(
                "{} nodes cannot hold children",
                self.kind
            )));
        }

        if self.first_child_id.as_deref() == Some(self.id.as_str()) {
            return Err(ValidationError::InvalidChild(
                "Node cannot be its own first child".to_string(),
            ));
        }

        if let Some(number) = &self.logical_number {
            match number.parse::<u64>() {
                Ok(n) if n > 0 => {}
                _ => return Err(ValidationError::InvalidLogicalNumber(number.clone())),
            }
        }

        if !self.properties.is_object() {
            return Err(ValidationError::InvalidProperties(
                "properties must be a JSON object".to_string(),
            ));
        }

        Ok(())
    }
}

/// Maps three input formats to the double-Option pattern:
/// - Missing field → None (don't update)
/// - null → Some(None) (set to NULL)
/// - "value" → Some(Some("value")) (set to value)
fn deserialize_optional_field<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(Some(Option::<T>::deserialize(deserializer)?))
}

/// Partial node update
///
/// # Double-Option Pattern for Nullable Fields
///
/// - `None`: Don't change this field
/// - `Some(None)`: Clear the field
/// - `Some(Some(value))`: Set the field to `value`
///
/// The linked-list builder emits only the fields whose value actually changes,
/// so an empty update means the node is already in its planned state.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "deserialize_optional_field"
    )]
    pub logical_number: Option<Option<String>>,

    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "deserialize_optional_field"
    )]
    pub parent_id: Option<Option<String>>,

    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "deserialize_optional_field"
    )]
    pub prev_sibling_id: Option<Option<String>>,

    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "deserialize_optional_field"
    )]
    pub next_sibling_id: Option<Option<String>>,

    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "deserialize_optional_field"
    )]
    pub first_child_id: Option<Option<String>>,

    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "deserialize_optional_field"
    )]
    pub child_count: Option<Option<usize>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub properties: Option<serde_json::Value>,
}

impl NodeUpdate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Check if update contains any changes
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.logical_number.is_none()
            && self.parent_id.is_none()
            && self.prev_sibling_id.is_none()
            && self.next_sibling_id.is_none()
            && self.first_child_id.is_none()
            && self.child_count.is_none()
            && self.properties.is_none()
    }

    /// Names of the fields this update touches, in a stable order
    pub fn changed_fields(&self) -> Vec<&'static str> {
        let mut fields = Vec::new();
        if self.title.is_some() {
            fields.push("title");
        }
        if self.logical_number.is_some() {
            fields.push("logical_number");
        }
        if self.parent_id.is_some() {
            fields.push("parent_id");
        }
        if self.prev_sibling_id.is_some() {
            fields.push("prev_sibling_id");
        }
        if self.next_sibling_id.is_some() {
            fields.push("next_sibling_id");
        }
        if self.first_child_id.is_some() {
            fields.push("first_child_id");
        }
        if self.child_count.is_some() {
            fields.push("child_count");
        }
        if self.properties.is_some() {
            fields.push("properties");
        }
        fields
    }
}

/// Result of a delete operation
///
/// Deleting a missing node is an idempotent success; `existed` records
/// whether anything was actually removed.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DeleteResult {
    pub existed: bool,
}

impl DeleteResult {
    pub fn existed() -> Self {
        Self { existed: true }
    }

    pub fn not_found() -> Self {
        Self { existed: false }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_new_node_is_unlinked() {
        let node = Node::new(NodeKind::Page, "Plate".to_string());
        assert!(Uuid::parse_str(&node.id).is_ok());
        assert!(node.logical_number.is_none());
        assert!(node.parent_id.is_none());
        assert!(node.prev_sibling_id.is_none());
        assert!(node.next_sibling_id.is_none());
        assert!(node.validate().is_ok());
    }

    #[test]
    fn test_paged_is_root() {
        let book = Node::new(NodeKind::Paged, "Book".to_string());
        assert!(book.is_root());
        assert!(book.is_container());

        let section = Node::new(NodeKind::Section, "Chapter".to_string());
        assert!(!section.is_root());
        assert!(section.is_container());
    }

    #[test]
    fn test_validation_self_parent() {
        let mut node = Node::new_with_id("a".to_string(), NodeKind::Page, String::new());
        node.parent_id = Some("a".to_string());
        assert!(matches!(
            node.validate(),
            Err(ValidationError::InvalidParent(_))
        ));
    }

    #[test]
    fn test_validation_circular_sibling() {
        let mut node = Node::new_with_id("a".to_string(), NodeKind::Page, String::new());
        node.next_sibling_id = Some("a".to_string());
        assert!(matches!(
            node.validate(),
            Err(ValidationError::InvalidSibling(_))
        ));

        node.next_sibling_id = Some("b".to_string());
        node.prev_sibling_id = Some("b".to_string());
        assert!(matches!(
            node.validate(),
            Err(ValidationError::InvalidSibling(_))
        ));
    }

    #[test]
    fn test_validation_leaf_cannot_hold_children() {
        let mut page = Node::new_with_id("p".to_string(), NodeKind::Page, String::new());
        page.first_child_id = Some("q".to_string());
        assert!(matches!(
            page.validate(),
            Err(ValidationError::InvalidChild(_))
        ));
    }

    #[test]
    fn test_validation_logical_number() {
        let mut page = Node::new_with_id("p".to_string(), NodeKind::Page, String::new());
        for bad in ["0", "-1", "two", ""] {
            page.logical_number = Some(bad.to_string());
            assert_eq!(
                page.validate(),
                Err(ValidationError::InvalidLogicalNumber(bad.to_string()))
            );
        }
        page.logical_number = Some("12".to_string());
        assert!(page.validate().is_ok());
    }

    #[test]
    fn test_validation_nested_paged() {
        let mut book = Node::new_with_id("b".to_string(), NodeKind::Paged, String::new());
        book.parent_id = Some("other".to_string());
        assert!(book.validate().is_err());
    }

    #[test]
    fn test_apply_update_double_option() {
        let mut node = Node::new_with_id("a".to_string(), NodeKind::Page, String::new());
        node.prev_sibling_id = Some("x".to_string());
        node.next_sibling_id = Some("y".to_string());

        let update = NodeUpdate {
            prev_sibling_id: Some(None),
            logical_number: Some(Some("1".to_string())),
            ..Default::default()
        };
        node.apply_update(&update);

        assert_eq!(node.prev_sibling_id, None);
        assert_eq!(node.next_sibling_id, Some("y".to_string()));
        assert_eq!(node.logical_number.as_deref(), Some("1"));
    }

    #[test]
    fn test_node_update_deserialize_null_vs_missing() {
        let update: NodeUpdate =
            serde_json::from_value(json!({"prevSiblingId": null, "logicalNumber": "3"})).unwrap();
        assert_eq!(update.prev_sibling_id, Some(None));
        assert_eq!(update.next_sibling_id, None);
        assert_eq!(update.logical_number, Some(Some("3".to_string())));
        assert_eq!(update.changed_fields(), vec!["logical_number", "prev_sibling_id"]);
    }

    #[test]
    fn test_node_update_is_empty() {
        let update = NodeUpdate {
            title: Some("Plate 2".to_string()),
            ..Default::default()
        };
        assert!(!update.is_empty());
        assert!(NodeUpdate::new().is_empty());
    }

    #[test]
    fn test_node_deserialize_minimal() {
        let node: Node = serde_json::from_value(json!({"id": "p1", "kind": "page"})).unwrap();
        assert_eq!(node.kind, NodeKind::Page);
        assert!(node.properties.is_object());
        assert!(node.validate().is_ok());
    }
}
