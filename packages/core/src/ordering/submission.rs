//! Submission Parser
//!
//! Decodes a client-supplied ordering description into an [`OrderedForest`].
//! Two wire shapes are accepted:
//!
//! - a flat, comma-separated list of bare ids: `p3,p1,p2`
//! - a JSON array whose elements are either bare ids or objects of shape
//!   `{ "id": <identifier>, "children"?: [ ...same shape... ] }`
//!
//! A blank or absent submission yields [`Submission::Empty`], which callers
//! report as "no changes submitted" rather than as an error.
//!
//! Parsing is pure: no lookups, no mutation. Everything that can be checked
//! without the store is checked here (duplicate ids, empty ids, nesting depth,
//! entry count) so malformed input is rejected before the pipeline starts.

use crate::config::OrderingConfig;
use crate::ordering::OrderingError;
use serde::Deserialize;
use std::collections::HashSet;

/// One entry of a submitted sibling group
///
/// Resolved once during parsing; later stages never inspect the wire shape.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmissionEntry {
    /// Bare id, or an object without a `children` key. The node's own child
    /// group is left as it is.
    LeafRef(String),
    /// Object carrying a `children` list: the node's own child group is patched
    /// to this order (an empty list is an explicit, empty patch).
    NodeRef {
        id: String,
        children: Vec<SubmissionEntry>,
    },
}

impl SubmissionEntry {
    pub fn id(&self) -> &str {
        match self {
            SubmissionEntry::LeafRef(id) | SubmissionEntry::NodeRef { id, .. } => id,
        }
    }

    /// Child entries, `None` when this entry does not patch its own group
    pub fn children(&self) -> Option<&[SubmissionEntry]> {
        match self {
            SubmissionEntry::LeafRef(_) => None,
            SubmissionEntry::NodeRef { children, .. } => Some(children),
        }
    }
}

/// Ordered forest of submitted entries; the top level belongs to the document root
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct OrderedForest {
    pub entries: Vec<SubmissionEntry>,
}

impl OrderedForest {
    pub fn new(entries: Vec<SubmissionEntry>) -> Self {
        Self { entries }
    }

    /// Total number of entries at every depth
    pub fn len(&self) -> usize {
        fn count(entries: &[SubmissionEntry]) -> usize {
            entries
                .iter()
                .map(|e| 1 + e.children().map(count).unwrap_or(0))
                .sum()
        }
        count(&self.entries)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Every submitted id, depth-first in submission order
    pub fn ids(&self) -> Vec<&str> {
        fn walk<'a>(entries: &'a [SubmissionEntry], out: &mut Vec<&'a str>) {
            for entry in entries {
                out.push(entry.id());
                if let Some(children) = entry.children() {
                    walk(children, out);
                }
            }
        }
        let mut out = Vec::new();
        walk(&self.entries, &mut out);
        out
    }
}

/// Outcome of parsing
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Submission {
    /// Absent or blank input: nothing to do
    Empty,
    Forest(OrderedForest),
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum WireId {
    Text(String),
    Number(u64),
}

impl WireId {
    fn into_string(self) -> String {
        match self {
            WireId::Text(s) => s,
            WireId::Number(n) => n.to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum WireEntry {
    Bare(WireId),
    Object {
        id: WireId,
        #[serde(default)]
        children: Option<Vec<WireEntry>>,
    },
}

/// Parse a raw submission string
///
/// # Examples
///
/// ```rust
/// use pageorder_core::config::OrderingConfig;
/// use pageorder_core::ordering::{parse_submission, Submission, SubmissionEntry};
///
/// let config = OrderingConfig::default();
///
/// let flat = parse_submission(Some("p3, p1,p2"), &config).unwrap();
/// let Submission::Forest(forest) = flat else { panic!() };
/// assert_eq!(forest.ids(), vec!["p3", "p1", "p2"]);
///
/// let nested = parse_submission(
///     Some(r#"[{"id": "s1", "children": [{"id": "p2"}, "p1"]}]"#),
///     &config,
/// ).unwrap();
/// let Submission::Forest(forest) = nested else { panic!() };
/// assert_eq!(
///     forest.entries[0],
///     SubmissionEntry::NodeRef {
///         id: "s1".to_string(),
///         children: vec![
///             SubmissionEntry::LeafRef("p2".to_string()),
///             SubmissionEntry::LeafRef("p1".to_string()),
///         ],
///     }
/// );
///
/// assert_eq!(parse_submission(Some("   "), &config).unwrap(), Submission::Empty);
/// assert_eq!(parse_submission(None, &config).unwrap(), Submission::Empty);
/// ```
pub fn parse_submission(
    raw: Option<&str>,
    config: &OrderingConfig,
) -> Result<Submission, OrderingError> {
    let raw = match raw.map(str::trim) {
        None | Some("") => return Ok(Submission::Empty),
        Some(raw) => raw,
    };

    let entries = if raw.starts_with('[') {
        let wire: Vec<WireEntry> = serde_json::from_str(raw)
            .map_err(|e| OrderingError::malformed(format!("unparseable submission: {}", e)))?;
        convert_entries(wire, 1, config)?
    } else {
        raw.split(',')
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .map(|id| SubmissionEntry::LeafRef(id.to_string()))
            .collect()
    };

    finish(entries, config)
}

/// Parse a submission that the request layer already decoded as JSON
///
/// `null`, `""` and `[]` are [`Submission::Empty`]; a JSON string is handled
/// exactly like [`parse_submission`].
pub fn parse_submission_value(
    value: &serde_json::Value,
    config: &OrderingConfig,
) -> Result<Submission, OrderingError> {
    match value {
        serde_json::Value::Null => Ok(Submission::Empty),
        serde_json::Value::String(s) => parse_submission(Some(s), config),
        serde_json::Value::Array(_) => {
            let wire: Vec<WireEntry> = serde_json::from_value(value.clone())
                .map_err(|e| OrderingError::malformed(format!("unparseable submission: {}", e)))?;
            let entries = convert_entries(wire, 1, config)?;
            finish(entries, config)
        }
        other => Err(OrderingError::malformed(format!(
            "expected a list of entries, got {}",
            json_type_name(other)
        ))),
    }
}

fn convert_entries(
    wire: Vec<WireEntry>,
    depth: usize,
    config: &OrderingConfig,
) -> Result<Vec<SubmissionEntry>, OrderingError> {
    if depth > config.max_depth {
        return Err(OrderingError::malformed(format!(
            "submission nests deeper than {} levels",
            config.max_depth
        )));
    }

    wire.into_iter()
        .map(|entry| match entry {
            WireEntry::Bare(id) => Ok(SubmissionEntry::LeafRef(id.into_string())),
            WireEntry::Object { id, children: None } => {
                Ok(SubmissionEntry::LeafRef(id.into_string()))
            }
            WireEntry::Object {
                id,
                children: Some(children),
            } => Ok(SubmissionEntry::NodeRef {
                id: id.into_string(),
                children: convert_entries(children, depth + 1, config)?,
            }),
        })
        .collect()
}

fn finish(
    entries: Vec<SubmissionEntry>,
    config: &OrderingConfig,
) -> Result<Submission, OrderingError> {
    if entries.is_empty() {
        return Ok(Submission::Empty);
    }

    let forest = OrderedForest::new(entries);
    let total = forest.len();
    if total > config.max_entries {
        return Err(OrderingError::malformed(format!(
            "submission lists {} entries, the limit is {}",
            total, config.max_entries
        )));
    }

    let mut seen = HashSet::with_capacity(total);
    for id in forest.ids() {
        if id.trim().is_empty() {
            return Err(OrderingError::malformed("submission contains an empty id"));
        }
        if !seen.insert(id) {
            return Err(OrderingError::malformed(format!(
                "id '{}' appears more than once",
                id
            )));
        }
    }

    Ok(Submission::Forest(forest))
}

fn json_type_name(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "a boolean",
        serde_json::Value::Number(_) => "a number",
        serde_json::Value::String(_) => "a string",
        serde_json::Value::Array(_) => "an array",
        serde_json::Value::Object(_) => "an object",
    }
}
