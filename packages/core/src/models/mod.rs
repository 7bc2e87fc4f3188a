//! Data Models
//!
//! - `Node` - A member of a paged document (Paged, Section or Page)
//! - `NodeUpdate` - Sparse, double-Option field update consumed by stores
//! - `DeleteResult` - Idempotent delete outcome

mod node;

pub use node::{DeleteResult, Node, NodeKind, NodeUpdate, ValidationError};
