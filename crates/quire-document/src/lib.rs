//! # Quire Document
//!
//! The document model owned by the editor core.
//!
//! ## Key Concepts
//!
//! ### The tree is the document
//! - `Document` owns every node in an arena keyed by `NodeId`
//! - The rendered surface is only a projection of this tree
//! - Node ids are never reused, so a stale id can't alias a new node
//!
//! ### Points and ranges
//! - A `Point` is a `(node, offset)` pair, like a DOM boundary point
//! - Text nodes count offsets in characters, elements count children
//! - A `TextRange` keeps its direction (anchor → focus)

mod document;
pub mod markup;
mod node;
mod point;
pub mod sanitize;

pub use document::Document;
pub use node::{Element, FragmentNode, Node, NodeId, NodeKind};
pub use point::{Point, TextRange};
pub use sanitize::SanitizePolicy;

/// Result type for document operations
pub type DocumentResult<T> = Result<T, DocumentError>;

/// Errors that can occur during document operations
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DocumentError {
    #[error("Node {0} is not attached to the document")]
    UnknownNode(NodeId),

    #[error("Node {0} is not a text node")]
    NotText(NodeId),

    #[error("Node {0} is not an element")]
    NotElement(NodeId),

    #[error("Offset {offset} is out of bounds for node {node} (length {len})")]
    OffsetOutOfBounds {
        node: NodeId,
        offset: usize,
        len: usize,
    },

    #[error("The root node cannot be removed")]
    RootImmutable,
}
