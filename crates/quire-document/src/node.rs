//! Node types for the document tree.
//!
//! ## Learning: Arena Trees
//!
//! Parent pointers and child lists in a tree of `Box`es fight the borrow
//! checker. Storing nodes in a map keyed by a small `Copy` id keeps every
//! link a plain value, and lookups fail cleanly once a node is removed.

use serde::{Deserialize, Serialize};

/// Stable identifier for a node in a [`Document`](crate::Document).
///
/// Ids are allocated from a monotonic counter and never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(pub u64);

impl NodeId {
    /// Returns the raw id value.
    pub const fn raw(self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// An element: tag name plus ordered attributes.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Element {
    /// Lowercase tag name
    pub tag: String,
    /// Attributes in source order
    pub attrs: Vec<(String, String)>,
}

impl Element {
    /// Creates an element without attributes.
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into().to_ascii_lowercase(),
            attrs: Vec::new(),
        }
    }

    /// Adds an attribute (builder style).
    pub fn with_attr(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attrs.push((name.into(), value.into()));
        self
    }

    /// Returns an attribute value.
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    /// Returns true for elements that never have children (`<br>`, `<hr>`, ...).
    pub fn is_void(&self) -> bool {
        crate::markup::is_void_element(&self.tag)
    }

    /// Returns true for block-level elements (used for text extraction).
    pub fn is_block(&self) -> bool {
        matches!(
            self.tag.as_str(),
            "p" | "div"
                | "h1"
                | "h2"
                | "h3"
                | "h4"
                | "h5"
                | "h6"
                | "li"
                | "ul"
                | "ol"
                | "pre"
                | "blockquote"
                | "table"
                | "tr"
                | "section"
                | "aside"
                | "details"
                | "summary"
                | "hr"
                | "br"
        )
    }
}

/// What a node holds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeKind {
    /// An element with children
    Element(Element),
    /// A run of text (always a leaf)
    Text(String),
}

/// A node attached to a document.
#[derive(Debug, Clone)]
pub struct Node {
    pub(crate) id: NodeId,
    pub(crate) parent: Option<NodeId>,
    pub(crate) kind: NodeKind,
    pub(crate) children: Vec<NodeId>,
}

impl Node {
    /// The node's id.
    pub fn id(&self) -> NodeId {
        self.id
    }

    /// The parent node, `None` only for the root.
    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    /// The node's payload.
    pub fn kind(&self) -> &NodeKind {
        &self.kind
    }

    /// Child ids in document order.
    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    /// Returns the text if this is a text node.
    pub fn as_text(&self) -> Option<&str> {
        match &self.kind {
            NodeKind::Text(t) => Some(t),
            NodeKind::Element(_) => None,
        }
    }

    /// Returns the element if this is an element node.
    pub fn as_element(&self) -> Option<&Element> {
        match &self.kind {
            NodeKind::Element(e) => Some(e),
            NodeKind::Text(_) => None,
        }
    }

    /// Boundary-point length: characters for text, children for elements.
    pub fn len(&self) -> usize {
        match &self.kind {
            NodeKind::Text(t) => t.chars().count(),
            NodeKind::Element(_) => self.children.len(),
        }
    }

    /// Returns true if [`len`](Self::len) is zero.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A detached subtree, as produced by the markup parser or by removing a
/// node.
///
/// A subtree taken out with [`Document::remove`](crate::Document::remove)
/// remembers the ids it had. Inserting it back into the same document
/// restores those ids; parsed fragments get fresh ones.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FragmentNode {
    pub kind: NodeKind,
    pub children: Vec<FragmentNode>,
    pub(crate) origin: Option<NodeId>,
}

impl FragmentNode {
    /// A text leaf.
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            kind: NodeKind::Text(text.into()),
            children: Vec::new(),
            origin: None,
        }
    }

    /// An element with the given children.
    pub fn element(element: Element, children: Vec<FragmentNode>) -> Self {
        Self {
            kind: NodeKind::Element(element),
            children,
            origin: None,
        }
    }

    /// The id this subtree had before it was removed.
    pub fn origin(&self) -> Option<NodeId> {
        self.origin
    }

    /// Asks for `id` when the fragment is inserted. Ignored when the id is
    /// in use or was never handed out by the document.
    pub fn with_origin(mut self, id: NodeId) -> Self {
        self.origin = Some(id);
        self
    }

    /// Drops remembered ids, so insertion allocates fresh ones.
    pub fn detached(mut self) -> Self {
        self.origin = None;
        self.children = self.children.into_iter().map(Self::detached).collect();
        self
    }

    /// Returns true if the subtree holds no text and no void elements.
    pub fn is_blank(&self) -> bool {
        match &self.kind {
            NodeKind::Text(t) => t.trim().is_empty(),
            NodeKind::Element(e) => !e.is_void() && self.children.iter().all(|c| c.is_blank()),
        }
    }
}
