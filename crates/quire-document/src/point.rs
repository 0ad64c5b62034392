//! Boundary points and directed ranges.
//!
//! ## Learning: Anchor and Focus
//!
//! A user can drag a selection backwards. Keeping `anchor` (where the drag
//! started) separate from `focus` (where the caret is) preserves that
//! direction; ordering the two needs the document, see
//! [`Document::compare_points`](crate::Document::compare_points).

use serde::{Deserialize, Serialize};

use crate::NodeId;

/// A boundary point: a node plus an offset inside it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Point {
    /// Container node
    pub node: NodeId,
    /// Characters into a text node, or children into an element
    pub offset: usize,
}

impl Point {
    /// Creates a new point.
    pub fn new(node: NodeId, offset: usize) -> Self {
        Self { node, offset }
    }
}

impl std::fmt::Display for Point {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}@{}", self.node, self.offset)
    }
}

/// A range between two points, with direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TextRange {
    /// Where the selection started
    pub anchor: Point,
    /// Where the caret is
    pub focus: Point,
}

impl TextRange {
    /// Creates a new directed range.
    pub fn new(anchor: Point, focus: Point) -> Self {
        Self { anchor, focus }
    }

    /// Creates a zero-width range (caret).
    pub fn caret(point: Point) -> Self {
        Self {
            anchor: point,
            focus: point,
        }
    }

    /// Returns true if this is a zero-width range.
    pub fn is_collapsed(&self) -> bool {
        self.anchor == self.focus
    }

    /// Returns true if both ends sit in the same container node.
    pub fn is_single_node(&self) -> bool {
        self.anchor.node == self.focus.node
    }

    /// Collapses the range onto its focus.
    pub fn collapse_to_focus(&self) -> Self {
        Self::caret(self.focus)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_caret_is_collapsed() {
        let p = Point::new(NodeId(3), 2);
        assert!(TextRange::caret(p).is_collapsed());
        assert!(!TextRange::new(p, Point::new(NodeId(3), 4)).is_collapsed());
    }

    #[test]
    fn test_collapse_to_focus() {
        let range = TextRange::new(Point::new(NodeId(1), 5), Point::new(NodeId(1), 0));
        let caret = range.collapse_to_focus();
        assert_eq!(caret.anchor, Point::new(NodeId(1), 0));
        assert!(caret.is_single_node());
    }
}
