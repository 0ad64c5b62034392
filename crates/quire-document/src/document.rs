//! The document tree.
//!
//! ## Why an explicit tree?
//!
//! Treating the rendered surface as the document means every undo step
//! has to reach into live rendering nodes. Owning the tree here lets
//! commands operate on plain data; the surface is re-rendered from it.
//!
//! ## Learning: Checked Lookups
//!
//! Every mutation takes ids and offsets that may have gone stale. Each
//! one is validated up front and reported as a [`DocumentError`] instead
//! of panicking, so a bad command can be dropped without damaging the tree.

use std::cmp::Ordering;
use std::collections::HashMap;

use unicode_segmentation::UnicodeSegmentation;

use crate::markup;
use crate::node::{Element, FragmentNode, Node, NodeId, NodeKind};
use crate::point::{Point, TextRange};
use crate::{DocumentError, DocumentResult};

/// An arena-backed document tree rooted at an implicit container element.
#[derive(Debug, Clone)]
pub struct Document {
    /// All attached nodes
    nodes: HashMap<NodeId, Node>,
    /// The container node (never serialized, never removed)
    root: NodeId,
    /// Next id to hand out
    next_id: u64,
}

impl Document {
    /// Creates an empty document.
    pub fn new() -> Self {
        let root = NodeId(0);
        let mut nodes = HashMap::new();
        nodes.insert(
            root,
            Node {
                id: root,
                parent: None,
                kind: NodeKind::Element(Element::new("body")),
                children: Vec::new(),
            },
        );
        Self {
            nodes,
            root,
            next_id: 1,
        }
    }

    /// Parses markup into a new document.
    pub fn from_markup(markup: &str) -> Self {
        let mut doc = Self::new();
        doc.replace_content(markup::parse_fragment(markup));
        doc
    }

    // ==================== Queries ====================

    /// The container node.
    pub fn root(&self) -> NodeId {
        self.root
    }

    /// Returns true if the container has no children.
    pub fn is_empty(&self) -> bool {
        self.nodes
            .get(&self.root)
            .map(|n| n.children.is_empty())
            .unwrap_or(true)
    }

    /// Returns true if the node is attached to this document.
    pub fn contains(&self, id: NodeId) -> bool {
        self.nodes.contains_key(&id)
    }

    /// Returns a node by id.
    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(&id)
    }

    /// Number of attached nodes, the root included.
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Boundary-point length of a node.
    pub fn len_of(&self, id: NodeId) -> Option<usize> {
        self.nodes.get(&id).map(Node::len)
    }

    /// Position of a node among its parent's children.
    pub fn index_in_parent(&self, id: NodeId) -> Option<usize> {
        let parent = self.nodes.get(&id)?.parent?;
        self.nodes
            .get(&parent)?
            .children
            .iter()
            .position(|c| *c == id)
    }

    /// Returns true if `point` names an attached node and an offset within it.
    pub fn is_valid_point(&self, point: Point) -> bool {
        self.len_of(point.node)
            .map(|len| point.offset <= len)
            .unwrap_or(false)
    }

    /// Child indices leading from the root to `id`.
    fn path(&self, id: NodeId) -> Option<Vec<usize>> {
        let mut path = Vec::new();
        let mut current = id;
        while current != self.root {
            path.push(self.index_in_parent(current)?);
            current = self.nodes.get(&current)?.parent?;
        }
        path.reverse();
        Some(path)
    }

    /// Compares two points in document order.
    ///
    /// Returns `None` if either point is detached.
    pub fn compare_points(&self, a: Point, b: Point) -> Option<Ordering> {
        let mut key_a = self.path(a.node)?;
        key_a.push(a.offset);
        let mut key_b = self.path(b.node)?;
        key_b.push(b.offset);
        Some(key_a.cmp(&key_b))
    }

    /// Returns `(start, end)` of a range in document order.
    pub fn ordered(&self, range: &TextRange) -> Option<(Point, Point)> {
        match self.compare_points(range.anchor, range.focus)? {
            Ordering::Greater => Some((range.focus, range.anchor)),
            _ => Some((range.anchor, range.focus)),
        }
    }

    /// Deepest node containing both `a` and `b` (inclusive).
    pub fn common_ancestor(&self, a: NodeId, b: NodeId) -> Option<NodeId> {
        let mut ancestors = Vec::new();
        let mut current = Some(a);
        while let Some(id) = current {
            ancestors.push(id);
            current = self.nodes.get(&id)?.parent;
        }

        let mut current = Some(b);
        while let Some(id) = current {
            if ancestors.contains(&id) {
                return Some(id);
            }
            current = self.nodes.get(&id)?.parent;
        }
        None
    }

    /// Plain text, with a line break after each block element.
    pub fn text_content(&self) -> String {
        let mut out = String::new();
        self.collect_text(self.root, &mut out);
        out
    }

    fn collect_text(&self, id: NodeId, out: &mut String) {
        let Some(node) = self.nodes.get(&id) else {
            return;
        };
        match &node.kind {
            NodeKind::Text(t) => out.push_str(t),
            NodeKind::Element(el) => {
                if el.tag == "br" {
                    out.push('\n');
                    return;
                }
                for child in &node.children {
                    self.collect_text(*child, out);
                }
                if el.is_block() && id != self.root && !out.ends_with('\n') {
                    out.push('\n');
                }
            }
        }
    }

    /// Number of words in the text content (Unicode word boundaries).
    pub fn word_count(&self) -> usize {
        self.text_content().unicode_words().count()
    }

    /// Serializes the container's children.
    pub fn to_markup(&self) -> String {
        markup::serialize_children(self, self.root)
    }

    /// Copies a subtree out as a detached fragment.
    pub fn fragment_of(&self, id: NodeId) -> Option<FragmentNode> {
        let node = self.nodes.get(&id)?;
        let children = node
            .children
            .iter()
            .filter_map(|c| self.fragment_of(*c))
            .collect();
        Some(FragmentNode {
            kind: node.kind.clone(),
            children,
            origin: None,
        })
    }

    // ==================== Mutations ====================

    /// Creates a text node under `parent` at child `index`.
    pub fn create_text(&mut self, parent: NodeId, index: usize, text: &str) -> DocumentResult<NodeId> {
        let ids = self.insert_fragment(parent, index, &[FragmentNode::text(text)])?;
        Ok(ids[0])
    }

    /// Inserts detached nodes under `parent` starting at child `index`.
    ///
    /// Returns the ids of the new top-level nodes.
    pub fn insert_fragment(
        &mut self,
        parent: NodeId,
        index: usize,
        nodes: &[FragmentNode],
    ) -> DocumentResult<Vec<NodeId>> {
        let parent_node = self.node_ref(parent)?;
        if parent_node.as_element().is_none() {
            return Err(DocumentError::NotElement(parent));
        }
        let len = parent_node.children.len();
        if index > len {
            return Err(DocumentError::OffsetOutOfBounds {
                node: parent,
                offset: index,
                len,
            });
        }

        let ids: Vec<NodeId> = nodes.iter().map(|n| self.build(parent, n)).collect();
        if let Some(node) = self.nodes.get_mut(&parent) {
            node.children.splice(index..index, ids.iter().copied());
        }
        Ok(ids)
    }

    /// Inserts text into a text node.
    pub fn insert_text(&mut self, at: Point, text: &str) -> DocumentResult<()> {
        let current = self.text_of(at.node)?;
        let byte = byte_index(current, at.offset).ok_or(DocumentError::OffsetOutOfBounds {
            node: at.node,
            offset: at.offset,
            len: current.chars().count(),
        })?;
        if let Some(NodeKind::Text(t)) = self.nodes.get_mut(&at.node).map(|n| &mut n.kind) {
            t.insert_str(byte, text);
        }
        Ok(())
    }

    /// Deletes `count` characters from a text node, returning them.
    pub fn delete_text(&mut self, at: Point, count: usize) -> DocumentResult<String> {
        let current = self.text_of(at.node)?;
        let len = current.chars().count();
        let end = at.offset.checked_add(count).filter(|end| *end <= len);
        let (Some(start), Some(end)) = (byte_index(current, at.offset), end.and_then(|e| byte_index(current, e))) else {
            return Err(DocumentError::OffsetOutOfBounds {
                node: at.node,
                offset: at.offset.saturating_add(count),
                len,
            });
        };
        let mut removed = String::new();
        if let Some(NodeKind::Text(t)) = self.nodes.get_mut(&at.node).map(|n| &mut n.kind) {
            removed = t.drain(start..end).collect();
        }
        Ok(removed)
    }

    /// Splits a text node at `at`; the tail moves into a new sibling.
    ///
    /// Returns the id of the new (right-hand) node.
    pub fn split_text(&mut self, at: Point) -> DocumentResult<NodeId> {
        self.split_text_as(at, None)
    }

    /// Like [`split_text`](Self::split_text), giving the tail `reuse` when
    /// that id is free. Redoing a split this way keeps later edits that
    /// point into the tail valid.
    pub fn split_text_as(&mut self, at: Point, reuse: Option<NodeId>) -> DocumentResult<NodeId> {
        let len = self.text_of(at.node)?.chars().count();
        let parent = self
            .node_ref(at.node)?
            .parent
            .ok_or(DocumentError::RootImmutable)?;
        let index = self
            .index_in_parent(at.node)
            .ok_or(DocumentError::UnknownNode(at.node))?;
        let tail = self.delete_text(at, len.saturating_sub(at.offset))?;
        let mut fragment = FragmentNode::text(tail);
        if let Some(id) = reuse {
            fragment = fragment.with_origin(id);
        }
        let ids = self.insert_fragment(parent, index + 1, &[fragment])?;
        Ok(ids[0])
    }

    /// Appends the text of `right` to `left` and removes `right`.
    pub fn merge_text(&mut self, left: NodeId, right: NodeId) -> DocumentResult<()> {
        let tail = self.text_of(right)?.to_string();
        let end = self.text_of(left)?.chars().count();
        self.insert_text(Point::new(left, end), &tail)?;
        self.remove(right)?;
        Ok(())
    }

    /// Detaches a node and its subtree, returning it as a fragment that
    /// remembers its ids.
    pub fn remove(&mut self, id: NodeId) -> DocumentResult<FragmentNode> {
        if id == self.root {
            return Err(DocumentError::RootImmutable);
        }
        let parent = self.node_ref(id)?.parent;
        if let Some(parent) = parent.and_then(|p| self.nodes.get_mut(&p)) {
            parent.children.retain(|c| *c != id);
        }
        self.take(id).ok_or(DocumentError::UnknownNode(id))
    }

    /// Replaces the whole content. Old ids become detached.
    pub fn replace_content(&mut self, nodes: Vec<FragmentNode>) -> Vec<NodeId> {
        let old = self
            .nodes
            .get(&self.root)
            .map(|n| n.children.clone())
            .unwrap_or_default();
        for id in old {
            let _ = self.remove(id);
        }
        let root = self.root;
        self.insert_fragment(root, 0, &nodes).unwrap_or_default()
    }

    /// Brings the content in line with `nodes` while keeping the ids of
    /// nodes that still line up.
    ///
    /// Children are matched from both ends: a text node matches a text node
    /// and an element matches an element with the same tag. Matched nodes
    /// are updated in place; the unmatched middle is replaced. Returns true
    /// if anything changed.
    pub fn reconcile(&mut self, nodes: &[FragmentNode]) -> bool {
        let root = self.root;
        let before = self.to_markup();
        self.reconcile_children(root, nodes);
        self.to_markup() != before
    }

    fn reconcile_children(&mut self, parent: NodeId, new: &[FragmentNode]) {
        let old = self
            .nodes
            .get(&parent)
            .map(|n| n.children.clone())
            .unwrap_or_default();

        let prefix = old
            .iter()
            .zip(new)
            .take_while(|(id, fragment)| self.same_shape(**id, fragment))
            .count();
        let suffix = old[prefix..]
            .iter()
            .rev()
            .zip(new[prefix..].iter().rev())
            .take_while(|(id, fragment)| self.same_shape(**id, fragment))
            .count();

        let kept_old = old[..prefix].iter().chain(&old[old.len() - suffix..]);
        let kept_new = new[..prefix].iter().chain(&new[new.len() - suffix..]);
        for (id, fragment) in kept_old.zip(kept_new) {
            self.update_in_place(*id, fragment);
        }

        for id in &old[prefix..old.len() - suffix] {
            let _ = self.remove(*id);
        }
        let middle: Vec<FragmentNode> = new[prefix..new.len() - suffix]
            .iter()
            .cloned()
            .map(FragmentNode::detached)
            .collect();
        if !middle.is_empty() {
            let _ = self.insert_fragment(parent, prefix, &middle);
        }
    }

    fn same_shape(&self, id: NodeId, fragment: &FragmentNode) -> bool {
        match (self.nodes.get(&id).map(|n| &n.kind), &fragment.kind) {
            (Some(NodeKind::Text(_)), NodeKind::Text(_)) => true,
            (Some(NodeKind::Element(a)), NodeKind::Element(b)) => a.tag == b.tag,
            _ => false,
        }
    }

    fn update_in_place(&mut self, id: NodeId, fragment: &FragmentNode) {
        let Some(node) = self.nodes.get_mut(&id) else {
            return;
        };
        match (&mut node.kind, &fragment.kind) {
            (NodeKind::Text(current), NodeKind::Text(text)) => {
                if current != text {
                    current.clone_from(text);
                }
            }
            (NodeKind::Element(current), NodeKind::Element(element)) => {
                if current.attrs != element.attrs {
                    current.attrs.clone_from(&element.attrs);
                }
                self.reconcile_children(id, &fragment.children);
            }
            _ => {}
        }
    }

    // ==================== Internals ====================

    fn node_ref(&self, id: NodeId) -> DocumentResult<&Node> {
        self.nodes.get(&id).ok_or(DocumentError::UnknownNode(id))
    }

    fn text_of(&self, id: NodeId) -> DocumentResult<&str> {
        self.node_ref(id)?
            .as_text()
            .ok_or(DocumentError::NotText(id))
    }

    fn alloc(&mut self) -> NodeId {
        let id = NodeId(self.next_id);
        self.next_id += 1;
        id
    }

    /// Allocates a fragment recursively; does not link it into `parent`.
    ///
    /// A remembered id is reused when it is free and was handed out by this
    /// document before.
    fn build(&mut self, parent: NodeId, fragment: &FragmentNode) -> NodeId {
        let id = match fragment.origin {
            Some(id) if id != self.root && id.0 < self.next_id && !self.nodes.contains_key(&id) => id,
            _ => self.alloc(),
        };
        let children = fragment
            .children
            .iter()
            .map(|child| self.build(id, child))
            .collect();
        self.nodes.insert(
            id,
            Node {
                id,
                parent: Some(parent),
                kind: fragment.kind.clone(),
                children,
            },
        );
        id
    }

    /// Removes a subtree from the arena.
    fn take(&mut self, id: NodeId) -> Option<FragmentNode> {
        let node = self.nodes.remove(&id)?;
        let children = node
            .children
            .iter()
            .filter_map(|c| self.take(*c))
            .collect();
        Some(FragmentNode {
            kind: node.kind,
            children,
            origin: Some(id),
        })
    }
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

/// Byte index of the `offset`-th character (or the end of the string).
fn byte_index(text: &str, offset: usize) -> Option<usize> {
    text.char_indices()
        .map(|(i, _)| i)
        .chain(std::iter::once(text.len()))
        .nth(offset)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn first_text(doc: &Document, parent: NodeId) -> NodeId {
        doc.node(parent).unwrap().children()[0]
    }

    #[test]
    fn test_unicode_offsets() {
        let mut doc = Document::from_markup("héllo");
        let text = first_text(&doc, doc.root());
        doc.insert_text(Point::new(text, 2), "–").unwrap();
        assert_eq!(doc.to_markup(), "hé–llo");
        assert_eq!(doc.delete_text(Point::new(text, 1), 2).unwrap(), "é–");
    }

    #[test]
    fn test_out_of_bounds_is_error() {
        let mut doc = Document::from_markup("abc");
        let text = first_text(&doc, doc.root());
        assert!(matches!(
            doc.insert_text(Point::new(text, 4), "x"),
            Err(DocumentError::OffsetOutOfBounds { len: 3, .. })
        ));
        assert!(doc.delete_text(Point::new(text, 2), 5).is_err());
        assert_eq!(doc.to_markup(), "abc");
    }

    #[test]
    fn test_remove_detaches_subtree() {
        let mut doc = Document::from_markup("<p>one</p><p>two</p>");
        let first = doc.node(doc.root()).unwrap().children()[0];
        let inner = first_text(&doc, first);

        let fragment = doc.remove(first).unwrap();
        assert!(!doc.contains(first));
        assert!(!doc.contains(inner));
        assert_eq!(doc.to_markup(), "<p>two</p>");

        let root = doc.root();
        doc.insert_fragment(root, 0, &[fragment]).unwrap();
        assert_eq!(doc.to_markup(), "<p>one</p><p>two</p>");
        // Reinserted nodes get fresh ids
        assert!(!doc.contains(first));
    }

    #[test]
    fn test_root_is_immutable() {
        let mut doc = Document::new();
        let root = doc.root();
        assert_eq!(doc.remove(root), Err(DocumentError::RootImmutable));
    }

    #[test]
    fn test_split_and_merge() {
        let mut doc = Document::from_markup("<p>HelloWorld</p>");
        let p = doc.node(doc.root()).unwrap().children()[0];
        let text = first_text(&doc, p);

        let right = doc.split_text(Point::new(text, 5)).unwrap();
        assert_eq!(doc.node(p).unwrap().children().len(), 2);
        assert_eq!(doc.node(right).unwrap().as_text(), Some("World"));

        doc.merge_text(text, right).unwrap();
        assert_eq!(doc.to_markup(), "<p>HelloWorld</p>");
        assert!(!doc.contains(right));
    }

    #[test]
    fn test_compare_points() {
        let doc = Document::from_markup("<p>ab</p><p>cd</p>");
        let root = doc.root();
        let p1 = doc.node(root).unwrap().children()[0];
        let p2 = doc.node(root).unwrap().children()[1];
        let t1 = first_text(&doc, p1);
        let t2 = first_text(&doc, p2);

        assert_eq!(
            doc.compare_points(Point::new(t1, 2), Point::new(t2, 0)),
            Some(Ordering::Less)
        );
        assert_eq!(
            doc.compare_points(Point::new(root, 1), Point::new(t1, 1)),
            Some(Ordering::Greater)
        );
        assert_eq!(
            doc.compare_points(Point::new(p1, 0), Point::new(t1, 0)),
            Some(Ordering::Less)
        );

        let backwards = TextRange::new(Point::new(t2, 1), Point::new(t1, 0));
        assert_eq!(
            doc.ordered(&backwards),
            Some((Point::new(t1, 0), Point::new(t2, 1)))
        );
    }

    #[test]
    fn test_common_ancestor() {
        let doc = Document::from_markup("<div><p>a</p><p>b</p></div>");
        let div = doc.node(doc.root()).unwrap().children()[0];
        let p1 = doc.node(div).unwrap().children()[0];
        let p2 = doc.node(div).unwrap().children()[1];
        assert_eq!(
            doc.common_ancestor(first_text(&doc, p1), first_text(&doc, p2)),
            Some(div)
        );
        assert_eq!(doc.common_ancestor(p1, p1), Some(p1));
        assert_eq!(doc.common_ancestor(p1, NodeId(999)), None);
    }

    #[test]
    fn test_text_content_and_words() {
        let doc = Document::from_markup("<h1>Title</h1><p>two words<br>three more words</p>");
        assert_eq!(doc.text_content(), "Title\ntwo words\nthree more words\n");
        assert_eq!(doc.word_count(), 6);
    }

    #[test]
    fn test_replace_content_detaches_old_ids() {
        let mut doc = Document::from_markup("<p>old</p>");
        let old = doc.node(doc.root()).unwrap().children()[0];
        doc.replace_content(crate::markup::parse_fragment("<p>new</p>"));
        assert!(!doc.contains(old));
        assert_eq!(doc.to_markup(), "<p>new</p>");
    }

    #[test]
    fn test_removed_subtree_comes_back_with_its_ids() {
        let mut doc = Document::from_markup("<p>one</p><p><b>two</b></p>");
        let second = doc.node(doc.root()).unwrap().children()[1];
        let bold = first_text(&doc, second);
        let inner = first_text(&doc, bold);

        let fragment = doc.remove(second).unwrap();
        assert_eq!(fragment.origin(), Some(second));
        let root = doc.root();
        let ids = doc.insert_fragment(root, 1, &[fragment]).unwrap();
        assert_eq!(ids, vec![second]);
        assert_eq!(first_text(&doc, first_text(&doc, second)), inner);
        assert_eq!(doc.to_markup(), "<p>one</p><p><b>two</b></p>");

        // A copy never steals ids that are in use
        let copy = doc.fragment_of(second).unwrap();
        let ids = doc.insert_fragment(root, 0, &[copy]).unwrap();
        assert_ne!(ids[0], second);
    }

    #[test]
    fn test_split_can_reuse_tail_id() {
        let mut doc = Document::from_markup("<p>HelloWorld</p>");
        let p = first_text(&doc, doc.root());
        let text = first_text(&doc, p);
        let tail = doc.split_text(Point::new(text, 5)).unwrap();
        doc.merge_text(text, tail).unwrap();
        assert!(!doc.contains(tail));

        let again = doc.split_text_as(Point::new(text, 5), Some(tail)).unwrap();
        assert_eq!(again, tail);
        assert_eq!(doc.node(tail).unwrap().as_text(), Some("World"));
    }

    #[test]
    fn test_reconcile_keeps_matching_ids() {
        let mut doc = Document::from_markup("<h1>Title</h1><p>typ</p><p>last</p>");
        let root = doc.root();
        let [h1, p, last] = doc.node(root).unwrap().children().to_vec()[..] else {
            panic!("expected three blocks");
        };
        let typed = first_text(&doc, p);

        let changed = doc.reconcile(&crate::markup::parse_fragment(
            "<h1>Title</h1><p>typed</p><ul><li>new</li></ul><p>last</p>",
        ));
        assert!(changed);
        assert_eq!(
            doc.to_markup(),
            "<h1>Title</h1><p>typed</p><ul><li>new</li></ul><p>last</p>"
        );
        let children = doc.node(root).unwrap().children().to_vec();
        assert_eq!(children[0], h1);
        assert_eq!(children[1], p);
        assert_eq!(children[3], last);
        assert_eq!(first_text(&doc, p), typed);
        assert_eq!(doc.node(typed).unwrap().as_text(), Some("typed"));

        assert!(!doc.reconcile(&crate::markup::parse_fragment(
            "<h1>Title</h1><p>typed</p><ul><li>new</li></ul><p>last</p>"
        )));
    }

    #[test]
    fn test_reconcile_replaces_changed_tags() {
        let mut doc = Document::from_markup("<p>a</p><p>b</p>");
        let root = doc.root();
        let old_second = doc.node(root).unwrap().children()[1];
        doc.reconcile(&crate::markup::parse_fragment("<p>a</p><h2>b</h2>"));
        assert_eq!(doc.to_markup(), "<p>a</p><h2>b</h2>");
        assert!(!doc.contains(old_second));
    }

    mod props {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn insert_then_delete_restores_text(
                base in "[a-zé ]{0,24}",
                inserted in "[a-z–]{1,8}",
                at in 0usize..25,
            ) {
                let mut doc = Document::from_markup(&format!("<p>x{base}</p>"));
                let p = doc.node(doc.root()).unwrap().children()[0];
                let text = first_text(&doc, p);
                let before = doc.to_markup();
                let offset = at.min(base.chars().count() + 1);

                doc.insert_text(Point::new(text, offset), &inserted).unwrap();
                let removed = doc
                    .delete_text(Point::new(text, offset), inserted.chars().count())
                    .unwrap();
                prop_assert_eq!(removed, inserted);
                prop_assert_eq!(doc.to_markup(), before);
            }
        }
    }
}
