//! Built-in document commands used by `insertText` and `insertHTML`.
//!
//! Both commands target an optional range. A collapsed range (or no range
//! at all) inserts at a point; a range inside one text node is replaced.
//! A range spanning several nodes collapses to its start: deleting across
//! structure is left to the platform.
//!
//! Undo keeps the nodes it takes out, and redo puts those same nodes back.
//! Later commands that point into them stay valid across undo and redo.

use std::cell::Cell;
use std::rc::Rc;

use anyhow::{bail, Context};
use quire_document::{Document, FragmentNode, NodeId, Point, TextRange};

use crate::command::Command;

/// Where a command reports the caret position after it applies.
pub type CaretSlot = Rc<Cell<Option<Point>>>;

/// Where an insertion lands, after resolving the target.
#[derive(Debug, Clone, Copy)]
enum Site {
    /// Inside a text node, optionally replacing `len` characters
    Text { at: Point, replace: usize },
    /// Among an element's children
    Children { parent: NodeId, index: usize },
}

/// Resolves a target range into an insertion site.
fn resolve(doc: &Document, target: Option<TextRange>) -> anyhow::Result<Site> {
    let Some(range) = target else {
        return Ok(end_of_document(doc));
    };

    let (start, end) = doc
        .ordered(&range)
        .context("target range is not in the document")?;
    let node = doc
        .node(start.node)
        .context("target node is not in the document")?;

    if node.as_text().is_some() {
        let replace = if start.node == end.node {
            end.offset - start.offset
        } else {
            0
        };
        return Ok(Site::Text { at: start, replace });
    }

    let is_void = node.as_element().map(|e| e.is_void()).unwrap_or(false);
    if is_void {
        // Nothing goes inside <br> or <hr>; insert after it instead
        let parent = node.parent().context("void element without parent")?;
        let index = doc
            .index_in_parent(start.node)
            .context("void element is detached")?;
        return Ok(Site::Children {
            parent,
            index: index + 1,
        });
    }

    Ok(Site::Children {
        parent: start.node,
        index: start.offset,
    })
}

/// The end of the document: inside a trailing text node when there is one.
fn end_of_document(doc: &Document) -> Site {
    let root = doc.root();
    let last = doc.node(root).and_then(|n| n.children().last().copied());
    if let Some(text) = last.and_then(|id| doc.node(id)).filter(|n| n.as_text().is_some()) {
        return Site::Text {
            at: Point::new(text.id(), text.len()),
            replace: 0,
        };
    }
    Site::Children {
        parent: root,
        index: doc.len_of(root).unwrap_or(0),
    }
}

// ==================== InsertText ====================

#[derive(Debug)]
enum TextUndo {
    /// Text went into an existing node
    InNode {
        at: Point,
        inserted: usize,
        removed: String,
    },
    /// A new text node was created
    NewNode(NodeId),
}

/// Inserts plain text, replacing a single-node selection.
#[derive(Debug)]
pub struct InsertText {
    target: Option<TextRange>,
    text: String,
    caret: Option<CaretSlot>,
    undo: Option<TextUndo>,
    /// Node taken out by the last undo, put back on redo
    removed: Option<FragmentNode>,
}

impl InsertText {
    pub fn new(target: Option<TextRange>, text: impl Into<String>) -> Self {
        Self {
            target,
            text: text.into(),
            caret: None,
            undo: None,
            removed: None,
        }
    }

    /// Reports the caret (just after the inserted text) into `slot`.
    pub fn with_caret(mut self, slot: CaretSlot) -> Self {
        self.caret = Some(slot);
        self
    }

    fn report(&self, point: Point) {
        if let Some(slot) = &self.caret {
            slot.set(Some(point));
        }
    }
}

impl Command for InsertText {
    fn label(&self) -> &str {
        "insertText"
    }

    fn execute(&mut self, doc: &mut Document) -> anyhow::Result<()> {
        if self.text.is_empty() {
            bail!("nothing to insert");
        }
        let inserted = self.text.chars().count();

        match resolve(doc, self.target)? {
            Site::Text { at, replace } => {
                let removed = doc.delete_text(at, replace)?;
                doc.insert_text(at, &self.text)?;
                self.report(Point::new(at.node, at.offset + inserted));
                self.undo = Some(TextUndo::InNode {
                    at,
                    inserted,
                    removed,
                });
            }
            Site::Children { parent, index } => {
                let id = match self.removed.take() {
                    Some(node) => doc
                        .insert_fragment(parent, index, &[node])?
                        .first()
                        .copied()
                        .context("text node not restored")?,
                    None => doc.create_text(parent, index, &self.text)?,
                };
                self.report(Point::new(id, inserted));
                self.undo = Some(TextUndo::NewNode(id));
            }
        }
        Ok(())
    }

    fn undo(&mut self, doc: &mut Document) -> anyhow::Result<()> {
        match self.undo.take().context("insertText was never applied")? {
            TextUndo::InNode {
                at,
                inserted,
                removed,
            } => {
                doc.delete_text(at, inserted)?;
                doc.insert_text(at, &removed)?;
            }
            TextUndo::NewNode(id) => {
                self.removed = Some(doc.remove(id)?);
            }
        }
        Ok(())
    }
}

// ==================== InsertMarkup ====================

#[derive(Debug)]
struct MarkupUndo {
    inserted: Vec<NodeId>,
    /// Text node split to make room: (left, right)
    split: Option<(NodeId, NodeId)>,
    /// Selected text replaced by the insertion
    replaced: Option<(Point, String)>,
}

/// Inserts parsed markup, replacing a single-node selection.
#[derive(Debug)]
pub struct InsertMarkup {
    target: Option<TextRange>,
    /// Parsed markup at first; after an undo, the removed nodes
    nodes: Vec<FragmentNode>,
    caret: Option<CaretSlot>,
    undo: Option<MarkupUndo>,
    /// Id of the split-off tail from the first execute
    split_tail: Option<NodeId>,
}

impl InsertMarkup {
    pub fn new(target: Option<TextRange>, nodes: Vec<FragmentNode>) -> Self {
        Self {
            target,
            nodes,
            caret: None,
            undo: None,
            split_tail: None,
        }
    }

    /// Reports the caret (just after the last inserted node) into `slot`.
    pub fn with_caret(mut self, slot: CaretSlot) -> Self {
        self.caret = Some(slot);
        self
    }
}

impl Command for InsertMarkup {
    fn label(&self) -> &str {
        "insertHTML"
    }

    fn execute(&mut self, doc: &mut Document) -> anyhow::Result<()> {
        if self.nodes.is_empty() {
            bail!("nothing to insert");
        }

        let mut split = None;
        let mut replaced = None;
        let (parent, index) = match resolve(doc, self.target)? {
            Site::Children { parent, index } => (parent, index),
            Site::Text { at, replace } => {
                if replace > 0 {
                    replaced = Some((at, doc.delete_text(at, replace)?));
                }
                let parent = doc
                    .node(at.node)
                    .and_then(|n| n.parent())
                    .context("text node without parent")?;
                let position = doc
                    .index_in_parent(at.node)
                    .context("text node is detached")?;
                let len = doc.len_of(at.node).unwrap_or(0);

                if at.offset == 0 {
                    (parent, position)
                } else if at.offset >= len {
                    (parent, position + 1)
                } else {
                    let right = doc.split_text_as(at, self.split_tail)?;
                    self.split_tail = Some(right);
                    split = Some((at.node, right));
                    (parent, position + 1)
                }
            }
        };

        let inserted = doc.insert_fragment(parent, index, &self.nodes)?;
        if let Some(slot) = &self.caret {
            slot.set(Some(Point::new(parent, index + inserted.len())));
        }
        self.undo = Some(MarkupUndo {
            inserted,
            split,
            replaced,
        });
        Ok(())
    }

    fn undo(&mut self, doc: &mut Document) -> anyhow::Result<()> {
        let undo = self.undo.take().context("insertHTML was never applied")?;
        let removed = undo
            .inserted
            .iter()
            .map(|id| doc.remove(*id))
            .collect::<Result<Vec<_>, _>>()?;
        self.nodes = removed;
        if let Some((left, right)) = undo.split {
            doc.merge_text(left, right)?;
        }
        if let Some((at, text)) = undo.replaced {
            doc.insert_text(at, &text)?;
        }
        Ok(())
    }
}
