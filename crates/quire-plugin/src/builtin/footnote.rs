//! Numbered footnotes.
//!
//! A footnote is a `<sup>` reference in the text plus a list item in a
//! footnotes container at the end of the document. References are numbered
//! by document order, so inserting one before an existing reference
//! renumbers everything after it.
//!
//! Undo keeps the removed reference, note and container, and redo puts
//! them back with the same node ids.

use anyhow::Context;
use quire_core::edits::CaretSlot;
use quire_core::{Command, Editor, InsertMarkup, Plugin, PluginSource, StackOutcome, WeakEditor};
use quire_document::markup::{escape_attr, escape_text, parse_fragment};
use quire_document::{Document, FragmentNode, NodeId, Point, TextRange};

use crate::{upgrade, BuiltinError};

pub const NAME: &str = "footnote";

const REF_CLASS: &str = "quire-fn-ref";
const CONTAINER_CLASS: &str = "quire-fn-container";
const LIST_CLASS: &str = "quire-fn-list";

// ==================== Tree helpers ====================

fn has_class(doc: &Document, id: NodeId, class: &str) -> bool {
    doc.node(id)
        .and_then(|n| n.as_element())
        .and_then(|el| el.attr("class"))
        .is_some_and(|classes| classes.split_whitespace().any(|c| c == class))
}

/// Node ids under `root` in document order, `root` excluded.
fn descendants(doc: &Document, root: NodeId) -> Vec<NodeId> {
    let mut out = Vec::new();
    let mut stack: Vec<NodeId> = doc
        .node(root)
        .map(|n| n.children().iter().rev().copied().collect())
        .unwrap_or_default();
    while let Some(id) = stack.pop() {
        out.push(id);
        if let Some(node) = doc.node(id) {
            stack.extend(node.children().iter().rev().copied());
        }
    }
    out
}

fn find_by_class(doc: &Document, class: &str) -> Option<NodeId> {
    descendants(doc, doc.root())
        .into_iter()
        .find(|id| has_class(doc, *id, class))
}

/// Footnote references in document order.
fn references(doc: &Document) -> Vec<NodeId> {
    descendants(doc, doc.root())
        .into_iter()
        .filter(|id| has_class(doc, *id, REF_CLASS))
        .collect()
}

/// Replaces an element's content with a single text run.
fn set_text(doc: &mut Document, element: NodeId, text: &str) -> anyhow::Result<()> {
    let children = doc
        .node(element)
        .map(|n| n.children().to_vec())
        .context("footnote reference vanished")?;
    if let [only] = children.as_slice() {
        if let Some(current) = doc.node(*only).and_then(|n| n.as_text()) {
            if current == text {
                return Ok(());
            }
            let len = current.chars().count();
            doc.delete_text(Point::new(*only, 0), len)?;
            doc.insert_text(Point::new(*only, 0), text)?;
            return Ok(());
        }
    }
    for child in children {
        doc.remove(child)?;
    }
    doc.create_text(element, 0, text)?;
    Ok(())
}

/// Numbers every reference 1..n in document order.
fn renumber(doc: &mut Document) -> anyhow::Result<()> {
    for (index, id) in references(doc).into_iter().enumerate() {
        set_text(doc, id, &(index + 1).to_string())?;
    }
    Ok(())
}

// ==================== AddFootnote ====================

#[derive(Debug)]
struct Applied {
    note: NodeId,
    container: Option<NodeId>,
}

/// What the last undo took out of the document.
#[derive(Debug)]
struct Removed {
    note: FragmentNode,
    container: Option<FragmentNode>,
}

/// Inserts a reference at the target and its note in the container.
#[derive(Debug)]
pub struct AddFootnote {
    id: String,
    text: String,
    target: Option<TextRange>,
    caret: CaretSlot,
    reference: Option<InsertMarkup>,
    applied: Option<Applied>,
    removed: Option<Removed>,
}

impl AddFootnote {
    pub fn new(id: impl Into<String>, text: impl Into<String>, target: Option<TextRange>) -> Self {
        Self {
            id: id.into(),
            text: text.into(),
            target,
            caret: CaretSlot::default(),
            reference: None,
            applied: None,
            removed: None,
        }
    }

    /// Where the caret goes once the command has run.
    pub fn caret(&self) -> CaretSlot {
        CaretSlot::clone(&self.caret)
    }

    fn reference_markup(&self, number: usize) -> String {
        let id = escape_attr(&self.id);
        format!("<sup class=\"{REF_CLASS}\" data-id=\"{id}\" id=\"fn-ref-{id}\">{number}</sup>")
    }

    fn note_markup(&self) -> String {
        let id = escape_attr(&self.id);
        format!(
            "<li class=\"quire-fn-item\" id=\"fn-note-{id}\"><span class=\"quire-fn-text\">{}</span><span class=\"quire-fn-back\" data-id=\"{id}\">↩</span></li>",
            escape_text(&self.text)
        )
    }
}

const CONTAINER_MARKUP: &str = "<div class=\"quire-fn-container\"><div class=\"quire-fn-title\">Footnotes</div><ol class=\"quire-fn-list\"></ol></div>";

impl Command for AddFootnote {
    fn label(&self) -> &str {
        "insertFootnote"
    }

    fn execute(&mut self, doc: &mut Document) -> anyhow::Result<()> {
        if let Some(removed) = self.removed.take() {
            return self.restore(doc, removed);
        }
        let existing = find_by_class(doc, CONTAINER_CLASS);

        // Without a target the reference goes to the end of the text, which
        // is just before the container when there is one
        let target = match (self.target, existing) {
            (None, Some(container)) => {
                let index = doc
                    .index_in_parent(container)
                    .context("footnote container is detached")?;
                let parent = doc
                    .node(container)
                    .and_then(|n| n.parent())
                    .context("footnote container has no parent")?;
                Some(TextRange::caret(Point::new(parent, index)))
            }
            (target, _) => target,
        };

        let number = references(doc).len() + 1;
        let mut reference = InsertMarkup::new(target, parse_fragment(&self.reference_markup(number)))
            .with_caret(CaretSlot::clone(&self.caret));
        reference.execute(doc)?;
        self.reference = Some(reference);

        let (container, created) = match existing {
            Some(container) => (container, None),
            None => {
                let root = doc.root();
                let end = doc.len_of(root).unwrap_or(0);
                let ids = doc.insert_fragment(root, end, &parse_fragment(CONTAINER_MARKUP))?;
                let container = ids.first().copied().context("footnote container not created")?;
                (container, Some(container))
            }
        };
        let list = descendants(doc, container)
            .into_iter()
            .find(|id| has_class(doc, *id, LIST_CLASS))
            .context("footnote container has no list")?;

        let end = doc.len_of(list).unwrap_or(0);
        let note = doc
            .insert_fragment(list, end, &parse_fragment(&self.note_markup()))?
            .first()
            .copied()
            .context("footnote note not created")?;

        self.applied = Some(Applied {
            note,
            container: created,
        });
        renumber(doc)
    }

    fn undo(&mut self, doc: &mut Document) -> anyhow::Result<()> {
        let applied = self.applied.take().context("footnote was never inserted")?;
        let note = doc.remove(applied.note)?;
        let container = applied
            .container
            .map(|container| doc.remove(container))
            .transpose()?;
        self.reference
            .as_mut()
            .context("footnote was never inserted")?
            .undo(doc)?;
        self.removed = Some(Removed { note, container });
        renumber(doc)
    }
}

impl AddFootnote {
    /// Redo: puts back exactly what the last undo removed.
    fn restore(&mut self, doc: &mut Document, removed: Removed) -> anyhow::Result<()> {
        self.reference
            .as_mut()
            .context("footnote was never inserted")?
            .execute(doc)?;

        let created = match removed.container {
            Some(container) => {
                let root = doc.root();
                let end = doc.len_of(root).unwrap_or(0);
                doc.insert_fragment(root, end, &[container])?.first().copied()
            }
            None => None,
        };
        let list = find_by_class(doc, LIST_CLASS).context("footnote container has no list")?;
        let end = doc.len_of(list).unwrap_or(0);
        let note = doc
            .insert_fragment(list, end, &[removed.note])?
            .first()
            .copied()
            .context("footnote note not restored")?;

        self.applied = Some(Applied {
            note,
            container: created,
        });
        renumber(doc)
    }
}

// ==================== Plugin ====================

/// A footnote as it appears in the document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FootnoteRef {
    pub id: String,
    pub number: String,
}

pub struct Footnote {
    editor: WeakEditor,
}

impl Footnote {
    pub fn new(editor: &Editor) -> Self {
        Self {
            editor: editor.downgrade(),
        }
    }

    pub fn source() -> PluginSource {
        PluginSource::factory(NAME, |editor, _| Ok(Footnote::new(editor)))
    }

    /// Inserts a footnote at the selection and returns its id, or `None`
    /// if the command did not apply.
    pub fn insert_footnote(&self, text: Option<&str>) -> Result<Option<String>, BuiltinError> {
        let editor = upgrade(&self.editor)?;
        let selection = editor.selection();
        selection.restore_selection();

        let id = uuid::Uuid::new_v4().simple().to_string()[..8].to_string();
        let command = AddFootnote::new(id.as_str(), text.unwrap_or_default(), selection.get_range());
        let caret = command.caret();

        if editor.execute(Box::new(command)) != StackOutcome::Applied {
            return Ok(None);
        }
        if let Some(point) = caret.get() {
            selection.set_caret(point);
        }
        selection.save_selection();
        Ok(Some(id))
    }

    /// References in document order with their displayed numbers.
    pub fn references(&self) -> Result<Vec<FootnoteRef>, BuiltinError> {
        let editor = upgrade(&self.editor)?;
        let doc = editor.surface().read();
        Ok(references(&doc)
            .into_iter()
            .filter_map(|id| {
                let node = doc.node(id)?;
                let id = node.as_element()?.attr("data-id")?.to_string();
                let number = node
                    .children()
                    .iter()
                    .filter_map(|c| doc.node(*c)?.as_text())
                    .collect();
                Some(FootnoteRef { id, number })
            })
            .collect())
    }
}

impl Plugin for Footnote {
    fn name(&self) -> Option<&str> {
        Some(NAME)
    }
}
