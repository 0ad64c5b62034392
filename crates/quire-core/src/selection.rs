//! Selection persistence.
//!
//! Clicking a toolbar button or opening a dialog moves focus away from the
//! editing surface and the platform forgets where the caret was. The store
//! snapshots the range while the user is still in the editor and puts it
//! back before a command runs.
//!
//! ## Learning: Validating Foreign Data
//!
//! The platform reports selections anywhere on the page. Only ranges whose
//! endpoints both live in our document are accepted; everything else reads
//! as "no range".

use std::cell::RefCell;

use quire_document::{Point, TextRange};
use serde::{Deserialize, Serialize};

use crate::surface::{EditableSurface, NativeSelection};

/// A range captured by [`SelectionStore::save_selection`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SavedSelection {
    pub range: TextRange,
}

/// Result of [`SelectionStore::restore_selection`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestoreOutcome {
    /// The saved range is the platform selection again
    Restored,
    /// Nothing was saved
    NothingSaved,
    /// A saved endpoint no longer exists; the platform was left alone
    Stale,
}

/// Captures and restores the platform selection.
pub struct SelectionStore {
    surface: EditableSurface,
    saved: RefCell<Option<SavedSelection>>,
}

impl SelectionStore {
    pub fn new(surface: EditableSurface) -> Self {
        Self {
            surface,
            saved: RefCell::new(None),
        }
    }

    /// The platform selection, unfiltered.
    pub fn get_selection(&self) -> NativeSelection {
        self.surface.with_platform(|p| p.selection())
    }

    /// The first platform range, if it lies inside the document.
    pub fn get_range(&self) -> Option<TextRange> {
        let range = self.get_selection().first()?;
        let doc = self.surface.read();
        let inside = doc.is_valid_point(range.anchor)
            && doc.is_valid_point(range.focus)
            && doc.common_ancestor(range.anchor.node, range.focus.node).is_some();
        inside.then_some(range)
    }

    /// Snapshots the current range. Ranges outside the editor are ignored
    /// and leave the previous snapshot in place.
    pub fn save_selection(&self) {
        match self.get_range() {
            Some(range) => *self.saved.borrow_mut() = Some(SavedSelection { range }),
            None => tracing::trace!("No in-editor range to save"),
        }
    }

    /// Re-applies the saved range to the platform.
    pub fn restore_selection(&self) -> RestoreOutcome {
        let Some(saved) = *self.saved.borrow() else {
            return RestoreOutcome::NothingSaved;
        };

        let clamped = {
            let doc = self.surface.read();
            let clamp = |p: Point| {
                doc.len_of(p.node)
                    .map(|len| Point::new(p.node, p.offset.min(len)))
            };
            match (clamp(saved.range.anchor), clamp(saved.range.focus)) {
                (Some(anchor), Some(focus)) => Some(TextRange::new(anchor, focus)),
                _ => None,
            }
        };

        let Some(range) = clamped else {
            tracing::debug!(range = ?saved.range, "Saved selection refers to removed nodes; not restored");
            return RestoreOutcome::Stale;
        };

        self.surface.with_platform(|p| {
            p.set_selection(None);
            p.set_selection(Some(range));
        });
        RestoreOutcome::Restored
    }

    /// Forgets the snapshot.
    pub fn clear_saved(&self) {
        *self.saved.borrow_mut() = None;
    }

    /// Returns true if there is no in-editor range or it is a caret.
    pub fn is_collapsed(&self) -> bool {
        self.get_range().map(|r| r.is_collapsed()).unwrap_or(true)
    }

    /// The current snapshot.
    pub fn saved(&self) -> Option<SavedSelection> {
        *self.saved.borrow()
    }

    /// Places the caret at `point` and snapshots it.
    pub fn set_caret(&self, point: Point) {
        self.surface
            .with_platform(|p| p.set_selection(Some(TextRange::caret(point))));
        self.save_selection();
    }
}

impl std::fmt::Debug for SelectionStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SelectionStore")
            .field("saved", &self.saved())
            .finish_non_exhaustive()
    }
}
