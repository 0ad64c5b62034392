//! The platform surface contract and the editable surface that wraps it.
//!
//! ## Learning: Projection
//!
//! The platform (a browser element, a native text view, a test double)
//! only ever *shows* the document. Committed edits happen on the
//! [`Document`] tree and are then re-rendered onto the platform. The one
//! exception is native formatting and typing, which happen on the
//! platform first and are pulled back with
//! [`EditableSurface::pull_from_platform`].

use std::cell::{Ref, RefCell};
use std::rc::Rc;

use quire_document::{markup, Document, NodeId, TextRange};

/// Options passed to the platform when the editor mounts.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MountOptions {
    /// Whether the surface accepts input
    pub editable: bool,
    /// Hint shown while the document is empty
    pub placeholder: Option<String>,
    /// Theme name, applied by the platform
    pub theme: String,
}

/// The selection as the platform reports it.
///
/// Ranges may point outside the editor (the user selected text elsewhere
/// on the page), so consumers must validate them against the document.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct NativeSelection {
    pub ranges: Vec<TextRange>,
}

impl NativeSelection {
    /// A selection with a single range.
    pub fn single(range: TextRange) -> Self {
        Self {
            ranges: vec![range],
        }
    }

    /// The first range, if any.
    pub fn first(&self) -> Option<TextRange> {
        self.ranges.first().copied()
    }
}

/// Errors raised by a platform surface.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SurfaceError {
    #[error("Native command not supported: {0}")]
    Unsupported(String),

    #[error("Surface is not mounted")]
    Detached,

    #[error("Platform error: {0}")]
    Platform(String),
}

/// What the core needs from the host platform.
///
/// Implemented by hosts; [`HeadlessSurface`](crate::HeadlessSurface) is the
/// in-memory implementation.
pub trait PlatformTextSurface {
    /// Makes the mount point editable and installs native listeners.
    fn mount(&mut self, options: &MountOptions) -> Result<(), SurfaceError>;

    /// Removes native listeners. Safe to call more than once.
    fn unmount(&mut self);

    /// Re-projects the document onto the platform.
    fn render(&mut self, doc: &Document);

    /// Current platform content as markup.
    fn content(&self) -> String;

    /// Current platform selection.
    fn selection(&self) -> NativeSelection;

    /// Replaces the platform selection; `None` clears it.
    fn set_selection(&mut self, range: Option<TextRange>);

    /// Moves keyboard focus to the surface.
    fn focus(&mut self);

    /// Whether the surface has keyboard focus.
    fn has_focus(&self) -> bool;

    /// Runs a native formatting command (bold, italic, ...).
    fn exec_native(&mut self, name: &str, value: Option<&str>) -> Result<(), SurfaceError>;
}

/// The document plus the platform it is projected onto.
///
/// Cloning yields another handle to the same document and platform.
#[derive(Clone)]
pub struct EditableSurface {
    doc: Rc<RefCell<Document>>,
    platform: Rc<RefCell<Box<dyn PlatformTextSurface>>>,
}

impl EditableSurface {
    /// Wraps a platform with an empty document.
    pub fn new(platform: Box<dyn PlatformTextSurface>) -> Self {
        Self {
            doc: Rc::new(RefCell::new(Document::new())),
            platform: Rc::new(RefCell::new(platform)),
        }
    }

    /// Borrows the document for reading.
    pub fn read(&self) -> Ref<'_, Document> {
        self.doc.borrow()
    }

    /// Mutates the document, then re-renders the platform.
    ///
    /// The render happens even when `f` fails, since a failed edit may have
    /// partially applied.
    pub fn edit<T>(&self, f: impl FnOnce(&mut Document) -> T) -> T {
        let result = f(&mut self.doc.borrow_mut());
        self.render();
        result
    }

    /// Re-projects the document onto the platform.
    pub fn render(&self) {
        let doc = self.doc.borrow();
        self.platform.borrow_mut().render(&doc);
    }

    /// Runs `f` against the platform.
    pub fn with_platform<T>(&self, f: impl FnOnce(&mut dyn PlatformTextSurface) -> T) -> T {
        let mut platform = self.platform.borrow_mut();
        f(platform.as_mut())
    }

    /// Returns true if `node` is attached to the document.
    pub fn contains(&self, node: NodeId) -> bool {
        self.doc.borrow().contains(node)
    }

    /// Serialized document.
    pub fn to_markup(&self) -> String {
        self.doc.borrow().to_markup()
    }

    /// Brings the document in line with whatever the platform shows.
    ///
    /// Returns true if the document changed. Nodes the platform left alone
    /// keep their ids, so history and saved selections pointing at them
    /// stay usable; only replaced nodes go stale.
    pub fn pull_from_platform(&self) -> bool {
        let content = self.platform.borrow().content();
        if content == self.to_markup() {
            return false;
        }
        let changed = self
            .doc
            .borrow_mut()
            .reconcile(&markup::parse_fragment(&content));
        self.render();
        changed
    }

    /// Replaces the document content without recording history.
    pub fn replace_markup(&self, content: &str) {
        self.edit(|doc| {
            doc.replace_content(markup::parse_fragment(content));
        });
    }
}

impl std::fmt::Debug for EditableSurface {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EditableSurface")
            .field("markup", &self.to_markup())
            .finish_non_exhaustive()
    }
}
