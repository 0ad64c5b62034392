//! In-memory platform surface.
//!
//! Used by tests, benches and the driver binary. It behaves like a
//! contenteditable region without a renderer: markup is stored as a string,
//! native commands are recorded, and helpers let a test play the user
//! (typing, selecting).

use std::cell::RefCell;
use std::rc::Rc;

use quire_document::{Document, TextRange};

use crate::surface::{MountOptions, NativeSelection, PlatformTextSurface, SurfaceError};

/// Native commands the headless platform accepts.
const SUPPORTED_NATIVE: &[&str] = &[
    "bold",
    "italic",
    "underline",
    "strikeThrough",
    "subscript",
    "superscript",
    "formatBlock",
    "insertOrderedList",
    "insertUnorderedList",
    "createLink",
    "unlink",
    "justifyLeft",
    "justifyCenter",
    "justifyRight",
    "removeFormat",
    "foreColor",
    "hiliteColor",
];

#[derive(Debug, Default)]
struct HeadlessState {
    mounted: bool,
    editable: bool,
    placeholder: Option<String>,
    theme: String,
    markup: String,
    selection: NativeSelection,
    focused: bool,
    native_log: Vec<(String, Option<String>)>,
    render_count: usize,
    fail_mount: Option<String>,
}

/// A platform surface backed by plain memory.
///
/// Cloning yields another handle to the same state, so a test can keep one
/// handle while the editor owns the other.
#[derive(Debug, Clone, Default)]
pub struct HeadlessSurface {
    state: Rc<RefCell<HeadlessState>>,
}

impl HeadlessSurface {
    /// Creates an unmounted surface.
    pub fn new() -> Self {
        Self::default()
    }

    /// A surface whose `mount` fails with the given reason.
    pub fn failing(reason: impl Into<String>) -> Self {
        let surface = Self::new();
        surface.state.borrow_mut().fail_mount = Some(reason.into());
        surface
    }

    // ==================== Simulating the user ====================

    /// Sets the native selection, as if the user dragged.
    pub fn set_native_selection(&self, selection: NativeSelection) {
        self.state.borrow_mut().selection = selection;
    }

    /// Replaces the native content, as if the user typed.
    pub fn set_content(&self, markup: impl Into<String>) {
        self.state.borrow_mut().markup = markup.into();
    }

    /// Moves focus away from the surface.
    pub fn blur(&self) {
        self.state.borrow_mut().focused = false;
    }

    // ==================== Inspection ====================

    /// Current markup.
    pub fn markup(&self) -> String {
        self.state.borrow().markup.clone()
    }

    /// Native commands run so far, in order.
    pub fn native_log(&self) -> Vec<(String, Option<String>)> {
        self.state.borrow().native_log.clone()
    }

    /// Number of renders since creation.
    pub fn render_count(&self) -> usize {
        self.state.borrow().render_count
    }

    /// Whether `mount` succeeded and `unmount` hasn't run.
    pub fn is_mounted(&self) -> bool {
        self.state.borrow().mounted
    }

    /// Whether the surface accepts input.
    pub fn is_editable(&self) -> bool {
        self.state.borrow().editable
    }

    /// The placeholder given at mount time.
    pub fn placeholder(&self) -> Option<String> {
        self.state.borrow().placeholder.clone()
    }

    /// The theme given at mount time.
    pub fn theme(&self) -> String {
        self.state.borrow().theme.clone()
    }
}

impl PlatformTextSurface for HeadlessSurface {
    fn mount(&mut self, options: &MountOptions) -> Result<(), SurfaceError> {
        let mut state = self.state.borrow_mut();
        if let Some(reason) = &state.fail_mount {
            return Err(SurfaceError::Platform(reason.clone()));
        }
        state.mounted = true;
        state.editable = options.editable;
        state.placeholder = options.placeholder.clone();
        state.theme = options.theme.clone();
        Ok(())
    }

    fn unmount(&mut self) {
        let mut state = self.state.borrow_mut();
        state.mounted = false;
        state.editable = false;
        state.focused = false;
    }

    fn render(&mut self, doc: &Document) {
        let mut state = self.state.borrow_mut();
        state.markup = doc.to_markup();
        state.render_count += 1;
    }

    fn content(&self) -> String {
        self.state.borrow().markup.clone()
    }

    fn selection(&self) -> NativeSelection {
        self.state.borrow().selection.clone()
    }

    fn set_selection(&mut self, range: Option<TextRange>) {
        let mut state = self.state.borrow_mut();
        state.selection.ranges.clear();
        state.selection.ranges.extend(range);
    }

    fn focus(&mut self) {
        let mut state = self.state.borrow_mut();
        if state.mounted {
            state.focused = true;
        }
    }

    fn has_focus(&self) -> bool {
        self.state.borrow().focused
    }

    fn exec_native(&mut self, name: &str, value: Option<&str>) -> Result<(), SurfaceError> {
        let mut state = self.state.borrow_mut();
        if !state.mounted {
            return Err(SurfaceError::Detached);
        }
        if !SUPPORTED_NATIVE.contains(&name) {
            return Err(SurfaceError::Unsupported(name.to_string()));
        }
        state
            .native_log
            .push((name.to_string(), value.map(str::to_string)));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quire_document::{NodeId, Point};

    #[test]
    fn test_mount_applies_options() {
        let handle = HeadlessSurface::new();
        let mut platform = handle.clone();
        platform
            .mount(&MountOptions {
                editable: true,
                placeholder: Some("Write...".into()),
                theme: "dark".into(),
            })
            .unwrap();
        assert!(handle.is_mounted());
        assert!(handle.is_editable());
        assert_eq!(handle.placeholder().as_deref(), Some("Write..."));
        assert_eq!(handle.theme(), "dark");

        platform.unmount();
        assert!(!handle.is_mounted());
    }

    #[test]
    fn test_failing_mount() {
        let mut platform = HeadlessSurface::failing("no element");
        assert_eq!(
            platform.mount(&MountOptions::default()),
            Err(SurfaceError::Platform("no element".into()))
        );
    }

    #[test]
    fn test_exec_native_records_supported_commands() {
        let handle = HeadlessSurface::new();
        let mut platform = handle.clone();
        assert_eq!(platform.exec_native("bold", None), Err(SurfaceError::Detached));

        platform.mount(&MountOptions::default()).unwrap();
        platform.exec_native("bold", None).unwrap();
        platform.exec_native("foreColor", Some("#f00")).unwrap();
        assert!(matches!(
            platform.exec_native("explode", None),
            Err(SurfaceError::Unsupported(_))
        ));
        assert_eq!(
            handle.native_log(),
            vec![
                ("bold".to_string(), None),
                ("foreColor".to_string(), Some("#f00".to_string()))
            ]
        );
    }

    #[test]
    fn test_set_selection_replaces_ranges() {
        let mut platform = HeadlessSurface::new();
        let a = TextRange::caret(Point::new(NodeId(1), 0));
        let b = TextRange::caret(Point::new(NodeId(2), 0));
        platform.set_native_selection(NativeSelection {
            ranges: vec![a, a],
        });
        platform.set_selection(Some(b));
        assert_eq!(platform.selection(), NativeSelection::single(b));
        platform.set_selection(None);
        assert!(platform.selection().ranges.is_empty());
    }
}
