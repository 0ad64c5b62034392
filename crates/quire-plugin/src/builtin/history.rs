//! Undo/redo entry points with availability tracking.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use quire_core::{subscriber, Editor, EventName, Plugin, PluginSource, Subscriber, WeakEditor};

use crate::{upgrade, BuiltinError};

pub const NAME: &str = "history";

/// Whether undo and redo are currently possible.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HistoryState {
    pub can_undo: bool,
    pub can_redo: bool,
}

pub struct History {
    editor: WeakEditor,
    state: Rc<Cell<HistoryState>>,
    handler: RefCell<Option<Subscriber>>,
}

impl History {
    pub fn new(editor: &Editor) -> Self {
        Self {
            editor: editor.downgrade(),
            state: Rc::new(Cell::new(HistoryState::default())),
            handler: RefCell::new(None),
        }
    }

    /// Registry source for this plugin.
    pub fn source() -> PluginSource {
        PluginSource::factory(NAME, |editor, _| Ok(History::new(editor)))
    }

    /// Availability as of the last `change`.
    pub fn state(&self) -> HistoryState {
        self.state.get()
    }

    pub fn undo(&self) -> Result<bool, BuiltinError> {
        Ok(upgrade(&self.editor)?.exec_command("undo", None))
    }

    pub fn redo(&self) -> Result<bool, BuiltinError> {
        Ok(upgrade(&self.editor)?.exec_command("redo", None))
    }

    fn refresh(editor: &Editor, state: &Cell<HistoryState>) {
        let commands = editor.commands();
        state.set(HistoryState {
            can_undo: commands.can_undo(),
            can_redo: commands.can_redo(),
        });
    }
}

impl Plugin for History {
    fn name(&self) -> Option<&str> {
        Some(NAME)
    }

    fn init(&self) -> anyhow::Result<()> {
        let editor = upgrade(&self.editor)?;
        let weak = self.editor.clone();
        let state = Rc::clone(&self.state);
        let handler = subscriber(move |_| {
            if let Some(editor) = weak.upgrade() {
                History::refresh(&editor, &state);
            }
            Ok(())
        });
        editor.on(EventName::Change, Rc::clone(&handler));
        *self.handler.borrow_mut() = Some(handler);
        History::refresh(&editor, &self.state);
        Ok(())
    }

    fn destroy(&self) -> anyhow::Result<()> {
        let handler = self.handler.borrow_mut().take();
        if let (Some(editor), Some(handler)) = (self.editor.upgrade(), handler) {
            editor.off(EventName::Change, &handler);
        }
        Ok(())
    }
}
