//! Live word and character statistics.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use quire_core::{subscriber, Editor, EventName, Plugin, PluginSource, Subscriber, WeakEditor};
use serde::Serialize;

use crate::upgrade;

pub const NAME: &str = "word-count";

/// Counts over the document's plain text.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TextStats {
    pub words: usize,
    pub characters: usize,
}

impl TextStats {
    /// Words are whitespace-separated runs. Characters include spaces but
    /// not the line breaks that separate blocks.
    pub fn of(text: &str) -> Self {
        Self {
            words: text.split_whitespace().count(),
            characters: text.chars().filter(|c| *c != '\n').count(),
        }
    }

    /// "N words, M characters"
    pub fn summary(&self) -> String {
        format!("{} words, {} characters", self.words, self.characters)
    }
}

pub struct WordCount {
    editor: WeakEditor,
    stats: Rc<Cell<TextStats>>,
    handler: RefCell<Option<Subscriber>>,
}

/// Events that refresh the statistics.
const TRIGGERS: [EventName; 2] = [EventName::Change, EventName::KeyUp];

impl WordCount {
    pub fn new(editor: &Editor) -> Self {
        Self {
            editor: editor.downgrade(),
            stats: Rc::new(Cell::new(TextStats::default())),
            handler: RefCell::new(None),
        }
    }

    pub fn source() -> PluginSource {
        PluginSource::factory(NAME, |editor, _| Ok(WordCount::new(editor)))
    }

    pub fn stats(&self) -> TextStats {
        self.stats.get()
    }

    pub fn summary(&self) -> String {
        self.stats().summary()
    }
}

impl Plugin for WordCount {
    fn name(&self) -> Option<&str> {
        Some(NAME)
    }

    fn init(&self) -> anyhow::Result<()> {
        let editor = upgrade(&self.editor)?;
        let weak = self.editor.clone();
        let stats = Rc::clone(&self.stats);
        let handler = subscriber(move |_| {
            if let Some(editor) = weak.upgrade() {
                stats.set(TextStats::of(&editor.text()));
            }
            Ok(())
        });
        for event in TRIGGERS {
            editor.on(event, Rc::clone(&handler));
        }
        self.stats.set(TextStats::of(&editor.text()));
        *self.handler.borrow_mut() = Some(handler);
        Ok(())
    }

    fn destroy(&self) -> anyhow::Result<()> {
        let handler = self.handler.borrow_mut().take();
        if let (Some(editor), Some(handler)) = (self.editor.upgrade(), handler) {
            for event in TRIGGERS {
                editor.off(event, &handler);
            }
        }
        Ok(())
    }
}
