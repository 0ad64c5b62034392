//! # Quire Plugins
//!
//! Built-in plugins for the Quire editor, plus named presets.
//!
//! ## Plugin Kinds
//!
//! 1. **Observers** react to editor events: `History`, `WordCount`, `AutoSave`
//! 2. **Inserters** add content blocks: `Code`, `Divider`, `Callout`, `Footnote`
//! 3. **Coordinators** call other plugins: `SlashCommands`
//!
//! ## Learning: Typed Cross-Plugin Calls
//!
//! A plugin that needs another plugin resolves it through
//! [`KnownPlugin::resolve`], which names every built-in kind explicitly.
//! Missing plugins come back as [`KnownPlugin::Absent`] and the caller
//! decides how to degrade.

pub mod builtin;
pub mod handle;
pub mod presets;

pub use builtin::autosave::{
    AutoSave, AutoSaveOptions, BoxFuture, Draft, DraftStore, MemoryDraftStore, SaveStatus,
};
pub use builtin::callout::{Callout, CalloutKind};
pub use builtin::code::{Code, CodeOptions};
pub use builtin::divider::{Divider, DividerStyle};
pub use builtin::footnote::{AddFootnote, Footnote, FootnoteRef};
pub use builtin::history::{History, HistoryState};
pub use builtin::slash::{SlashAction, SlashCommand, SlashCommands, SlashMenu, SlashOptions};
pub use builtin::word_count::{TextStats, WordCount};
pub use handle::KnownPlugin;
pub use presets::Preset;

use quire_core::{Editor, WeakEditor};

/// Errors from built-in plugin operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BuiltinError {
    #[error("Unknown {kind}: {value}")]
    UnknownVariant { kind: &'static str, value: String },

    #[error("Plugin not available: {0}")]
    Unavailable(String),

    #[error("The editor is gone")]
    EditorGone,
}

/// Upgrades a plugin's editor handle.
pub(crate) fn upgrade(editor: &WeakEditor) -> Result<Editor, BuiltinError> {
    editor.upgrade().ok_or(BuiltinError::EditorGone)
}
