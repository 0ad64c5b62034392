//! Highlighted callout boxes.

use std::fmt;
use std::str::FromStr;

use quire_core::{Editor, Plugin, PluginSource, WeakEditor};

use crate::{upgrade, BuiltinError};

pub const NAME: &str = "callout";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CalloutKind {
    #[default]
    Info,
    Tip,
    Warning,
    Error,
    Success,
}

impl CalloutKind {
    pub const ALL: [CalloutKind; 5] = [
        CalloutKind::Info,
        CalloutKind::Tip,
        CalloutKind::Warning,
        CalloutKind::Error,
        CalloutKind::Success,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            CalloutKind::Info => "info",
            CalloutKind::Tip => "tip",
            CalloutKind::Warning => "warning",
            CalloutKind::Error => "error",
            CalloutKind::Success => "success",
        }
    }

    pub fn icon(&self) -> &'static str {
        match self {
            CalloutKind::Info => "ℹ️",
            CalloutKind::Tip => "💡",
            CalloutKind::Warning => "⚠️",
            CalloutKind::Error => "🚫",
            CalloutKind::Success => "✅",
        }
    }
}

impl FromStr for CalloutKind {
    type Err = BuiltinError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        CalloutKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| BuiltinError::UnknownVariant {
                kind: "callout",
                value: s.to_string(),
            })
    }
}

impl fmt::Display for CalloutKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub struct Callout {
    editor: WeakEditor,
}

impl Callout {
    pub fn new(editor: &Editor) -> Self {
        Self {
            editor: editor.downgrade(),
        }
    }

    pub fn source() -> PluginSource {
        PluginSource::factory(NAME, |editor, _| Ok(Callout::new(editor)))
    }

    pub fn markup(kind: CalloutKind) -> String {
        format!(
            "<div class=\"quire-callout quire-callout-{kind}\"><span class=\"quire-callout-icon\">{icon}</span><div class=\"quire-callout-content\"><p>Type something...</p></div></div><p><br></p>",
            kind = kind,
            icon = kind.icon()
        )
    }

    pub fn insert_callout(&self, kind: CalloutKind) -> Result<bool, BuiltinError> {
        let editor = upgrade(&self.editor)?;
        Ok(editor.exec_command("insertHTML", Some(&Callout::markup(kind))))
    }
}

impl Plugin for Callout {
    fn name(&self) -> Option<&str> {
        Some(NAME)
    }
}
