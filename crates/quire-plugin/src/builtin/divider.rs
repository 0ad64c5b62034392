//! Horizontal dividers.

use std::fmt;
use std::str::FromStr;

use quire_core::{Editor, Plugin, PluginSource, WeakEditor};

use crate::{upgrade, BuiltinError};

pub const NAME: &str = "divider";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DividerStyle {
    #[default]
    Solid,
    Dashed,
    Dotted,
}

impl DividerStyle {
    pub fn as_str(&self) -> &'static str {
        match self {
            DividerStyle::Solid => "solid",
            DividerStyle::Dashed => "dashed",
            DividerStyle::Dotted => "dotted",
        }
    }
}

impl FromStr for DividerStyle {
    type Err = BuiltinError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "solid" => Ok(DividerStyle::Solid),
            "dashed" => Ok(DividerStyle::Dashed),
            "dotted" => Ok(DividerStyle::Dotted),
            _ => Err(BuiltinError::UnknownVariant {
                kind: "divider style",
                value: s.to_string(),
            }),
        }
    }
}

impl fmt::Display for DividerStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub struct Divider {
    editor: WeakEditor,
}

impl Divider {
    pub fn new(editor: &Editor) -> Self {
        Self {
            editor: editor.downgrade(),
        }
    }

    pub fn source() -> PluginSource {
        PluginSource::factory(NAME, |editor, _| Ok(Divider::new(editor)))
    }

    pub fn markup(style: DividerStyle) -> String {
        format!(
            "<div class=\"quire-divider\"><hr class=\"quire-divider-{}\"></div><p><br></p>",
            style
        )
    }

    pub fn insert_divider(&self, style: DividerStyle) -> Result<bool, BuiltinError> {
        let editor = upgrade(&self.editor)?;
        Ok(editor.exec_command("insertHTML", Some(&Divider::markup(style))))
    }
}

impl Plugin for Divider {
    fn name(&self) -> Option<&str> {
        Some(NAME)
    }
}
