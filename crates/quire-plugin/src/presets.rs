//! Named plugin lists.

use std::fmt;
use std::str::FromStr;

use quire_core::{EditorConfig, PluginSource};

use crate::{BuiltinError, Callout, Code, Divider, Footnote, History, SlashCommands, WordCount};

/// A named set of built-in plugins.
///
/// `AutoSave` is in none of them: it needs a draft store from the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Preset {
    /// History and word count
    Basic,
    /// Basic plus code blocks, dividers and callouts
    Standard,
    /// Standard plus footnotes and slash commands
    Full,
}

impl Preset {
    pub fn as_str(&self) -> &'static str {
        match self {
            Preset::Basic => "basic",
            Preset::Standard => "standard",
            Preset::Full => "full",
        }
    }

    /// Plugin sources in registration order.
    pub fn sources(&self) -> Vec<PluginSource> {
        let mut sources = vec![History::source(), WordCount::source()];
        if matches!(self, Preset::Standard | Preset::Full) {
            sources.extend([Code::source(), Divider::source(), Callout::source()]);
        }
        if *self == Preset::Full {
            sources.extend([Footnote::source(), SlashCommands::source()]);
        }
        sources
    }

    /// Sources for the preset named in the config. No preset, or an
    /// unknown one, yields nothing.
    pub fn sources_for(config: &EditorConfig) -> Vec<PluginSource> {
        let Some(name) = config.preset.as_deref() else {
            return Vec::new();
        };
        match name.parse::<Preset>() {
            Ok(preset) => preset.sources(),
            Err(e) => {
                tracing::warn!("{}; loading no preset plugins", e);
                Vec::new()
            }
        }
    }
}

impl FromStr for Preset {
    type Err = BuiltinError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "basic" => Ok(Preset::Basic),
            "standard" => Ok(Preset::Standard),
            "full" => Ok(Preset::Full),
            _ => Err(BuiltinError::UnknownVariant {
                kind: "preset",
                value: s.to_string(),
            }),
        }
    }
}

impl fmt::Display for Preset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
