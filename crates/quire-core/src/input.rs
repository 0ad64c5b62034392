//! Native input as the platform delivers it.
//!
//! ## Learning: Normalizing at the Edge
//!
//! Platforms disagree on key names, modifier handling and clipboard
//! formats. These types are the single shape the facade accepts; the
//! host translates its own events into them once.

use quire_document::markup::escape_text;
use quire_document::SanitizePolicy;
use serde::{Deserialize, Serialize};

/// Modifier keys held during a key event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Modifiers {
    pub ctrl: bool,
    pub meta: bool,
    pub shift: bool,
    pub alt: bool,
}

impl Modifiers {
    /// Ctrl on most platforms, Cmd on macOS.
    pub fn command(&self) -> bool {
        self.ctrl || self.meta
    }
}

/// A key press or release.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyEvent {
    /// Key name as reported by the platform ("b", "Enter", "/")
    pub key: String,
    pub modifiers: Modifiers,
}

impl KeyEvent {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            modifiers: Modifiers::default(),
        }
    }

    pub fn ctrl(mut self) -> Self {
        self.modifiers.ctrl = true;
        self
    }

    pub fn meta(mut self) -> Self {
        self.modifiers.meta = true;
        self
    }

    pub fn shift(mut self) -> Self {
        self.modifiers.shift = true;
        self
    }

    pub fn alt(mut self) -> Self {
        self.modifiers.alt = true;
        self
    }

    /// The editor command bound to this key, if any.
    ///
    /// Ctrl/Cmd+B, I and U toggle formatting; Ctrl/Cmd+Z undoes and
    /// Ctrl/Cmd+Shift+Z redoes.
    pub fn shortcut(&self) -> Option<&'static str> {
        if !self.modifiers.command() {
            return None;
        }
        match self.key.to_ascii_lowercase().as_str() {
            "b" => Some("bold"),
            "i" => Some("italic"),
            "u" => Some("underline"),
            "z" if self.modifiers.shift => Some("redo"),
            "z" => Some("undo"),
            _ => None,
        }
    }
}

/// Clipboard contents offered by a paste.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ClipboardData {
    pub html: Option<String>,
    pub text: Option<String>,
}

impl ClipboardData {
    pub fn html(html: impl Into<String>) -> Self {
        Self {
            html: Some(html.into()),
            text: None,
        }
    }

    pub fn text(text: impl Into<String>) -> Self {
        Self {
            html: None,
            text: Some(text.into()),
        }
    }

    /// Markup to insert for this paste.
    ///
    /// HTML is preferred; plain text has its line breaks turned into
    /// `<br>`. The result is sanitized, and if nothing visible survives the
    /// escaped plain text is used instead. Returns `None` when the
    /// clipboard is empty.
    pub fn to_insertable(&self, policy: &SanitizePolicy) -> Option<String> {
        let plain = self.text.as_deref().map(|t| {
            escape_text(&t.replace("\r\n", "\n")).replace('\n', "<br>")
        });
        let raw = self
            .html
            .as_deref()
            .filter(|h| !h.trim().is_empty())
            .map(str::to_string)
            .or_else(|| plain.clone())?;

        let clean = policy.sanitize_markup(&raw);
        if clean.trim().is_empty() {
            plain.filter(|p| !p.is_empty())
        } else {
            Some(clean)
        }
    }
}

/// A native event from the platform surface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NativeEvent {
    /// Content changed by typing
    Input,
    KeyDown(KeyEvent),
    KeyUp(KeyEvent),
    MouseUp,
    Focus,
    Blur,
    Paste(ClipboardData),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shortcuts() {
        assert_eq!(KeyEvent::new("b").ctrl().shortcut(), Some("bold"));
        assert_eq!(KeyEvent::new("I").meta().shortcut(), Some("italic"));
        assert_eq!(KeyEvent::new("u").ctrl().shortcut(), Some("underline"));
        assert_eq!(KeyEvent::new("z").ctrl().shortcut(), Some("undo"));
        assert_eq!(KeyEvent::new("Z").ctrl().shift().shortcut(), Some("redo"));
        assert_eq!(KeyEvent::new("b").shortcut(), None);
        assert_eq!(KeyEvent::new("x").ctrl().shortcut(), None);
    }

    #[test]
    fn test_paste_prefers_html() {
        let clip = ClipboardData {
            html: Some(r#"<b style="color:red">bold</b>"#.into()),
            text: Some("bold".into()),
        };
        assert_eq!(
            clip.to_insertable(&SanitizePolicy::default()).as_deref(),
            Some("<b>bold</b>")
        );
    }

    #[test]
    fn test_paste_plain_text_breaks() {
        let clip = ClipboardData::text("a < b\r\nc");
        assert_eq!(
            clip.to_insertable(&SanitizePolicy::default()).as_deref(),
            Some("a &lt; b<br>c")
        );
    }

    #[test]
    fn test_paste_falls_back_to_plain_text() {
        let clip = ClipboardData {
            html: Some("<script>alert(1)</script>".into()),
            text: Some("alert(1)".into()),
        };
        assert_eq!(
            clip.to_insertable(&SanitizePolicy::default()).as_deref(),
            Some("alert(1)")
        );
        assert_eq!(ClipboardData::default().to_insertable(&SanitizePolicy::default()), None);
    }
}
