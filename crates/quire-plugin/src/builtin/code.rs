//! Code blocks, with Tab indentation inside them.

use std::cell::RefCell;
use std::rc::Rc;

use quire_core::plugin::parse_options;
use quire_core::{
    subscriber, Editor, EventName, EventPayload, Plugin, PluginSource, Subscriber, WeakEditor,
};
use quire_document::markup::escape_attr;
use quire_document::{Document, NodeId};
use serde::{Deserialize, Serialize};

use crate::{upgrade, BuiltinError};

pub const NAME: &str = "code";

/// Languages a block can be tagged with.
pub const LANGUAGES: [&str; 6] = ["javascript", "python", "html", "css", "java", "cpp"];

const PLACEHOLDER: &str = "// Type code here...";
const INDENT: &str = "    ";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CodeOptions {
    pub default_language: String,
}

impl Default for CodeOptions {
    fn default() -> Self {
        Self {
            default_language: "javascript".to_string(),
        }
    }
}

pub struct Code {
    editor: WeakEditor,
    options: CodeOptions,
    handler: RefCell<Option<Subscriber>>,
}

impl Code {
    pub fn new(editor: &Editor, options: CodeOptions) -> Self {
        Self {
            editor: editor.downgrade(),
            options,
            handler: RefCell::new(None),
        }
    }

    pub fn source() -> PluginSource {
        PluginSource::factory(NAME, |editor, options| {
            let options: CodeOptions = parse_options(NAME, options)?;
            check_language(&options.default_language)?;
            Ok(Code::new(editor, options))
        })
    }

    /// Markup for an empty block in `language`, followed by a paragraph to
    /// keep typing in.
    pub fn block_markup(language: &str) -> String {
        format!(
            "<div class=\"quire-code-block\" data-language=\"{}\"><pre><code>{}</code></pre></div><p><br></p>",
            escape_attr(language),
            PLACEHOLDER
        )
    }

    /// Inserts a code block at the selection. `None` uses the configured
    /// default language.
    pub fn insert_code_block(&self, language: Option<&str>) -> Result<bool, BuiltinError> {
        let language = language.unwrap_or(&self.options.default_language);
        check_language(language)?;
        let editor = upgrade(&self.editor)?;
        Ok(editor.exec_command("insertHTML", Some(&Code::block_markup(language))))
    }
}

fn check_language(language: &str) -> Result<(), BuiltinError> {
    if LANGUAGES.contains(&language) {
        Ok(())
    } else {
        Err(BuiltinError::UnknownVariant {
            kind: "language",
            value: language.to_string(),
        })
    }
}

/// Whether `node` sits inside a `<pre>`.
fn inside_pre(doc: &Document, node: NodeId) -> bool {
    let mut current = Some(node);
    while let Some(id) = current {
        let Some(node) = doc.node(id) else {
            return false;
        };
        if node.as_element().is_some_and(|el| el.tag == "pre") {
            return true;
        }
        current = node.parent();
    }
    false
}

impl Plugin for Code {
    fn name(&self) -> Option<&str> {
        Some(NAME)
    }

    fn init(&self) -> anyhow::Result<()> {
        let editor = upgrade(&self.editor)?;
        let weak = self.editor.clone();
        let handler = subscriber(move |payload| {
            let EventPayload::Key(key) = payload else {
                return Ok(());
            };
            if key.key != "Tab" || key.modifiers.command() || key.modifiers.shift {
                return Ok(());
            }
            let Some(editor) = weak.upgrade() else {
                return Ok(());
            };
            let Some(range) = editor.selection().get_range() else {
                return Ok(());
            };
            let in_code = inside_pre(&editor.surface().read(), range.focus.node);
            if in_code {
                editor.insert_text(INDENT);
            }
            Ok(())
        });
        editor.on(EventName::KeyDown, Rc::clone(&handler));
        *self.handler.borrow_mut() = Some(handler);
        Ok(())
    }

    fn destroy(&self) -> anyhow::Result<()> {
        let handler = self.handler.borrow_mut().take();
        if let (Some(editor), Some(handler)) = (self.editor.upgrade(), handler) {
            editor.off(EventName::KeyDown, &handler);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quire_core::{HeadlessSurface, KeyEvent, NativeEvent, NativeSelection, PluginState};
    use quire_document::{Point, TextRange};
    use serde_json::json;

    fn build(options: serde_json::Value) -> (Editor, HeadlessSurface) {
        let platform = HeadlessSurface::new();
        let editor = Editor::builder()
            .mount(platform.clone())
            .plugin_with_options(Code::source(), options)
            .build()
            .unwrap();
        (editor, platform)
    }

    /// Descends through first children to the first text node.
    fn first_text(doc: &Document, from: NodeId) -> NodeId {
        let mut id = from;
        loop {
            let node = doc.node(id).unwrap();
            if node.as_text().is_some() {
                return id;
            }
            id = node.children()[0];
        }
    }

    #[test]
    fn test_insert_default_language() {
        let (editor, _) = build(serde_json::Value::Null);
        let code = editor.plugins().get_as::<Code>(NAME).unwrap();
        assert_eq!(code.insert_code_block(None), Ok(true));
        assert_eq!(
            editor.get_data(),
            "<div class=\"quire-code-block\" data-language=\"javascript\"><pre><code>// Type code here...</code></pre></div><p><br></p>"
        );
        assert!(editor.exec_command("undo", None));
        assert_eq!(editor.get_data(), "");
    }

    #[test]
    fn test_language_validation() {
        let (editor, _) = build(json!({ "default_language": "python" }));
        let code = editor.plugins().get_as::<Code>(NAME).unwrap();
        assert_eq!(
            code.insert_code_block(Some("cobol")),
            Err(BuiltinError::UnknownVariant {
                kind: "language",
                value: "cobol".into()
            })
        );
        assert_eq!(editor.get_data(), "");

        code.insert_code_block(None).unwrap();
        assert!(editor.get_data().contains("data-language=\"python\""));
    }

    #[test]
    fn test_bad_default_language_rejects_plugin() {
        let (editor, _) = build(json!({ "default_language": "cobol" }));
        assert!(!editor.plugins().contains(NAME));
    }

    #[test]
    fn test_tab_indents_inside_code() {
        let (editor, platform) = build(serde_json::Value::Null);
        let code = editor.plugins().get_as::<Code>(NAME).unwrap();
        code.insert_code_block(None).unwrap();
        assert_eq!(editor.plugins().state(NAME), Some(PluginState::Active));

        let text = {
            let doc = editor.surface().read();
            first_text(&doc, doc.root())
        };
        platform.set_native_selection(NativeSelection::single(TextRange::caret(Point::new(
            text, 0,
        ))));
        editor.handle_native_event(NativeEvent::KeyDown(KeyEvent::new("Tab")));
        assert!(editor.get_data().contains("<code>    // Type code here...</code>"));
    }

    #[test]
    fn test_tab_outside_code_is_ignored() {
        let (editor, platform) = build(serde_json::Value::Null);
        editor.set_data("<p>plain</p>");
        let text = {
            let doc = editor.surface().read();
            first_text(&doc, doc.root())
        };
        platform.set_native_selection(NativeSelection::single(TextRange::caret(Point::new(
            text, 0,
        ))));
        editor.handle_native_event(NativeEvent::KeyDown(KeyEvent::new("Tab")));
        editor.handle_native_event(NativeEvent::KeyDown(KeyEvent::new("Tab").shift()));
        assert_eq!(editor.get_data(), "<p>plain</p>");
    }
}
