//! Slash commands: type "/" at the start of a word to pick a block from a
//! searchable catalog.
//!
//! ## Learning: Shared State for Subscribers
//!
//! Event subscribers are `'static` closures, so they can't borrow the
//! plugin. The state they need lives in an `Rc<Shared>` that both the
//! plugin and its closures hold. No `RefCell` borrow of the menu is held
//! while a command runs, because running a command emits events that come
//! back into this plugin.

use std::cell::RefCell;
use std::rc::Rc;

use quire_core::plugin::parse_options;
use quire_core::{
    subscriber, Editor, EventName, EventPayload, FnCommand, KeyEvent, Plugin, PluginSource,
    StackOutcome, Subscriber, WeakEditor,
};
use quire_document::{NodeId, Point};
use serde::{Deserialize, Serialize};

use crate::builtin::{callout, code, divider, footnote};
use crate::{upgrade, BuiltinError, Callout, CalloutKind, Code, Divider, DividerStyle, Footnote, KnownPlugin};

pub const NAME: &str = "slash-commands";

/// What a catalog entry does.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlashAction {
    /// Insert fixed markup
    Markup(&'static str),
    CodeBlock,
    Footnote,
    Divider(DividerStyle),
    Callout(CalloutKind),
}

impl SlashAction {
    /// The plugin this action calls into, if any.
    pub fn plugin(&self) -> Option<&'static str> {
        match self {
            SlashAction::Markup(_) => None,
            SlashAction::CodeBlock => Some(code::NAME),
            SlashAction::Footnote => Some(footnote::NAME),
            SlashAction::Divider(_) => Some(divider::NAME),
            SlashAction::Callout(_) => Some(callout::NAME),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlashCommand {
    pub name: &'static str,
    pub description: &'static str,
    pub keywords: &'static [&'static str],
    pub action: SlashAction,
}

impl SlashCommand {
    fn matches(&self, query: &str) -> bool {
        self.name.to_lowercase().contains(query) || self.keywords.iter().any(|k| k.contains(query))
    }
}

const fn entry(
    name: &'static str,
    description: &'static str,
    keywords: &'static [&'static str],
    action: SlashAction,
) -> SlashCommand {
    SlashCommand {
        name,
        description,
        keywords,
        action,
    }
}

/// Every slash command, in menu order.
pub static CATALOG: &[SlashCommand] = &[
    entry("Heading 1", "Large section heading", &["h1", "heading", "title"], SlashAction::Markup("<h1>Heading 1</h1>")),
    entry("Heading 2", "Medium section heading", &["h2", "heading", "subtitle"], SlashAction::Markup("<h2>Heading 2</h2>")),
    entry("Heading 3", "Small section heading", &["h3", "heading"], SlashAction::Markup("<h3>Heading 3</h3>")),
    entry("Paragraph", "Regular text block", &["p", "paragraph", "text"], SlashAction::Markup("<p>Start typing your paragraph...</p>")),
    entry("Bulleted List", "Create a bullet list", &["ul", "bullet", "list"], SlashAction::Markup("<ul><li>List item 1</li><li>List item 2</li></ul>")),
    entry("Numbered List", "Create a numbered list", &["ol", "number", "list"], SlashAction::Markup("<ol><li>List item 1</li><li>List item 2</li></ol>")),
    entry("Quote", "Insert a quote block", &["quote", "blockquote"], SlashAction::Markup("<blockquote>Type your quote here...</blockquote>")),
    entry("Code Block", "Insert a code block", &["code", "pre", "snippet"], SlashAction::CodeBlock),
    entry("Footnote", "Insert a footnote reference", &["footnote", "ref", "cite"], SlashAction::Footnote),
    entry("Divider", "Horizontal line", &["hr", "divider", "line", "separator"], SlashAction::Divider(DividerStyle::Solid)),
    entry("Dashed Divider", "Dashed horizontal line", &["dashed", "separator"], SlashAction::Divider(DividerStyle::Dashed)),
    entry("Callout", "Highlighted info box", &["callout", "info", "box"], SlashAction::Callout(CalloutKind::Info)),
    entry("Warning", "Warning box", &["warning", "alert"], SlashAction::Callout(CalloutKind::Warning)),
    entry("Tip", "Tip box", &["tip", "success", "hint"], SlashAction::Callout(CalloutKind::Tip)),
    entry("Error", "Error box", &["error", "danger"], SlashAction::Callout(CalloutKind::Error)),
];

/// Catalog entries whose name or keywords contain `query` (any case).
pub fn search(query: &str) -> Vec<&'static SlashCommand> {
    let query = query.trim().to_lowercase();
    CATALOG.iter().filter(|cmd| cmd.matches(&query)).collect()
}

/// Looks a command up by name (any case).
pub fn find(name: &str) -> Option<&'static SlashCommand> {
    CATALOG.iter().find(|cmd| cmd.name.eq_ignore_ascii_case(name))
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SlashOptions {
    pub enabled: bool,
    /// Key that opens the menu
    pub trigger: String,
}

impl Default for SlashOptions {
    fn default() -> Self {
        Self {
            enabled: true,
            trigger: "/".to_string(),
        }
    }
}

/// The menu as the user sees it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SlashMenu {
    pub open: bool,
    pub query: String,
    pub selected: usize,
    pub matches: Vec<&'static str>,
}

impl SlashMenu {
    fn show(&mut self) {
        *self = SlashMenu {
            open: true,
            matches: CATALOG.iter().map(|c| c.name).collect(),
            ..SlashMenu::default()
        };
    }

    fn filter(&mut self, query: String) {
        self.matches = search(&query).into_iter().map(|c| c.name).collect();
        self.query = query;
        self.selected = 0;
    }

    fn hide(&mut self) {
        *self = SlashMenu::default();
    }

    fn selected_name(&self) -> Option<&'static str> {
        self.matches.get(self.selected).copied()
    }
}

/// A resolved action, ready to run.
enum Target {
    Markup(&'static str),
    Code(Rc<Code>),
    Footnote(Rc<Footnote>),
    Divider(Rc<Divider>, DividerStyle),
    Callout(Rc<Callout>, CalloutKind),
}

impl Target {
    fn resolve(editor: &Editor, action: SlashAction) -> Option<Target> {
        let Some(name) = action.plugin() else {
            return match action {
                SlashAction::Markup(markup) => Some(Target::Markup(markup)),
                _ => None,
            };
        };
        match (KnownPlugin::resolve(editor, name), action) {
            (KnownPlugin::Code(p), SlashAction::CodeBlock) => Some(Target::Code(p)),
            (KnownPlugin::Footnote(p), SlashAction::Footnote) => Some(Target::Footnote(p)),
            (KnownPlugin::Divider(p), SlashAction::Divider(style)) => Some(Target::Divider(p, style)),
            (KnownPlugin::Callout(p), SlashAction::Callout(kind)) => Some(Target::Callout(p, kind)),
            _ => None,
        }
    }

    fn run(self, editor: &Editor) -> Result<bool, BuiltinError> {
        match self {
            Target::Markup(markup) => Ok(editor.exec_command("insertHTML", Some(markup))),
            Target::Code(p) => p.insert_code_block(None),
            Target::Footnote(p) => p.insert_footnote(None).map(|id| id.is_some()),
            Target::Divider(p, style) => p.insert_divider(style),
            Target::Callout(p, kind) => p.insert_callout(kind),
        }
    }
}

/// The text node at the caret, the caret offset in it, and its text.
fn caret_text(editor: &Editor) -> Option<(NodeId, usize, String)> {
    let focus = editor.selection().get_range()?.focus;
    let doc = editor.surface().read();
    let node = doc.node(focus.node)?;
    if let Some(text) = node.as_text() {
        return Some((focus.node, focus.offset, text.to_string()));
    }
    // Caret between children: use the text just before it
    let before = *node.children().get(focus.offset.checked_sub(1)?)?;
    let text = doc.node(before)?.as_text()?;
    Some((before, text.chars().count(), text.to_string()))
}

fn text_before(text: &str, offset: usize) -> String {
    text.chars().take(offset).collect()
}

struct Shared {
    editor: WeakEditor,
    options: SlashOptions,
    menu: RefCell<SlashMenu>,
}

impl Shared {
    fn on_key_down(&self, key: &KeyEvent) -> Result<(), BuiltinError> {
        let open = self.menu.borrow().open;
        if !open {
            if key.key == self.options.trigger && !key.modifiers.command() {
                self.maybe_open()?;
            }
            return Ok(());
        }

        match key.key.as_str() {
            "ArrowDown" => {
                let mut menu = self.menu.borrow_mut();
                menu.selected = (menu.selected + 1).min(menu.matches.len().saturating_sub(1));
            }
            "ArrowUp" => {
                let mut menu = self.menu.borrow_mut();
                menu.selected = menu.selected.saturating_sub(1);
            }
            "Escape" => self.menu.borrow_mut().hide(),
            "Enter" => {
                let selected = self.menu.borrow().selected_name();
                if let Some(name) = selected {
                    self.run(name)?;
                }
            }
            "Tab" => {
                let first = self.menu.borrow().matches.first().copied();
                if let Some(name) = first {
                    self.run(name)?;
                }
            }
            _ => {}
        }
        Ok(())
    }

    /// Opens the menu when the trigger starts a word.
    fn maybe_open(&self) -> Result<(), BuiltinError> {
        let editor = upgrade(&self.editor)?;
        if editor.selection().get_range().is_none() {
            return Ok(());
        }
        let before = caret_text(&editor)
            .map(|(_, offset, text)| text_before(&text, offset))
            .unwrap_or_default();
        if before.is_empty() || before.ends_with(' ') {
            self.menu.borrow_mut().show();
        }
        Ok(())
    }

    /// Re-filters the open menu from the text typed after the trigger.
    fn refresh(&self) -> Result<(), BuiltinError> {
        if !self.menu.borrow().open {
            return Ok(());
        }
        let editor = upgrade(&self.editor)?;
        let Some((_, offset, text)) = caret_text(&editor) else {
            return Ok(());
        };
        let before = text_before(&text, offset);
        let mut menu = self.menu.borrow_mut();
        match before.rfind(self.options.trigger.as_str()) {
            Some(at) => {
                let query = before[at + self.options.trigger.len()..].to_lowercase();
                menu.filter(query);
            }
            None => menu.hide(),
        }
        Ok(())
    }

    fn run(&self, name: &str) -> Result<bool, BuiltinError> {
        let command = find(name).ok_or_else(|| BuiltinError::UnknownVariant {
            kind: "slash command",
            value: name.to_string(),
        })?;
        let editor = upgrade(&self.editor)?;
        let was_open = self.menu.borrow().open;
        self.menu.borrow_mut().hide();

        let Some(target) = Target::resolve(&editor, command.action) else {
            let plugin = command.action.plugin().unwrap_or(NAME);
            tracing::warn!(command = command.name, plugin, "Slash command needs a plugin that isn't loaded");
            return Err(BuiltinError::Unavailable(plugin.to_string()));
        };

        if was_open {
            self.remove_trigger_text(&editor);
        }
        target.run(&editor)
    }

    /// Deletes the trigger and the query typed after it, as one undo step.
    fn remove_trigger_text(&self, editor: &Editor) {
        let Some((node, offset, text)) = caret_text(editor) else {
            return;
        };
        let before = text_before(&text, offset);
        let Some(at) = before.rfind(self.options.trigger.as_str()) else {
            return;
        };
        let start = before[..at].chars().count();
        let removed: String = before[at..].to_string();
        let count = removed.chars().count();
        let point = Point::new(node, start);

        let command = FnCommand::new(
            "removeSlashText",
            move |doc| {
                doc.delete_text(point, count)?;
                Ok(())
            },
            move |doc| {
                doc.insert_text(point, &removed)?;
                Ok(())
            },
        );
        if editor.execute(Box::new(command)) == StackOutcome::Applied {
            editor.selection().set_caret(point);
        }
    }
}

pub struct SlashCommands {
    shared: Rc<Shared>,
    handlers: RefCell<Vec<(EventName, Subscriber)>>,
}

impl SlashCommands {
    pub fn new(editor: &Editor, options: SlashOptions) -> Self {
        Self {
            shared: Rc::new(Shared {
                editor: editor.downgrade(),
                options,
                menu: RefCell::new(SlashMenu::default()),
            }),
            handlers: RefCell::new(Vec::new()),
        }
    }

    pub fn source() -> PluginSource {
        PluginSource::factory(NAME, |editor, options| {
            let options: SlashOptions = parse_options(NAME, options)?;
            Ok(SlashCommands::new(editor, options))
        })
    }

    pub fn catalog(&self) -> &'static [SlashCommand] {
        CATALOG
    }

    pub fn search(&self, query: &str) -> Vec<&'static SlashCommand> {
        search(query)
    }

    /// Runs a command by name. Fails without touching the document when
    /// the plugin behind it isn't loaded.
    pub fn run(&self, name: &str) -> Result<bool, BuiltinError> {
        self.shared.run(name)
    }

    pub fn menu(&self) -> SlashMenu {
        self.shared.menu.borrow().clone()
    }

    pub fn is_open(&self) -> bool {
        self.shared.menu.borrow().open
    }

    fn listen(&self, editor: &Editor, event: EventName, handler: Subscriber) {
        editor.on(event.clone(), Rc::clone(&handler));
        self.handlers.borrow_mut().push((event, handler));
    }
}

impl Plugin for SlashCommands {
    fn name(&self) -> Option<&str> {
        Some(NAME)
    }

    fn init(&self) -> anyhow::Result<()> {
        if !self.shared.options.enabled {
            return Ok(());
        }
        let editor = upgrade(&self.shared.editor)?;

        let shared = Rc::clone(&self.shared);
        self.listen(
            &editor,
            EventName::KeyDown,
            subscriber(move |payload| {
                if let EventPayload::Key(key) = payload {
                    shared.on_key_down(key)?;
                }
                Ok(())
            }),
        );

        let shared = Rc::clone(&self.shared);
        let refresh = subscriber(move |_| Ok(shared.refresh()?));
        self.listen(&editor, EventName::Change, Rc::clone(&refresh));
        self.listen(&editor, EventName::KeyUp, refresh);
        Ok(())
    }

    fn destroy(&self) -> anyhow::Result<()> {
        let handlers = std::mem::take(&mut *self.handlers.borrow_mut());
        if let Some(editor) = self.shared.editor.upgrade() {
            for (event, handler) in handlers {
                editor.off(event, &handler);
            }
        }
        self.shared.menu.borrow_mut().hide();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quire_core::HeadlessSurface;

    fn names(commands: Vec<&'static SlashCommand>) -> Vec<&'static str> {
        commands.into_iter().map(|c| c.name).collect()
    }

    #[test]
    fn test_search() {
        assert_eq!(search("").len(), CATALOG.len());
        assert_eq!(names(search("HEAD")), vec!["Heading 1", "Heading 2", "Heading 3"]);
        assert_eq!(names(search("separator")), vec!["Divider", "Dashed Divider"]);
        assert!(search("zzz").is_empty());
    }

    #[test]
    fn test_find_ignores_case() {
        assert_eq!(find("code block").map(|c| c.action), Some(SlashAction::CodeBlock));
        assert!(find("Table").is_none());
    }

    #[test]
    fn test_catalog_plugins() {
        for command in CATALOG {
            match command.action {
                SlashAction::Markup(markup) => assert!(markup.starts_with('<')),
                action => assert!(action.plugin().is_some()),
            }
        }
    }

    #[test]
    fn test_menu_navigation_bounds() {
        let mut menu = SlashMenu::default();
        menu.show();
        menu.filter("heading".into());
        assert_eq!(menu.matches.len(), 3);
        assert_eq!(menu.selected_name(), Some("Heading 1"));
        menu.hide();
        assert_eq!(menu, SlashMenu::default());
    }

    #[test]
    fn test_markup_command_without_other_plugins() {
        let editor = Editor::builder()
            .mount(HeadlessSurface::new())
            .plugin(SlashCommands::source())
            .build()
            .unwrap();
        let slash = editor.plugins().get_as::<SlashCommands>(NAME).unwrap();

        assert_eq!(slash.run("Quote"), Ok(true));
        assert_eq!(editor.get_data(), "<blockquote>Type your quote here...</blockquote>");
        assert_eq!(
            slash.run("Nope"),
            Err(BuiltinError::UnknownVariant {
                kind: "slash command",
                value: "Nope".into()
            })
        );
    }

    #[test]
    fn test_disabled_has_no_subscriptions() {
        let editor = Editor::builder()
            .mount(HeadlessSurface::new())
            .plugin_with_options(SlashCommands::source(), serde_json::json!({ "enabled": false }))
            .build()
            .unwrap();
        assert_eq!(editor.events().subscriber_count(EventName::KeyDown), 0);
    }
}
