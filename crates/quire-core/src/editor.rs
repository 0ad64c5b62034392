//! The editor facade.
//!
//! ## Learning: The Facade Pattern
//!
//! `Editor` is the one object hosts and plugins talk to. It composes the
//! event bus, command stack, selection store and plugin registry, and it
//! owns the translation of native platform events into semantic ones.
//!
//! ## Learning: `Rc` Handles and `Weak` Back-References
//!
//! `Editor` is a cheap clone of an `Rc`. Plugins and subscriber closures
//! keep a [`WeakEditor`] instead, so the editor's own tables never keep
//! the editor alive; `destroy()` clears those tables regardless.

use std::cell::Cell;
use std::path::Path;
use std::rc::{Rc, Weak};

use quire_document::markup::parse_fragment;
use quire_document::SanitizePolicy;

use crate::command::{Command, CommandStack, StackOutcome};
use crate::config::EditorConfig;
use crate::edits::{CaretSlot, InsertMarkup, InsertText};
use crate::event::{EventBus, EventName, EventPayload, Subscriber};
use crate::input::NativeEvent;
use crate::plugin::{PluginError, PluginRegistry, PluginSource};
use crate::selection::SelectionStore;
use crate::surface::{EditableSurface, MountOptions, PlatformTextSurface};
use crate::{CoreError, CoreResult};

/// Identifies an editor instance in logs and persisted drafts.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EditorId(String);

impl EditorId {
    /// A fresh random id.
    pub fn generate() -> Self {
        Self(format!("quire-{}", uuid::Uuid::new_v4()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for EditorId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl std::fmt::Display for EditorId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Where the editor is in its life.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Lifecycle {
    /// Subsystems exist, plugins not loaded
    #[default]
    Constructed,
    /// Plugins are being registered and initialized
    Initializing,
    /// Accepting input
    Ready,
    /// Teardown is running; new operations are already inert
    Destroying,
    /// Torn down; every operation is inert
    Destroyed,
}

struct EditorInner {
    id: EditorId,
    config: EditorConfig,
    sanitizer: SanitizePolicy,
    surface: EditableSurface,
    events: EventBus,
    commands: CommandStack,
    selection: SelectionStore,
    plugins: PluginRegistry,
    lifecycle: Cell<Lifecycle>,
}

/// Shared handle to an editor.
#[derive(Clone)]
pub struct Editor {
    inner: Rc<EditorInner>,
}

/// Non-owning handle to an editor, for plugins and callbacks.
#[derive(Clone, Default)]
pub struct WeakEditor {
    inner: Weak<EditorInner>,
}

impl WeakEditor {
    /// The editor, if it is still alive.
    pub fn upgrade(&self) -> Option<Editor> {
        self.inner.upgrade().map(|inner| Editor { inner })
    }
}

impl std::fmt::Debug for WeakEditor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WeakEditor")
            .field("alive", &(self.inner.strong_count() > 0))
            .finish()
    }
}

/// Builds an [`Editor`]: mount the surface, load plugins, set content.
pub struct EditorBuilder {
    config: EditorConfig,
    platform: Option<Box<dyn PlatformTextSurface>>,
    plugins: Vec<(PluginSource, Option<serde_json::Value>)>,
}

impl EditorBuilder {
    fn new() -> Self {
        Self {
            config: EditorConfig::default(),
            platform: None,
            plugins: Vec::new(),
        }
    }

    /// Replaces the configuration.
    pub fn config(mut self, config: EditorConfig) -> Self {
        self.config = config;
        self
    }

    /// Loads the configuration from a TOML file.
    pub fn config_file(self, path: impl AsRef<Path>) -> CoreResult<Self> {
        let config = EditorConfig::load_from(path)?;
        Ok(self.config(config))
    }

    /// The platform surface to mount on. Required.
    pub fn mount(self, platform: impl PlatformTextSurface + 'static) -> Self {
        self.mount_boxed(Box::new(platform))
    }

    pub fn mount_boxed(mut self, platform: Box<dyn PlatformTextSurface>) -> Self {
        self.platform = Some(platform);
        self
    }

    /// Adds a plugin; options come from `config.plugin_options`.
    pub fn plugin(mut self, source: PluginSource) -> Self {
        self.plugins.push((source, None));
        self
    }

    /// Adds a plugin with explicit options.
    pub fn plugin_with_options(mut self, source: PluginSource, options: serde_json::Value) -> Self {
        self.plugins.push((source, Some(options)));
        self
    }

    /// Adds several plugins.
    pub fn plugins(mut self, sources: impl IntoIterator<Item = PluginSource>) -> Self {
        self.plugins.extend(sources.into_iter().map(|s| (s, None)));
        self
    }

    /// Mounts the surface and brings the editor to `Ready`.
    ///
    /// Only a missing or failing mount is an error; plugin problems are
    /// logged and skipped.
    pub fn build(self) -> CoreResult<Editor> {
        let Some(mut platform) = self.platform else {
            tracing::error!("Editor has no mount point");
            return Err(CoreError::MissingMount);
        };

        let config = self.config;
        let options = MountOptions {
            editable: !config.read_only,
            placeholder: config.placeholder.clone(),
            theme: config.theme.clone(),
        };
        if let Err(e) = platform.mount(&options) {
            tracing::error!("Failed to mount editor surface: {}", e);
            return Err(CoreError::Mount(e));
        }

        let id = config
            .id
            .clone()
            .map(EditorId::from)
            .unwrap_or_else(EditorId::generate);
        let surface = EditableSurface::new(platform);
        let events = EventBus::new();
        let commands = CommandStack::new(surface.clone(), events.clone(), config.undo_limit);
        let selection = SelectionStore::new(surface.clone());

        let editor = Editor {
            inner: Rc::new(EditorInner {
                id,
                sanitizer: SanitizePolicy::default(),
                surface,
                events,
                commands,
                selection,
                plugins: PluginRegistry::new(),
                lifecycle: Cell::new(Lifecycle::Constructed),
                config,
            }),
        };

        editor.inner.lifecycle.set(Lifecycle::Initializing);
        for (source, options) in self.plugins {
            let options = options.unwrap_or_else(|| {
                source
                    .name_hint()
                    .map(|name| editor.config().plugin_options(&name))
                    .unwrap_or(serde_json::Value::Null)
            });
            // Rejections are logged by the registry
            let _ = editor.inner.plugins.register(&editor, source, &options);
        }
        editor.inner.plugins.init_all();

        let content = editor.config().content.clone();
        editor.set_data(&content);

        editor.inner.lifecycle.set(Lifecycle::Ready);
        tracing::info!(
            editor = %editor.id(),
            plugins = editor.inner.plugins.len(),
            "Editor ready"
        );
        editor.trigger(EventName::Ready, &EventPayload::None);
        Ok(editor)
    }
}

impl Editor {
    /// Starts building an editor.
    pub fn builder() -> EditorBuilder {
        EditorBuilder::new()
    }

    /// A non-owning handle.
    pub fn downgrade(&self) -> WeakEditor {
        WeakEditor {
            inner: Rc::downgrade(&self.inner),
        }
    }

    pub fn id(&self) -> &EditorId {
        &self.inner.id
    }

    pub fn config(&self) -> &EditorConfig {
        &self.inner.config
    }

    pub fn lifecycle(&self) -> Lifecycle {
        self.inner.lifecycle.get()
    }

    /// True once teardown has started.
    pub fn is_destroyed(&self) -> bool {
        matches!(
            self.lifecycle(),
            Lifecycle::Destroying | Lifecycle::Destroyed
        )
    }

    /// Fails with [`CoreError::Destroyed`] once the editor is torn down.
    pub fn ensure_alive(&self) -> CoreResult<()> {
        if self.is_destroyed() {
            Err(CoreError::Destroyed)
        } else {
            Ok(())
        }
    }

    /// Logs and returns false when the editor is destroyed.
    fn live(&self, operation: &str) -> bool {
        match self.ensure_alive() {
            Ok(()) => true,
            Err(e) => {
                tracing::debug!(operation, "Ignored: {}", e);
                false
            }
        }
    }

    // ==================== Subsystems ====================

    /// The document and the platform it is shown on.
    pub fn surface(&self) -> &EditableSurface {
        &self.inner.surface
    }

    pub fn events(&self) -> &EventBus {
        &self.inner.events
    }

    pub fn commands(&self) -> &CommandStack {
        &self.inner.commands
    }

    pub fn selection(&self) -> &SelectionStore {
        &self.inner.selection
    }

    pub fn plugins(&self) -> &PluginRegistry {
        &self.inner.plugins
    }

    /// Registers a plugin after construction. It is initialized right away
    /// when the editor is already ready.
    pub fn register_plugin(
        &self,
        source: PluginSource,
        options: &serde_json::Value,
    ) -> Result<String, PluginError> {
        if self.is_destroyed() {
            return Err(PluginError::EditorDestroyed);
        }
        let name = self.inner.plugins.register(self, source, options)?;
        if self.lifecycle() == Lifecycle::Ready {
            self.inner.plugins.init(&name);
        }
        Ok(name)
    }

    // ==================== Events ====================

    pub fn on(&self, event: impl Into<EventName>, callback: Subscriber) {
        if self.live("on") {
            self.inner.events.on(event, callback);
        }
    }

    /// Still works while teardown runs, so plugins can unsubscribe.
    pub fn off(&self, event: impl Into<EventName>, callback: &Subscriber) {
        if self.lifecycle() != Lifecycle::Destroyed {
            self.inner.events.off(event, callback);
        }
    }

    pub fn trigger(&self, event: impl Into<EventName>, payload: &EventPayload) {
        if self.live("trigger") {
            self.inner.events.trigger(event, payload);
        }
    }

    // ==================== Content ====================

    /// The document as markup.
    pub fn get_data(&self) -> String {
        self.inner.surface.to_markup()
    }

    /// Replaces the document. Not undoable: history and the saved
    /// selection refer to the old nodes and are dropped.
    pub fn set_data(&self, markup: &str) {
        if !self.live("set_data") {
            return;
        }
        let markup = if self.inner.config.sanitize {
            self.inner.sanitizer.sanitize_markup(markup)
        } else {
            markup.to_string()
        };
        self.inner.surface.replace_markup(&markup);
        self.forget_history();
        self.trigger(EventName::Change, &EventPayload::None);
    }

    /// Plain text of the document.
    pub fn text(&self) -> String {
        self.inner.surface.read().text_content()
    }

    fn forget_history(&self) {
        self.inner.commands.clear();
        self.inner.selection.clear_saved();
    }

    // ==================== Commands ====================

    /// Runs an undoable command.
    pub fn execute(&self, command: Box<dyn Command>) -> StackOutcome {
        if !self.live("execute") {
            return StackOutcome::Rejected;
        }
        self.inner.commands.execute(command)
    }

    pub fn undo(&self) -> StackOutcome {
        if !self.live("undo") {
            return StackOutcome::Empty;
        }
        self.inner.commands.undo()
    }

    pub fn redo(&self) -> StackOutcome {
        if !self.live("redo") {
            return StackOutcome::Empty;
        }
        self.inner.commands.redo()
    }

    /// Inserts markup at the current range, replacing a single-node
    /// selection, and puts the caret after it.
    ///
    /// Plugin markup is trusted; pasted markup is sanitized before it gets
    /// here.
    pub fn insert_markup(&self, markup: &str) -> StackOutcome {
        if !self.live("insert_markup") {
            return StackOutcome::Rejected;
        }
        let nodes = parse_fragment(markup);
        let caret = CaretSlot::default();
        let command = InsertMarkup::new(self.inner.selection.get_range(), nodes)
            .with_caret(Rc::clone(&caret));
        self.execute_with_caret(Box::new(command), &caret)
    }

    /// Inserts plain text at the current range, replacing a single-node
    /// selection, and puts the caret after it.
    pub fn insert_text(&self, text: &str) -> StackOutcome {
        if !self.live("insert_text") {
            return StackOutcome::Rejected;
        }
        let caret = CaretSlot::default();
        let command =
            InsertText::new(self.inner.selection.get_range(), text).with_caret(Rc::clone(&caret));
        self.execute_with_caret(Box::new(command), &caret)
    }

    fn execute_with_caret(&self, command: Box<dyn Command>, caret: &CaretSlot) -> StackOutcome {
        let outcome = self.inner.commands.execute(command);
        if outcome == StackOutcome::Applied {
            if let Some(point) = caret.get() {
                self.inner.selection.set_caret(point);
            }
        }
        outcome
    }

    /// Runs a named editor command.
    ///
    /// `undo`, `redo`, `insertHTML` and `insertText` are handled by the
    /// core; every other name goes to the platform's native formatting.
    /// Returns true if something was applied. Failures are logged.
    pub fn exec_command(&self, name: &str, value: Option<&str>) -> bool {
        if !self.live("exec_command") {
            return false;
        }

        self.inner.selection.restore_selection();
        self.inner.surface.with_platform(|p| p.focus());

        let applied = match name {
            "undo" => self.inner.commands.undo() == StackOutcome::Applied,
            "redo" => self.inner.commands.redo() == StackOutcome::Applied,
            "insertHTML" => self.insert_markup(value.unwrap_or_default()) == StackOutcome::Applied,
            "insertText" => self.insert_text(value.unwrap_or_default()) == StackOutcome::Applied,
            _ => return self.exec_native(name, value),
        };
        self.inner.selection.save_selection();
        applied
    }

    fn exec_native(&self, name: &str, value: Option<&str>) -> bool {
        if let Err(e) = self
            .inner
            .surface
            .with_platform(|p| p.exec_native(name, value))
        {
            tracing::error!(command = name, "Command failed: {}", e);
            return false;
        }

        self.inner.surface.pull_from_platform();
        self.inner.selection.save_selection();
        self.trigger(EventName::Change, &EventPayload::None);
        self.trigger(EventName::SelectionChange, &EventPayload::None);
        true
    }

    // ==================== Native events ====================

    /// Translates a platform event into editor behaviour.
    ///
    /// Returns true when the platform's default action must be suppressed.
    pub fn handle_native_event(&self, event: NativeEvent) -> bool {
        if !self.live("handle_native_event") {
            return false;
        }
        let read_only = self.inner.config.read_only;

        match event {
            NativeEvent::Input => {
                if read_only {
                    return false;
                }
                self.inner.surface.pull_from_platform();
                self.trigger(EventName::Change, &EventPayload::None);
                false
            }
            NativeEvent::KeyDown(key) => {
                let shortcut = key.shortcut();
                self.trigger(EventName::KeyDown, &EventPayload::Key(key));
                match shortcut {
                    Some(command) if !read_only => {
                        self.exec_command(command, None);
                        true
                    }
                    _ => false,
                }
            }
            NativeEvent::KeyUp(key) => {
                self.inner.selection.save_selection();
                self.trigger(EventName::KeyUp, &EventPayload::Key(key));
                false
            }
            NativeEvent::MouseUp => {
                self.inner.selection.save_selection();
                self.trigger(EventName::MouseUp, &EventPayload::None);
                self.trigger(EventName::SelectionChange, &EventPayload::None);
                false
            }
            NativeEvent::Focus => {
                self.trigger(EventName::Focus, &EventPayload::None);
                false
            }
            NativeEvent::Blur => {
                self.trigger(EventName::Blur, &EventPayload::None);
                false
            }
            NativeEvent::Paste(clipboard) => {
                if read_only || !self.inner.config.sanitize {
                    return false;
                }
                if let Some(markup) = clipboard.to_insertable(&self.inner.sanitizer) {
                    self.exec_command("insertHTML", Some(&markup));
                }
                true
            }
        }
    }

    // ==================== Teardown ====================

    /// Tears the editor down. Later calls, including ones made from
    /// destroy subscribers or plugin teardown, warn and return.
    pub fn destroy(&self) {
        if self.is_destroyed() {
            tracing::warn!(editor = %self.id(), "Editor already destroyed");
            return;
        }
        self.inner.lifecycle.set(Lifecycle::Destroying);

        // Straight to the bus: trigger() is already inert
        self.inner
            .events
            .trigger(EventName::Destroy, &EventPayload::None);
        self.inner.plugins.destroy_all();
        self.inner.surface.with_platform(|p| p.unmount());
        self.inner.events.clear();
        self.forget_history();
        self.inner.lifecycle.set(Lifecycle::Destroyed);
        tracing::info!(editor = %self.id(), "Editor destroyed");
    }
}

impl std::fmt::Debug for Editor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Editor")
            .field("id", &self.inner.id)
            .field("lifecycle", &self.lifecycle())
            .field("plugins", &self.inner.plugins)
            .field("commands", &self.inner.commands)
            .finish()
    }
}
