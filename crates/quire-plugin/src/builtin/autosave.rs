//! Debounced auto-save through an injected async store.
//!
//! ## Learning: `!Send` Editors and `Send` Tasks
//!
//! The editor lives on one thread behind `Rc`, but the save itself runs on
//! the host's tokio runtime. The change handler therefore snapshots
//! everything the task needs (the markup, the editor id, an `Arc` of the
//! store) and spawns a task that never touches the editor. The status the
//! task reports goes through an `Arc<Mutex<_>>`.
//!
//! Each change aborts the pending task before spawning a new one, so only
//! the last change in a burst is written.

use std::cell::RefCell;
use std::future::Future;
use std::pin::Pin;
use std::rc::Rc;
use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use quire_core::plugin::parse_options;
use quire_core::{
    subscriber, Editor, EventName, EventPayload, Plugin, PluginSource, Subscriber, WeakEditor,
};
use serde::{Deserialize, Serialize};
use tokio::runtime::Handle;
use tokio::task::JoinHandle;

use crate::upgrade;

pub const NAME: &str = "autosave";

/// Event emitted after a save requested through [`AutoSave::save_now`].
pub const SAVED_EVENT: &str = "autosave";

/// A boxed, sendable future.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// A saved snapshot of the document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Draft {
    pub content: String,
    /// Milliseconds since the Unix epoch
    pub timestamp_ms: u64,
    pub editor_id: String,
}

impl Draft {
    pub fn new(content: impl Into<String>, editor_id: impl Into<String>) -> Self {
        let timestamp_ms = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0);
        Self {
            content: content.into(),
            timestamp_ms,
            editor_id: editor_id.into(),
        }
    }
}

/// Where drafts go. Implemented by the host (local storage, a file, an
/// HTTP endpoint).
pub trait DraftStore: Send + Sync {
    fn save(&self, draft: Draft) -> BoxFuture<'_, anyhow::Result<()>>;
    fn load(&self) -> BoxFuture<'_, anyhow::Result<Option<Draft>>>;
    fn clear(&self) -> BoxFuture<'_, anyhow::Result<()>>;
}

/// A store that keeps the latest draft in memory.
#[derive(Debug, Clone, Default)]
pub struct MemoryDraftStore {
    inner: Arc<Mutex<MemoryInner>>,
}

#[derive(Debug, Default)]
struct MemoryInner {
    draft: Option<Draft>,
    saves: usize,
}

impl MemoryDraftStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// The stored draft.
    pub fn draft(&self) -> Option<Draft> {
        self.inner.lock().ok().and_then(|inner| inner.draft.clone())
    }

    /// How many times `save` ran.
    pub fn save_count(&self) -> usize {
        self.inner.lock().map(|inner| inner.saves).unwrap_or(0)
    }

    fn with_inner<T>(&self, f: impl FnOnce(&mut MemoryInner) -> T) -> anyhow::Result<T> {
        let mut inner = self
            .inner
            .lock()
            .map_err(|_| anyhow::anyhow!("draft store lock poisoned"))?;
        Ok(f(&mut inner))
    }
}

impl DraftStore for MemoryDraftStore {
    fn save(&self, draft: Draft) -> BoxFuture<'_, anyhow::Result<()>> {
        let result = self.with_inner(|inner| {
            inner.draft = Some(draft);
            inner.saves += 1;
        });
        Box::pin(std::future::ready(result))
    }

    fn load(&self) -> BoxFuture<'_, anyhow::Result<Option<Draft>>> {
        let result = self.with_inner(|inner| inner.draft.clone());
        Box::pin(std::future::ready(result))
    }

    fn clear(&self) -> BoxFuture<'_, anyhow::Result<()>> {
        let result = self.with_inner(|inner| inner.draft = None);
        Box::pin(std::future::ready(result))
    }
}

/// Plugin options.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AutoSaveOptions {
    pub enabled: bool,
    /// Quiet period before a save, in milliseconds
    pub interval_ms: u64,
}

impl Default for AutoSaveOptions {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_ms: 2000,
        }
    }
}

/// Outcome of the saves so far.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SaveStatus {
    pub saves: u64,
    pub last_saved_ms: Option<u64>,
    pub last_error: Option<String>,
}

impl SaveStatus {
    fn record(status: &Mutex<SaveStatus>, draft: &Draft, result: anyhow::Result<()>) {
        let Ok(mut status) = status.lock() else {
            return;
        };
        match result {
            Ok(()) => {
                status.saves += 1;
                status.last_saved_ms = Some(draft.timestamp_ms);
                status.last_error = None;
            }
            Err(e) => {
                tracing::error!(editor = %draft.editor_id, "Auto-save failed: {:#}", e);
                status.last_error = Some(e.to_string());
            }
        }
    }
}

pub struct AutoSave {
    editor: WeakEditor,
    store: Arc<dyn DraftStore>,
    options: AutoSaveOptions,
    status: Arc<Mutex<SaveStatus>>,
    pending: Rc<RefCell<Option<JoinHandle<()>>>>,
    handler: RefCell<Option<Subscriber>>,
}

impl AutoSave {
    pub fn new(editor: &Editor, store: Arc<dyn DraftStore>, options: AutoSaveOptions) -> Self {
        Self {
            editor: editor.downgrade(),
            store,
            options,
            status: Arc::new(Mutex::new(SaveStatus::default())),
            pending: Rc::new(RefCell::new(None)),
            handler: RefCell::new(None),
        }
    }

    /// Registry source saving into `store`; options come from the config.
    pub fn source(store: Arc<dyn DraftStore>) -> PluginSource {
        PluginSource::factory(NAME, move |editor, options| {
            let options = parse_options(NAME, options)?;
            Ok(AutoSave::new(editor, store, options))
        })
    }

    pub fn options(&self) -> &AutoSaveOptions {
        &self.options
    }

    pub fn status(&self) -> SaveStatus {
        self.status
            .lock()
            .map(|status| status.clone())
            .unwrap_or_default()
    }

    /// Whether the plugin is listening for changes.
    pub fn is_active(&self) -> bool {
        self.handler.borrow().is_some()
    }

    /// Whether a debounced save is waiting.
    pub fn has_pending(&self) -> bool {
        self.pending
            .borrow()
            .as_ref()
            .is_some_and(|task| !task.is_finished())
    }

    /// Saves right away and emits [`SAVED_EVENT`]. Empty documents are not
    /// saved. Returns whether a draft was written.
    pub async fn save_now(&self) -> bool {
        let Some(editor) = self.editor.upgrade() else {
            return false;
        };
        if let Some(task) = self.pending.borrow_mut().take() {
            task.abort();
        }
        let content = editor.get_data();
        if content.trim().is_empty() {
            return false;
        }
        let draft = Draft::new(content, editor.id().as_str());
        let result = self.store.save(draft.clone()).await;
        let saved = result.is_ok();
        SaveStatus::record(&self.status, &draft, result);

        if saved {
            let payload = serde_json::to_value(&draft).unwrap_or_default();
            editor.trigger(SAVED_EVENT, &EventPayload::Value(payload));
        }
        saved
    }

    /// The stored draft. Store failures are logged and read as no draft.
    pub async fn load_draft(&self) -> Option<Draft> {
        match self.store.load().await {
            Ok(draft) => draft,
            Err(e) => {
                tracing::error!("Failed to load draft: {:#}", e);
                None
            }
        }
    }

    /// Replaces the document with the stored draft, if there is one.
    pub async fn restore_draft(&self) -> bool {
        let Some(draft) = self.load_draft().await else {
            return false;
        };
        match upgrade(&self.editor) {
            Ok(editor) => {
                editor.set_data(&draft.content);
                tracing::info!(editor = %editor.id(), "Restored draft");
                true
            }
            Err(_) => false,
        }
    }

    /// Removes the stored draft.
    pub async fn clear_draft(&self) -> bool {
        match self.store.clear().await {
            Ok(()) => true,
            Err(e) => {
                tracing::error!("Failed to clear draft: {:#}", e);
                false
            }
        }
    }

    fn stop(&self) {
        if let Some(task) = self.pending.borrow_mut().take() {
            task.abort();
        }
    }
}

impl Plugin for AutoSave {
    fn name(&self) -> Option<&str> {
        Some(NAME)
    }

    fn init(&self) -> anyhow::Result<()> {
        if !self.options.enabled {
            tracing::debug!("Auto-save disabled");
            return Ok(());
        }
        let Ok(runtime) = Handle::try_current() else {
            tracing::warn!("Auto-save needs a tokio runtime; disabled");
            return Ok(());
        };
        let editor = upgrade(&self.editor)?;

        let weak = self.editor.clone();
        let store = Arc::clone(&self.store);
        let status = Arc::clone(&self.status);
        let pending = Rc::clone(&self.pending);
        let interval = Duration::from_millis(self.options.interval_ms);

        let handler = subscriber(move |_| {
            let Some(editor) = weak.upgrade() else {
                return Ok(());
            };
            if let Some(task) = pending.borrow_mut().take() {
                task.abort();
            }
            let content = editor.get_data();
            if content.trim().is_empty() {
                return Ok(());
            }

            let draft = Draft::new(content, editor.id().as_str());
            let store = Arc::clone(&store);
            let status = Arc::clone(&status);
            let task = runtime.spawn(async move {
                tokio::time::sleep(interval).await;
                let result = store.save(draft.clone()).await;
                SaveStatus::record(&status, &draft, result);
            });
            *pending.borrow_mut() = Some(task);
            Ok(())
        });

        editor.on(EventName::Change, Rc::clone(&handler));
        *self.handler.borrow_mut() = Some(handler);
        tracing::debug!(interval_ms = self.options.interval_ms, "Auto-save enabled");
        Ok(())
    }

    fn destroy(&self) -> anyhow::Result<()> {
        self.stop();
        let handler = self.handler.borrow_mut().take();
        if let (Some(editor), Some(handler)) = (self.editor.upgrade(), handler) {
            editor.off(EventName::Change, &handler);
        }
        Ok(())
    }
}
