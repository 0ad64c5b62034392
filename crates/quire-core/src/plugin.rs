//! Plugin contract and registry.
//!
//! ## Learning: Trait Objects for Plugins
//!
//! Plugins are stored as `Rc<dyn Plugin>` so the registry can hold any
//! implementation and hand out shared handles. Getting the concrete type
//! back (to call a plugin-specific method such as "insert a code block")
//! goes through [`AsAnyRc`] and `Rc::downcast`.
//!
//! ## Learning: No Borrow Across Plugin Code
//!
//! `init` and `destroy` commonly reach back into the editor, and through
//! it into this registry. Every fan-out clones the list of handles first
//! and releases the `RefCell` borrow before calling any plugin.

use std::any::Any;
use std::cell::RefCell;
use std::rc::Rc;

use serde::de::DeserializeOwned;

use crate::editor::Editor;
use crate::guard::guarded;

/// Plugin registry errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PluginError {
    #[error("Plugin has no name")]
    MissingName,

    #[error("Plugin already registered: {0}")]
    Duplicate(String),

    #[error("Plugin factory failed: {0}")]
    FactoryFailed(String),

    #[error("Invalid options for plugin {plugin}: {message}")]
    Options { plugin: String, message: String },

    #[error("Editor has been destroyed")]
    EditorDestroyed,
}

/// Upcast to `Rc<dyn Any>` for typed lookups.
///
/// Implemented for every `'static` type; plugin authors never implement it.
pub trait AsAnyRc: Any {
    fn into_any_rc(self: Rc<Self>) -> Rc<dyn Any>;
}

impl<T: Any> AsAnyRc for T {
    fn into_any_rc(self: Rc<Self>) -> Rc<dyn Any> {
        self
    }
}

/// An editor plugin.
///
/// Every method has a default, so a plugin implements only what it needs.
/// Methods take `&self`: plugins are shared handles and keep their mutable
/// state behind `Cell`/`RefCell`.
pub trait Plugin: AsAnyRc {
    /// Unique name. When `None`, the factory name is used.
    fn name(&self) -> Option<&str> {
        None
    }

    /// Hands a ready-made instance the editor it was registered with.
    /// Factory-built plugins receive the editor in the factory instead.
    fn attach(&self, _editor: &Editor) {}

    /// Called once, after every plugin is registered.
    fn init(&self) -> anyhow::Result<()> {
        Ok(())
    }

    /// Called once at editor teardown.
    fn destroy(&self) -> anyhow::Result<()> {
        Ok(())
    }
}

/// Builds a plugin from the editor and its options.
pub type PluginFactory =
    Box<dyn FnOnce(&Editor, &serde_json::Value) -> anyhow::Result<Rc<dyn Plugin>>>;

/// How a plugin is handed to the registry.
pub enum PluginSource {
    /// Built by the registry, with a fallback name
    Factory {
        name: Option<String>,
        build: PluginFactory,
    },
    /// A ready-made instance
    Instance(Rc<dyn Plugin>),
}

impl PluginSource {
    /// A named factory.
    pub fn factory<P, F>(name: impl Into<String>, build: F) -> Self
    where
        P: Plugin,
        F: FnOnce(&Editor, &serde_json::Value) -> anyhow::Result<P> + 'static,
    {
        Self::Factory {
            name: Some(name.into()),
            build: Self::boxed(build),
        }
    }

    /// A factory without a fallback name; the plugin must name itself.
    pub fn unnamed_factory<P, F>(build: F) -> Self
    where
        P: Plugin,
        F: FnOnce(&Editor, &serde_json::Value) -> anyhow::Result<P> + 'static,
    {
        Self::Factory {
            name: None,
            build: Self::boxed(build),
        }
    }

    /// A ready-made instance.
    pub fn instance<P: Plugin>(plugin: P) -> Self {
        Self::Instance(Rc::new(plugin))
    }

    /// A ready-made instance the caller keeps a handle to.
    pub fn shared(plugin: Rc<dyn Plugin>) -> Self {
        Self::Instance(plugin)
    }

    /// The name this source will most likely register under, used to look
    /// up configured options before the plugin exists.
    pub fn name_hint(&self) -> Option<String> {
        match self {
            PluginSource::Factory { name, .. } => name.clone(),
            PluginSource::Instance(p) => p.name().map(str::to_string),
        }
    }

    fn boxed<P, F>(build: F) -> PluginFactory
    where
        P: Plugin,
        F: FnOnce(&Editor, &serde_json::Value) -> anyhow::Result<P> + 'static,
    {
        Box::new(move |editor, options| {
            let plugin: Rc<dyn Plugin> = Rc::new(build(editor, options)?);
            Ok(plugin)
        })
    }
}

impl std::fmt::Debug for PluginSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PluginSource::Factory { name, .. } => {
                f.debug_struct("Factory").field("name", name).finish_non_exhaustive()
            }
            PluginSource::Instance(p) => f.debug_tuple("Instance").field(&p.name()).finish(),
        }
    }
}

/// Deserializes plugin options, using defaults when none were given.
pub fn parse_options<T>(plugin: &str, options: &serde_json::Value) -> Result<T, PluginError>
where
    T: DeserializeOwned + Default,
{
    if options.is_null() {
        return Ok(T::default());
    }
    serde_json::from_value(options.clone()).map_err(|e| PluginError::Options {
        plugin: plugin.to_string(),
        message: e.to_string(),
    })
}

/// Lifecycle state of a registered plugin.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PluginState {
    /// Registered, `init` not run yet
    Registered,
    /// `init` succeeded
    Active,
    /// `init` failed; the plugin stays registered
    Failed,
}

struct PluginRecord {
    name: String,
    instance: Rc<dyn Plugin>,
    state: PluginState,
}

/// Named plugin instances in registration order.
#[derive(Default)]
pub struct PluginRegistry {
    records: RefCell<Vec<PluginRecord>>,
}

impl PluginRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds (or attaches) a plugin and records it under its name.
    ///
    /// Rejections are logged; the caller may ignore the error and carry on
    /// loading other plugins.
    pub fn register(
        &self,
        editor: &Editor,
        source: PluginSource,
        options: &serde_json::Value,
    ) -> Result<String, PluginError> {
        let (fallback, instance, attach) = match source {
            PluginSource::Factory { name, build } => {
                let label = name.as_deref().unwrap_or("<unnamed>").to_string();
                let built = guarded(format_args!("plugin factory '{}'", label), || {
                    build(editor, options)
                });
                match built {
                    Some(instance) => (name, instance, false),
                    None => return Err(PluginError::FactoryFailed(label)),
                }
            }
            PluginSource::Instance(instance) => (None, instance, true),
        };

        let name = instance
            .name()
            .map(str::to_string)
            .or(fallback)
            .filter(|n| !n.is_empty());
        let Some(name) = name else {
            tracing::warn!("Plugin has no name; skipped");
            return Err(PluginError::MissingName);
        };

        if self.contains(&name) {
            tracing::warn!(plugin = %name, "Plugin already registered; keeping the first");
            return Err(PluginError::Duplicate(name));
        }

        if attach {
            instance.attach(editor);
        }

        let mut records = self.records.borrow_mut();
        // attach() may have registered plugins of its own
        if records.iter().any(|r| r.name == name) {
            tracing::warn!(plugin = %name, "Plugin already registered; keeping the first");
            return Err(PluginError::Duplicate(name));
        }
        records.push(PluginRecord {
            name: name.clone(),
            instance,
            state: PluginState::Registered,
        });
        tracing::debug!(plugin = %name, "Registered plugin");
        Ok(name)
    }

    /// Runs `init` on every plugin not yet initialized, in registration
    /// order.
    pub fn init_all(&self) {
        for (name, instance) in self.snapshot() {
            if self.state(&name) == Some(PluginState::Registered) {
                self.run_init(&name, &instance);
            }
        }
    }

    /// Runs `init` on one plugin if it hasn't run yet.
    pub fn init(&self, name: &str) -> Option<PluginState> {
        let instance = self.get(name)?;
        if self.state(name) == Some(PluginState::Registered) {
            self.run_init(name, &instance);
        }
        self.state(name)
    }

    fn run_init(&self, name: &str, instance: &Rc<dyn Plugin>) {
        let ok = guarded(format_args!("init of plugin '{}'", name), || instance.init());
        let state = if ok.is_some() {
            PluginState::Active
        } else {
            PluginState::Failed
        };
        if let Some(record) = self.records.borrow_mut().iter_mut().find(|r| r.name == name) {
            record.state = state;
        }
    }

    /// Runs `destroy` on every plugin, then empties the registry.
    pub fn destroy_all(&self) {
        for (name, instance) in self.snapshot() {
            guarded(format_args!("destroy of plugin '{}'", name), || {
                instance.destroy()
            });
        }
        let records = std::mem::take(&mut *self.records.borrow_mut());
        tracing::debug!(count = records.len(), "Plugins torn down");
    }

    // ==================== Lookups ====================

    /// A plugin by name.
    pub fn get(&self, name: &str) -> Option<Rc<dyn Plugin>> {
        self.records
            .borrow()
            .iter()
            .find(|r| r.name == name)
            .map(|r| Rc::clone(&r.instance))
    }

    /// A plugin by name, as its concrete type.
    pub fn get_as<T: Plugin>(&self, name: &str) -> Option<Rc<T>> {
        self.get(name)?.into_any_rc().downcast::<T>().ok()
    }

    /// The lifecycle state of a plugin.
    pub fn state(&self, name: &str) -> Option<PluginState> {
        self.records
            .borrow()
            .iter()
            .find(|r| r.name == name)
            .map(|r| r.state)
    }

    /// Plugin names in registration order.
    pub fn names(&self) -> Vec<String> {
        self.records.borrow().iter().map(|r| r.name.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.records.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.borrow().is_empty()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.records.borrow().iter().any(|r| r.name == name)
    }

    fn snapshot(&self) -> Vec<(String, Rc<dyn Plugin>)> {
        self.records
            .borrow()
            .iter()
            .map(|r| (r.name.clone(), Rc::clone(&r.instance)))
            .collect()
    }
}

impl std::fmt::Debug for PluginRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PluginRegistry")
            .field("plugins", &self.names())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::HeadlessSurface;
    use serde::Deserialize;
    use std::cell::Cell;

    struct Counting {
        name: &'static str,
        inits: Cell<usize>,
        fail_init: bool,
    }

    impl Counting {
        fn new(name: &'static str) -> Self {
            Self {
                name,
                inits: Cell::new(0),
                fail_init: false,
            }
        }
    }

    impl Plugin for Counting {
        fn name(&self) -> Option<&str> {
            Some(self.name)
        }

        fn init(&self) -> anyhow::Result<()> {
            self.inits.set(self.inits.get() + 1);
            if self.fail_init {
                anyhow::bail!("init failed on purpose");
            }
            Ok(())
        }
    }

    struct Nameless;
    impl Plugin for Nameless {}

    fn editor() -> Editor {
        Editor::builder()
            .mount(HeadlessSurface::new())
            .build()
            .unwrap()
    }

    #[test]
    fn test_duplicate_keeps_first_and_inits_once() {
        let editor = editor();
        let registry = PluginRegistry::new();
        let first = Rc::new(Counting::new("Foo"));
        let second = Rc::new(Counting::new("Foo"));

        assert_eq!(
            registry.register(&editor, PluginSource::shared(first.clone()), &serde_json::Value::Null),
            Ok("Foo".to_string())
        );
        assert_eq!(
            registry.register(&editor, PluginSource::shared(second.clone()), &serde_json::Value::Null),
            Err(PluginError::Duplicate("Foo".into()))
        );

        registry.init_all();
        assert_eq!(first.inits.get(), 1);
        assert_eq!(second.inits.get(), 0);
        assert_eq!(registry.len(), 1);

        let found = registry.get_as::<Counting>("Foo").unwrap();
        assert!(Rc::ptr_eq(&found, &first));
    }

    #[test]
    fn test_failing_init_is_isolated() {
        let editor = editor();
        let registry = PluginRegistry::new();
        let a = Rc::new(Counting::new("A"));
        let b = Rc::new(Counting {
            fail_init: true,
            ..Counting::new("B")
        });
        let c = Rc::new(Counting::new("C"));
        for p in [a.clone(), b.clone(), c.clone()] {
            registry
                .register(&editor, PluginSource::shared(p), &serde_json::Value::Null)
                .unwrap();
        }

        registry.init_all();
        assert_eq!((a.inits.get(), b.inits.get(), c.inits.get()), (1, 1, 1));
        assert_eq!(registry.state("A"), Some(PluginState::Active));
        assert_eq!(registry.state("B"), Some(PluginState::Failed));
        assert_eq!(registry.state("C"), Some(PluginState::Active));
        assert_eq!(registry.names(), vec!["A", "B", "C"]);
    }

    #[test]
    fn test_factory_name_fallback_and_failures() {
        let editor = editor();
        let registry = PluginRegistry::new();

        let named = registry.register(
            &editor,
            PluginSource::factory("Fallback", |_, _| Ok(Nameless)),
            &serde_json::Value::Null,
        );
        assert_eq!(named, Ok("Fallback".to_string()));

        let unnamed = registry.register(
            &editor,
            PluginSource::unnamed_factory(|_, _| Ok(Nameless)),
            &serde_json::Value::Null,
        );
        assert_eq!(unnamed, Err(PluginError::MissingName));

        let failing = registry.register(
            &editor,
            PluginSource::factory("Broken", |_, _| -> anyhow::Result<Nameless> {
                anyhow::bail!("no")
            }),
            &serde_json::Value::Null,
        );
        assert_eq!(failing, Err(PluginError::FactoryFailed("Broken".into())));
        assert_eq!(registry.names(), vec!["Fallback"]);
    }

    #[test]
    fn test_typed_lookup_wrong_type() {
        let editor = editor();
        let registry = PluginRegistry::new();
        registry
            .register(&editor, PluginSource::instance(Counting::new("P")), &serde_json::Value::Null)
            .unwrap();
        assert!(registry.get_as::<Nameless>("P").is_none());
        assert!(registry.get_as::<Counting>("missing").is_none());
    }

    #[test]
    fn test_destroy_all_empties_even_on_failure() {
        struct BadDestroy;
        impl Plugin for BadDestroy {
            fn name(&self) -> Option<&str> {
                Some("Bad")
            }
            fn destroy(&self) -> anyhow::Result<()> {
                panic!("destroy exploded")
            }
        }

        let editor = editor();
        let registry = PluginRegistry::new();
        registry
            .register(&editor, PluginSource::instance(BadDestroy), &serde_json::Value::Null)
            .unwrap();
        registry
            .register(&editor, PluginSource::instance(Counting::new("Ok")), &serde_json::Value::Null)
            .unwrap();

        registry.destroy_all();
        assert!(registry.is_empty());
    }

    #[test]
    fn test_parse_options() {
        #[derive(Debug, Default, Deserialize, PartialEq)]
        #[serde(default)]
        struct Opts {
            interval: u64,
        }

        assert_eq!(parse_options::<Opts>("X", &serde_json::Value::Null), Ok(Opts::default()));
        assert_eq!(
            parse_options::<Opts>("X", &serde_json::json!({ "interval": 5 })),
            Ok(Opts { interval: 5 })
        );
        assert!(matches!(
            parse_options::<Opts>("X", &serde_json::json!({ "interval": "soon" })),
            Err(PluginError::Options { .. })
        ));
    }
}
