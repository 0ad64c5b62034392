//! Typed handles to registered plugins.
//!
//! ## Learning: Downcasting `Rc<dyn Trait>`
//!
//! `Rc<dyn Plugin>` upcasts to `Rc<dyn Any>` through `AsAnyRc`, and
//! `Rc::downcast` either hands back the concrete `Rc<T>` or returns the
//! `Rc<dyn Any>` unchanged so the next type can be tried.

use std::any::Any;
use std::rc::Rc;

use quire_core::plugin::AsAnyRc;
use quire_core::{Editor, Plugin};

use crate::{AutoSave, Callout, Code, Divider, Footnote, History, SlashCommands, WordCount};

/// A registered plugin, by kind.
#[derive(Clone)]
pub enum KnownPlugin {
    History(Rc<History>),
    WordCount(Rc<WordCount>),
    AutoSave(Rc<AutoSave>),
    Code(Rc<Code>),
    Divider(Rc<Divider>),
    Callout(Rc<Callout>),
    Footnote(Rc<Footnote>),
    SlashCommands(Rc<SlashCommands>),
    /// A plugin this crate doesn't define
    Other(Rc<dyn Plugin>),
    /// Nothing registered under the name
    Absent,
}

macro_rules! try_kind {
    ($any:ident, $ty:ty, $variant:ident) => {
        let $any = match $any.downcast::<$ty>() {
            Ok(plugin) => return KnownPlugin::$variant(plugin),
            Err(any) => any,
        };
    };
}

impl KnownPlugin {
    /// Looks a plugin up by name and identifies its kind.
    pub fn resolve(editor: &Editor, name: &str) -> Self {
        match editor.plugins().get(name) {
            Some(plugin) => Self::classify(plugin),
            None => KnownPlugin::Absent,
        }
    }

    /// Identifies a plugin's kind.
    pub fn classify(plugin: Rc<dyn Plugin>) -> Self {
        let any: Rc<dyn Any> = Rc::clone(&plugin).into_any_rc();
        try_kind!(any, History, History);
        try_kind!(any, WordCount, WordCount);
        try_kind!(any, AutoSave, AutoSave);
        try_kind!(any, Code, Code);
        try_kind!(any, Divider, Divider);
        try_kind!(any, Callout, Callout);
        try_kind!(any, Footnote, Footnote);
        try_kind!(any, SlashCommands, SlashCommands);
        drop(any);
        KnownPlugin::Other(plugin)
    }

    pub fn is_absent(&self) -> bool {
        matches!(self, KnownPlugin::Absent)
    }

    /// Kind name for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            KnownPlugin::History(_) => "history",
            KnownPlugin::WordCount(_) => "word-count",
            KnownPlugin::AutoSave(_) => "autosave",
            KnownPlugin::Code(_) => "code",
            KnownPlugin::Divider(_) => "divider",
            KnownPlugin::Callout(_) => "callout",
            KnownPlugin::Footnote(_) => "footnote",
            KnownPlugin::SlashCommands(_) => "slash-commands",
            KnownPlugin::Other(_) => "other",
            KnownPlugin::Absent => "absent",
        }
    }
}

impl std::fmt::Debug for KnownPlugin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("KnownPlugin").field(&self.kind()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quire_core::{HeadlessSurface, PluginSource};

    struct Custom;

    impl Plugin for Custom {
        fn name(&self) -> Option<&str> {
            Some("custom")
        }
    }

    #[test]
    fn test_resolves_each_kind() {
        let editor = Editor::builder()
            .mount(HeadlessSurface::new())
            .plugins([Code::source(), Divider::source(), History::source()])
            .plugin(PluginSource::instance(Custom))
            .build()
            .unwrap();

        assert!(matches!(KnownPlugin::resolve(&editor, "code"), KnownPlugin::Code(_)));
        assert!(matches!(KnownPlugin::resolve(&editor, "divider"), KnownPlugin::Divider(_)));
        assert!(matches!(KnownPlugin::resolve(&editor, "history"), KnownPlugin::History(_)));
        assert!(matches!(KnownPlugin::resolve(&editor, "custom"), KnownPlugin::Other(_)));
        assert!(KnownPlugin::resolve(&editor, "callout").is_absent());
    }

    #[test]
    fn test_kind_follows_type_not_name() {
        let editor = Editor::builder()
            .mount(HeadlessSurface::new())
            .build()
            .unwrap();
        let plugin: Rc<dyn Plugin> = Rc::new(Divider::new(&editor));
        assert_eq!(KnownPlugin::classify(plugin).kind(), "divider");
    }
}
