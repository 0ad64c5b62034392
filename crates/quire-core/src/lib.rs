//! # Quire Core
//!
//! Coordination layer of the editor: events, commands, selection and
//! plugins, composed behind the [`Editor`] facade.
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                        Editor                            │
//! │  ┌──────────┐ ┌──────────────┐ ┌──────────────────────┐  │
//! │  │ EventBus │ │ CommandStack │ │    PluginRegistry    │  │
//! │  └──────────┘ └──────┬───────┘ └──────────────────────┘  │
//! │  ┌────────────────┐  │                                   │
//! │  │ SelectionStore │  │                                   │
//! │  └───────┬────────┘  │                                   │
//! │  ┌───────┴───────────┴─────────────────────────────┐     │
//! │  │  EditableSurface: Document ──render──▶ Platform │     │
//! │  └─────────────────────────────────────────────────┘     │
//! └──────────────────────────────────────────────────────────┘
//! ```
//!
//! Native events enter through [`Editor::handle_native_event`], become
//! semantic events on the [`EventBus`], and plugins react by executing
//! commands. Committed edits re-render the platform and emit `change`.
//!
//! ## Learning: Module Organization
//!
//! - `mod foo;` looks for `foo.rs` or `foo/mod.rs`
//! - `pub use` re-exports items for cleaner public APIs

pub mod command;
pub mod config;
pub mod edits;
pub mod editor;
pub mod event;
pub mod guard;
pub mod headless;
pub mod input;
pub mod plugin;
pub mod selection;
pub mod surface;

pub use command::{Command, CommandStack, FnCommand, StackOutcome};
pub use config::{ConfigError, EditorConfig};
pub use edits::{InsertMarkup, InsertText};
pub use editor::{Editor, EditorBuilder, EditorId, Lifecycle, WeakEditor};
pub use event::{subscriber, EventBus, EventName, EventPayload, Subscriber};
pub use headless::HeadlessSurface;
pub use input::{ClipboardData, KeyEvent, Modifiers, NativeEvent};
pub use plugin::{Plugin, PluginError, PluginRegistry, PluginSource, PluginState};
pub use selection::{RestoreOutcome, SavedSelection, SelectionStore};
pub use surface::{EditableSurface, MountOptions, NativeSelection, PlatformTextSurface, SurfaceError};

/// Result type for core operations
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors that reach the integrating application.
///
/// Everything that happens after construction (plugin, command and
/// listener failures) is logged and contained instead.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("No mount point was given")]
    MissingMount,

    #[error("Mount failed: {0}")]
    Mount(#[from] SurfaceError),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    #[error("Editor has been destroyed")]
    Destroyed,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        assert_eq!(CoreError::MissingMount.to_string(), "No mount point was given");
        let mount: CoreError = SurfaceError::Detached.into();
        assert_eq!(mount.to_string(), "Mount failed: Surface is not mounted");
    }

    #[test]
    fn test_config_file_errors_surface() {
        let dir = tempfile::tempdir().unwrap();
        let result = Editor::builder().config_file(dir.path().join("missing.toml"));
        assert!(matches!(result, Err(CoreError::Config(ConfigError::Io(_)))));
    }
}
