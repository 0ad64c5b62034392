//! Editor configuration.
//!
//! ## Learning: Serde for Serialization
//!
//! `#[serde(default)]` fills missing fields from `Default::default()`, so
//! a config file only needs to name what it changes:
//!
//! ```toml
//! placeholder = "Start writing..."
//! sanitize = true
//! preset = "standard"
//!
//! [plugin_options.AutoSave]
//! interval_ms = 5000
//! ```

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::command::DEFAULT_MAX_STACK_SIZE;

/// Editor configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EditorConfig {
    /// Editor id; generated when absent
    pub id: Option<String>,

    /// Initial markup
    pub content: String,

    /// Hint shown while the document is empty
    pub placeholder: Option<String>,

    /// Mount the surface without editing
    pub read_only: bool,

    /// Theme name passed to the platform
    pub theme: String,

    /// Sanitize pasted markup and `set_data` input
    pub sanitize: bool,

    /// Maximum undo depth
    pub undo_limit: usize,

    /// Named plugin preset (`basic`, `standard`, `full`)
    pub preset: Option<String>,

    /// Per-plugin options, keyed by plugin name
    pub plugin_options: HashMap<String, serde_json::Value>,
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            id: None,
            content: String::new(),
            placeholder: Some("Type here...".to_string()),
            read_only: false,
            theme: "default".to_string(),
            sanitize: false,
            undo_limit: DEFAULT_MAX_STACK_SIZE,
            preset: None,
            plugin_options: HashMap::new(),
        }
    }
}

impl EditorConfig {
    /// Loads config from the default location, falling back to defaults.
    pub fn load() -> Self {
        match Self::load_from_default_path() {
            Ok(config) => config,
            Err(e) => {
                tracing::warn!("Using default config: {}", e);
                Self::default()
            }
        }
    }

    /// Loads config from a file.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    fn load_from_default_path() -> Result<Self, ConfigError> {
        let path = Self::default_path()?;
        if path.exists() {
            Self::load_from(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Returns the default config file path.
    pub fn default_path() -> Result<PathBuf, ConfigError> {
        let config_dir = dirs::config_dir().ok_or(ConfigError::NoConfigDir)?;
        Ok(config_dir.join("quire").join("config.toml"))
    }

    /// Saves the config to the default location.
    pub fn save(&self) -> Result<(), ConfigError> {
        self.save_to(Self::default_path()?)
    }

    /// Saves the config to a file, creating parent directories.
    pub fn save_to(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Options for a plugin, or `Null` when none are configured.
    pub fn plugin_options(&self, name: &str) -> serde_json::Value {
        self.plugin_options
            .get(name)
            .cloned()
            .unwrap_or(serde_json::Value::Null)
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Could not find config directory")]
    NoConfigDir,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Serialize error: {0}")]
    Serialize(#[from] toml::ser::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = EditorConfig::default();
        assert_eq!(config.placeholder.as_deref(), Some("Type here..."));
        assert_eq!(config.theme, "default");
        assert!(!config.sanitize);
        assert_eq!(config.undo_limit, 100);
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config: EditorConfig = toml::from_str(
            r#"
            sanitize = true
            preset = "basic"

            [plugin_options.AutoSave]
            interval_ms = 500
            "#,
        )
        .unwrap();
        assert!(config.sanitize);
        assert_eq!(config.preset.as_deref(), Some("basic"));
        assert_eq!(config.theme, "default");
        assert_eq!(
            config.plugin_options("AutoSave")["interval_ms"],
            serde_json::json!(500)
        );
        assert!(config.plugin_options("Missing").is_null());
    }

    #[test]
    fn test_save_and_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let mut config = EditorConfig::default();
        config.content = "<p>draft</p>".into();
        config.read_only = true;
        config
            .plugin_options
            .insert("Divider".into(), serde_json::json!({ "style": "dashed" }));

        config.save_to(&path).unwrap();
        let loaded = EditorConfig::load_from(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_load_errors() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            EditorConfig::load_from(dir.path().join("absent.toml")),
            Err(ConfigError::Io(_))
        ));

        let bad = dir.path().join("bad.toml");
        std::fs::write(&bad, "undo_limit = \"many\"").unwrap();
        assert!(matches!(EditorConfig::load_from(&bad), Err(ConfigError::Parse(_))));
    }
}
