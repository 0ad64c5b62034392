//! Drafts kept as JSON files on disk.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use quire_plugin::{BoxFuture, Draft, DraftStore};

/// Draft file errors.
#[derive(Debug, thiserror::Error)]
pub enum DraftError {
    #[error("Could not determine the data directory")]
    NoDataDir,

    #[error("Draft I/O failed for {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Draft file is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// A [`DraftStore`] writing one JSON file.
#[derive(Debug, Clone)]
pub struct FileDraftStore {
    path: PathBuf,
}

impl FileDraftStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Draft name used when the editor has no configured id.
    pub const DEFAULT_NAME: &'static str = "default";

    /// `<data dir>/quire/drafts/<editor id>.json`
    pub fn default_path(editor_id: &str) -> Result<PathBuf, DraftError> {
        let dir = dirs::data_local_dir().ok_or(DraftError::NoDataDir)?;
        Ok(dir.join("quire").join("drafts").join(format!("{editor_id}.json")))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn io_error(&self, source: std::io::Error) -> DraftError {
        DraftError::Io {
            path: self.path.clone(),
            source,
        }
    }

    async fn write(&self, draft: Draft) -> Result<(), DraftError> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| self.io_error(e))?;
        }
        let json = serde_json::to_string_pretty(&draft)?;
        tokio::fs::write(&self.path, json)
            .await
            .map_err(|e| self.io_error(e))?;
        tracing::debug!(path = %self.path.display(), "Draft written");
        Ok(())
    }

    async fn read(&self) -> Result<Option<Draft>, DraftError> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(json) => Ok(Some(serde_json::from_str(&json)?)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(self.io_error(e)),
        }
    }

    async fn remove(&self) -> Result<(), DraftError> {
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(self.io_error(e)),
        }
    }
}

impl DraftStore for FileDraftStore {
    fn save(&self, draft: Draft) -> BoxFuture<'_, anyhow::Result<()>> {
        Box::pin(async move { self.write(draft).await.map_err(anyhow::Error::from) })
    }

    fn load(&self) -> BoxFuture<'_, anyhow::Result<Option<Draft>>> {
        Box::pin(async move { self.read().await.map_err(anyhow::Error::from) })
    }

    fn clear(&self) -> BoxFuture<'_, anyhow::Result<()>> {
        Box::pin(async move { self.remove().await.map_err(anyhow::Error::from) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_save_load_clear() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileDraftStore::new(dir.path().join("nested").join("draft.json"));

        assert_eq!(store.load().await.unwrap(), None);

        let draft = Draft::new("<p>Saved</p>", "quire-test");
        store.save(draft.clone()).await.unwrap();
        assert_eq!(store.load().await.unwrap(), Some(draft));

        store.clear().await.unwrap();
        assert_eq!(store.load().await.unwrap(), None);
        // Clearing twice is fine
        store.clear().await.unwrap();
    }

    #[tokio::test]
    async fn test_corrupt_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("draft.json");
        std::fs::write(&path, "not json").unwrap();

        let err = FileDraftStore::new(&path).load().await.unwrap_err();
        assert!(err.downcast_ref::<DraftError>().is_some());
    }

    #[test]
    fn test_default_path_names_the_editor() {
        if let Ok(path) = FileDraftStore::default_path("quire-abc") {
            assert!(path.ends_with("quire/drafts/quire-abc.json"));
        }
    }
}
