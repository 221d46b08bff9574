//! Local filesystem storage implementation.
//!
//! Useful for development and for deployments without a gist token.
//!
//! ## Storage Layout
//!
//! ```text
//! {root}/
//! ├── discount_state.json        # PersistedState of the last run
//! └── discounted_products.html   # Report of the last run
//! ```

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;

use crate::error::{AppError, Result};
use crate::models::PersistedState;
use crate::storage::{ReportPublisher, StateStore};

/// Local filesystem backend for both state and report.
#[derive(Debug, Clone)]
pub struct LocalStore {
    root_dir: PathBuf,
    state_file: String,
    report_file: String,
}

impl LocalStore {
    /// Create a new LocalStore rooted at the given directory.
    pub fn new(root_dir: impl Into<PathBuf>, state_file: &str, report_file: &str) -> Self {
        Self {
            root_dir: root_dir.into(),
            state_file: state_file.to_string(),
            report_file: report_file.to_string(),
        }
    }

    /// Get the full path for a relative key.
    fn path(&self, key: &str) -> PathBuf {
        self.root_dir.join(key)
    }

    /// Write bytes atomically (write to temp, then rename).
    async fn write_bytes(&self, key: &str, bytes: &[u8]) -> Result<PathBuf> {
        let path = self.path(key);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let tmp = path.with_extension("tmp");
        let mut file = tokio::fs::File::create(&tmp).await?;
        file.write_all(bytes).await?;
        file.flush().await?;
        drop(file);

        tokio::fs::rename(&tmp, &path).await?;
        Ok(path)
    }

    /// Read bytes, returning None if file doesn't exist.
    async fn read_bytes(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let path = self.path(key);
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(AppError::Io(e)),
        }
    }
}

fn display(path: &Path) -> String {
    path.display().to_string()
}

#[async_trait]
impl StateStore for LocalStore {
    fn location(&self) -> String {
        display(&self.path(&self.state_file))
    }

    async fn fetch_state(&self) -> Result<Option<PersistedState>> {
        match self.read_bytes(&self.state_file).await? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    async fn store_state(&self, state: &PersistedState) -> Result<()> {
        let bytes = serde_json::to_vec_pretty(state)?;
        self.write_bytes(&self.state_file, &bytes).await?;
        Ok(())
    }
}

#[async_trait]
impl ReportPublisher for LocalStore {
    async fn publish_report(&self, html: &str) -> Result<String> {
        let path = self.write_bytes(&self.report_file, html.as_bytes()).await?;
        Ok(display(&path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SnapshotEntry;
    use tempfile::TempDir;

    fn store(tmp: &TempDir) -> LocalStore {
        LocalStore::new(tmp.path(), "state.json", "report.html")
    }

    #[tokio::test]
    async fn test_write_and_read() {
        let tmp = TempDir::new().unwrap();
        let storage = store(&tmp);

        storage.write_bytes("test.txt", b"hello").await.unwrap();
        let data = storage.read_bytes("test.txt").await.unwrap();
        assert_eq!(data, Some(b"hello".to_vec()));
    }

    #[tokio::test]
    async fn test_missing_state_is_empty() {
        let tmp = TempDir::new().unwrap();
        let storage = store(&tmp);

        assert!(storage.fetch_state().await.unwrap().is_none());
        assert!(storage.load().await.is_empty());
    }

    #[tokio::test]
    async fn test_state_round_trip() {
        let tmp = TempDir::new().unwrap();
        let storage = store(&tmp);

        let state = PersistedState::new(
            vec![SnapshotEntry {
                pid: "70123".into(),
                name: "Retro-X".into(),
                sizes: vec!["M".into()],
                ..SnapshotEntry::default()
            }],
            1,
        );
        assert!(storage.save(&state).await);

        let loaded = storage.load().await;
        assert_eq!(loaded, state);
        assert!(!tmp.path().join("state.tmp").exists());
    }

    #[tokio::test]
    async fn test_corrupt_state_degrades_to_empty() {
        let tmp = TempDir::new().unwrap();
        let storage = store(&tmp);
        std::fs::write(tmp.path().join("state.json"), "{not json").unwrap();

        assert!(storage.fetch_state().await.is_err());
        assert!(storage.load().await.is_empty());
    }

    #[tokio::test]
    async fn test_publish_report_writes_file() {
        let tmp = TempDir::new().unwrap();
        let storage = LocalStore::new(tmp.path().join("nested"), "state.json", "report.html");

        let location = storage.publish("<html></html>").await.unwrap();
        assert!(location.ends_with("report.html"));
        let written = std::fs::read_to_string(tmp.path().join("nested/report.html")).unwrap();
        assert_eq!(written, "<html></html>");
    }
}
