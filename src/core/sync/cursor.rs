//! Persisted server-version cursor of the UCS change feed

use crate::domain::{BridgeError, Result, ServerVersion};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Storage for the highest processed server version
#[async_trait]
pub trait CursorStore: Send + Sync {
    /// The persisted cursor; missing or unreadable state is the start of the feed
    async fn load(&self) -> ServerVersion;

    async fn save(&self, cursor: ServerVersion) -> Result<()>;
}

/// Cursor kept as a single integer in a plain text file
#[derive(Debug, Clone)]
pub struct FileCursorStore {
    path: PathBuf,
}

impl FileCursorStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "cursor".into());
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

#[async_trait]
impl CursorStore for FileCursorStore {
    async fn load(&self) -> ServerVersion {
        let contents = match tokio::fs::read_to_string(&self.path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!(path = %self.path.display(), "No cursor persisted, starting from 0");
                return ServerVersion::ZERO;
            }
            Err(e) => {
                tracing::warn!(
                    path = %self.path.display(),
                    error = %e,
                    "Failed to read cursor, starting from 0"
                );
                return ServerVersion::ZERO;
            }
        };

        match ServerVersion::from_str(&contents) {
            Ok(cursor) => cursor,
            Err(e) => {
                tracing::warn!(
                    path = %self.path.display(),
                    error = %e,
                    "Corrupt cursor, starting from 0"
                );
                ServerVersion::ZERO
            }
        }
    }

    /// Writes through a temp file and renames it over the cursor
    async fn save(&self, cursor: ServerVersion) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                BridgeError::State(format!(
                    "Failed to create cursor directory {}: {e}",
                    parent.display()
                ))
            })?;
        }

        let temp = self.temp_path();
        tokio::fs::write(&temp, cursor.to_string())
            .await
            .map_err(|e| BridgeError::State(format!("Failed to write cursor: {e}")))?;
        tokio::fs::rename(&temp, &self.path)
            .await
            .map_err(|e| BridgeError::State(format!("Failed to replace cursor: {e}")))?;

        tracing::debug!(path = %self.path.display(), cursor = %cursor, "Cursor saved");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_missing_cursor_is_zero() {
        let dir = tempdir().unwrap();
        let store = FileCursorStore::new(dir.path().join("cursor.txt"));
        assert_eq!(store.load().await, ServerVersion::ZERO);
    }

    #[tokio::test]
    async fn test_save_then_load() {
        let dir = tempdir().unwrap();
        let store = FileCursorStore::new(dir.path().join("state").join("cursor.txt"));

        store.save(ServerVersion::new(1700).unwrap()).await.unwrap();
        assert_eq!(store.load().await.value(), 1700);
        assert!(!store.temp_path().exists());
    }

    #[tokio::test]
    async fn test_corrupt_cursor_is_zero() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("cursor.txt");
        std::fs::write(&path, "not-a-number").unwrap();

        let store = FileCursorStore::new(path);
        assert_eq!(store.load().await, ServerVersion::ZERO);
    }
}
