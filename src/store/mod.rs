//! Durable key-value blob store.
//!
//! State slices serialize to named string blobs. The store is deliberately
//! dumb: `get`/`set`/`clear`, no transactions. A file-backed implementation
//! covers normal runs (one file per key under the data dir) and an in-memory
//! implementation covers tests.

use std::collections::HashMap;
use std::path::PathBuf;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::error::StoreError;

/// Extension used for on-disk slice files.
const BLOB_EXT: &str = "json";

/// Storage boundary for named state slices.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Read a key. `Ok(None)` when the key has never been written.
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    /// Write a key, replacing any previous value.
    async fn set(&self, key: &str, value: &str) -> Result<(), StoreError>;

    /// Remove every key.
    async fn clear(&self) -> Result<(), StoreError>;
}

/// Default data directory: `~/.dealdesk`.
pub fn default_data_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".dealdesk")
}

/// File-backed store: one `<key>.json` per slice under a data directory.
pub struct FileBlobStore {
    dir: PathBuf,
}

impl FileBlobStore {
    /// Open (and create if needed) a store rooted at `dir`.
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.{BLOB_EXT}"))
    }
}

#[async_trait]
impl BlobStore for FileBlobStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        match tokio::fs::read_to_string(self.path_for(key)).await {
            Ok(value) => Ok(Some(value)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StoreError::Read {
                key: key.to_string(),
                reason: e.to_string(),
            }),
        }
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        tokio::fs::write(self.path_for(key), value)
            .await
            .map_err(|e| StoreError::Write {
                key: key.to_string(),
                reason: e.to_string(),
            })
    }

    async fn clear(&self) -> Result<(), StoreError> {
        let mut entries = tokio::fs::read_dir(&self.dir)
            .await
            .map_err(|e| StoreError::Clear(e.to_string()))?;
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| StoreError::Clear(e.to_string()))?
        {
            let path = entry.path();
            if path.extension().and_then(|ext| ext.to_str()) == Some(BLOB_EXT) {
                tokio::fs::remove_file(&path)
                    .await
                    .map_err(|e| StoreError::Clear(format!("{}: {e}", path.display())))?;
            }
        }
        Ok(())
    }
}

/// In-memory store for tests and ephemeral sessions.
#[derive(Default)]
pub struct MemoryBlobStore {
    inner: RwLock<HashMap<String, String>>,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-seed a key, e.g. to simulate a previous session's blobs.
    pub async fn seed(&self, key: &str, value: &str) {
        self.inner
            .write()
            .await
            .insert(key.to_string(), value.to_string());
    }

    /// Number of stored keys.
    pub async fn len(&self) -> usize {
        self.inner.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.is_empty()
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.inner.read().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.inner
            .write()
            .await
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn clear(&self) -> Result<(), StoreError> {
        self.inner.write().await.clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn file_store_round_trips_and_clears() {
        let dir = tempdir().unwrap();
        let store = FileBlobStore::new(dir.path()).unwrap();

        assert_eq!(store.get("deals").await.unwrap(), None);

        store.set("deals", "{\"deals\":[]}").await.unwrap();
        assert_eq!(
            store.get("deals").await.unwrap().as_deref(),
            Some("{\"deals\":[]}")
        );

        store.set("view", "\"chat\"").await.unwrap();
        store.clear().await.unwrap();
        assert_eq!(store.get("deals").await.unwrap(), None);
        assert_eq!(store.get("view").await.unwrap(), None);
    }

    #[tokio::test]
    async fn file_store_overwrites_in_place() {
        let dir = tempdir().unwrap();
        let store = FileBlobStore::new(dir.path()).unwrap();
        store.set("profile", "one").await.unwrap();
        store.set("profile", "two").await.unwrap();
        assert_eq!(store.get("profile").await.unwrap().as_deref(), Some("two"));
    }

    #[tokio::test]
    async fn clear_leaves_foreign_files_alone() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("notes.txt"), "keep me").unwrap();
        let store = FileBlobStore::new(dir.path()).unwrap();
        store.set("deals", "x").await.unwrap();
        store.clear().await.unwrap();
        assert!(dir.path().join("notes.txt").exists());
    }

    #[tokio::test]
    async fn memory_store_round_trips() {
        let store = MemoryBlobStore::new();
        assert!(store.is_empty().await);
        store.set("k", "v").await.unwrap();
        assert_eq!(store.get("k").await.unwrap().as_deref(), Some("v"));
        store.clear().await.unwrap();
        assert!(store.is_empty().await);
    }
}
