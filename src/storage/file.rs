//! [`KvStore`] persisted to one JSON file.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::sync::{broadcast, Mutex};

use super::{KvStore, MemoryStore, StorageChanges, StorageMap};
use crate::error::{Error, Result};

/// Keeps the whole map in memory and rewrites the file after each mutation.
///
/// Writes go to a sibling temp file first and are renamed into place, so a
/// crash mid-write leaves the previous document intact.
pub struct JsonFileStore {
    path: PathBuf,
    memory: MemoryStore,
    // Serializes snapshot + write so the file never goes backwards.
    write_lock: Mutex<()>,
}

impl JsonFileStore {
    /// Open the store at `path`, creating parent directories. A missing file
    /// starts empty.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let entries = match tokio::fs::read(&path).await {
            Ok(bytes) if bytes.is_empty() => StorageMap::new(),
            Ok(bytes) => serde_json::from_slice(&bytes).map_err(|e| {
                Error::Storage(format!("{} is not a valid store: {e}", path.display()))
            })?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => StorageMap::new(),
            Err(e) => return Err(e.into()),
        };
        tracing::debug!(path = %path.display(), keys = entries.len(), "Opened store");

        Ok(Self {
            path,
            memory: MemoryStore::with_entries(entries),
            write_lock: Mutex::new(()),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn persist(&self, snapshot: StorageMap) -> Result<()> {
        let bytes = serde_json::to_vec(&snapshot)?;
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, bytes).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }
}

#[async_trait]
impl KvStore for JsonFileStore {
    async fn get(&self, keys: &[&str]) -> Result<StorageMap> {
        Ok(self.memory.read(keys))
    }

    async fn set(&self, entries: StorageMap) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        let snapshot = self.memory.apply_set(entries);
        self.persist(snapshot).await
    }

    async fn remove(&self, keys: &[&str]) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        let snapshot = self.memory.apply_remove(keys);
        self.persist(snapshot).await
    }

    fn subscribe(&self) -> broadcast::Receiver<StorageChanges> {
        self.memory.subscribe()
    }
}
