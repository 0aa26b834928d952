//! Durable key-value storage.
//!
//! The core only relies on the minimal [`KvStore`] contract: partial-map
//! reads, map writes, removals and a change feed. Values are JSON so that
//! every component can keep its own record shape under its own key.
//!
//! - [`MemoryStore`]: in-process map, used by tests and ephemeral sessions.
//! - [`JsonFileStore`]: the same map persisted as a single JSON document.

mod file;

pub use file::JsonFileStore;

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tokio::sync::broadcast;

use crate::error::Result;

pub type StorageMap = HashMap<String, Value>;

/// Old and new value of one key. `None` means absent.
#[derive(Debug, Clone, PartialEq)]
pub struct StorageChange {
    pub old: Option<Value>,
    pub new: Option<Value>,
}

/// Changes from a single `set` or `remove`, keyed by storage key.
pub type StorageChanges = HashMap<String, StorageChange>;

const CHANGE_CHANNEL_CAPACITY: usize = 64;

#[async_trait]
pub trait KvStore: Send + Sync {
    /// Returns the subset of `keys` that are present.
    async fn get(&self, keys: &[&str]) -> Result<StorageMap>;

    async fn set(&self, entries: StorageMap) -> Result<()>;

    async fn remove(&self, keys: &[&str]) -> Result<()>;

    /// Subscribe to change notifications for every later mutation.
    fn subscribe(&self) -> broadcast::Receiver<StorageChanges>;
}

/// Read and decode one key. A value that no longer decodes as `T` is
/// treated as absent.
pub async fn load<T: DeserializeOwned>(store: &dyn KvStore, key: &str) -> Result<Option<T>> {
    let mut found = store.get(&[key]).await?;
    let Some(value) = found.remove(key) else {
        return Ok(None);
    };
    match serde_json::from_value(value) {
        Ok(decoded) => Ok(Some(decoded)),
        Err(e) => {
            tracing::warn!(key, error = %e, "Discarding undecodable stored value");
            Ok(None)
        }
    }
}

/// Encode and write one key.
pub async fn save<T: Serialize + ?Sized>(store: &dyn KvStore, key: &str, value: &T) -> Result<()> {
    let value = serde_json::to_value(value)?;
    store.set(HashMap::from([(key.to_string(), value)])).await
}

/// In-memory [`KvStore`].
pub struct MemoryStore {
    entries: Mutex<StorageMap>,
    changes: broadcast::Sender<StorageChanges>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::with_entries(StorageMap::new())
    }

    pub fn with_entries(entries: StorageMap) -> Self {
        let (changes, _) = broadcast::channel(CHANGE_CHANNEL_CAPACITY);
        Self {
            entries: Mutex::new(entries),
            changes,
        }
    }

    fn read(&self, keys: &[&str]) -> StorageMap {
        let entries = self.entries.lock();
        keys.iter()
            .filter_map(|k| entries.get(*k).map(|v| (k.to_string(), v.clone())))
            .collect()
    }

    /// Apply a write and return the serialized snapshot of the whole map.
    fn apply_set(&self, updates: StorageMap) -> StorageMap {
        let mut entries = self.entries.lock();
        let mut changes = StorageChanges::new();
        for (key, new) in updates {
            let old = entries.insert(key.clone(), new.clone());
            if old.as_ref() != Some(&new) {
                changes.insert(
                    key,
                    StorageChange {
                        old,
                        new: Some(new),
                    },
                );
            }
        }
        self.notify(changes);
        entries.clone()
    }

    fn apply_remove(&self, keys: &[&str]) -> StorageMap {
        let mut entries = self.entries.lock();
        let mut changes = StorageChanges::new();
        for key in keys {
            if let Some(old) = entries.remove(*key) {
                changes.insert(
                    key.to_string(),
                    StorageChange {
                        old: Some(old),
                        new: None,
                    },
                );
            }
        }
        self.notify(changes);
        entries.clone()
    }

    fn notify(&self, changes: StorageChanges) {
        if !changes.is_empty() {
            // No subscribers is fine.
            let _ = self.changes.send(changes);
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl KvStore for MemoryStore {
    async fn get(&self, keys: &[&str]) -> Result<StorageMap> {
        Ok(self.read(keys))
    }

    async fn set(&self, entries: StorageMap) -> Result<()> {
        self.apply_set(entries);
        Ok(())
    }

    async fn remove(&self, keys: &[&str]) -> Result<()> {
        self.apply_remove(keys);
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<StorageChanges> {
        self.changes.subscribe()
    }
}
