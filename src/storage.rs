use crate::errors::StoreError;
use async_trait::async_trait;
use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
    sync::{Mutex, MutexGuard},
};
use tokio::fs;
use tracing::{debug, error};

/// Durable string key/value storage for user-entered targets.
///
/// Reads come from memory. Writes are last-write-wins and only return once
/// the value is durable.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;
    async fn set(&self, key: &str, value: String) -> Result<(), StoreError>;
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<BTreeMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        lock(&self.entries).get(key).cloned()
    }

    async fn set(&self, key: &str, value: String) -> Result<(), StoreError> {
        lock(&self.entries).insert(key.to_string(), value);
        Ok(())
    }
}

/// Key/value store mirrored to a pretty-printed JSON object on disk.
#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    entries: Mutex<BTreeMap<String, String>>,
    // Serializes writers so the file and the map change in the same order.
    writer: tokio::sync::Mutex<()>,
}

impl JsonFileStore {
    pub async fn open(path: PathBuf) -> Self {
        let entries = load_entries(&path).await;
        debug!(path = %path.display(), entries = entries.len(), "opened key/value store");
        Self {
            path,
            entries: Mutex::new(entries),
            writer: tokio::sync::Mutex::new(()),
        }
    }
}

impl JsonFileStore {
    fn restore(&self, key: &str, previous: Option<String>) {
        let mut entries = lock(&self.entries);
        match previous {
            Some(previous) => entries.insert(key.to_string(), previous),
            None => entries.remove(key),
        };
    }
}

#[async_trait]
impl KeyValueStore for JsonFileStore {
    fn get(&self, key: &str) -> Option<String> {
        lock(&self.entries).get(key).cloned()
    }

    async fn set(&self, key: &str, value: String) -> Result<(), StoreError> {
        let _writer = self.writer.lock().await;
        let (previous, snapshot) = {
            let mut entries = lock(&self.entries);
            let previous = entries.insert(key.to_string(), value);
            (previous, serde_json::to_vec_pretty(&*entries))
        };

        let result = match snapshot {
            Ok(payload) => fs::write(&self.path, payload).await.map_err(StoreError::from),
            Err(err) => Err(StoreError::from(err)),
        };
        if let Err(err) = result {
            error!(path = %self.path.display(), "failed to persist store: {err}");
            self.restore(key, previous);
            return Err(err);
        }
        Ok(())
    }
}

async fn load_entries(path: &Path) -> BTreeMap<String, String> {
    match fs::read(path).await {
        Ok(bytes) => match serde_json::from_slice(&bytes) {
            Ok(entries) => entries,
            Err(err) => {
                error!("failed to parse store file: {err}");
                BTreeMap::new()
            }
        },
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
        Err(err) => {
            error!("failed to read store file: {err}");
            BTreeMap::new()
        }
    }
}

fn lock(entries: &Mutex<BTreeMap<String, String>>) -> MutexGuard<'_, BTreeMap<String, String>> {
    // A panic while holding the lock cannot leave a half-written map.
    entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
