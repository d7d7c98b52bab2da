//! Key/value metadata store used to remember polling positions
//!
//! Values are opaque strings. Only an in-memory store ships here; durable
//! backends implement [`MetadataStore`] elsewhere.

use std::collections::HashMap;
use std::sync::RwLock;

use tracing::debug;

/// Concurrent string key/value store
pub trait MetadataStore: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;

    fn put(&self, key: &str, value: &str);

    /// Store `value` unless the key exists; returns the existing value if it does
    fn put_if_absent(&self, key: &str, value: &str) -> Option<String>;

    /// Replace `old` with `new` atomically; false if the current value is not `old`
    fn replace(&self, key: &str, old: &str, new: &str) -> bool;

    fn remove(&self, key: &str) -> Option<String>;
}

#[derive(Debug, Default)]
pub struct InMemoryMetadataStore {
    entries: RwLock<HashMap<String, String>>,
}

impl InMemoryMetadataStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl MetadataStore for InMemoryMetadataStore {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.read().unwrap_or_else(|e| e.into_inner()).get(key).cloned()
    }

    fn put(&self, key: &str, value: &str) {
        debug!(%key, %value, "InMemoryMetadataStore::put: called");
        self.entries
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(key.to_string(), value.to_string());
    }

    fn put_if_absent(&self, key: &str, value: &str) -> Option<String> {
        debug!(%key, %value, "InMemoryMetadataStore::put_if_absent: called");
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        match entries.get(key) {
            Some(existing) => Some(existing.clone()),
            None => {
                entries.insert(key.to_string(), value.to_string());
                None
            }
        }
    }

    fn replace(&self, key: &str, old: &str, new: &str) -> bool {
        debug!(%key, %old, %new, "InMemoryMetadataStore::replace: called");
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        match entries.get_mut(key) {
            Some(current) if current == old => {
                *current = new.to_string();
                true
            }
            _ => false,
        }
    }

    fn remove(&self, key: &str) -> Option<String> {
        debug!(%key, "InMemoryMetadataStore::remove: called");
        self.entries.write().unwrap_or_else(|e| e.into_inner()).remove(key)
    }
}
