//! In-process storage, always available, gone when the process exits

use super::StorageBackend;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::RwLock;

/// Map-backed storage used as the last fallback of the selector
#[derive(Debug, Default)]
pub struct MemoryStorage {
    entries: RwLock<BTreeMap<String, String>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

impl StorageBackend for MemoryStorage {
    fn is_supported(&self) -> bool {
        true
    }

    fn set(&self, key: &str, value: Value) -> Value {
        // Stored serialized so reads hand out fresh copies, like the durable backends
        match serde_json::to_string(&value) {
            Ok(encoded) => {
                if let Ok(mut entries) = self.entries.write() {
                    entries.insert(key.to_string(), encoded);
                }
            }
            Err(e) => log::warn!("Failed to encode value for key '{}': {}", key, e),
        }
        value
    }

    fn get(&self, key: &str) -> Option<Value> {
        let entries = self.entries.read().ok()?;
        let raw = entries.get(key)?;
        serde_json::from_str(raw).ok()
    }

    fn remove(&self, key: &str) {
        if let Ok(mut entries) = self.entries.write() {
            entries.remove(key);
        }
    }

    fn keys(&self) -> Vec<String> {
        self.entries
            .read()
            .map(|entries| entries.keys().cloned().collect())
            .unwrap_or_default()
    }

    fn clear_all(&self) {
        if let Ok(mut entries) = self.entries.write() {
            entries.clear();
        }
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}
