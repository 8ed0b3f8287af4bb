//! Durable storage in a single JSON document on disk
//!
//! This is the first backend the selector probes. The whole document is read for
//! every operation and rewritten through a temporary file followed by a rename,
//! so a crash mid-write leaves the previous document intact.

use super::{probe_round_trip, StorageBackend};
use once_cell::sync::OnceCell;
use serde_json::{Map, Value};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

const STORAGE_FILE_NAME: &str = "storage.json";

/// JSON-document storage rooted at a file path
#[derive(Debug)]
pub struct FileStorage {
    path: PathBuf,
    supported: OnceCell<bool>,
    write_lock: Mutex<()>,
}

impl FileStorage {
    /// Storage backed by the given document path
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            supported: OnceCell::new(),
            write_lock: Mutex::new(()),
        }
    }

    /// Storage backed by `storage.json` inside a directory
    pub fn in_dir<P: AsRef<Path>>(dir: P) -> Self {
        Self::new(dir.as_ref().join(STORAGE_FILE_NAME))
    }

    /// Platform default directory, e.g. `~/.local/share/rackdesk` on Linux
    pub fn default_dir() -> Option<PathBuf> {
        dirs::data_local_dir().map(|dir| dir.join("rackdesk"))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self) -> Map<String, Value> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Map::new(),
            Err(e) => {
                log::warn!("Failed to read storage file {}: {}", self.path.display(), e);
                return Map::new();
            }
        };

        match serde_json::from_str::<Value>(&content) {
            Ok(Value::Object(map)) => map,
            Ok(_) | Err(_) => {
                log::warn!(
                    "Storage file {} is not a JSON object, treating it as empty",
                    self.path.display()
                );
                Map::new()
            }
        }
    }

    fn persist(&self, map: &Map<String, Value>) -> std::io::Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }

        let encoded = serde_json::to_vec_pretty(map)?;
        let tmp_path = self.path.with_extension("json.tmp");
        {
            let mut file = fs::File::create(&tmp_path)?;
            file.write_all(&encoded)?;
            file.sync_all()?;
        }
        fs::rename(&tmp_path, &self.path)
    }

    fn modify<F>(&self, mutate: F)
    where
        F: FnOnce(&mut Map<String, Value>),
    {
        let _guard = match self.write_lock.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        let mut map = self.load();
        mutate(&mut map);
        if let Err(e) = self.persist(&map) {
            log::warn!("Failed to write storage file {}: {}", self.path.display(), e);
        }
    }
}

impl StorageBackend for FileStorage {
    fn is_supported(&self) -> bool {
        *self.supported.get_or_init(|| {
            let supported = probe_round_trip(self);
            if !supported {
                log::debug!("File storage at {} is not usable", self.path.display());
            }
            supported
        })
    }

    fn set(&self, key: &str, value: Value) -> Value {
        let stored = value.clone();
        self.modify(|map| {
            map.insert(key.to_string(), stored);
        });
        value
    }

    fn get(&self, key: &str) -> Option<Value> {
        self.load().remove(key)
    }

    fn remove(&self, key: &str) {
        self.modify(|map| {
            map.remove(key);
        });
    }

    fn keys(&self) -> Vec<String> {
        self.load().keys().cloned().collect()
    }

    fn clear_all(&self) {
        self.modify(|map| map.clear());
    }

    fn name(&self) -> &'static str {
        "file"
    }
}
