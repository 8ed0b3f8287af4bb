//! Picks the first usable storage backend
//!
//! Probe order is fixed: durable file storage, then the cookie jar, then memory.
//! The choice is made once, at construction, and every call afterwards goes to
//! the chosen backend.

use super::{CookieStorage, FileStorage, MemoryStorage, StorageBackend};
use serde_json::Value;
use std::path::Path;

/// Storage facade delegating to the first backend that reports support
pub struct StorageSelector {
    backend: Box<dyn StorageBackend>,
}

impl StorageSelector {
    /// Probe file and cookie storage under `dir`, falling back to memory
    pub fn new<P: AsRef<Path>>(dir: P) -> Self {
        let dir = dir.as_ref();
        Self::with_backends(vec![
            Box::new(FileStorage::in_dir(dir)),
            Box::new(CookieStorage::in_dir(dir)),
        ])
    }

    /// Probe the platform data directory, or go straight to memory without one
    pub fn with_default_dir() -> Self {
        match FileStorage::default_dir() {
            Some(dir) => Self::new(dir),
            None => Self::with_backends(Vec::new()),
        }
    }

    /// Probe the given backends in order; memory is always the final fallback
    pub fn with_backends(candidates: Vec<Box<dyn StorageBackend>>) -> Self {
        for candidate in candidates {
            if candidate.is_supported() {
                log::debug!("Using {} storage", candidate.name());
                return Self { backend: candidate };
            }
            log::debug!("{} storage is not supported, trying next backend", candidate.name());
        }

        log::warn!("No durable storage available; settings will not survive a restart");
        Self {
            backend: Box::new(MemoryStorage::new()),
        }
    }

    /// Name of the backend that won the probe
    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }
}

impl StorageBackend for StorageSelector {
    fn is_supported(&self) -> bool {
        self.backend.is_supported()
    }

    fn set(&self, key: &str, value: Value) -> Value {
        self.backend.set(key, value)
    }

    fn get(&self, key: &str) -> Option<Value> {
        self.backend.get(key)
    }

    fn remove(&self, key: &str) {
        self.backend.remove(key)
    }

    fn keys(&self) -> Vec<String> {
        self.backend.keys()
    }

    fn clear_all(&self) {
        self.backend.clear_all()
    }

    fn length(&self) -> usize {
        self.backend.length()
    }

    fn name(&self) -> &'static str {
        self.backend.name()
    }
}
