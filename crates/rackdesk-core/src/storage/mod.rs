//! Key/value persistence over several degrading backends
//!
//! Every backend speaks the same contract and stores structured JSON values. A
//! backend serializes on write and deserializes on read; a missing key or an
//! unreadable value comes back as `None` instead of an error. Failures while
//! talking to the underlying medium are logged and absorbed, so callers that
//! need a backend that actually works go through [`StorageSelector`].

pub mod memory;
pub mod cookie;
pub mod file;
pub mod selector;

pub use memory::*;
pub use cookie::*;
pub use file::*;
pub use selector::*;

use serde_json::Value;

/// Key written and removed while probing whether a backend is usable
pub const PROBE_KEY: &str = "rackdesk.storage_probe";

/// Uniform persistence contract implemented by every storage backend
pub trait StorageBackend: Send + Sync {
    /// Whether this backend can actually store values in the current process
    fn is_supported(&self) -> bool;

    /// Store a value under a key and hand the value back
    fn set(&self, key: &str, value: Value) -> Value;

    /// Read a value, `None` when missing or not decodable
    fn get(&self, key: &str) -> Option<Value>;

    /// Remove a key; removing a missing key is a no-op
    fn remove(&self, key: &str);

    /// All keys currently stored
    fn keys(&self) -> Vec<String>;

    /// Drop every stored key
    fn clear_all(&self);

    /// Number of stored keys
    fn length(&self) -> usize {
        self.keys().len()
    }

    /// Short name used in logs and diagnostics
    fn name(&self) -> &'static str;
}

/// Write and remove a marker value, reporting whether both steps took effect.
///
/// Used by durable backends to decide support. Presence of the medium is not
/// enough: a directory may exist but be read-only, or a jar may be full.
pub(crate) fn probe_round_trip(backend: &dyn StorageBackend) -> bool {
    let marker = Value::String(PROBE_KEY.to_string());
    backend.set(PROBE_KEY, marker.clone());
    let stored = backend.get(PROBE_KEY);
    backend.remove(PROBE_KEY);
    stored.as_ref() == Some(&marker) && backend.get(PROBE_KEY).is_none()
}
