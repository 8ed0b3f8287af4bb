//! Operator-managed entries kept in storage
//!
//! The whole list lives under one storage key and is always rewritten as a
//! whole, so a write can never leave half an update behind.

use super::ConfigurationSource;
use crate::config::types::{ConfigurationEntry, SourceKind};
use crate::config::CONFIGURATIONS_KEY;
use crate::errors::ConsoleError;
use crate::storage::StorageBackend;
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;

pub struct PersistedSource {
    storage: Arc<dyn StorageBackend>,
}

impl PersistedSource {
    pub fn new(storage: Arc<dyn StorageBackend>) -> Self {
        Self { storage }
    }

    /// Current list; an absent or unreadable value is an empty list
    pub fn load(&self) -> Vec<ConfigurationEntry> {
        match self.storage.get(CONFIGURATIONS_KEY) {
            None | Some(Value::Null) => Vec::new(),
            Some(value) => match serde_json::from_value::<Vec<ConfigurationEntry>>(value) {
                Ok(entries) => entries,
                Err(e) => {
                    log::warn!("Stored configuration list is unreadable, ignoring it: {}", e);
                    Vec::new()
                }
            },
        }
    }

    /// Replace the stored list.
    ///
    /// Backends may drop a write (the cookie jar refuses oversized values), so
    /// the list is read back and a mismatch is reported as a storage error.
    pub fn store(&self, entries: &[ConfigurationEntry]) -> Result<(), ConsoleError> {
        let value = serde_json::to_value(entries)?;
        self.storage.set(CONFIGURATIONS_KEY, value.clone());

        if self.storage.get(CONFIGURATIONS_KEY).as_ref() != Some(&value) {
            return Err(ConsoleError::Storage(format!(
                "{} storage did not keep the configuration list ({} entries)",
                self.storage.name(),
                entries.len()
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl ConfigurationSource for PersistedSource {
    fn kind(&self) -> SourceKind {
        SourceKind::Persisted
    }

    fn description(&self) -> &'static str {
        "Operator-managed configurations in storage"
    }

    async fn entries(&self) -> Result<Vec<ConfigurationEntry>, ConsoleError> {
        Ok(self.load())
    }
}
