//! Programmatically registered entries

use super::ConfigurationSource;
use crate::config::types::{ConfigurationEntry, SourceKind};
use crate::errors::ConsoleError;
use async_trait::async_trait;
use std::sync::RwLock;

/// Entries registered in code, highest precedence of all sources
#[derive(Debug, Default)]
pub struct ExplicitSource {
    entries: RwLock<Vec<ConfigurationEntry>>,
}

impl ExplicitSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an entry; a later registration with the same id replaces the earlier one
    pub fn register(&self, entry: ConfigurationEntry) {
        if let Ok(mut entries) = self.entries.write() {
            match entries.iter_mut().find(|existing| existing.id == entry.id) {
                Some(existing) => *existing = entry,
                None => entries.push(entry),
            }
        }
    }

    /// Forget every registered entry
    pub fn reset(&self) {
        if let Ok(mut entries) = self.entries.write() {
            entries.clear();
        }
    }
}

#[async_trait]
impl ConfigurationSource for ExplicitSource {
    fn kind(&self) -> SourceKind {
        SourceKind::Explicit
    }

    fn description(&self) -> &'static str {
        "Explicitly registered configurations"
    }

    async fn entries(&self) -> Result<Vec<ConfigurationEntry>, ConsoleError> {
        self.entries
            .read()
            .map(|entries| entries.clone())
            .map_err(|_| ConsoleError::ConfigError("explicit source lock poisoned".to_string()))
    }
}
