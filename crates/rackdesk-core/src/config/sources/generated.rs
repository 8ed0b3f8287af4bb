//! The synthesized default configuration
//!
//! Services register a base (an absolute URL, a `:port`, or a path) and the
//! source combines them with the console origin into one entry named "Default".

use super::ConfigurationSource;
use crate::config::types::{ConfigurationEntry, SourceKind};
use crate::errors::ConsoleError;
use crate::uri::resolve_against_origin;
use async_trait::async_trait;
use reqwest::Url;
use std::collections::BTreeMap;
use std::sync::RwLock;

/// Id of the generated entry
pub const DEFAULT_CONFIGURATION_ID: &str = "default";

#[derive(Debug)]
pub struct GeneratedSource {
    origin: Url,
    bases: RwLock<BTreeMap<String, String>>,
}

impl GeneratedSource {
    pub fn new(origin: Url) -> Self {
        Self {
            origin,
            bases: RwLock::new(BTreeMap::new()),
        }
    }

    pub fn origin(&self) -> &Url {
        &self.origin
    }

    /// Register the base of a logical service
    pub fn register_service_base(&self, service: impl Into<String>, base: impl Into<String>) {
        if let Ok(mut bases) = self.bases.write() {
            bases.insert(service.into(), base.into());
        }
    }

    pub fn reset(&self) {
        if let Ok(mut bases) = self.bases.write() {
            bases.clear();
        }
    }

    /// Build the default entry, `None` when no service registered a base
    pub fn default_entry(&self) -> Option<ConfigurationEntry> {
        let bases = self.bases.read().ok()?;
        if bases.is_empty() {
            return None;
        }

        let mut entry = ConfigurationEntry::new(DEFAULT_CONFIGURATION_ID).with_name("Default");
        for (service, base) in bases.iter() {
            match resolve_against_origin(&self.origin, base) {
                Some(root) => entry = entry.with_service(service.clone(), root),
                None => log::warn!(
                    "Ignoring base '{}' for service '{}': cannot combine it with origin {}",
                    base,
                    service,
                    self.origin
                ),
            }
        }
        Some(entry)
    }
}

#[async_trait]
impl ConfigurationSource for GeneratedSource {
    fn kind(&self) -> SourceKind {
        SourceKind::Generated
    }

    fn description(&self) -> &'static str {
        "Default configuration generated from service bases"
    }

    async fn entries(&self) -> Result<Vec<ConfigurationEntry>, ConsoleError> {
        Ok(self.default_entry().into_iter().collect())
    }
}
