//! Aggregated configuration registry
//!
//! The registry merges every enabled source into one ordered, id-unique view and
//! routes writes to the persisted source. Sources are consulted in precedence
//! order; when two sources supply the same id the earlier one wins and the later
//! entry is dropped from the view.

use super::sources::{
    ConfigurationSource, ExplicitSource, GeneratedSource, PersistedSource, RemoteFileSource,
    DEFAULT_CONFIG_FILE,
};
use super::types::{ConfigurationEntry, ConfigurationFilter, SourceKind};
use crate::errors::ConsoleError;
use crate::storage::StorageBackend;
use async_trait::async_trait;
use reqwest::Url;
use std::collections::{BTreeMap, HashSet};
use std::sync::{Arc, RwLock};
use std::time::Duration;

/// Default origin used when none is configured
pub const DEFAULT_ORIGIN: &str = "http://localhost";

/// Read-side contract the selection resolver depends on
#[async_trait]
pub trait ConfigurationLookup: Send + Sync {
    /// Entry with the given id
    async fn read(&self, id: &str) -> Result<ConfigurationEntry, ConsoleError>;

    /// First entry of the aggregated view, used when nothing is selected
    async fn first(&self) -> Result<Option<ConfigurationEntry>, ConsoleError>;
}

/// Diagnostic view of one source
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceStatus {
    pub kind: SourceKind,
    pub description: &'static str,
    pub enabled: bool,
}

struct Aggregate {
    entries: Vec<ConfigurationEntry>,
    failures: Vec<ConsoleError>,
}

pub struct ConfigurationRegistry {
    explicit: ExplicitSource,
    generated: GeneratedSource,
    remote_file: RemoteFileSource,
    persisted: PersistedSource,
    enabled: RwLock<BTreeMap<SourceKind, bool>>,
    /// Held across load, check and store of the persisted list
    write_lock: tokio::sync::Mutex<()>,
}

impl ConfigurationRegistry {
    /// Start building a registry whose writable source lives in `storage`
    pub fn builder(storage: Arc<dyn StorageBackend>) -> RegistryBuilder {
        RegistryBuilder::new(storage)
    }

    /// Sources in precedence order
    fn sources(&self) -> [&dyn ConfigurationSource; 4] {
        [
            &self.explicit,
            &self.generated,
            &self.remote_file,
            &self.persisted,
        ]
    }

    pub fn is_source_enabled(&self, kind: SourceKind) -> bool {
        self.enabled
            .read()
            .map(|enabled| enabled.get(&kind).copied().unwrap_or(true))
            .unwrap_or(true)
    }

    /// Include or exclude a source from the aggregated view.
    ///
    /// Never refetches the configuration file; re-enabling it only brings back
    /// whatever the single fetch produced.
    pub fn set_source_enabled(&self, kind: SourceKind, enabled: bool) {
        if let Ok(mut toggles) = self.enabled.write() {
            toggles.insert(kind, enabled);
        }
        log::debug!("Configuration source '{}' enabled: {}", kind, enabled);
    }

    pub fn list_sources(&self) -> Vec<SourceStatus> {
        self.sources()
            .iter()
            .map(|source| SourceStatus {
                kind: source.kind(),
                description: source.description(),
                enabled: self.is_source_enabled(source.kind()),
            })
            .collect()
    }

    /// Register an entry in the explicit source
    pub fn register(&self, entry: ConfigurationEntry) {
        self.explicit.register(entry);
    }

    /// Register a service base for the generated default entry
    pub fn register_service_base(&self, service: impl Into<String>, base: impl Into<String>) {
        self.generated.register_service_base(service, base);
    }

    pub fn remote_file(&self) -> &RemoteFileSource {
        &self.remote_file
    }

    /// Drop programmatic registrations and the cached configuration file
    pub fn reset(&self) {
        self.explicit.reset();
        self.generated.reset();
        self.remote_file.reset();
    }

    async fn aggregate(&self) -> Aggregate {
        let mut seen = HashSet::new();
        let mut entries = Vec::new();
        let mut failures = Vec::new();

        for source in self.sources() {
            if !self.is_source_enabled(source.kind()) {
                continue;
            }

            match source.entries().await {
                Ok(source_entries) => {
                    for entry in source_entries {
                        if seen.insert(entry.id.clone()) {
                            entries.push(entry);
                        } else {
                            log::debug!(
                                "Configuration '{}' from {} source is shadowed by an earlier source",
                                entry.id,
                                source.kind()
                            );
                        }
                    }
                }
                Err(e) => {
                    log::debug!("{} source contributed no entries: {}", source.kind(), e);
                    failures.push(e);
                }
            }
        }

        Aggregate { entries, failures }
    }

    /// Entries of every enabled source that match the filter, in precedence order
    pub async fn query(
        &self,
        filter: &ConfigurationFilter,
    ) -> Result<Vec<ConfigurationEntry>, ConsoleError> {
        let aggregate = self.aggregate().await;
        Ok(aggregate
            .entries
            .into_iter()
            .filter(|entry| filter.matches(entry))
            .collect())
    }

    /// Entry with the given id from any enabled source.
    ///
    /// When the id is nowhere to be found and a source failed to load, the
    /// failure is reported instead of `NotFound`: the id may well live in the
    /// configuration file that could not be fetched.
    pub async fn read(&self, id: &str) -> Result<ConfigurationEntry, ConsoleError> {
        let aggregate = self.aggregate().await;
        if let Some(entry) = aggregate.entries.into_iter().find(|entry| entry.id == id) {
            return Ok(entry);
        }

        match aggregate.failures.into_iter().next() {
            Some(failure) => Err(failure),
            None => Err(ConsoleError::NotFound(format!("configuration '{}'", id))),
        }
    }

    /// Add an entry to the persisted source
    pub async fn create(
        &self,
        entry: ConfigurationEntry,
    ) -> Result<ConfigurationEntry, ConsoleError> {
        if entry.id.trim().is_empty() {
            return Err(ConsoleError::Validation(
                "configuration id is required".to_string(),
            ));
        }

        let _guard = self.write_lock.lock().await;
        let mut entries = self.persisted.load();
        if entries.iter().any(|existing| existing.id == entry.id) {
            return Err(ConsoleError::Validation(format!(
                "configuration '{}' already exists",
                entry.id
            )));
        }

        entries.push(entry.clone());
        self.persisted.store(&entries)?;
        log::info!("Created configuration '{}'", entry.id);
        Ok(entry)
    }

    /// Replace an entry of the persisted source
    pub async fn update(
        &self,
        entry: ConfigurationEntry,
    ) -> Result<ConfigurationEntry, ConsoleError> {
        let _guard = self.write_lock.lock().await;
        let mut entries = self.persisted.load();
        let slot = entries
            .iter_mut()
            .find(|existing| existing.id == entry.id)
            .ok_or_else(|| ConsoleError::NotFound(format!("configuration '{}'", entry.id)))?;

        *slot = entry.clone();
        self.persisted.store(&entries)?;
        log::info!("Updated configuration '{}'", entry.id);
        Ok(entry)
    }

    /// Delete an entry from the persisted source
    pub async fn remove(&self, id: &str) -> Result<(), ConsoleError> {
        let _guard = self.write_lock.lock().await;
        let mut entries = self.persisted.load();
        let before = entries.len();
        entries.retain(|existing| existing.id != id);
        if entries.len() == before {
            return Err(ConsoleError::NotFound(format!("configuration '{}'", id)));
        }

        self.persisted.store(&entries)?;
        log::info!("Removed configuration '{}'", id);
        Ok(())
    }
}

#[async_trait]
impl ConfigurationLookup for ConfigurationRegistry {
    async fn read(&self, id: &str) -> Result<ConfigurationEntry, ConsoleError> {
        ConfigurationRegistry::read(self, id).await
    }

    async fn first(&self) -> Result<Option<ConfigurationEntry>, ConsoleError> {
        let entries = self.query(&ConfigurationFilter::all()).await?;
        Ok(entries.into_iter().next())
    }
}

/// Builder wiring the four sources of a registry
pub struct RegistryBuilder {
    storage: Arc<dyn StorageBackend>,
    origin: Option<Url>,
    config_file: String,
    client: Option<reqwest::Client>,
    timeout: Option<Duration>,
    enabled: BTreeMap<SourceKind, bool>,
    explicit: Vec<ConfigurationEntry>,
    service_bases: Vec<(String, String)>,
}

impl RegistryBuilder {
    pub fn new(storage: Arc<dyn StorageBackend>) -> Self {
        Self {
            storage,
            origin: None,
            config_file: DEFAULT_CONFIG_FILE.to_string(),
            client: None,
            timeout: None,
            enabled: BTreeMap::new(),
            explicit: Vec::new(),
            service_bases: Vec::new(),
        }
    }

    /// Origin the generated entry and a relative configuration file resolve against
    pub fn origin(mut self, origin: Url) -> Self {
        self.origin = Some(origin);
        self
    }

    /// Location of the configuration file (URL, path, or origin-relative)
    pub fn config_file(mut self, location: impl Into<String>) -> Self {
        self.config_file = location.into();
        self
    }

    pub fn http_client(mut self, client: reqwest::Client) -> Self {
        self.client = Some(client);
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn source_enabled(mut self, kind: SourceKind, enabled: bool) -> Self {
        self.enabled.insert(kind, enabled);
        self
    }

    pub fn register(mut self, entry: ConfigurationEntry) -> Self {
        self.explicit.push(entry);
        self
    }

    pub fn service_base(mut self, service: impl Into<String>, base: impl Into<String>) -> Self {
        self.service_bases.push((service.into(), base.into()));
        self
    }

    pub fn build(self) -> Result<ConfigurationRegistry, ConsoleError> {
        let origin = match self.origin {
            Some(origin) => origin,
            None => Url::parse(DEFAULT_ORIGIN)
                .map_err(|e| ConsoleError::ConfigError(format!("invalid default origin: {}", e)))?,
        };

        let explicit = ExplicitSource::new();
        for entry in self.explicit {
            explicit.register(entry);
        }

        let generated = GeneratedSource::new(origin.clone());
        for (service, base) in self.service_bases {
            generated.register_service_base(service, base);
        }

        let mut remote_file = RemoteFileSource::new(&self.config_file, Some(&origin));
        if let Some(client) = self.client {
            remote_file = remote_file.with_client(client);
        }
        if let Some(timeout) = self.timeout {
            remote_file = remote_file.with_timeout(timeout);
        }

        Ok(ConfigurationRegistry {
            explicit,
            generated,
            remote_file,
            persisted: PersistedSource::new(self.storage),
            enabled: RwLock::new(self.enabled),
            write_lock: tokio::sync::Mutex::new(()),
        })
    }
}
