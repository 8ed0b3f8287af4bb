//! Entries shipped alongside the console in a well-known JSON file
//!
//! The file is fetched at most once per process. Whatever happens during that
//! fetch is remembered: a failure keeps being reported as an error (which the
//! registry turns into zero entries) until [`RemoteFileSource::reset`] is called.

use super::ConfigurationSource;
use crate::config::types::{ConfigurationEntry, SourceKind};
use crate::errors::ConsoleError;
use async_trait::async_trait;
use reqwest::Url;
use serde_json::Value;
use std::path::PathBuf;
use std::sync::{Arc, RwLock};
use std::time::Duration;
use tokio::sync::OnceCell;

/// Default location of the configuration file, relative to the origin
pub const DEFAULT_CONFIG_FILE: &str = "config.json";

type FetchOutcome = Result<Vec<ConfigurationEntry>, ConsoleError>;

/// Where the configuration file lives once resolved
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigFileLocation {
    Url(Url),
    Path(PathBuf),
}

pub struct RemoteFileSource {
    location: ConfigFileLocation,
    client: reqwest::Client,
    timeout: Duration,
    fetched: RwLock<Arc<OnceCell<FetchOutcome>>>,
}

impl RemoteFileSource {
    /// Source reading `location`, resolved against `origin` when relative
    pub fn new(location: &str, origin: Option<&Url>) -> Self {
        Self {
            location: Self::resolve_location(location, origin),
            client: reqwest::Client::new(),
            timeout: Duration::from_secs(30),
            fetched: RwLock::new(Arc::new(OnceCell::new())),
        }
    }

    pub fn with_client(mut self, client: reqwest::Client) -> Self {
        self.client = client;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn location(&self) -> &ConfigFileLocation {
        &self.location
    }

    /// Decide between an HTTP fetch and a local read.
    ///
    /// `http(s)://` URLs are fetched, `file://` URLs and absolute paths are read
    /// from disk, and other relative locations are joined onto an http(s) origin
    /// when one is available.
    pub fn resolve_location(location: &str, origin: Option<&Url>) -> ConfigFileLocation {
        let location = location.trim();

        if let Ok(url) = Url::parse(location) {
            match url.scheme() {
                "http" | "https" => return ConfigFileLocation::Url(url),
                "file" => {
                    if let Ok(path) = url.to_file_path() {
                        return ConfigFileLocation::Path(path);
                    }
                }
                _ => {}
            }
        }

        let path = PathBuf::from(location);
        if path.is_absolute() {
            return ConfigFileLocation::Path(path);
        }

        match origin {
            Some(origin) if matches!(origin.scheme(), "http" | "https") => {
                let mut base = origin.clone();
                if !base.path().ends_with('/') {
                    let dir = format!("{}/", base.path());
                    base.set_path(&dir);
                }
                match base.join(location) {
                    Ok(url) => ConfigFileLocation::Url(url),
                    Err(_) => ConfigFileLocation::Path(path),
                }
            }
            _ => ConfigFileLocation::Path(path),
        }
    }

    /// Forget the fetched result so the next access fetches again
    pub fn reset(&self) {
        if let Ok(mut fetched) = self.fetched.write() {
            *fetched = Arc::new(OnceCell::new());
        }
    }

    /// Whether the one allowed fetch already happened
    pub fn is_fetched(&self) -> bool {
        self.fetched
            .read()
            .map(|cell| cell.initialized())
            .unwrap_or(false)
    }

    async fn fetch(&self) -> FetchOutcome {
        let body = match &self.location {
            ConfigFileLocation::Url(url) => self.fetch_url(url).await?,
            ConfigFileLocation::Path(path) => tokio::fs::read_to_string(path).await.map_err(|e| {
                ConsoleError::Transport(format!(
                    "Failed to read configuration file {}: {}",
                    path.display(),
                    e
                ))
            })?,
        };

        Self::parse_entries(&body)
    }

    async fn fetch_url(&self, url: &Url) -> Result<String, ConsoleError> {
        let response = self
            .client
            .get(url.clone())
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| {
                ConsoleError::Transport(format!(
                    "Failed to fetch configuration file from {}: {}",
                    url, e
                ))
            })?;

        if !response.status().is_success() {
            return Err(ConsoleError::Transport(format!(
                "Failed to fetch configuration file: HTTP {} from {}",
                response.status(),
                url
            )));
        }

        response.text().await.map_err(|e| {
            ConsoleError::Transport(format!(
                "Failed to read configuration file body from {}: {}",
                url, e
            ))
        })
    }

    /// Parse the file body; only a JSON array is accepted
    pub fn parse_entries(body: &str) -> FetchOutcome {
        let value: Value = serde_json::from_str(body).map_err(|e| {
            ConsoleError::Transport(format!("Configuration file is not valid JSON: {}", e))
        })?;

        let items = match value {
            Value::Array(items) => items,
            other => {
                return Err(ConsoleError::Transport(format!(
                    "Configuration file must hold a JSON array, found {}",
                    json_type_name(&other)
                )))
            }
        };

        let mut entries = Vec::with_capacity(items.len());
        for item in items {
            match serde_json::from_value::<ConfigurationEntry>(item) {
                Ok(entry) if !entry.id.trim().is_empty() => entries.push(entry),
                Ok(_) => log::warn!("Skipping configuration file entry without an id"),
                Err(e) => log::warn!("Skipping malformed configuration file entry: {}", e),
            }
        }
        Ok(entries)
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[async_trait]
impl ConfigurationSource for RemoteFileSource {
    fn kind(&self) -> SourceKind {
        SourceKind::RemoteFile
    }

    fn description(&self) -> &'static str {
        "Configurations from the console configuration file"
    }

    async fn entries(&self) -> Result<Vec<ConfigurationEntry>, ConsoleError> {
        let cell = self
            .fetched
            .read()
            .map(|cell| cell.clone())
            .map_err(|_| ConsoleError::ConfigError("configuration file cache lock poisoned".to_string()))?;

        let outcome = cell
            .get_or_init(|| async {
                let outcome = self.fetch().await;
                match &outcome {
                    Ok(entries) => log::info!(
                        "Loaded {} configuration(s) from {:?}",
                        entries.len(),
                        self.location
                    ),
                    Err(e) => log::warn!(
                        "Configuration file unavailable, using no entries from it: {}",
                        e
                    ),
                }
                outcome
            })
            .await
            .clone();
        outcome
    }
}
