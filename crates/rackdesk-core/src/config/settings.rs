//! Console settings and their loader
//!
//! Settings describe how the console itself is wired: which origin it serves
//! from, where durable storage lives, which configuration sources are active and
//! which service bases feed the generated default. They are read from YAML (a
//! local file or a URL), then environment overrides are applied, then the result
//! is validated.

use crate::config::types::{ConfigurationEntry, SourceKind};
use crate::config::registry::DEFAULT_ORIGIN;
use crate::config::sources::DEFAULT_CONFIG_FILE;
use crate::errors::ConsoleError;
use reqwest::Url;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::env;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;
use tokio::fs;

pub const ENV_ORIGIN: &str = "RACKDESK_ORIGIN";
pub const ENV_CONFIG_FILE: &str = "RACKDESK_CONFIG_FILE";
pub const ENV_STORAGE_DIR: &str = "RACKDESK_STORAGE_DIR";
pub const ENV_LOG_LEVEL: &str = "RACKDESK_LOG_LEVEL";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ConsoleSettings {
    #[serde(default = "default_origin")]
    pub origin: String,
    #[serde(default = "default_config_file")]
    pub config_file: String,
    #[serde(default)]
    pub storage_dir: Option<PathBuf>,
    #[serde(default)]
    pub sources: SourceSettings,
    /// Service name to base (`http://...`, `:port`, or a path under the origin)
    #[serde(default)]
    pub services: BTreeMap<String, String>,
    /// Entries registered in the explicit source
    #[serde(default)]
    pub entries: Vec<ConfigurationEntry>,
    #[serde(default)]
    pub http: HttpSettings,
    #[serde(default)]
    pub logging: LoggingSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SourceSettings {
    #[serde(default = "default_true")]
    pub explicit: bool,
    #[serde(default = "default_true")]
    pub generated: bool,
    #[serde(default = "default_true")]
    pub remote_file: bool,
    #[serde(default = "default_true")]
    pub persisted: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct HttpSettings {
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LoggingSettings {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub file: Option<PathBuf>,
}

fn default_origin() -> String {
    DEFAULT_ORIGIN.to_string()
}

fn default_config_file() -> String {
    DEFAULT_CONFIG_FILE.to_string()
}

fn default_true() -> bool {
    true
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for ConsoleSettings {
    fn default() -> Self {
        Self {
            origin: default_origin(),
            config_file: default_config_file(),
            storage_dir: None,
            sources: SourceSettings::default(),
            services: BTreeMap::new(),
            entries: Vec::new(),
            http: HttpSettings::default(),
            logging: LoggingSettings::default(),
        }
    }
}

impl Default for SourceSettings {
    fn default() -> Self {
        Self {
            explicit: true,
            generated: true,
            remote_file: true,
            persisted: true,
        }
    }
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: None,
        }
    }
}

impl SourceSettings {
    pub fn is_enabled(&self, kind: SourceKind) -> bool {
        match kind {
            SourceKind::Explicit => self.explicit,
            SourceKind::Generated => self.generated,
            SourceKind::RemoteFile => self.remote_file,
            SourceKind::Persisted => self.persisted,
        }
    }
}

impl ConsoleSettings {
    pub fn origin_url(&self) -> Result<Url, ConsoleError> {
        Url::parse(&self.origin)
            .map_err(|e| ConsoleError::ConfigError(format!("Invalid origin '{}': {}", self.origin, e)))
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.http.timeout_secs)
    }

    pub fn log_level(&self) -> log::LevelFilter {
        log::LevelFilter::from_str(&self.logging.level).unwrap_or(log::LevelFilter::Info)
    }

    pub fn validate(&self) -> Result<(), ConsoleError> {
        let origin = self.origin_url()?;
        if !matches!(origin.scheme(), "http" | "https") {
            return Err(ConsoleError::ConfigError(format!(
                "Origin must be an http(s) URL, got '{}'",
                self.origin
            )));
        }

        if self.config_file.trim().is_empty() {
            return Err(ConsoleError::ConfigError(
                "config_file cannot be empty".to_string(),
            ));
        }

        if self.http.timeout_secs == 0 {
            return Err(ConsoleError::ConfigError(
                "http.timeout_secs must be greater than zero".to_string(),
            ));
        }

        if log::LevelFilter::from_str(&self.logging.level).is_err() {
            return Err(ConsoleError::ConfigError(format!(
                "Unknown log level '{}'",
                self.logging.level
            )));
        }

        let mut seen = HashSet::new();
        for entry in &self.entries {
            if entry.id.trim().is_empty() {
                return Err(ConsoleError::ConfigError(
                    "Registered configuration entries need an id".to_string(),
                ));
            }
            if !seen.insert(entry.id.as_str()) {
                return Err(ConsoleError::ConfigError(format!(
                    "Configuration entry '{}' is registered twice",
                    entry.id
                )));
            }
        }

        Ok(())
    }
}

/// Settings loader with environment resolution
pub struct SettingsLoader;

impl SettingsLoader {
    /// Load settings from a file path or an http(s) URL
    pub async fn from_source(source: &str) -> Result<ConsoleSettings, ConsoleError> {
        if source.starts_with("http://") || source.starts_with("https://") {
            Self::from_url(source).await
        } else {
            Self::from_file(source).await
        }
    }

    /// Load settings from a URL
    pub async fn from_url(url: &str) -> Result<ConsoleSettings, ConsoleError> {
        let client = reqwest::Client::new();
        let response = client.get(url).send().await.map_err(|e| {
            ConsoleError::ConfigError(format!("Failed to fetch settings from URL {}: {}", url, e))
        })?;

        if !response.status().is_success() {
            return Err(ConsoleError::ConfigError(format!(
                "Failed to fetch settings: HTTP {} from URL {}",
                response.status(),
                url
            )));
        }

        let content = response.text().await.map_err(|e| {
            ConsoleError::ConfigError(format!(
                "Failed to read settings response from URL {}: {}",
                url, e
            ))
        })?;

        Self::from_str(&content)
    }

    /// Load settings from a YAML file
    pub async fn from_file<P: AsRef<Path>>(path: P) -> Result<ConsoleSettings, ConsoleError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).await.map_err(|e| {
            ConsoleError::ConfigError(format!(
                "Failed to read settings file {}: {}",
                path.display(),
                e
            ))
        })?;

        Self::from_str(&content)
    }

    /// Parse YAML, apply process environment overrides, validate
    pub fn from_str(content: &str) -> Result<ConsoleSettings, ConsoleError> {
        let env_vars: HashMap<String, String> = env::vars().collect();
        Self::from_str_with_env(content, &env_vars)
    }

    /// Same as [`SettingsLoader::from_str`] with an explicit environment
    pub fn from_str_with_env(
        content: &str,
        env_vars: &HashMap<String, String>,
    ) -> Result<ConsoleSettings, ConsoleError> {
        let mut settings: ConsoleSettings = if content.trim().is_empty() {
            ConsoleSettings::default()
        } else {
            serde_yaml::from_str(content).map_err(|e| {
                ConsoleError::ConfigError(format!("Failed to parse YAML settings: {}", e))
            })?
        };

        Self::apply_env_overrides(&mut settings, env_vars);
        settings.validate()?;
        Ok(settings)
    }

    /// Defaults plus environment overrides, for running without a settings file
    pub fn from_env() -> Result<ConsoleSettings, ConsoleError> {
        Self::from_str("")
    }

    fn apply_env_overrides(settings: &mut ConsoleSettings, env_vars: &HashMap<String, String>) {
        if let Some(origin) = non_empty(env_vars, ENV_ORIGIN) {
            log::debug!("Origin overridden by {}", ENV_ORIGIN);
            settings.origin = origin;
        }
        if let Some(config_file) = non_empty(env_vars, ENV_CONFIG_FILE) {
            settings.config_file = config_file;
        }
        if let Some(storage_dir) = non_empty(env_vars, ENV_STORAGE_DIR) {
            settings.storage_dir = Some(PathBuf::from(storage_dir));
        }
        if let Some(level) = non_empty(env_vars, ENV_LOG_LEVEL) {
            settings.logging.level = level;
        }
    }
}

fn non_empty(env_vars: &HashMap<String, String>, key: &str) -> Option<String> {
    env_vars
        .get(key)
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}
