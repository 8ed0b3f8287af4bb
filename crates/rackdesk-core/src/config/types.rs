//! Configuration entry types
//!
//! A configuration entry names one remote deployment and lists the API root of
//! every logical service the console talks to in that deployment.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// One remote deployment the console can target
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct ConfigurationEntry {
    #[serde(default)]
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default)]
    pub services: BTreeMap<String, ServiceEndpoint>,
}

/// Where a logical service is reachable
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ServiceEndpoint {
    #[serde(rename = "apiRoot")]
    pub api_root: String,
}

impl ConfigurationEntry {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: None,
            services: BTreeMap::new(),
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_service(mut self, service: impl Into<String>, api_root: impl Into<String>) -> Self {
        self.services.insert(
            service.into(),
            ServiceEndpoint {
                api_root: api_root.into(),
            },
        );
        self
    }

    /// API root for a service, if this entry defines one
    pub fn api_root(&self, service: &str) -> Option<&str> {
        self.services
            .get(service)
            .map(|endpoint| endpoint.api_root.as_str())
            .filter(|root| !root.trim().is_empty())
    }

    /// Display name, falling back to the id
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.id)
    }
}

/// Selection criteria for `query`; empty fields match everything
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigurationFilter {
    pub id: Option<String>,
    pub service: Option<String>,
}

impl ConfigurationFilter {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn by_service(service: impl Into<String>) -> Self {
        Self {
            id: None,
            service: Some(service.into()),
        }
    }

    pub fn matches(&self, entry: &ConfigurationEntry) -> bool {
        if let Some(ref id) = self.id {
            if &entry.id != id {
                return false;
            }
        }
        if let Some(ref service) = self.service {
            if !entry.services.contains_key(service) {
                return false;
            }
        }
        true
    }
}

/// Provider categories, declared in precedence order (earliest wins)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum SourceKind {
    /// Entries registered programmatically, mostly for tests and embedding
    Explicit,
    /// Single entry synthesized from per-service base URLs and the origin
    Generated,
    /// Entries loaded once from the well-known configuration file
    RemoteFile,
    /// Operator-managed entries held in storage; the only writable source
    Persisted,
}

impl SourceKind {
    pub const ALL: [SourceKind; 4] = [
        SourceKind::Explicit,
        SourceKind::Generated,
        SourceKind::RemoteFile,
        SourceKind::Persisted,
    ];

    pub fn is_writable(self) -> bool {
        matches!(self, SourceKind::Persisted)
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SourceKind::Explicit => "explicit",
            SourceKind::Generated => "generated",
            SourceKind::RemoteFile => "remote-file",
            SourceKind::Persisted => "persisted",
        };
        f.write_str(name)
    }
}

/// Anything that names a configuration entry: a bare id or an entry itself
pub trait AsConfigurationId {
    fn configuration_id(&self) -> &str;
}

impl AsConfigurationId for str {
    fn configuration_id(&self) -> &str {
        self
    }
}

impl AsConfigurationId for String {
    fn configuration_id(&self) -> &str {
        self.as_str()
    }
}

impl AsConfigurationId for ConfigurationEntry {
    fn configuration_id(&self) -> &str {
        &self.id
    }
}

impl<T: AsConfigurationId + ?Sized> AsConfigurationId for &T {
    fn configuration_id(&self) -> &str {
        (**self).configuration_id()
    }
}
