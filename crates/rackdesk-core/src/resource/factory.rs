//! Hands out resource clients for the active configuration
//!
//! A client is bound to `<apiRoot of service>/<resource>` under whichever entry
//! the selection resolves to. Clients are built once per endpoint through the
//! builder registered for the service (or the fallback builder when the
//! service has none) and cached by base URI, so switching back to an earlier
//! configuration reuses its clients.

use super::cache::ResourceCache;
use super::client::{ClientBuilder, NullResourceClient, ResourceClient};
use crate::selection::SelectedConfiguration;
use crate::uri::{join_segment, normalize_base_uri};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

pub struct ResourceFactory {
    selection: Arc<SelectedConfiguration>,
    cache: Arc<ResourceCache>,
    builders: RwLock<HashMap<String, ClientBuilder>>,
    fallback: RwLock<Option<ClientBuilder>>,
}

impl ResourceFactory {
    pub fn new(selection: Arc<SelectedConfiguration>, cache: Arc<ResourceCache>) -> Self {
        Self {
            selection,
            cache,
            builders: RwLock::new(HashMap::new()),
            fallback: RwLock::new(None),
        }
    }

    /// Register (or replace) the client builder for a service
    pub fn register_builder(&self, service: impl Into<String>, builder: ClientBuilder) {
        if let Ok(mut builders) = self.builders.write() {
            builders.insert(service.into(), builder);
        }
    }

    /// Builder for services that have no builder of their own
    pub fn set_fallback_builder(&self, builder: ClientBuilder) {
        if let Ok(mut fallback) = self.fallback.write() {
            *fallback = Some(builder);
        }
    }

    pub fn has_fallback_builder(&self) -> bool {
        self.fallback
            .read()
            .map(|fallback| fallback.is_some())
            .unwrap_or(false)
    }

    /// Whether `service` has a builder registered under its own name
    pub fn has_builder(&self, service: &str) -> bool {
        self.builders
            .read()
            .map(|builders| builders.contains_key(service))
            .unwrap_or(false)
    }

    pub fn cache(&self) -> &ResourceCache {
        &self.cache
    }

    /// Client for `resource` of `service` under the active configuration.
    ///
    /// Never fails: without an active configuration, an api root for the
    /// service, or any builder to use, the caller gets a null client whose
    /// operations all fail. Null clients are not cached.
    pub async fn resource(&self, service: &str, resource: &str) -> Arc<dyn ResourceClient> {
        let entry = match self.selection.get().await {
            Ok(entry) => entry,
            Err(e) => {
                log::debug!("No active configuration for {}/{}: {}", service, resource, e);
                return Arc::new(NullResourceClient::new());
            }
        };

        let Some(root) = entry.api_root(service) else {
            log::debug!(
                "Configuration '{}' has no endpoint for service '{}'",
                entry.id,
                service
            );
            return Arc::new(NullResourceClient::new());
        };

        let uri = normalize_base_uri(&join_segment(root, resource));
        if let Some(client) = self.cache.get(&uri) {
            return client;
        }

        let Some(builder) = self.builder_for(service) else {
            log::warn!("No client builder registered for service '{}'", service);
            return Arc::new(NullResourceClient::for_uri(uri));
        };

        self.cache.get_or_insert_with(&uri, || builder(&uri, resource))
    }

    fn builder_for(&self, service: &str) -> Option<ClientBuilder> {
        let specific = self
            .builders
            .read()
            .ok()
            .and_then(|builders| builders.get(service).cloned());
        specific.or_else(|| self.fallback.read().ok().and_then(|fallback| fallback.clone()))
    }
}
