//! Memoized resource clients keyed by normalized base URI

use super::client::ResourceClient;
use crate::uri::normalize_base_uri;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

/// Client cache: one client per endpoint, never evicted on its own
#[derive(Default)]
pub struct ResourceCache {
    clients: RwLock<HashMap<String, Arc<dyn ResourceClient>>>,
}

impl ResourceCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn has(&self, uri: &str) -> bool {
        let key = normalize_base_uri(uri);
        self.clients
            .read()
            .map(|clients| clients.contains_key(&key))
            .unwrap_or(false)
    }

    pub fn get(&self, uri: &str) -> Option<Arc<dyn ResourceClient>> {
        let key = normalize_base_uri(uri);
        self.clients.read().ok()?.get(&key).cloned()
    }

    /// Store a client, replacing any client already cached for the URI
    pub fn set(&self, uri: &str, client: Arc<dyn ResourceClient>) -> Arc<dyn ResourceClient> {
        let key = normalize_base_uri(uri);
        if let Ok(mut clients) = self.clients.write() {
            clients.insert(key, client.clone());
        }
        client
    }

    /// Cached client for the URI, building and storing one if absent
    pub fn get_or_insert_with<F>(&self, uri: &str, build: F) -> Arc<dyn ResourceClient>
    where
        F: FnOnce() -> Arc<dyn ResourceClient>,
    {
        let key = normalize_base_uri(uri);
        let mut clients = match self.clients.write() {
            Ok(clients) => clients,
            Err(poisoned) => poisoned.into_inner(),
        };

        if let Some(client) = clients.get(&key) {
            log::debug!("Reusing cached client for {}", key);
            return client.clone();
        }

        log::debug!("Building client for {}", key);
        let client = build();
        clients.insert(key, client.clone());
        client
    }

    pub fn remove(&self, uri: &str) {
        let key = normalize_base_uri(uri);
        if let Ok(mut clients) = self.clients.write() {
            clients.remove(&key);
        }
    }

    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self
            .clients
            .read()
            .map(|clients| clients.keys().cloned().collect())
            .unwrap_or_default();
        keys.sort();
        keys
    }

    pub fn clear_all(&self) {
        if let Ok(mut clients) = self.clients.write() {
            clients.clear();
        }
    }

    pub fn length(&self) -> usize {
        self.clients.read().map(|clients| clients.len()).unwrap_or(0)
    }
}
