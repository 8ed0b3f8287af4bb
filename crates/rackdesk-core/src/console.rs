//! Console wiring: builds storage, registry, selection and clients from settings

use crate::config::{ConfigurationRegistry, ConsoleSettings, SourceKind};
use crate::errors::ConsoleError;
use crate::resource::{HttpResourceClient, ResourceCache, ResourceClient, ResourceFactory};
use crate::selection::SelectedConfiguration;
use crate::storage::{StorageBackend, StorageSelector};
use std::collections::BTreeSet;
use std::sync::Arc;

/// Factory for assembling a [`Console`] from [`ConsoleSettings`]
pub struct ConsoleFactory;

impl ConsoleFactory {
    /// Probe storage under the configured directory (or the platform default)
    /// and build the console on top of it
    pub fn create_from_settings(settings: ConsoleSettings) -> Result<Console, ConsoleError> {
        let selector = match settings.storage_dir {
            Some(ref dir) => StorageSelector::new(dir),
            None => StorageSelector::with_default_dir(),
        };
        let backend = selector.backend_name();
        let console = Self::create_with_storage(settings, Arc::new(selector))?;
        log::info!("Console ready with {} storage", backend);
        Ok(console)
    }

    pub fn create_with_storage(
        settings: ConsoleSettings,
        storage: Arc<dyn StorageBackend>,
    ) -> Result<Console, ConsoleError> {
        settings.validate()?;

        let http_client = Self::configure_http_client(&settings)?;
        let registry = Arc::new(Self::configure_registry(
            &settings,
            storage.clone(),
            http_client.clone(),
        )?);
        let selection = Arc::new(SelectedConfiguration::new(registry.clone(), storage.clone()));
        let resources = ResourceFactory::new(selection.clone(), Arc::new(ResourceCache::new()));

        // Services named in settings get their own HTTP builder; services that
        // only show up in persisted or file entries go through the fallback
        let builder = HttpResourceClient::builder(http_client, settings.timeout());
        for service in Self::known_services(&settings) {
            log::debug!("Registering HTTP client builder for service '{}'", service);
            resources.register_builder(service, builder.clone());
        }
        resources.set_fallback_builder(builder);

        Ok(Console {
            settings,
            storage,
            registry,
            selection,
            resources,
        })
    }

    fn configure_http_client(settings: &ConsoleSettings) -> Result<reqwest::Client, ConsoleError> {
        reqwest::Client::builder()
            .timeout(settings.timeout())
            .build()
            .map_err(|e| ConsoleError::ConfigError(format!("Failed to build HTTP client: {}", e)))
    }

    fn configure_registry(
        settings: &ConsoleSettings,
        storage: Arc<dyn StorageBackend>,
        http_client: reqwest::Client,
    ) -> Result<ConfigurationRegistry, ConsoleError> {
        let mut builder = ConfigurationRegistry::builder(storage)
            .origin(settings.origin_url()?)
            .config_file(settings.config_file.clone())
            .http_client(http_client)
            .timeout(settings.timeout());

        for kind in SourceKind::ALL {
            builder = builder.source_enabled(kind, settings.sources.is_enabled(kind));
        }
        for entry in &settings.entries {
            builder = builder.register(entry.clone());
        }
        for (service, base) in &settings.services {
            builder = builder.service_base(service.clone(), base.clone());
        }

        builder.build()
    }

    fn known_services(settings: &ConsoleSettings) -> BTreeSet<String> {
        settings
            .services
            .keys()
            .cloned()
            .chain(
                settings
                    .entries
                    .iter()
                    .flat_map(|entry| entry.services.keys().cloned()),
            )
            .collect()
    }
}

/// A fully wired console
pub struct Console {
    settings: ConsoleSettings,
    storage: Arc<dyn StorageBackend>,
    registry: Arc<ConfigurationRegistry>,
    selection: Arc<SelectedConfiguration>,
    resources: ResourceFactory,
}

impl Console {
    pub fn from_settings(settings: ConsoleSettings) -> Result<Self, ConsoleError> {
        ConsoleFactory::create_from_settings(settings)
    }

    pub fn settings(&self) -> &ConsoleSettings {
        &self.settings
    }

    pub fn storage(&self) -> &Arc<dyn StorageBackend> {
        &self.storage
    }

    pub fn registry(&self) -> &Arc<ConfigurationRegistry> {
        &self.registry
    }

    pub fn selection(&self) -> &Arc<SelectedConfiguration> {
        &self.selection
    }

    pub fn resources(&self) -> &ResourceFactory {
        &self.resources
    }

    /// Shorthand for [`ResourceFactory::resource`]
    pub async fn resource(&self, service: &str, resource: &str) -> Arc<dyn ResourceClient> {
        self.resources.resource(service, resource).await
    }
}
