//! Registry tests: aggregation, precedence and persisted writes

#[cfg(test)]
mod tests {
    use super::super::*;
    use crate::errors::ConsoleError;
    use crate::storage::{MemoryStorage, StorageBackend};
    use reqwest::Url;
    use serde_json::json;
    use std::sync::Arc;

    fn entry(id: &str, root: &str) -> ConfigurationEntry {
        ConfigurationEntry::new(id).with_service("inv", root)
    }

    /// Registry without a configuration file source
    fn registry_with(storage: Arc<MemoryStorage>) -> ConfigurationRegistry {
        ConfigurationRegistry::builder(storage)
            .config_file("/nonexistent/rackdesk/config.json")
            .source_enabled(SourceKind::RemoteFile, false)
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn test_created_entry_reads_back_equal() {
        let registry = registry_with(Arc::new(MemoryStorage::new()));
        let created = registry
            .create(entry("a", "http://h1:1000").with_name("Rack A"))
            .await
            .unwrap();

        let read = registry.read("a").await.unwrap();
        assert_eq!(read, created);
        assert_eq!(read.display_name(), "Rack A");
    }

    #[tokio::test]
    async fn test_create_rejections_leave_storage_untouched() {
        let storage = Arc::new(MemoryStorage::new());
        let registry = registry_with(storage.clone());
        registry.create(entry("a", "http://h1:1000")).await.unwrap();
        let before = storage.get(CONFIGURATIONS_KEY);

        let blank = registry.create(entry("  ", "http://blank")).await.unwrap_err();
        assert!(matches!(blank, ConsoleError::Validation(_)));

        let duplicate = registry.create(entry("a", "http://other")).await.unwrap_err();
        assert!(matches!(duplicate, ConsoleError::Validation(_)));

        assert_eq!(storage.get(CONFIGURATIONS_KEY), before);
    }

    #[tokio::test]
    async fn test_update_and_remove_require_existing_entry() {
        let registry = registry_with(Arc::new(MemoryStorage::new()));

        let err = registry.update(entry("ghost", "http://x")).await.unwrap_err();
        assert!(err.is_not_found());
        let err = registry.remove("ghost").await.unwrap_err();
        assert!(err.is_not_found());

        registry.create(entry("a", "http://h1:1000")).await.unwrap();
        registry.update(entry("a", "http://h1:1001")).await.unwrap();
        assert_eq!(
            registry.read("a").await.unwrap().api_root("inv"),
            Some("http://h1:1001")
        );

        registry.remove("a").await.unwrap();
        assert!(registry.read("a").await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_returned_entries_are_copies() {
        let registry = registry_with(Arc::new(MemoryStorage::new()));
        registry.create(entry("a", "http://h1:1000")).await.unwrap();

        let mut copy = registry.read("a").await.unwrap();
        copy.services.clear();

        assert_eq!(
            registry.read("a").await.unwrap().api_root("inv"),
            Some("http://h1:1000")
        );
    }

    #[tokio::test]
    async fn test_earlier_source_wins_on_collision() {
        let storage = Arc::new(MemoryStorage::new());
        let registry = ConfigurationRegistry::builder(storage)
            .config_file("/nonexistent/rackdesk/config.json")
            .register(entry("x", "http://explicit"))
            .build()
            .unwrap();
        registry.create(entry("x", "http://persisted")).await.unwrap();

        for _ in 0..3 {
            let read = registry.read("x").await.unwrap();
            assert_eq!(read.api_root("inv"), Some("http://explicit"));
        }
        assert_eq!(registry.query(&ConfigurationFilter::all()).await.unwrap().len(), 1);

        registry.set_source_enabled(SourceKind::Explicit, false);
        let read = registry.read("x").await.unwrap();
        assert_eq!(read.api_root("inv"), Some("http://persisted"));
    }

    #[tokio::test]
    async fn test_query_keeps_precedence_order() {
        let storage = Arc::new(MemoryStorage::new());
        storage.set(
            CONFIGURATIONS_KEY,
            json!([
                {"id": "a", "services": {"inv": {"apiRoot": "http://h1:1000"}}},
                {"id": "b", "services": {"inv": {"apiRoot": "http://h2:2000"}}}
            ]),
        );

        let registry = ConfigurationRegistry::builder(storage)
            .origin(Url::parse("http://console.local").unwrap())
            .config_file("/nonexistent/rackdesk/config.json")
            .register(ConfigurationEntry::new("embedded"))
            .service_base("inv", ":6385")
            .build()
            .unwrap();

        let ids: Vec<String> = registry
            .query(&ConfigurationFilter::all())
            .await
            .unwrap()
            .into_iter()
            .map(|e| e.id)
            .collect();
        assert_eq!(ids, vec!["embedded", "default", "a", "b"]);

        let with_inv = registry.query(&ConfigurationFilter::by_service("inv")).await.unwrap();
        assert_eq!(with_inv.len(), 3);
    }

    #[tokio::test]
    async fn test_disabled_sources_are_excluded() {
        let storage = Arc::new(MemoryStorage::new());
        let registry = ConfigurationRegistry::builder(storage)
            .config_file("/nonexistent/rackdesk/config.json")
            .service_base("inv", ":6385")
            .source_enabled(SourceKind::Generated, false)
            .build()
            .unwrap();

        assert!(registry.query(&ConfigurationFilter::all()).await.unwrap().is_empty());
        assert!(!registry.is_source_enabled(SourceKind::Generated));

        let statuses = registry.list_sources();
        let kinds: Vec<SourceKind> = statuses.iter().map(|s| s.kind).collect();
        assert_eq!(kinds, SourceKind::ALL.to_vec());
        assert!(!statuses[1].enabled);
        assert!(statuses[3].enabled);
    }

    #[tokio::test]
    async fn test_failed_config_file_degrades_to_zero_entries() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/config.json")
            .with_status(500)
            .expect(1)
            .create_async()
            .await;

        let storage = Arc::new(MemoryStorage::new());
        let registry = ConfigurationRegistry::builder(storage)
            .origin(Url::parse(&server.url()).unwrap())
            .build()
            .unwrap();
        registry.create(entry("a", "http://h1:1000")).await.unwrap();

        let all = registry.query(&ConfigurationFilter::all()).await.unwrap();
        assert_eq!(all.len(), 1);

        // Reads of ids nobody has surface the fetch failure
        let err = registry.read("from-file").await.unwrap_err();
        assert!(matches!(err, ConsoleError::Transport(_)));
        assert!(registry.read("a").await.is_ok());

        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_toggling_config_file_source_does_not_refetch() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/config.json")
            .with_status(200)
            .with_body(r#"[{"id": "lab", "services": {"inv": {"apiRoot": "http://lab:6385"}}}]"#)
            .expect(1)
            .create_async()
            .await;

        let storage = Arc::new(MemoryStorage::new());
        let registry = ConfigurationRegistry::builder(storage)
            .origin(Url::parse(&server.url()).unwrap())
            .build()
            .unwrap();

        assert_eq!(registry.read("lab").await.unwrap().api_root("inv"), Some("http://lab:6385"));

        registry.set_source_enabled(SourceKind::RemoteFile, false);
        assert!(registry.read("lab").await.unwrap_err().is_not_found());

        registry.set_source_enabled(SourceKind::RemoteFile, true);
        assert!(registry.read("lab").await.is_ok());

        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_lookup_first_entry() {
        let registry = registry_with(Arc::new(MemoryStorage::new()));
        assert_eq!(ConfigurationLookup::first(&registry).await.unwrap(), None);

        registry.create(entry("a", "http://h1:1000")).await.unwrap();
        registry.create(entry("b", "http://h2:2000")).await.unwrap();
        let first = ConfigurationLookup::first(&registry).await.unwrap().unwrap();
        assert_eq!(first.id, "a");
    }

    #[tokio::test]
    async fn test_reset_clears_programmatic_registrations() {
        let registry = registry_with(Arc::new(MemoryStorage::new()));
        registry.register(ConfigurationEntry::new("embedded"));
        registry.register_service_base("inv", ":6385");
        assert_eq!(registry.query(&ConfigurationFilter::all()).await.unwrap().len(), 2);

        registry.reset();
        assert!(registry.query(&ConfigurationFilter::all()).await.unwrap().is_empty());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 8)]
    async fn test_parallel_creates_all_persist() {
        let registry = Arc::new(registry_with(Arc::new(MemoryStorage::new())));

        let tasks: Vec<_> = (0..200)
            .map(|i| {
                let registry = registry.clone();
                tokio::spawn(async move {
                    registry
                        .create(entry(&format!("e{}", i), &format!("http://h{}:1000", i)))
                        .await
                })
            })
            .collect();
        for task in tasks {
            task.await.unwrap().unwrap();
        }

        let stored = registry.query(&ConfigurationFilter::all()).await.unwrap();
        assert_eq!(stored.len(), 200);
        for i in 0..200 {
            registry.read(&format!("e{}", i)).await.unwrap();
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 8)]
    async fn test_parallel_duplicate_creates_admit_one() {
        let storage = Arc::new(MemoryStorage::new());
        let registry = Arc::new(registry_with(storage.clone()));

        let tasks: Vec<_> = (0..32)
            .map(|i| {
                let registry = registry.clone();
                tokio::spawn(async move {
                    registry.create(entry("x", &format!("http://h{}:1000", i))).await
                })
            })
            .collect();

        let mut created = 0;
        for task in tasks {
            match task.await.unwrap() {
                Ok(_) => created += 1,
                Err(e) => assert!(matches!(e, ConsoleError::Validation(_))),
            }
        }

        assert_eq!(created, 1);
        assert_eq!(
            storage
                .get(CONFIGURATIONS_KEY)
                .and_then(|list| list.as_array().map(|items| items.len())),
            Some(1)
        );
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_parallel_updates_and_removes_keep_other_entries() {
        let registry = Arc::new(registry_with(Arc::new(MemoryStorage::new())));
        for i in 0..40 {
            registry
                .create(entry(&format!("e{}", i), "http://old:1000"))
                .await
                .unwrap();
        }

        let tasks: Vec<_> = (0..40)
            .map(|i| {
                let registry = registry.clone();
                tokio::spawn(async move {
                    let id = format!("e{}", i);
                    if i % 2 == 0 {
                        registry.remove(&id).await
                    } else {
                        registry.update(entry(&id, "http://new:1000")).await.map(|_| ())
                    }
                })
            })
            .collect();
        for task in tasks {
            task.await.unwrap().unwrap();
        }

        let stored = registry.query(&ConfigurationFilter::all()).await.unwrap();
        assert_eq!(stored.len(), 20);
        assert!(stored
            .iter()
            .all(|entry| entry.api_root("inv") == Some("http://new:1000")));
    }

    #[tokio::test]
    async fn test_create_fails_when_storage_drops_the_list() {
        let dir = tempfile::TempDir::new().unwrap();
        let storage = Arc::new(crate::storage::CookieStorage::in_dir(dir.path()));
        let registry = ConfigurationRegistry::builder(storage)
            .source_enabled(SourceKind::RemoteFile, false)
            .build()
            .unwrap();

        let mut big = ConfigurationEntry::new("big");
        for i in 0..100 {
            big = big.with_service(format!("svc{}", i), format!("http://host-{}.example:6385", i));
        }

        let err = registry.create(big).await.unwrap_err();
        assert!(matches!(err, ConsoleError::Storage(_)));
        assert!(registry.read("big").await.unwrap_err().is_not_found());

        // Small entries still fit
        registry.create(entry("a", "http://h1:1000")).await.unwrap();
        assert_eq!(registry.read("a").await.unwrap().id, "a");
    }
}
