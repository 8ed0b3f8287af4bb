use super::*;
use crate::config::{ConfigurationRegistry, SourceKind};
use crate::storage::MemoryStorage;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::oneshot;

/// Lookup whose reads can be held open until the test releases them
struct GatedLookup {
    entries: Vec<ConfigurationEntry>,
    gates: Mutex<HashMap<String, oneshot::Receiver<()>>>,
    reads: AtomicUsize,
}

impl GatedLookup {
    fn new(ids: &[&str]) -> Self {
        Self {
            entries: ids
                .iter()
                .map(|id| ConfigurationEntry::new(*id).with_service("inv", format!("http://{}", id)))
                .collect(),
            gates: Mutex::new(HashMap::new()),
            reads: AtomicUsize::new(0),
        }
    }

    /// Hold reads of `id` until the returned sender fires
    fn gate(&self, id: &str) -> oneshot::Sender<()> {
        let (tx, rx) = oneshot::channel();
        self.gates.lock().unwrap().insert(id.to_string(), rx);
        tx
    }

    fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ConfigurationLookup for GatedLookup {
    async fn read(&self, id: &str) -> Result<ConfigurationEntry, ConsoleError> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        let gate = self.gates.lock().unwrap().remove(id);
        if let Some(gate) = gate {
            let _ = gate.await;
        }
        self.entries
            .iter()
            .find(|entry| entry.id == id)
            .cloned()
            .ok_or_else(|| ConsoleError::NotFound(format!("configuration '{}'", id)))
    }

    async fn first(&self) -> Result<Option<ConfigurationEntry>, ConsoleError> {
        Ok(self.entries.first().cloned())
    }
}

fn resolver(lookup: Arc<GatedLookup>, storage: Arc<MemoryStorage>) -> SelectedConfiguration {
    SelectedConfiguration::new(lookup, storage)
}

#[tokio::test]
async fn test_same_id_shares_pending_handle() {
    let lookup = Arc::new(GatedLookup::new(&["a"]));
    let release = lookup.gate("a");
    let selection = resolver(lookup.clone(), Arc::new(MemoryStorage::new()));

    let first = selection.set("a");
    let second = selection.set("a");
    assert_eq!(first, second);
    assert!(!first.is_settled());
    assert_eq!(selection.state(), SelectionState::Resolving(Some("a".to_string())));

    release.send(()).unwrap();
    let (one, two) = tokio::join!(first, second);
    assert_eq!(one.unwrap(), two.unwrap());
    assert_eq!(lookup.reads(), 1);
}

#[tokio::test]
async fn test_set_after_resolution_is_idempotent() {
    let lookup = Arc::new(GatedLookup::new(&["a"]));
    let storage = Arc::new(MemoryStorage::new());
    let selection = resolver(lookup.clone(), storage.clone());

    let handle = selection.set("a");
    handle.clone().await.unwrap();
    storage.remove(SELECTED_CONFIGURATION_KEY);

    let entry = ConfigurationEntry::new("a");
    let again = selection.set(&entry);
    assert_eq!(again, handle);
    assert_eq!(lookup.reads(), 1);
    // No redundant persistence write either
    assert_eq!(selection.persisted_id(), None);
}

#[tokio::test]
async fn test_last_requested_wins_over_last_settled() {
    let lookup = Arc::new(GatedLookup::new(&["a", "b"]));
    let release_a = lookup.gate("a");
    let release_b = lookup.gate("b");
    let storage = Arc::new(MemoryStorage::new());
    let selection = resolver(lookup.clone(), storage.clone());

    let handle_a = selection.set("a");
    let handle_b = selection.set("b");
    assert_ne!(handle_a, handle_b);

    release_b.send(()).unwrap();
    assert_eq!(handle_b.await.unwrap().id, "b");

    release_a.send(()).unwrap();
    assert_eq!(handle_a.await.unwrap().id, "a");

    assert_eq!(selection.state(), SelectionState::Resolved("b".to_string()));
    assert_eq!(selection.persisted_id().as_deref(), Some("b"));
    assert_eq!(selection.get().await.unwrap().id, "b");
}

#[tokio::test]
async fn test_get_returns_in_flight_handle() {
    let lookup = Arc::new(GatedLookup::new(&["a"]));
    let release = lookup.gate("a");
    let selection = resolver(lookup.clone(), Arc::new(MemoryStorage::new()));

    let pending = selection.set("a");
    assert_eq!(selection.get(), pending);

    release.send(()).unwrap();
    pending.await.unwrap();
    assert_eq!(lookup.reads(), 1);
}

#[tokio::test]
async fn test_get_restores_persisted_id() {
    let lookup = Arc::new(GatedLookup::new(&["a", "b"]));
    let storage = Arc::new(MemoryStorage::new());
    storage.set(SELECTED_CONFIGURATION_KEY, Value::String("b".to_string()));

    let selection = resolver(lookup, storage);
    assert_eq!(selection.state(), SelectionState::Unset);
    assert_eq!(selection.get().await.unwrap().id, "b");
}

#[tokio::test]
async fn test_get_without_selection_uses_first_entry() {
    let lookup = Arc::new(GatedLookup::new(&["a", "b"]));
    let storage = Arc::new(MemoryStorage::new());
    let selection = resolver(lookup, storage);

    let handle = selection.get();
    assert_eq!(handle.id(), None);
    assert_eq!(handle.await.unwrap().id, "a");
    assert_eq!(selection.persisted_id().as_deref(), Some("a"));

    // The resolved default counts as selected
    let again = selection.set("a");
    assert!(again.is_settled());
}

#[tokio::test]
async fn test_get_with_empty_registry_is_invalid() {
    let lookup = Arc::new(GatedLookup::new(&[]));
    let selection = resolver(lookup, Arc::new(MemoryStorage::new()));

    let err = selection.get().await.unwrap_err();
    assert!(err.is_not_found());
    assert_eq!(selection.state(), SelectionState::Invalid(None));
}

#[tokio::test]
async fn test_stale_persisted_id_is_evicted() {
    let storage = Arc::new(MemoryStorage::new());
    let registry = Arc::new(
        ConfigurationRegistry::builder(storage.clone())
            .source_enabled(SourceKind::RemoteFile, false)
            .build()
            .unwrap(),
    );
    registry
        .create(ConfigurationEntry::new("gone").with_service("inv", "http://h1:1000"))
        .await
        .unwrap();

    let selection = SelectedConfiguration::new(registry.clone(), storage.clone());
    selection.set("gone").await.unwrap();
    registry.remove("gone").await.unwrap();

    // Simulated restart
    let restarted = SelectedConfiguration::new(registry.clone(), storage.clone());
    assert!(restarted.get().await.is_err());
    assert_eq!(restarted.state(), SelectionState::Invalid(Some("gone".to_string())));
    assert_eq!(restarted.persisted_id(), None);

    let after_restart = SelectedConfiguration::new(registry, storage);
    assert_eq!(after_restart.state(), SelectionState::Unset);
    assert_eq!(after_restart.persisted_id(), None);
}

#[tokio::test]
async fn test_failed_set_keeps_other_persisted_id() {
    let lookup = Arc::new(GatedLookup::new(&["b"]));
    let storage = Arc::new(MemoryStorage::new());
    let selection = resolver(lookup, storage);

    selection.set("b").await.unwrap();
    let err = selection.set("missing").await.unwrap_err();

    assert!(err.is_not_found());
    assert_eq!(selection.state(), SelectionState::Invalid(Some("missing".to_string())));
    assert_eq!(selection.persisted_id().as_deref(), Some("b"));

    // Back to the persisted selection on the next get
    assert_eq!(selection.get().await.unwrap().id, "b");
}

#[tokio::test]
async fn test_resolution_settles_without_being_awaited() {
    let lookup = Arc::new(GatedLookup::new(&["a"]));
    let storage = Arc::new(MemoryStorage::new());
    let selection = resolver(lookup, storage);

    let handle = selection.set("a");
    for _ in 0..100 {
        if handle.is_settled() {
            break;
        }
        tokio::task::yield_now().await;
    }

    assert!(handle.is_settled());
    assert_eq!(selection.state(), SelectionState::Resolved("a".to_string()));
}

#[tokio::test]
async fn test_clear_forgets_selection() {
    let lookup = Arc::new(GatedLookup::new(&["a", "b"]));
    let storage = Arc::new(MemoryStorage::new());
    let selection = resolver(lookup, storage);

    selection.set("b").await.unwrap();
    selection.clear();

    assert_eq!(selection.state(), SelectionState::Unset);
    assert_eq!(selection.persisted_id(), None);
    assert_eq!(selection.get().await.unwrap().id, "a");
}

#[tokio::test]
async fn test_handles_of_different_resolvers_differ() {
    let lookup = Arc::new(GatedLookup::new(&["a"]));
    let one = resolver(lookup.clone(), Arc::new(MemoryStorage::new()));
    let two = resolver(lookup, Arc::new(MemoryStorage::new()));

    let first = one.set("a");
    let second = two.set("a");
    assert_eq!(first.generation(), second.generation());
    assert_ne!(first, second);
    assert_eq!(first, one.get());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_racing_sets_on_separate_tasks_keep_last_request() {
    let lookup = Arc::new(GatedLookup::new(&["a", "b"]));
    let release_a = lookup.gate("a");
    let release_b = lookup.gate("b");
    let storage = Arc::new(MemoryStorage::new());
    let selection = Arc::new(resolver(lookup, storage));

    let (requested_a, wait_a) = oneshot::channel();
    let task_a = tokio::spawn({
        let selection = selection.clone();
        async move {
            let handle = selection.set("a");
            let _ = requested_a.send(());
            handle.await
        }
    });
    wait_a.await.unwrap();

    let (requested_b, wait_b) = oneshot::channel();
    let task_b = tokio::spawn({
        let selection = selection.clone();
        async move {
            let handle = selection.set("b");
            let _ = requested_b.send(());
            handle.await
        }
    });
    wait_b.await.unwrap();

    release_b.send(()).unwrap();
    assert_eq!(task_b.await.unwrap().unwrap().id, "b");
    release_a.send(()).unwrap();
    assert_eq!(task_a.await.unwrap().unwrap().id, "a");

    assert_eq!(selection.state(), SelectionState::Resolved("b".to_string()));
    assert_eq!(selection.persisted_id().as_deref(), Some("b"));
    assert_eq!(selection.get().await.unwrap().id, "b");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn test_many_racing_sets_agree_with_storage() {
    let lookup = Arc::new(GatedLookup::new(&["a", "b"]));
    let selection = Arc::new(resolver(lookup, Arc::new(MemoryStorage::new())));

    let tasks: Vec<_> = (0..64)
        .map(|i| {
            let selection = selection.clone();
            tokio::spawn(async move {
                let id = if i % 2 == 0 { "a" } else { "b" };
                selection.set(id).await
            })
        })
        .collect();
    for task in tasks {
        task.await.unwrap().unwrap();
    }

    let active = selection.get().await.unwrap();
    assert_eq!(selection.state(), SelectionState::Resolved(active.id.clone()));
    assert_eq!(selection.persisted_id(), Some(active.id));
}
