//! Tracks which configuration entry is active
//!
//! Configuration switches come from several places at once, so resolution is
//! single-flight: asking for the id that is already being resolved returns the
//! pending handle instead of reading the registry again. Every new resolution
//! takes a fresh generation number and only the latest generation may update
//! the current selection or the persisted id. An older resolution that settles
//! late is ignored, so the last request wins, not the last answer.

#[cfg(test)]
mod tests;

use crate::config::registry::ConfigurationLookup;
use crate::config::types::{AsConfigurationId, ConfigurationEntry};
use crate::config::SELECTED_CONFIGURATION_KEY;
use crate::errors::ConsoleError;
use crate::storage::StorageBackend;
use futures::future::{BoxFuture, FutureExt, Shared};
use serde_json::Value;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::task::{Context, Poll};

pub type ResolutionOutcome = Result<ConfigurationEntry, ConsoleError>;

/// Lifecycle of the active selection
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SelectionState {
    /// Nothing resolved or requested yet
    Unset,
    /// A resolution is pending; `None` while looking for a default entry
    Resolving(Option<String>),
    /// The latest resolution produced this entry id
    Resolved(String),
    /// The latest resolution failed for this id
    Invalid(Option<String>),
}

/// Pending or settled resolution, cheap to clone and shared by every caller
#[derive(Clone)]
pub struct ResolutionHandle {
    id: Option<String>,
    generation: u64,
    inner: Shared<BoxFuture<'static, ResolutionOutcome>>,
}

impl ResolutionHandle {
    /// Id this resolution targets; `None` when resolving the default entry
    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Outcome if already settled
    pub fn peek(&self) -> Option<&ResolutionOutcome> {
        self.inner.peek()
    }

    pub fn is_settled(&self) -> bool {
        self.peek().is_some()
    }
}

/// Two handles are equal when they await the same resolution
impl PartialEq for ResolutionHandle {
    fn eq(&self, other: &Self) -> bool {
        self.inner.ptr_eq(&other.inner)
    }
}

impl std::fmt::Debug for ResolutionHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResolutionHandle")
            .field("id", &self.id)
            .field("generation", &self.generation)
            .field("settled", &self.is_settled())
            .finish()
    }
}

impl Future for ResolutionHandle {
    type Output = ResolutionOutcome;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.inner).poll(cx)
    }
}

struct ResolverState {
    generation: u64,
    in_flight: Option<ResolutionHandle>,
    current: Option<ResolutionHandle>,
    status: SelectionState,
}

/// The active-configuration resolver
pub struct SelectedConfiguration {
    lookup: Arc<dyn ConfigurationLookup>,
    storage: Arc<dyn StorageBackend>,
    state: Arc<Mutex<ResolverState>>,
}

impl SelectedConfiguration {
    pub fn new(lookup: Arc<dyn ConfigurationLookup>, storage: Arc<dyn StorageBackend>) -> Self {
        Self {
            lookup,
            storage,
            state: Arc::new(Mutex::new(ResolverState {
                generation: 0,
                in_flight: None,
                current: None,
                status: SelectionState::Unset,
            })),
        }
    }

    fn lock(&self) -> MutexGuard<'_, ResolverState> {
        lock_state(&self.state)
    }

    pub fn state(&self) -> SelectionState {
        self.lock().status.clone()
    }

    /// Id last written to storage, if any
    pub fn persisted_id(&self) -> Option<String> {
        persisted_id(self.storage.as_ref())
    }

    /// The active configuration.
    ///
    /// Returns the pending resolution if there is one, then the resolved one;
    /// otherwise starts resolving the persisted id, or the registry's first
    /// entry when nothing was ever selected.
    pub fn get(&self) -> ResolutionHandle {
        let mut state = self.lock();
        if let Some(ref pending) = state.in_flight {
            return pending.clone();
        }
        if let Some(ref current) = state.current {
            return current.clone();
        }

        let target = self.persisted_id();
        self.start_resolution(&mut state, target)
    }

    /// Select a configuration by id or by entry.
    ///
    /// Selecting the id that is already pending (or, with nothing pending,
    /// already resolved) returns the existing handle and touches nothing.
    pub fn set<T: AsConfigurationId + ?Sized>(&self, target: &T) -> ResolutionHandle {
        let id = target.configuration_id().to_string();
        let mut state = self.lock();

        if let Some(ref pending) = state.in_flight {
            if pending.id() == Some(id.as_str()) {
                return pending.clone();
            }
        } else if let (Some(current), SelectionState::Resolved(resolved)) =
            (&state.current, &state.status)
        {
            if resolved == &id {
                return current.clone();
            }
        }

        log::info!("Selecting configuration '{}'", id);
        self.start_resolution(&mut state, Some(id))
    }

    /// Forget the selection, including the persisted id.
    ///
    /// Pending resolutions become stale and are ignored when they settle.
    pub fn clear(&self) {
        let mut state = self.lock();
        state.generation += 1;
        state.in_flight = None;
        state.current = None;
        state.status = SelectionState::Unset;
        self.storage.remove(SELECTED_CONFIGURATION_KEY);
    }

    fn start_resolution(
        &self,
        state: &mut ResolverState,
        target: Option<String>,
    ) -> ResolutionHandle {
        state.generation += 1;
        let generation = state.generation;

        let inner = resolve(
            self.lookup.clone(),
            self.storage.clone(),
            Arc::downgrade(&self.state),
            target.clone(),
            generation,
        )
        .boxed()
        .shared();

        let handle = ResolutionHandle {
            id: target.clone(),
            generation,
            inner,
        };

        state.in_flight = Some(handle.clone());
        state.status = SelectionState::Resolving(target);

        // Settle even if no caller awaits the handle
        if let Ok(runtime) = tokio::runtime::Handle::try_current() {
            runtime.spawn(handle.clone());
        }

        handle
    }
}

fn lock_state(state: &Mutex<ResolverState>) -> MutexGuard<'_, ResolverState> {
    match state.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

fn persisted_id(storage: &dyn StorageBackend) -> Option<String> {
    match storage.get(SELECTED_CONFIGURATION_KEY) {
        Some(Value::String(id)) if !id.trim().is_empty() => Some(id),
        _ => None,
    }
}

async fn resolve(
    lookup: Arc<dyn ConfigurationLookup>,
    storage: Arc<dyn StorageBackend>,
    state: Weak<Mutex<ResolverState>>,
    target: Option<String>,
    generation: u64,
) -> ResolutionOutcome {
    let outcome = match target {
        Some(ref id) => lookup.read(id).await,
        None => match lookup.first().await {
            Ok(Some(entry)) => Ok(entry),
            Ok(None) => Err(ConsoleError::NotFound(
                "no configuration available to select".to_string(),
            )),
            Err(e) => Err(e),
        },
    };

    if let Err(ref e) = outcome {
        // A persisted id that cannot be resolved is evicted, never retried
        if let Some(ref id) = target {
            if persisted_id(storage.as_ref()).as_deref() == Some(id.as_str()) {
                log::warn!("Evicting stored configuration selection '{}': {}", id, e);
                storage.remove(SELECTED_CONFIGURATION_KEY);
            }
        }
    }

    let Some(state) = state.upgrade() else {
        return outcome;
    };
    let mut state = lock_state(&state);

    if state.generation != generation {
        log::debug!(
            "Ignoring stale resolution of {:?} (generation {}, latest {})",
            target,
            generation,
            state.generation
        );
        return outcome;
    }

    match outcome {
        Ok(ref entry) => {
            storage.set(SELECTED_CONFIGURATION_KEY, Value::String(entry.id.clone()));
            state.current = state.in_flight.take();
            state.status = SelectionState::Resolved(entry.id.clone());
            log::info!("Active configuration is '{}'", entry.id);
        }
        Err(_) => {
            state.in_flight = None;
            state.current = None;
            state.status = SelectionState::Invalid(target.clone());
        }
    }

    outcome
}
