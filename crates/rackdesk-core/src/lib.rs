//! Endpoint configuration and resource clients for the rackdesk console.
//!
//! The console manages bare-metal inventory spread across several deployments.
//! Each deployment exposes the same logical services at different API roots;
//! this crate decides which deployment is active and hands out clients bound to
//! its endpoints.
//!
//! # Architecture Overview
//!
//! - **Storage**: key/value persistence with file, cookie jar and memory backends
//! - **Configuration registry**: entries merged from explicit, generated,
//!   configuration-file and persisted sources in precedence order
//! - **Selection**: single-flight resolution of the active entry, last request wins
//! - **Resources**: per-endpoint client cache and the factory that fills it
//! - **Console**: wiring of all of the above from [`ConsoleSettings`]

pub mod config;
pub mod console;
pub mod errors;
pub mod resource;
pub mod selection;
pub mod storage;
pub mod uri;

pub use config::*;
pub use console::{Console, ConsoleFactory};
pub use errors::ConsoleError;
pub use resource::{ResourceCache, ResourceClient, ResourceFactory};
pub use selection::{ResolutionHandle, SelectedConfiguration, SelectionState};
pub use storage::{StorageBackend, StorageSelector};
