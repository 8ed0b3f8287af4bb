//! Configuration entry providers
//!
//! Each source contributes an ordered list of entries to the registry. Sources
//! never fail the aggregate view: an error returned from `entries` is logged by
//! the registry and counted as zero entries.

pub mod explicit;
pub mod generated;
pub mod remote_file;
pub mod persisted;

pub use explicit::*;
pub use generated::*;
pub use remote_file::*;
pub use persisted::*;

use crate::config::types::{ConfigurationEntry, SourceKind};
use crate::errors::ConsoleError;
use async_trait::async_trait;

/// Core trait implemented by every configuration provider
#[async_trait]
pub trait ConfigurationSource: Send + Sync {
    /// Which category this source belongs to; decides its precedence
    fn kind(&self) -> SourceKind;

    /// Human-readable description for diagnostics
    fn description(&self) -> &'static str;

    /// Current entries of this source, as owned copies
    async fn entries(&self) -> Result<Vec<ConfigurationEntry>, ConsoleError>;
}
