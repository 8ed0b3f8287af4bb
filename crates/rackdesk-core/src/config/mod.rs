//! Configuration module for the console
//!
//! Configuration entries say where each remote service of a deployment lives.
//! They come from four sources merged by [`ConfigurationRegistry`]; console
//! settings (origin, storage location, enabled sources) are loaded separately by
//! [`SettingsLoader`].

pub mod types;
pub mod sources;
pub mod registry;
pub mod settings;

pub use types::*;
pub use sources::*;
pub use registry::*;
pub use settings::*;

#[cfg(test)]
mod tests;

/// Storage key holding the operator-managed configuration list
pub const CONFIGURATIONS_KEY: &str = "rackdesk.configurations";

/// Storage key holding the id of the selected configuration
pub const SELECTED_CONFIGURATION_KEY: &str = "rackdesk.selected_configuration";
