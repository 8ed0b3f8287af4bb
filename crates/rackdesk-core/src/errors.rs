//! Error types for configuration resolution and resource access
//!
//! Every failure in this crate settles into one of these variants. Nothing here is
//! fatal to the process: callers decide how to surface a rejected outcome. The
//! variants follow the failure taxonomy of the console, so a view can tell a
//! missing record apart from a bad request or an unreachable endpoint.

use thiserror::Error;

/// Reason attached to every operation of a client that has no endpoint behind it.
pub const NO_ENDPOINT_REASON: &str = "no endpoint configured";

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConsoleError {
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Validation error: {0}")]
    Validation(String),
    #[error("Transport error: {0}")]
    Transport(String),
    #[error("Unconfigured endpoint: {0}")]
    UnconfiguredEndpoint(String),
    #[error("Storage error: {0}")]
    Storage(String),
    #[error("Configuration error: {0}")]
    ConfigError(String),
    #[error("Parsing error: {0}")]
    ParsingError(String),
    #[error("I/O error: {0}")]
    IoError(String),
}

impl ConsoleError {
    /// True for failures caused by an unknown id
    pub fn is_not_found(&self) -> bool {
        matches!(self, ConsoleError::NotFound(_))
    }
}

impl From<std::io::Error> for ConsoleError {
    fn from(err: std::io::Error) -> Self {
        ConsoleError::IoError(err.to_string())
    }
}

impl From<reqwest::Error> for ConsoleError {
    fn from(err: reqwest::Error) -> Self {
        ConsoleError::Transport(err.to_string())
    }
}

impl From<serde_json::Error> for ConsoleError {
    fn from(err: serde_json::Error) -> Self {
        ConsoleError::ParsingError(err.to_string())
    }
}
