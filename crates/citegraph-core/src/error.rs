//! Centralized error types for configuration and model parsing.

use thiserror::Error;

/// Main error type for citegraph core operations.
#[derive(Error, Debug)]
pub enum CiteGraphError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Unknown node kind: {0}")]
    UnknownNodeKind(String),

    #[error("Unknown edge kind: {0}")]
    UnknownEdgeKind(String),

    #[error("Unknown stage: {0}")]
    UnknownStage(String),

    #[error("Failed to parse configuration file: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for citegraph core operations.
pub type CiteGraphResult<T> = Result<T, CiteGraphError>;

impl CiteGraphError {
    /// Create a configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }
}
