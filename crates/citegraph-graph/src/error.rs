//! Graph target error types.

use std::time::Duration;

use thiserror::Error;

/// Errors raised by a [`GraphStore`](crate::GraphStore).
#[derive(Error, Debug)]
pub enum GraphError {
    #[error("Transient graph error: {0}")]
    Transient(String),

    #[error("Graph rejected the batch: {0}")]
    Rejected(String),

    #[error("Graph connection error: {0}")]
    Connection(String),

    #[error("Batch timed out after {0:?}")]
    Timeout(Duration),

    #[error("Cannot decode '{field}' from graph row: {message}")]
    Decode { field: String, message: String },
}

/// Result type for graph operations.
pub type GraphResult<T> = Result<T, GraphError>;

/// Driver message fragments that mark a failure as worth retrying.
const TRANSIENT_MARKERS: &[&str] = &[
    "TransientError",
    "Deadlock",
    "LockClient",
    "LockAcquisition",
    "ConnectionError",
    "connection reset",
    "broken pipe",
    "IOError",
    "timed out",
];

impl GraphError {
    /// Whether retrying the same batch may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transient(_) | Self::Connection(_) | Self::Timeout(_))
    }

    /// Classify a driver failure by its message.
    pub fn classify(message: impl Into<String>) -> Self {
        let message = message.into();
        let lower = message.to_lowercase();
        if TRANSIENT_MARKERS
            .iter()
            .any(|marker| lower.contains(&marker.to_lowercase()))
        {
            Self::Transient(message)
        } else {
            Self::Rejected(message)
        }
    }
}

impl From<neo4rs::Error> for GraphError {
    fn from(err: neo4rs::Error) -> Self {
        Self::classify(format!("{:?}", err))
    }
}
