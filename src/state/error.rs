//! State persistence error types

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while persisting state
#[derive(Error, Debug)]
pub enum StateError {
    /// I/O operation failed
    #[error("IO error on {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Serialization failed
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for StateError {
    fn from(err: serde_json::Error) -> Self {
        StateError::Serialization(err.to_string())
    }
}

/// Result type alias for state operations
pub type StateResult<T> = Result<T, StateError>;
