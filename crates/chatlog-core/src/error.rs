//! Error types for chatlog-core
//!
//! Read-only queries never fail; these errors come from mutating
//! operations that touch the snapshot file or a rotation file.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur in log manager operations
#[derive(Debug, Error)]
pub enum LogError {
    /// I/O error outside of rotation (directory setup, snapshot writes)
    #[error("I/O error: {0}")]
    Io(String),

    /// Error while encoding the snapshot document
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Writing a rotation file failed; the queue was left untouched
    #[error("Rotation failed for '{key}' at {path}: {source}")]
    Rotation {
        /// Owner key of the queue being rotated
        key: String,
        /// Rotation file path that was being written
        path: PathBuf,
        /// Underlying I/O failure
        #[source]
        source: std::io::Error,
    },

    /// The queue is still full from an earlier failed rotation
    #[error("Queue for '{0}' is at capacity and could not be rotated")]
    QueueAtCapacity(String),

    /// Invalid manager configuration
    #[error("Configuration error: {0}")]
    Config(String),
}

impl From<std::io::Error> for LogError {
    fn from(err: std::io::Error) -> Self {
        LogError::Io(err.to_string())
    }
}

impl From<serde_json::Error> for LogError {
    fn from(err: serde_json::Error) -> Self {
        LogError::Serialization(err.to_string())
    }
}

impl LogError {
    /// Create a new configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Whether this error left a queue stuck at capacity
    pub fn is_capacity_stall(&self) -> bool {
        matches!(self, LogError::Rotation { .. } | LogError::QueueAtCapacity(_))
    }
}

/// Result type alias for log manager operations
pub type LogResult<T> = Result<T, LogError>;
