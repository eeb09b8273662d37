//! Error types for the chatlog server

use std::net::SocketAddr;

use chatlog_core::LogError;
use thiserror::Error;

/// Errors that can occur while running the server
#[derive(Debug, Error)]
pub enum ServerError {
    /// The listening socket could not be set up
    #[error("Failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    /// Connection-level IO error
    #[error("IO error: {0}")]
    Io(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Log manager error
    #[error("Log error: {0}")]
    Log(#[from] LogError),

    /// A blocking handler task panicked or was cancelled
    #[error("Task error: {0}")]
    Task(String),
}

impl From<std::io::Error> for ServerError {
    fn from(e: std::io::Error) -> Self {
        ServerError::Io(e.to_string())
    }
}

impl From<tokio::task::JoinError> for ServerError {
    fn from(e: tokio::task::JoinError) -> Self {
        ServerError::Task(e.to_string())
    }
}

impl From<toml::de::Error> for ServerError {
    fn from(e: toml::de::Error) -> Self {
        ServerError::Config(e.to_string())
    }
}

impl ServerError {
    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        ServerError::Config(message.into())
    }
}

/// Result type alias for server operations
pub type ServerResult<T> = Result<T, ServerError>;
