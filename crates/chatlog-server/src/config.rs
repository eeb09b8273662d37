//! Server configuration
//!
//! Loaded from an optional TOML file; every field has a default so a
//! partial file (or none at all) is valid:
//!
//! ```toml
//! port = 9000
//!
//! [log]
//! capacity = 5
//! log_dir = "/var/lib/chatlog"
//! overflow = "drop_oldest"
//!
//! [logging.console]
//! pretty = true
//! ```

use std::fs;
use std::net::{SocketAddr, ToSocketAddrs};
use std::path::{Path, PathBuf};

use chatlog_core::LogManagerConfig;
use chatlog_logging::LogConfig;
use serde::{Deserialize, Serialize};

use crate::error::{ServerError, ServerResult};

/// Configuration for the chatlog server
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Interface to listen on
    pub host: String,
    /// TCP port; 0 picks an ephemeral port
    pub port: u16,
    /// Bytes read from each connection; larger requests are truncated
    pub read_buffer_size: usize,
    /// HTML document served at `/`
    pub ui_path: PathBuf,
    /// Log manager settings
    pub log: LogManagerConfig,
    /// Diagnostic logging settings
    pub logging: LogConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            read_buffer_size: 4096,
            ui_path: PathBuf::from("web/chat_app_logger.html"),
            log: LogManagerConfig::default(),
            logging: LogConfig::default(),
        }
    }
}

impl ServerConfig {
    /// Parse a configuration from TOML text
    pub fn from_toml_str(text: &str) -> ServerResult<Self> {
        Ok(toml::from_str(text)?)
    }

    /// Read and parse a TOML configuration file
    pub fn load(path: &Path) -> ServerResult<Self> {
        let text = fs::read_to_string(path)
            .map_err(|e| ServerError::config(format!("reading {}: {}", path.display(), e)))?;
        Self::from_toml_str(&text)
    }

    /// Set the listen host
    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    /// Set the listen port
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Set the per-connection read size
    pub fn with_read_buffer_size(mut self, size: usize) -> Self {
        self.read_buffer_size = size;
        self
    }

    /// Set the UI document path
    pub fn with_ui_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.ui_path = path.into();
        self
    }

    /// Set the log manager configuration
    pub fn with_log(mut self, log: LogManagerConfig) -> Self {
        self.log = log;
        self
    }

    /// Set the diagnostic logging configuration
    pub fn with_logging(mut self, logging: LogConfig) -> Self {
        self.logging = logging;
        self
    }

    /// Check values that would otherwise fail later at runtime
    pub fn validate(&self) -> ServerResult<()> {
        if self.read_buffer_size == 0 {
            return Err(ServerError::config("read_buffer_size must be at least 1"));
        }
        if self.log.capacity == 0 {
            return Err(ServerError::config("log.capacity must be at least 1"));
        }
        Ok(())
    }

    /// Resolve `host:port` to a socket address
    pub fn bind_addr(&self) -> ServerResult<SocketAddr> {
        (self.host.as_str(), self.port)
            .to_socket_addrs()
            .map_err(|e| ServerError::config(format!("resolving {}: {}", self.host, e)))?
            .next()
            .ok_or_else(|| ServerError::config(format!("no address for host {}", self.host)))
    }
}
