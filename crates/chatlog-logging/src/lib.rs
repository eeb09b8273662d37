//! Structured logging setup for the chatlog service
//!
//! # Features
//!
//! - **JSONL Output**: Structured JSON lines on the console (default)
//! - **Pretty Output**: Human-readable console output for development
//! - **File Output**: Daily/hourly rolling JSONL files via tracing-appender
//! - **Service level**: A separate level for the chatlog crates
//! - **RUST_LOG**: Replaces the configured filter entirely
//!
//! # Quick Start
//!
//! ```ignore
//! use chatlog_logging::{ChatlogSubscriberBuilder, LogConfig};
//!
//! // JSONL to console
//! let _guard = ChatlogSubscriberBuilder::new().init();
//!
//! // Development mode with pretty human-readable output
//! let _guard = ChatlogSubscriberBuilder::new()
//!     .with_config(LogConfig::development())
//!     .init();
//! ```
//!
//! Keep the returned guard alive for as long as file output should be
//! flushed.

pub mod config;
pub mod layers;

pub use config::{
    ConsoleConfig, FileConfig, JsonlConfig, LogConfig, RotationStrategy, SERVICE_TARGETS,
};
pub use tracing_appender::non_blocking::WorkerGuard;

use thiserror::Error;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Registry};

use layers::BoxedLayer;

/// Errors raised while installing the subscriber
#[derive(Debug, Error)]
pub enum LoggingError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Log file appender error: {0}")]
    Appender(#[from] tracing_appender::rolling::InitError),

    #[error("Invalid filter directive: {0}")]
    Filter(String),

    #[error("Subscriber init error: {0}")]
    Init(String),
}

/// Builder for configuring and initializing the chatlog tracing subscriber
///
/// By default, console output uses JSONL format. Use `LogConfig::development()`
/// for human-readable pretty output during development.
pub struct ChatlogSubscriberBuilder {
    config: LogConfig,
}

impl ChatlogSubscriberBuilder {
    /// Create a new subscriber builder with default configuration
    pub fn new() -> Self {
        Self {
            config: LogConfig::default(),
        }
    }

    /// Use a specific configuration
    pub fn with_config(mut self, config: LogConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the default log level
    pub fn with_level(mut self, level: impl Into<String>) -> Self {
        self.config.default_level = level.into();
        self
    }

    /// Enable or disable console output
    pub fn with_console(mut self, enabled: bool) -> Self {
        self.config.console.enabled = enabled;
        self
    }

    /// Switch the console between pretty and JSONL output
    pub fn with_pretty_console(mut self, pretty: bool) -> Self {
        self.config.console.pretty = pretty;
        self.config.console.ansi = pretty;
        self
    }

    /// Configure file output
    pub fn with_file_output(mut self, config: FileConfig) -> Self {
        self.config.file = Some(config);
        self
    }

    /// Access the configuration that will be applied
    pub fn config(&self) -> &LogConfig {
        &self.config
    }

    /// Try to initialize the subscriber globally
    ///
    /// Returns the file writer guard when file output is configured. Fails if
    /// a global subscriber has already been set or the file cannot be opened.
    pub fn try_init(self) -> Result<Option<WorkerGuard>, LoggingError> {
        let env_filter = match EnvFilter::try_from_default_env() {
            Ok(filter) => filter,
            Err(_) => EnvFilter::try_new(self.config.filter_directive())
                .map_err(|e| LoggingError::Filter(e.to_string()))?,
        };

        let (layers, guard) = self.build_layers()?;

        Registry::default()
            .with(layers)
            .with(env_filter)
            .try_init()
            .map_err(|e| LoggingError::Init(e.to_string()))?;

        tracing::debug!(
            filter = %self.config.filter_directive(),
            console = self.config.console.enabled,
            file = ?self.config.file.as_ref().map(|f| &f.directory),
            "Logging initialized"
        );

        Ok(guard)
    }

    /// Initialize the subscriber globally
    ///
    /// Failures are reported on stderr and leave logging disabled.
    pub fn init(self) -> Option<WorkerGuard> {
        match self.try_init() {
            Ok(guard) => guard,
            Err(e) => {
                eprintln!("Warning: Failed to initialize logging: {}", e);
                None
            }
        }
    }

    fn build_layers(&self) -> Result<(Vec<BoxedLayer>, Option<WorkerGuard>), LoggingError> {
        let mut stack = Vec::new();
        let mut guard = None;

        if self.config.console.enabled {
            stack.push(layers::console_layer(
                &self.config.console,
                &self.config.jsonl,
            ));
        }

        if let Some(file_config) = &self.config.file {
            let (writer, file_guard) = layers::file_writer(file_config)?;
            stack.push(layers::jsonl_layer(writer, &self.config.jsonl));
            guard = Some(file_guard);
        }

        Ok((stack, guard))
    }
}

impl Default for ChatlogSubscriberBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Initialize logging with default settings (JSONL to console)
pub fn init_default() -> Option<WorkerGuard> {
    ChatlogSubscriberBuilder::new().init()
}

/// Initialize logging for development (chatlog at debug, pretty console output)
pub fn init_development() -> Option<WorkerGuard> {
    ChatlogSubscriberBuilder::new()
        .with_config(LogConfig::development())
        .init()
}

/// Initialize logging for testing (minimal output, repeat calls are ignored)
pub fn init_testing() {
    let _ = ChatlogSubscriberBuilder::new()
        .with_config(LogConfig::testing())
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_builder_creation() {
        let builder = ChatlogSubscriberBuilder::new();
        assert_eq!(builder.config.default_level, "info");
    }

    #[test]
    fn test_default_is_jsonl() {
        let builder = ChatlogSubscriberBuilder::new();
        assert!(!builder.config.console.pretty);
    }

    #[test]
    fn test_builder_with_config() {
        let builder = ChatlogSubscriberBuilder::new().with_config(LogConfig::development());
        assert_eq!(builder.config.service_level.as_deref(), Some("debug"));
        assert!(builder.config.console.pretty);
    }

    #[test]
    fn test_builder_with_level_and_console() {
        let builder = ChatlogSubscriberBuilder::new()
            .with_level("trace")
            .with_console(false)
            .with_pretty_console(true);
        assert_eq!(builder.config().default_level, "trace");
        assert!(!builder.config().console.enabled);
        assert!(builder.config().console.pretty);
    }

    #[test]
    fn test_build_layers_console_and_file() {
        let temp = TempDir::new().unwrap();
        let builder = ChatlogSubscriberBuilder::new().with_file_output(FileConfig {
            directory: temp.path().to_path_buf(),
            rotation: RotationStrategy::Never,
            ..FileConfig::default()
        });

        let (layers, guard) = builder.build_layers().unwrap();
        assert_eq!(layers.len(), 2);
        assert!(guard.is_some());
    }

    #[test]
    fn test_build_layers_nothing_enabled() {
        let builder = ChatlogSubscriberBuilder::new().with_console(false);
        let (layers, guard) = builder.build_layers().unwrap();
        assert!(layers.is_empty());
        assert!(guard.is_none());
    }

    #[test]
    fn test_init_testing_is_repeatable() {
        init_testing();
        init_testing();
    }
}
