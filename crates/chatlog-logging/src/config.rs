//! Diagnostic logging settings
//!
//! This is the `[logging]` table of the server's TOML file. It only covers
//! the service's own tracing output; chat rotation files and the snapshot are
//! configured under `[log]`.
//!
//! ```toml
//! [logging]
//! default_level = "warn"
//! service_level = "debug"
//!
//! [logging.console]
//! pretty = true
//!
//! [logging.file]
//! directory = "/var/log/chatlog"
//! rotation = "hourly"
//! ```

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Crates whose events `service_level` applies to
pub const SERVICE_TARGETS: [&str; 3] = ["chatlog_core", "chatlog_server", "chatlog"];

/// Logging configuration for the chatlog service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Level for every target, dependencies included. `RUST_LOG` replaces the
    /// whole filter when set.
    pub default_level: String,

    /// Level for the chatlog crates only, e.g. `debug` to trace appends and
    /// rotations without tokio noise
    pub service_level: Option<String>,

    /// Console output
    pub console: ConsoleConfig,

    /// Diagnostic file output; off unless configured
    pub file: Option<FileConfig>,

    /// Fields included in JSONL events
    pub jsonl: JsonlConfig,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            default_level: "info".to_string(),
            service_level: None,
            console: ConsoleConfig::default(),
            file: None,
            jsonl: JsonlConfig::default(),
        }
    }
}

impl LogConfig {
    /// Local runs: pretty console, debug for chatlog, info for everything else
    pub fn development() -> Self {
        Self {
            service_level: Some("debug".to_string()),
            console: ConsoleConfig {
                pretty: true,
                ansi: true,
                ..ConsoleConfig::default()
            },
            ..Self::default()
        }
    }

    /// Deployed service: JSONL on stdout for the supervisor plus daily files
    /// under `dir`, warnings only from dependencies
    pub fn production(dir: impl Into<PathBuf>) -> Self {
        Self {
            default_level: "warn".to_string(),
            service_level: Some("info".to_string()),
            file: Some(FileConfig {
                directory: dir.into(),
                max_files: Some(14),
                ..FileConfig::default()
            }),
            jsonl: JsonlConfig {
                include_location: false,
                ..JsonlConfig::default()
            },
            ..Self::default()
        }
    }

    /// Test binaries: warnings and errors only
    pub fn testing() -> Self {
        Self {
            default_level: "warn".to_string(),
            ..Self::default()
        }
    }

    /// Send diagnostics to daily files in `dir` as well as the console
    pub fn with_file_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.file = Some(FileConfig {
            directory: dir.into(),
            ..FileConfig::default()
        });
        self
    }

    /// The `EnvFilter` directive used when `RUST_LOG` is unset
    ///
    /// `default_level` followed by one `target=level` entry per chatlog crate.
    pub fn filter_directive(&self) -> String {
        match &self.service_level {
            Some(level) => {
                let mut directive = self.default_level.clone();
                for target in SERVICE_TARGETS {
                    directive.push_str(&format!(",{}={}", target, level));
                }
                directive
            }
            None => self.default_level.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConsoleConfig {
    pub enabled: bool,
    /// Human-readable lines instead of JSONL
    pub pretty: bool,
    pub ansi: bool,
    /// Stricter level for the console than the global filter
    pub level: Option<String>,
}

impl Default for ConsoleConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            pretty: false,
            ansi: false,
            level: None,
        }
    }
}

/// Rolling diagnostic files
///
/// Keep `directory` apart from the chat `log_dir`: both hold `*.log` files
/// and rotation files there are named after chat users.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileConfig {
    pub directory: PathBuf,
    /// Files are named `<prefix>.<period>.log`
    pub prefix: String,
    pub rotation: RotationStrategy,
    /// Older files beyond this count are pruned
    pub max_files: Option<usize>,
}

impl Default for FileConfig {
    fn default() -> Self {
        Self {
            directory: PathBuf::from("service-logs"),
            prefix: "chatlog-service".to_string(),
            rotation: RotationStrategy::Daily,
            max_files: Some(7),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum RotationStrategy {
    #[default]
    Daily,
    Hourly,
    /// One file, truncated at startup
    Never,
}

/// JSONL event fields
///
/// Manager spans carry the owner key, so span fields are on by default.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct JsonlConfig {
    /// Put event fields at the top level instead of under `fields`
    pub flatten_events: bool,
    pub include_spans: bool,
    pub include_current_span: bool,
    pub include_thread_info: bool,
    /// Source file and line
    pub include_location: bool,
}

impl Default for JsonlConfig {
    fn default() -> Self {
        Self {
            flatten_events: true,
            include_spans: true,
            include_current_span: true,
            include_thread_info: false,
            include_location: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = LogConfig::default();
        assert_eq!(config.filter_directive(), "info");
        assert!(config.console.enabled);
        assert!(!config.console.pretty);
        assert!(config.file.is_none());
    }

    #[test]
    fn test_development_raises_service_level_only() {
        let config = LogConfig::development();
        assert_eq!(config.default_level, "info");
        assert_eq!(
            config.filter_directive(),
            "info,chatlog_core=debug,chatlog_server=debug,chatlog=debug"
        );
        assert!(config.console.pretty);
    }

    #[test]
    fn test_production_config() {
        let config = LogConfig::production("/var/log/chatlog");
        assert!(config.console.enabled);
        assert!(!config.console.pretty);
        assert!(config.filter_directive().starts_with("warn,chatlog_core=info"));

        let file = config.file.unwrap();
        assert_eq!(file.directory, PathBuf::from("/var/log/chatlog"));
        assert_eq!(file.prefix, "chatlog-service");
        assert_eq!(file.max_files, Some(14));
    }

    #[test]
    fn test_with_file_dir() {
        let config = LogConfig::testing().with_file_dir("diag");
        assert_eq!(config.default_level, "warn");
        assert_eq!(config.file.unwrap().rotation, RotationStrategy::Daily);
    }

    #[test]
    fn test_partial_deserialize() {
        let config: LogConfig = serde_json::from_str(
            r#"{"service_level": "trace", "file": {"rotation": "hourly"}}"#,
        )
        .unwrap();
        assert_eq!(config.default_level, "info");
        assert!(config.filter_directive().contains("chatlog_server=trace"));
        assert!(config.console.enabled);

        let file = config.file.unwrap();
        assert_eq!(file.rotation, RotationStrategy::Hourly);
        assert_eq!(file.prefix, "chatlog-service");
    }
}
