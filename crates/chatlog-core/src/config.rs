//! Configuration for the log manager

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::queue::OverflowPolicy;

/// Configuration for a [`LogManager`](crate::LogManager)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogManagerConfig {
    /// Entries per owner key before the queue overflows
    pub capacity: usize,
    /// Directory receiving rotation files (and the snapshot by default)
    pub log_dir: PathBuf,
    /// Snapshot file; defaults to `<log_dir>/chat_data.json`
    pub snapshot_file: Option<PathBuf>,
    /// What to do when a queue reaches capacity
    pub overflow: OverflowPolicy,
}

impl Default for LogManagerConfig {
    fn default() -> Self {
        Self {
            capacity: 10,
            log_dir: PathBuf::from("logs"),
            snapshot_file: None,
            overflow: OverflowPolicy::Rotate,
        }
    }
}

impl LogManagerConfig {
    /// Create a configuration rooted at a custom directory
    pub fn with_log_dir(log_dir: impl Into<PathBuf>) -> Self {
        Self {
            log_dir: log_dir.into(),
            ..Default::default()
        }
    }

    /// Set the per-key capacity
    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    /// Set an explicit snapshot file path
    pub fn with_snapshot_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.snapshot_file = Some(path.into());
        self
    }

    /// Set the overflow policy
    pub fn with_overflow(mut self, overflow: OverflowPolicy) -> Self {
        self.overflow = overflow;
        self
    }

    /// Resolved snapshot file path
    pub fn snapshot_path(&self) -> PathBuf {
        self.snapshot_file
            .clone()
            .unwrap_or_else(|| self.log_dir.join("chat_data.json"))
    }
}
