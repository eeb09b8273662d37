//! Logged message entries

use chrono::{DateTime, Local, Utc};

/// Format used for human-readable timestamps in rotation files and the API view
pub const LOCAL_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// A single logged message
///
/// Entries are immutable once created; the owner key and timestamp are
/// fixed at append time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    owner: String,
    content: String,
    timestamp_millis: i64,
}

impl Entry {
    /// Create an entry stamped with the current wall-clock time
    pub fn new(owner: impl Into<String>, content: impl Into<String>) -> Self {
        Self::with_timestamp(owner, content, Utc::now().timestamp_millis())
    }

    /// Create an entry with an explicit timestamp (used when restoring a snapshot)
    pub fn with_timestamp(
        owner: impl Into<String>,
        content: impl Into<String>,
        timestamp_millis: i64,
    ) -> Self {
        Self {
            owner: owner.into(),
            content: content.into(),
            timestamp_millis,
        }
    }

    /// Key of the queue this entry belongs to
    pub fn owner(&self) -> &str {
        &self.owner
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    /// Milliseconds since the Unix epoch
    pub fn timestamp_millis(&self) -> i64 {
        self.timestamp_millis
    }

    /// Timestamp rendered in local time, e.g. `2024-05-01 13:45:10`
    pub fn local_time(&self) -> String {
        format_local_millis(self.timestamp_millis)
    }
}

/// Render epoch milliseconds in local time
///
/// Out-of-range timestamps render as the epoch rather than failing.
pub fn format_local_millis(timestamp_millis: i64) -> String {
    DateTime::<Utc>::from_timestamp_millis(timestamp_millis)
        .unwrap_or_default()
        .with_timezone(&Local)
        .format(LOCAL_TIME_FORMAT)
        .to_string()
}
