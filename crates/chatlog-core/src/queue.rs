//! Bounded per-key FIFO queue
//!
//! A [`MessageQueue`] holds the not-yet-rotated entries of one owner key.
//! Every operation takes the queue-local lock for its whole duration and
//! never performs I/O while holding it; rotation output is the
//! [`LogManager`](crate::LogManager)'s job.

use std::collections::VecDeque;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::entry::Entry;
use crate::error::{LogError, LogResult};

/// What happens when a queue reaches its capacity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverflowPolicy {
    /// Write the full queue to a rotation file, then clear it (default)
    #[default]
    Rotate,
    /// Silently discard the oldest entry to make room; nothing is written
    DropOldest,
}

/// Result of appending to a queue
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppendOutcome {
    /// Entry queued, capacity not reached
    Queued,
    /// Entry queued and the queue now holds exactly `capacity` entries
    CapacityReached,
    /// Entry queued after discarding the oldest entry
    EvictedOldest(Entry),
}

/// FIFO of entries for a single owner key
#[derive(Debug)]
pub struct MessageQueue {
    owner: String,
    capacity: usize,
    policy: OverflowPolicy,
    entries: Mutex<VecDeque<Entry>>,
}

impl MessageQueue {
    /// Create an empty queue
    ///
    /// A capacity of zero is raised to one.
    pub fn new(owner: impl Into<String>, capacity: usize, policy: OverflowPolicy) -> Self {
        let capacity = capacity.max(1);
        Self {
            owner: owner.into(),
            capacity,
            policy,
            entries: Mutex::new(VecDeque::with_capacity(capacity)),
        }
    }

    pub fn owner(&self) -> &str {
        &self.owner
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn policy(&self) -> OverflowPolicy {
        self.policy
    }

    /// Append a new entry stamped with the current time
    ///
    /// Under [`OverflowPolicy::Rotate`] a full queue refuses the append with
    /// [`LogError::QueueAtCapacity`]; the caller must rotate it first.
    pub fn append(&self, content: impl Into<String>) -> LogResult<AppendOutcome> {
        let mut entries = self.entries.lock();

        if self.policy == OverflowPolicy::Rotate && entries.len() >= self.capacity {
            return Err(LogError::QueueAtCapacity(self.owner.clone()));
        }

        entries.push_back(Entry::new(self.owner.as_str(), content));
        Ok(self.settle(&mut entries))
    }

    /// Push a previously persisted entry, keeping its original timestamp
    ///
    /// Restoring never refuses: a snapshot written under a larger capacity
    /// may leave a rotating queue over its limit until the manager rotates it.
    pub fn restore(&self, entry: Entry) -> AppendOutcome {
        let mut entries = self.entries.lock();
        entries.push_back(entry);
        self.settle(&mut entries)
    }

    fn settle(&self, entries: &mut VecDeque<Entry>) -> AppendOutcome {
        match self.policy {
            OverflowPolicy::DropOldest if entries.len() > self.capacity => entries
                .pop_front()
                .map(AppendOutcome::EvictedOldest)
                .unwrap_or(AppendOutcome::Queued),
            _ if entries.len() >= self.capacity => AppendOutcome::CapacityReached,
            _ => AppendOutcome::Queued,
        }
    }

    /// Ordered copy of the queued entries
    pub fn snapshot(&self) -> Vec<Entry> {
        self.entries.lock().iter().cloned().collect()
    }

    /// The last `n` entries, oldest first
    pub fn recent(&self, n: usize) -> Vec<Entry> {
        let entries = self.entries.lock();
        let skip = entries.len().saturating_sub(n);
        entries.iter().skip(skip).cloned().collect()
    }

    pub fn size(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    /// Whether the queue holds at least `capacity` entries
    pub fn is_full(&self) -> bool {
        self.entries.lock().len() >= self.capacity
    }

    /// Remove every entry
    ///
    /// Only the manager calls this, after any rotation output is on disk.
    pub(crate) fn clear(&self) {
        self.entries.lock().clear();
    }
}
