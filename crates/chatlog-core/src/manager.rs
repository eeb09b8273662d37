//! The log manager
//!
//! [`LogManager`] owns every per-key queue and is the only writer of the
//! snapshot file and of rotation files. Locking is two-tier: a coarse
//! manager lock serializes mutations, key enumeration and snapshot rewrites,
//! and each [`MessageQueue`] additionally guards its own entries.
//!
//! Every append rewrites the whole snapshot while the manager lock is held.
//! Appends for different keys therefore serialize on snapshot I/O; this keeps
//! the file exactly in step with memory at the cost of per-append latency
//! proportional to total queued state.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, error, info, instrument, warn};

use crate::config::LogManagerConfig;
use crate::entry::Entry;
use crate::error::{LogError, LogResult};
use crate::queue::{AppendOutcome, MessageQueue, OverflowPolicy};
use crate::rotation::RotationWriter;
use crate::snapshot::{LoadMode, SnapshotDocument, SnapshotStore};

/// What a successful [`LogManager::log_message`] did
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppendReceipt {
    /// Queue length for the key after the call
    pub queued: usize,
    /// Rotation files written during the call, oldest first
    pub rotated: Vec<PathBuf>,
    /// Entry discarded under [`OverflowPolicy::DropOldest`]
    pub evicted: Option<Entry>,
    /// Whether the snapshot rewrite succeeded
    pub snapshot_saved: bool,
}

/// Result of flushing queues to rotation files
#[derive(Debug, Default)]
pub struct FlushReport {
    /// Rotation files written
    pub rotated: Vec<PathBuf>,
    /// Keys whose rotation failed; their queues are untouched
    pub failed: Vec<(String, LogError)>,
}

impl FlushReport {
    /// True when every non-empty queue was rotated
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

type QueueMap = BTreeMap<String, Arc<MessageQueue>>;

/// Owner of all per-key message queues
#[derive(Debug)]
pub struct LogManager {
    capacity: usize,
    overflow: OverflowPolicy,
    store: SnapshotStore,
    rotation: RotationWriter,
    queues: Mutex<QueueMap>,
}

impl LogManager {
    /// Open a manager, creating the rotation directory and loading any
    /// existing snapshot
    ///
    /// A malformed snapshot never prevents opening; see [`crate::snapshot`].
    #[instrument(skip_all, fields(log_dir = %config.log_dir.display()))]
    pub fn open(config: LogManagerConfig) -> LogResult<Self> {
        if config.capacity == 0 {
            return Err(LogError::config("capacity must be at least 1"));
        }

        fs::create_dir_all(&config.log_dir)?;

        let manager = Self {
            capacity: config.capacity,
            overflow: config.overflow,
            store: SnapshotStore::new(config.snapshot_path()),
            rotation: RotationWriter::new(&config.log_dir),
            queues: Mutex::new(BTreeMap::new()),
        };

        manager.load();

        info!(
            capacity = manager.capacity,
            overflow = ?manager.overflow,
            snapshot = %manager.store.path().display(),
            keys = manager.queues.lock().len(),
            "Log manager ready"
        );

        Ok(manager)
    }

    fn new_queue(&self, key: &str) -> Arc<MessageQueue> {
        Arc::new(MessageQueue::new(key, self.capacity, self.overflow))
    }

    /// Restore queues from the snapshot file
    fn load(&self) {
        let Some(loaded) = self.store.load() else {
            return;
        };

        let mut queues = self.queues.lock();
        for user in loaded.document.users {
            let queue = Arc::clone(
                queues
                    .entry(user.username.clone())
                    .or_insert_with(|| self.new_queue(&user.username)),
            );
            for record in user.messages {
                queue.restore(Entry::with_timestamp(
                    user.username.as_str(),
                    record.content,
                    record.timestamp,
                ));
            }
        }

        // Queues that came back full (or over a lowered capacity) rotate now
        let mut dirty = matches!(loaded.mode, LoadMode::Recovered { .. });
        if self.overflow == OverflowPolicy::Rotate {
            let full: Vec<_> = queues.values().filter(|q| q.is_full()).cloned().collect();
            for queue in full {
                match self.rotate(&queue) {
                    Ok(_) => dirty = true,
                    Err(e) => warn!(key = %queue.owner(), error = %e, "Could not rotate restored queue"),
                }
            }
        }

        if dirty && let Err(e) = self.persist(&queues) {
            error!(error = %e, "Failed to rewrite snapshot after load");
        }
    }

    /// Append `content` to the queue for `key`
    ///
    /// The queue is created on first use. After the append the snapshot is
    /// rewritten; if the queue reached capacity its entries are written to a
    /// rotation file and only then cleared.
    ///
    /// # Errors
    ///
    /// - [`LogError::Rotation`]: the append succeeded but the capacity-triggered
    ///   rotation failed; the queue is left full and intact.
    /// - [`LogError::QueueAtCapacity`]: the queue was still full from an earlier
    ///   failed rotation, a retry failed too, and this message was not appended.
    #[instrument(skip(self, content))]
    pub fn log_message(&self, key: &str, content: &str) -> LogResult<AppendReceipt> {
        let mut queues = self.queues.lock();
        let queue = Arc::clone(
            queues
                .entry(key.to_string())
                .or_insert_with(|| self.new_queue(key)),
        );

        let mut rotated = Vec::new();

        if self.overflow == OverflowPolicy::Rotate && queue.is_full() {
            match self.rotate(&queue) {
                Ok(path) => rotated.push(path),
                Err(e) => {
                    warn!(error = %e, "Pending rotation failed again, rejecting append");
                    return Err(LogError::QueueAtCapacity(key.to_string()));
                }
            }
        }

        let outcome = queue.append(content)?;

        let mut snapshot_saved = self.persist_logged(&queues);

        let evicted = match outcome {
            AppendOutcome::EvictedOldest(entry) => {
                debug!("Dropped oldest entry");
                Some(entry)
            }
            AppendOutcome::CapacityReached if self.overflow == OverflowPolicy::Rotate => {
                rotated.push(self.rotate(&queue)?);
                snapshot_saved = self.persist_logged(&queues);
                None
            }
            _ => None,
        };

        Ok(AppendReceipt {
            queued: queue.size(),
            rotated,
            evicted,
            snapshot_saved,
        })
    }

    /// Ordered copy of the queued entries for `key`; empty for unknown keys
    pub fn get_messages(&self, key: &str) -> Vec<Entry> {
        self.queue(key).map(|q| q.snapshot()).unwrap_or_default()
    }

    /// The last `n` queued entries for `key`
    pub fn recent_messages(&self, key: &str, n: usize) -> Vec<Entry> {
        self.queue(key).map(|q| q.recent(n)).unwrap_or_default()
    }

    /// Number of queued entries for `key`; 0 for unknown keys
    pub fn message_count(&self, key: &str) -> usize {
        self.queue(key).map(|q| q.size()).unwrap_or(0)
    }

    /// All known keys, sorted
    pub fn list_keys(&self) -> Vec<String> {
        self.queues.lock().keys().cloned().collect()
    }

    fn queue(&self, key: &str) -> Option<Arc<MessageQueue>> {
        self.queues.lock().get(key).cloned()
    }

    /// Empty the queue for `key` without writing a rotation file
    ///
    /// Returns `false` if the key is unknown.
    #[instrument(skip(self))]
    pub fn clear_key(&self, key: &str) -> LogResult<bool> {
        let queues = self.queues.lock();
        let Some(queue) = queues.get(key) else {
            return Ok(false);
        };

        queue.clear();
        self.persist(&queues)?;
        info!("Cleared queue");
        Ok(true)
    }

    /// Drop every queue and key, then write an empty snapshot
    ///
    /// No rotation files are written.
    #[instrument(skip(self))]
    pub fn clear_all(&self) -> LogResult<()> {
        let mut queues = self.queues.lock();
        let dropped = queues.len();
        queues.clear();
        self.persist(&queues)?;
        info!(keys = dropped, "Cleared all queues");
        Ok(())
    }

    /// Rotate the queue for `key` now, if it holds anything
    #[instrument(skip(self))]
    pub fn flush_key(&self, key: &str) -> LogResult<Option<PathBuf>> {
        let queues = self.queues.lock();
        let Some(queue) = queues.get(key) else {
            return Ok(None);
        };
        if queue.is_empty() {
            return Ok(None);
        }

        let path = self.rotate(queue)?;
        self.persist(&queues)?;
        Ok(Some(path))
    }

    /// Rotate every non-empty queue, then rewrite the snapshot
    ///
    /// A failed rotation leaves that queue intact and is recorded in the
    /// report; the remaining queues are still flushed.
    ///
    /// # Errors
    ///
    /// Only a failed snapshot rewrite is returned as an error.
    #[instrument(skip(self))]
    pub fn flush_all(&self) -> LogResult<FlushReport> {
        let queues = self.queues.lock();
        let mut report = FlushReport::default();

        for (key, queue) in queues.iter().filter(|(_, q)| !q.is_empty()) {
            match self.rotate(queue) {
                Ok(path) => report.rotated.push(path),
                Err(e) => {
                    error!(key = %key, error = %e, "Flush rotation failed, keeping queue");
                    report.failed.push((key.clone(), e));
                }
            }
        }

        self.persist(&queues)?;
        info!(
            rotated = report.rotated.len(),
            failed = report.failed.len(),
            "Flushed queues"
        );
        Ok(report)
    }

    /// Current state as a snapshot document
    pub fn snapshot_document(&self) -> SnapshotDocument {
        Self::document(&self.queues.lock())
    }

    /// Current state rendered for API consumers, with local-time stamps
    pub fn snapshot_text(&self) -> LogResult<String> {
        self.snapshot_document().to_api_json()
    }

    /// Rewrite the snapshot file from the current state
    pub fn save_snapshot(&self) -> LogResult<()> {
        self.persist(&self.queues.lock())
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn overflow(&self) -> OverflowPolicy {
        self.overflow
    }

    pub fn snapshot_path(&self) -> &Path {
        self.store.path()
    }

    pub fn rotation_dir(&self) -> &Path {
        self.rotation.dir()
    }

    /// Write `queue` to a rotation file, then clear it
    ///
    /// Callers hold the manager lock.
    fn rotate(&self, queue: &MessageQueue) -> LogResult<PathBuf> {
        let entries = queue.snapshot();
        let path = self.rotation.write(queue.owner(), &entries)?;
        queue.clear();
        Ok(path)
    }

    fn document(queues: &QueueMap) -> SnapshotDocument {
        SnapshotDocument::from_queues(queues.iter().map(|(k, q)| (k.as_str(), q.snapshot())))
    }

    /// Callers hold the manager lock.
    fn persist(&self, queues: &QueueMap) -> LogResult<()> {
        self.store.save(&Self::document(queues))
    }

    fn persist_logged(&self, queues: &QueueMap) -> bool {
        match self.persist(queues) {
            Ok(()) => true,
            Err(e) => {
                error!(error = %e, path = %self.store.path().display(), "Failed to write snapshot");
                false
            }
        }
    }
}
