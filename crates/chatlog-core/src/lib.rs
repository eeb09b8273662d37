//! # Chatlog Core
//!
//! Message storage for the chatlog service.
//!
//! Messages are appended into one bounded FIFO queue per owner key (a
//! username). When a queue fills up it is written to an immutable rotation
//! file and cleared. A JSON snapshot of everything still queued is rewritten
//! after every mutation so a restart picks up where the last process left off.
//!
//! ## Features
//!
//! - **MessageQueue**: per-key FIFO with a capacity and an [`OverflowPolicy`]
//! - **LogManager**: owns all queues; append, query, clear, flush
//! - **SnapshotStore**: atomic snapshot writes with tolerant recovery on load
//! - **RotationWriter**: timestamped, never-overwritten rotation files
//!
//! ## Example
//!
//! ```rust,ignore
//! use chatlog_core::{LogManager, LogManagerConfig};
//!
//! let manager = LogManager::open(LogManagerConfig::with_log_dir("logs").with_capacity(3))?;
//!
//! manager.log_message("alice", "hi")?;
//! manager.log_message("alice", "there")?;
//! let receipt = manager.log_message("alice", "you")?;
//!
//! // The third message filled the queue; it was rotated to a file
//! assert_eq!(receipt.rotated.len(), 1);
//! assert!(manager.get_messages("alice").is_empty());
//! ```

pub mod config;
pub mod entry;
pub mod error;
pub mod manager;
pub mod queue;
pub mod rotation;
pub mod safe_io;
pub mod snapshot;

// Re-exports
pub use config::LogManagerConfig;
pub use entry::Entry;
pub use error::{LogError, LogResult};
pub use manager::{AppendReceipt, FlushReport, LogManager};
pub use queue::{AppendOutcome, MessageQueue, OverflowPolicy};
pub use rotation::RotationWriter;
pub use snapshot::{LoadMode, LoadedSnapshot, SnapshotDocument, SnapshotStore};
