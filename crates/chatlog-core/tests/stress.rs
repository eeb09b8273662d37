//! Stress tests for chatlog-core
//!
//! These tests hammer the log manager from many threads and check that no
//! message is lost between the live queues and the rotation files.

use std::fs;
use std::path::Path;
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::Instant;

use chatlog_core::{LogManager, LogManagerConfig, OverflowPolicy, SnapshotDocument};
use tempfile::TempDir;

/// Count `[time] key: content` lines across every rotation file in `dir`
fn rotated_lines(dir: &Path, key: &str) -> Vec<String> {
    let needle = format!("] {}: ", key);
    let mut lines = Vec::new();
    for entry in fs::read_dir(dir).unwrap() {
        let path = entry.unwrap().path();
        if path.extension().is_some_and(|ext| ext == "log") {
            let text = fs::read_to_string(&path).unwrap();
            lines.extend(
                text.lines()
                    .filter(|l| l.starts_with('[') && l.contains(&needle))
                    .map(str::to_string),
            );
        }
    }
    lines
}

// ============================================================================
// Concurrency Tests
// ============================================================================

/// T threads each appending M messages to the same key never lose an append
#[test]
fn test_concurrent_appends_same_key() {
    const THREADS: usize = 8;
    const PER_THREAD: usize = 50;

    let temp = TempDir::new().unwrap();
    let manager = Arc::new(
        LogManager::open(LogManagerConfig::with_log_dir(temp.path()).with_capacity(7)).unwrap(),
    );
    let barrier = Arc::new(Barrier::new(THREADS));

    let start = Instant::now();
    let handles: Vec<_> = (0..THREADS)
        .map(|t| {
            let manager = Arc::clone(&manager);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                for i in 0..PER_THREAD {
                    manager
                        .log_message("shared", &format!("t{}-m{}", t, i))
                        .expect("append failed");
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }
    println!(
        "{} appends across {} threads in {:?}",
        THREADS * PER_THREAD,
        THREADS,
        start.elapsed()
    );

    let queued = manager.message_count("shared");
    let rotated = rotated_lines(temp.path(), "shared").len();
    assert!(queued < 7);
    assert_eq!(queued + rotated, THREADS * PER_THREAD);
}

/// Per-thread ordering survives interleaving: each thread's messages appear in order
#[test]
fn test_per_producer_fifo_order() {
    const THREADS: usize = 4;
    const PER_THREAD: usize = 30;

    let temp = TempDir::new().unwrap();
    let manager = Arc::new(
        LogManager::open(LogManagerConfig::with_log_dir(temp.path()).with_capacity(1000)).unwrap(),
    );

    let handles: Vec<_> = (0..THREADS)
        .map(|t| {
            let manager = Arc::clone(&manager);
            thread::spawn(move || {
                for i in 0..PER_THREAD {
                    manager
                        .log_message("ordered", &format!("{}:{}", t, i))
                        .unwrap();
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    let messages = manager.get_messages("ordered");
    assert_eq!(messages.len(), THREADS * PER_THREAD);

    let mut next = [0usize; THREADS];
    for entry in &messages {
        let (t, i) = entry.content().split_once(':').unwrap();
        let t: usize = t.parse().unwrap();
        let i: usize = i.parse().unwrap();
        assert_eq!(i, next[t], "thread {} out of order", t);
        next[t] += 1;
    }
}

/// Many keys written concurrently keep an exact on-disk snapshot
#[test]
fn test_concurrent_keys_snapshot_consistency() {
    const THREADS: usize = 6;
    const PER_THREAD: usize = 20;

    let temp = TempDir::new().unwrap();
    let manager = Arc::new(
        LogManager::open(LogManagerConfig::with_log_dir(temp.path()).with_capacity(100)).unwrap(),
    );

    let handles: Vec<_> = (0..THREADS)
        .map(|t| {
            let manager = Arc::clone(&manager);
            thread::spawn(move || {
                let key = format!("user{}", t);
                for i in 0..PER_THREAD {
                    manager.log_message(&key, &format!("m{}", i)).unwrap();
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    let on_disk: SnapshotDocument =
        serde_json::from_str(&fs::read_to_string(manager.snapshot_path()).unwrap()).unwrap();
    assert_eq!(on_disk, manager.snapshot_document());
    assert_eq!(on_disk.users.len(), THREADS);
    assert_eq!(on_disk.message_count(), THREADS * PER_THREAD);
}

// ============================================================================
// Eviction Tests
// ============================================================================

/// Drop-oldest keeps exactly the newest `capacity` entries under load
#[test]
fn test_drop_oldest_under_load() {
    let temp = TempDir::new().unwrap();
    let config = LogManagerConfig::with_log_dir(temp.path())
        .with_capacity(5)
        .with_overflow(OverflowPolicy::DropOldest);
    let manager = LogManager::open(config).unwrap();

    for i in 0..1000 {
        manager.log_message("bounded", &format!("m{}", i)).unwrap();
    }

    let contents: Vec<_> = manager
        .get_messages("bounded")
        .iter()
        .map(|e| e.content().to_string())
        .collect();
    assert_eq!(contents, vec!["m995", "m996", "m997", "m998", "m999"]);
    assert!(rotated_lines(temp.path(), "bounded").is_empty());
}

// ============================================================================
// Restart Tests
// ============================================================================

/// Queued entries survive a restart and rotation continues from there
#[test]
fn test_restart_continues_rotation_cycle() {
    let temp = TempDir::new().unwrap();
    let config = LogManagerConfig::with_log_dir(temp.path()).with_capacity(4);

    {
        let manager = LogManager::open(config.clone()).unwrap();
        for i in 0..6 {
            manager.log_message("alice", &format!("m{}", i)).unwrap();
        }
        assert_eq!(manager.message_count("alice"), 2);
    }

    let manager = LogManager::open(config).unwrap();
    assert_eq!(manager.message_count("alice"), 2);

    manager.log_message("alice", "m6").unwrap();
    let receipt = manager.log_message("alice", "m7").unwrap();
    assert_eq!(receipt.rotated.len(), 1);

    let lines = rotated_lines(temp.path(), "alice");
    assert_eq!(lines.len(), 8);
}
