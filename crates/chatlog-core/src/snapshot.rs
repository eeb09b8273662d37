//! Snapshot persistence
//!
//! The snapshot is a JSON document holding every queued (not yet rotated)
//! entry, grouped by owner key:
//!
//! ```text
//! {
//!   "users": [
//!     {
//!       "username": "alice",
//!       "messages": [
//!         {"username":"alice","content":"hi","timestamp":1700000000000}
//!       ]
//!     }
//!   ]
//! }
//! ```
//!
//! Message objects are written compact, one per line, so line-oriented
//! readers matching `"username":"..."` keep working. The file is rewritten in
//! full on every mutation through [`atomic_write`].
//!
//! Loading first tries a structured parse. Files that fail it (truncated
//! writes, hand edits, files left by an older build) go through a recovery
//! pass that pattern-matches owner keys and individual message objects out
//! of the raw text and skips anything that does not look like a message.

use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::entry::{Entry, format_local_millis};
use crate::error::LogResult;
use crate::safe_io::atomic_write;

/// Top-level snapshot document
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotDocument {
    pub users: Vec<UserRecord>,
}

/// All queued messages of one owner key
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRecord {
    pub username: String,
    #[serde(default)]
    pub messages: Vec<MessageRecord>,
}

/// One persisted entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageRecord {
    pub username: String,
    pub content: String,
    pub timestamp: i64,
}

impl From<&Entry> for MessageRecord {
    fn from(entry: &Entry) -> Self {
        Self {
            username: entry.owner().to_string(),
            content: entry.content().to_string(),
            timestamp: entry.timestamp_millis(),
        }
    }
}

impl From<MessageRecord> for Entry {
    fn from(record: MessageRecord) -> Self {
        Entry::with_timestamp(record.username, record.content, record.timestamp)
    }
}

impl SnapshotDocument {
    /// Build a document from `(owner key, queued entries)` pairs
    pub fn from_queues<'a, I>(queues: I) -> Self
    where
        I: IntoIterator<Item = (&'a str, Vec<Entry>)>,
    {
        let users = queues
            .into_iter()
            .map(|(username, entries)| UserRecord {
                username: username.to_string(),
                messages: entries.iter().map(MessageRecord::from).collect(),
            })
            .collect();
        Self { users }
    }

    /// Total number of messages across all users
    pub fn message_count(&self) -> usize {
        self.users.iter().map(|u| u.messages.len()).sum()
    }

    /// Encode in the on-disk layout: indented users, compact messages
    pub fn to_json(&self) -> LogResult<String> {
        let mut out = String::from("{\n  \"users\": [");
        for (i, user) in self.users.iter().enumerate() {
            out.push_str(if i == 0 { "\n" } else { ",\n" });
            out.push_str("    {\n      \"username\": ");
            out.push_str(&serde_json::to_string(&user.username)?);
            out.push_str(",\n      \"messages\": [");
            for (j, message) in user.messages.iter().enumerate() {
                out.push_str(if j == 0 { "\n        " } else { ",\n        " });
                out.push_str(&serde_json::to_string(message)?);
            }
            if !user.messages.is_empty() {
                out.push_str("\n      ");
            }
            out.push_str("]\n    }");
        }
        if !self.users.is_empty() {
            out.push_str("\n  ");
        }
        out.push_str("]\n}\n");
        Ok(out)
    }

    /// Encode the API view: the snapshot plus a `formatted_time` per message
    pub fn to_api_json(&self) -> LogResult<String> {
        let view = ApiView {
            users: self
                .users
                .iter()
                .map(|user| ApiUser {
                    username: &user.username,
                    messages: user
                        .messages
                        .iter()
                        .map(|m| ApiMessage {
                            username: &m.username,
                            content: &m.content,
                            timestamp: m.timestamp,
                            formatted_time: format_local_millis(m.timestamp),
                        })
                        .collect(),
                })
                .collect(),
        };
        Ok(serde_json::to_string_pretty(&view)?)
    }
}

#[derive(Serialize)]
struct ApiView<'a> {
    users: Vec<ApiUser<'a>>,
}

#[derive(Serialize)]
struct ApiUser<'a> {
    username: &'a str,
    messages: Vec<ApiMessage<'a>>,
}

#[derive(Serialize)]
struct ApiMessage<'a> {
    username: &'a str,
    content: &'a str,
    timestamp: i64,
    formatted_time: String,
}

/// How a snapshot was decoded
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadMode {
    /// The document parsed as a whole
    Structured,
    /// The document was malformed; fragments were recovered individually
    Recovered {
        /// Message-like fragments that could not be decoded
        skipped: usize,
    },
}

/// Outcome of decoding snapshot text
#[derive(Debug, Clone)]
pub struct LoadedSnapshot {
    pub document: SnapshotDocument,
    pub mode: LoadMode,
}

/// Decode snapshot text, falling back to fragment recovery
///
/// Never fails: at worst the result is an empty document.
pub fn decode(text: &str) -> LoadedSnapshot {
    match serde_json::from_str::<SnapshotDocument>(text) {
        Ok(document) => LoadedSnapshot {
            document,
            mode: LoadMode::Structured,
        },
        Err(e) => {
            debug!(error = %e, "Structured snapshot parse failed, recovering fragments");
            recover(text)
        }
    }
}

static USERNAME_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#""username"\s*:\s*"((?:[^"\\]|\\.)*)""#).expect("valid username pattern")
});

static CONTENT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#""content"\s*:\s*"((?:[^"\\]|\\.)*)""#).expect("valid content pattern")
});

static TIMESTAMP_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#""timestamp"\s*:\s*(-?\d+)"#).expect("valid timestamp pattern"));

/// Brace-free `{ ... }` objects. String literals are consumed whole, so
/// braces inside message content do not split a fragment.
static FRAGMENT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"\{(?:[^{}"]|"(?:[^"\\]|\\.)*")*\}"#).expect("valid fragment pattern")
});

static CONTENT_KEY_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#""content"\s*:"#).expect("valid content key pattern"));

/// Pattern-based recovery over raw snapshot text
///
/// Keys are collected first, in order of appearance. Each message fragment is
/// then decoded on its own and attached to its key; fragments missing a field
/// or naming an unknown key are skipped. A `"content"` key outside any
/// complete fragment (a message cut off mid-object) also counts as skipped.
pub fn recover(text: &str) -> LoadedSnapshot {
    let mut users: Vec<UserRecord> = Vec::new();

    for caps in USERNAME_RE.captures_iter(text) {
        let username = unescape(&caps[1]);
        if !users.iter().any(|u| u.username == username) {
            users.push(UserRecord {
                username,
                messages: Vec::new(),
            });
        }
    }

    let mut skipped = 0;
    let mut candidates = 0;
    for fragment in FRAGMENT_RE.find_iter(text) {
        let fragment = fragment.as_str();
        if !CONTENT_KEY_RE.is_match(fragment) {
            // A user header with no messages, not a message
            continue;
        }
        candidates += 1;

        match decode_fragment(fragment) {
            Some(record) => match users.iter_mut().find(|u| u.username == record.username) {
                Some(user) => user.messages.push(record),
                None => skipped += 1,
            },
            None => skipped += 1,
        }
    }

    skipped += CONTENT_KEY_RE
        .find_iter(text)
        .count()
        .saturating_sub(candidates);

    if skipped > 0 {
        warn!(skipped, "Skipped malformed snapshot fragments");
    }

    LoadedSnapshot {
        document: SnapshotDocument { users },
        mode: LoadMode::Recovered { skipped },
    }
}

fn decode_fragment(fragment: &str) -> Option<MessageRecord> {
    if let Ok(record) = serde_json::from_str::<MessageRecord>(fragment) {
        return Some(record);
    }

    let username = USERNAME_RE.captures(fragment)?;
    let content = CONTENT_RE.captures(fragment)?;
    let timestamp = TIMESTAMP_RE.captures(fragment)?[1].parse().ok()?;

    Some(MessageRecord {
        username: unescape(&username[1]),
        content: unescape(&content[1]),
        timestamp,
    })
}

/// Reverse JSON string escapes; text that is not a valid JSON string body is kept verbatim
fn unescape(raw: &str) -> String {
    serde_json::from_str::<String>(&format!("\"{}\"", raw)).unwrap_or_else(|_| raw.to_string())
}

/// The on-disk snapshot file
#[derive(Debug, Clone)]
pub struct SnapshotStore {
    path: PathBuf,
}

impl SnapshotStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Replace the snapshot file with `document`
    pub fn save(&self, document: &SnapshotDocument) -> LogResult<()> {
        let json = document.to_json()?;
        atomic_write(&self.path, json.as_bytes())?;
        debug!(
            path = %self.path.display(),
            users = document.users.len(),
            messages = document.message_count(),
            "Snapshot written"
        );
        Ok(())
    }

    /// Read and decode the snapshot file
    ///
    /// A missing or unreadable file yields `None`; decoding never fails.
    pub fn load(&self) -> Option<LoadedSnapshot> {
        let text = match std::fs::read(&self.path) {
            Ok(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "No snapshot file, starting fresh");
                return None;
            }
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "Could not read snapshot, starting fresh");
                return None;
            }
        };

        let loaded = decode(&text);
        info!(
            path = %self.path.display(),
            mode = ?loaded.mode,
            users = loaded.document.users.len(),
            messages = loaded.document.message_count(),
            "Loaded snapshot"
        );
        Some(loaded)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn sample() -> SnapshotDocument {
        SnapshotDocument::from_queues(vec![
            (
                "alice",
                vec![
                    Entry::with_timestamp("alice", "say \"hi\"", 1000),
                    Entry::with_timestamp("alice", "back\\slash\nnew line\ttab", 2000),
                ],
            ),
            ("bob", vec![]),
        ])
    }

    #[test]
    fn test_roundtrip_with_escapes() {
        let temp = TempDir::new().unwrap();
        let store = SnapshotStore::new(temp.path().join("chat_data.json"));
        let doc = sample();

        store.save(&doc).unwrap();
        let loaded = store.load().unwrap();

        assert_eq!(loaded.mode, LoadMode::Structured);
        assert_eq!(loaded.document, doc);
    }

    #[test]
    fn test_schema_shape() {
        let json = sample().to_json().unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();

        let users = value["users"].as_array().unwrap();
        assert_eq!(users[0]["username"], "alice");
        assert_eq!(users[0]["messages"][0]["username"], "alice");
        assert_eq!(users[0]["messages"][0]["content"], "say \"hi\"");
        assert_eq!(users[0]["messages"][0]["timestamp"], 1000);
        assert_eq!(users[1]["messages"].as_array().unwrap().len(), 0);
    }

    #[test]
    fn test_messages_written_compact() {
        let json = sample().to_json().unwrap();

        assert!(json.starts_with("{\n  \"users\": [\n    {\n      \"username\": \"alice\",\n"));
        assert!(json.contains(
            "\n        {\"username\":\"alice\",\"content\":\"say \\\"hi\\\"\",\"timestamp\":1000},\n"
        ));
        assert!(json.contains("\"username\": \"bob\",\n      \"messages\": []"));

        let empty = SnapshotDocument::default().to_json().unwrap();
        assert_eq!(empty, "{\n  \"users\": []\n}\n");
        assert_eq!(decode(&empty).document, SnapshotDocument::default());
    }

    #[test]
    fn test_api_view_adds_formatted_time() {
        let json = sample().to_api_json().unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        let message = &value["users"][0]["messages"][0];

        assert_eq!(message["timestamp"], 1000);
        assert_eq!(message["formatted_time"].as_str().unwrap().len(), 19);

        // The API view is still loadable as a snapshot
        let loaded = decode(&json);
        assert_eq!(loaded.mode, LoadMode::Structured);
        assert_eq!(loaded.document.message_count(), 2);
    }

    #[test]
    fn test_missing_file_is_none() {
        let temp = TempDir::new().unwrap();
        let store = SnapshotStore::new(temp.path().join("absent.json"));
        assert!(store.load().is_none());
    }

    #[test]
    fn test_recovery_from_truncated_file() {
        let json = sample().to_json().unwrap();
        // Cut the document after the first message object
        let cut = json.find("2000").unwrap();
        let truncated = &json[..cut];

        let loaded = decode(truncated);
        assert!(matches!(loaded.mode, LoadMode::Recovered { .. }));

        let usernames: Vec<_> = loaded.document.users.iter().map(|u| u.username.as_str()).collect();
        assert_eq!(usernames, vec!["alice"]);
        assert_eq!(loaded.document.users[0].messages.len(), 1);
        assert_eq!(loaded.document.users[0].messages[0].content, "say \"hi\"");
    }

    #[test]
    fn test_recovery_skips_bad_fragments() {
        let text = r#"{"users":[{"username":"carol","messages":[
            {"username":"carol","content":"ok","timestamp":5},
            {"username":"carol","content":"no timestamp"},
            {"username":"carol","content":"fine \"quoted\"","timestamp":6},
        ]}"#;

        let loaded = decode(text);
        assert_eq!(loaded.mode, LoadMode::Recovered { skipped: 1 });

        let messages = &loaded.document.users[0].messages;
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].timestamp, 5);
        assert_eq!(messages[1].content, "fine \"quoted\"");
    }

    #[test]
    fn test_recovery_of_legacy_compact_layout() {
        // Older writers put each message on one line with no spaces and extra fields
        let text = "{\n  \"users\": [\n    {\n      \"username\": \"dan\",\n      \"messages\": [\n        \
                    {\"username\":\"dan\",\"content\":\"hey\",\"timestamp\":99,\"formatted_time\":\"x\"}\n      ]\n    }\n  ]\n"; // no closing brace

        let loaded = decode(text);
        assert!(matches!(loaded.mode, LoadMode::Recovered { skipped: 0 }));
        assert_eq!(loaded.document.users[0].messages[0].content, "hey");
        assert_eq!(loaded.document.users[0].messages[0].timestamp, 99);
    }

    #[test]
    fn test_recovery_keeps_braces_in_content() {
        let text = r#"{"users":[{"username":"eve","messages":[{"username":"eve","content":"smile :{","timestamp":1},{"username":"eve","content":"ok","timestamp":2},{"username":"eve","content":"} and {x}","timestamp":3}"#;

        let loaded = decode(text);
        assert_eq!(loaded.mode, LoadMode::Recovered { skipped: 0 });

        let contents: Vec<_> = loaded.document.users[0]
            .messages
            .iter()
            .map(|m| m.content.as_str())
            .collect();
        assert_eq!(contents, vec!["smile :{", "ok", "} and {x}"]);
    }

    #[test]
    fn test_recovery_counts_cut_off_message() {
        let text = r#"{"users":[{"username":"eve","messages":[{"username":"eve","content":"kept","timestamp":1},{"username":"eve","content":"lost"#;

        let loaded = decode(text);
        assert_eq!(loaded.mode, LoadMode::Recovered { skipped: 1 });
        assert_eq!(loaded.document.users[0].messages.len(), 1);
        assert_eq!(loaded.document.users[0].messages[0].content, "kept");
    }

    #[test]
    fn test_garbage_yields_empty_document() {
        let loaded = decode("not json at all");
        assert!(loaded.document.users.is_empty());
    }
}
