//! Route handlers backed by the log manager

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chatlog_core::{LogError, LogManager};
use serde::Serialize;
use tracing::{info, warn};

use crate::codec::{APPLICATION_JSON, TEXT_HTML};
use crate::routes::RouteTable;

pub const SEND_OK: &str = r#"{"success":true,"message":"Message sent successfully"}"#;
pub const SEND_MISSING_FIELDS: &str = r#"{"success":false,"error":"Missing username or message"}"#;
/// The message was queued and persisted but its queue could not be rotated
pub const SEND_ROTATION_PENDING: &str =
    r#"{"success":true,"message":"Message stored; log rotation pending"}"#;
pub const CLEAR_OK: &str = r#"{"success":true,"message":"All data cleared successfully"}"#;

/// Page served at `/` when the UI document cannot be read
pub const FALLBACK_UI: &str = r#"<!DOCTYPE html>
<html>
<head>
    <meta charset="UTF-8">
    <title>Chat Logger</title>
    <style>
        body { font-family: sans-serif; background: #10141a; color: #e6e6e6; padding: 24px; }
        h1 { color: #3fb950; }
        .notice { background: #1c2128; padding: 16px; border-radius: 8px; }
    </style>
</head>
<body>
    <h1>Chat Logger</h1>
    <div class="notice">
        <h3>Web interface unavailable</h3>
        <p>The UI document could not be loaded. The JSON API is still served at
        <code>/api/messages</code>, <code>/api/send</code> and <code>/api/clear</code>.</p>
    </div>
</body>
</html>"#;

#[derive(Serialize)]
struct Failure<'a> {
    success: bool,
    error: &'a str,
}

/// `{"success":false,"error":"<reason>"}` with the reason JSON-escaped
fn failure(reason: &str) -> String {
    serde_json::to_string(&Failure {
        success: false,
        error: reason,
    })
    .unwrap_or_else(|_| SEND_MISSING_FIELDS.to_string())
}

/// Pull a string value out of a loosely formatted JSON body
///
/// Finds the first `"field":"` and reads up to the next double quote (or the
/// end of the body). No whitespace around the colon and no escape handling;
/// a missing field yields an empty string.
pub fn extract_field(body: &str, field: &str) -> String {
    let needle = format!("\"{}\":\"", field);
    let Some(start) = body.find(&needle).map(|pos| pos + needle.len()) else {
        return String::new();
    };

    let rest = &body[start..];
    let end = rest.find('"').unwrap_or(rest.len());
    rest[..end].to_string()
}

/// Read the UI document, falling back to [`FALLBACK_UI`]
pub fn load_ui(path: &Path) -> String {
    match fs::read_to_string(path) {
        Ok(html) => html,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "UI document unavailable, serving fallback");
            FALLBACK_UI.to_string()
        }
    }
}

/// `/api/send`
pub fn send_message(manager: &LogManager, body: &str) -> String {
    let username = extract_field(body, "username");
    let message = extract_field(body, "message");

    if username.is_empty() || message.is_empty() {
        return SEND_MISSING_FIELDS.to_string();
    }

    match manager.log_message(&username, &message) {
        Ok(receipt) => {
            if !receipt.snapshot_saved {
                warn!(key = %username, "Message queued but snapshot is stale");
            }
            SEND_OK.to_string()
        }
        Err(e @ LogError::Rotation { .. }) => {
            // Appended and in the snapshot; the next append retries the rotation
            warn!(key = %username, error = %e, "Message stored, rotation pending");
            SEND_ROTATION_PENDING.to_string()
        }
        Err(e) => {
            warn!(key = %username, error = %e, "Append rejected");
            failure(&e.to_string())
        }
    }
}

/// `/api/messages`
pub fn list_messages(manager: &LogManager) -> String {
    match manager.snapshot_text() {
        Ok(text) => text,
        Err(e) => {
            warn!(error = %e, "Could not render messages");
            failure(&e.to_string())
        }
    }
}

/// `/api/clear`
pub fn clear_messages(manager: &LogManager) -> String {
    match manager.clear_all() {
        Ok(()) => CLEAR_OK.to_string(),
        Err(e) => {
            warn!(error = %e, "Clear failed to persist");
            failure(&e.to_string())
        }
    }
}

/// The service's route table
pub fn routes(manager: Arc<LogManager>, ui_path: PathBuf) -> RouteTable {
    let send = Arc::clone(&manager);
    let list = Arc::clone(&manager);
    let clear = manager;

    let table = RouteTable::new()
        .with_route("/", TEXT_HTML, move |_| load_ui(&ui_path))
        .with_route("/api/messages", APPLICATION_JSON, move |_| list_messages(&list))
        .with_route("/api/send", APPLICATION_JSON, move |body| send_message(&send, body))
        .with_route("/api/clear", APPLICATION_JSON, move |_| clear_messages(&clear));

    info!(routes = ?table.paths(), "Routes registered");
    table
}
