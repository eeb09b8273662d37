//! Rotation files
//!
//! When a queue fills up its entries are written to a new, never-modified
//! text file in the rotation directory:
//!
//! ```text
//! === Chat Log for User: alice ===
//! Generated at: 2024-05-01 13:45:10
//! Total messages: 3
//! ========================================
//!
//! [2024-05-01 13:45:01] alice: hi
//! [2024-05-01 13:45:05] alice: there
//! [2024-05-01 13:45:10] alice: you
//!
//! === End of Log ===
//! ```
//!
//! File names are `<key>_<YYYYmmdd_HHMMSS_mmm>.log`, with a numeric suffix
//! if that name is already taken.

use std::fmt::Write as _;
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};
use tracing::{debug, info, warn};

use crate::entry::{Entry, LOCAL_TIME_FORMAT};
use crate::error::{LogError, LogResult};

/// Upper bound on `_<n>` suffixes tried for a single rotation
const MAX_NAME_ATTEMPTS: u32 = 1000;

/// Writes rotation files into a directory
#[derive(Debug, Clone)]
pub struct RotationWriter {
    dir: PathBuf,
}

impl RotationWriter {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Write `entries` to a fresh rotation file and return its path
    ///
    /// The file is synced before returning. On failure any partially written
    /// file is removed and the caller must keep the entries.
    pub fn write(&self, owner: &str, entries: &[Entry]) -> LogResult<PathBuf> {
        let now = Local::now();
        let body = render(owner, entries, now);
        let stem = file_stem(owner, now);

        let rotation_err = |path: PathBuf, source: io::Error| LogError::Rotation {
            key: owner.to_string(),
            path,
            source,
        };

        fs::create_dir_all(&self.dir).map_err(|e| rotation_err(self.dir.clone(), e))?;

        let (path, mut file) = self
            .create_unique(&stem)
            .map_err(|(path, e)| rotation_err(path, e))?;

        let written = file
            .write_all(body.as_bytes())
            .and_then(|_| file.sync_all());

        if let Err(e) = written {
            drop(file);
            if let Err(remove_err) = fs::remove_file(&path) {
                warn!(path = %path.display(), error = %remove_err, "Could not remove partial rotation file");
            }
            return Err(rotation_err(path, e));
        }

        info!(key = %owner, entries = entries.len(), path = %path.display(), "Rotated queue to file");
        Ok(path)
    }

    fn create_unique(&self, stem: &str) -> Result<(PathBuf, fs::File), (PathBuf, io::Error)> {
        let mut last = self.dir.join(format!("{}.log", stem));
        for attempt in 0..MAX_NAME_ATTEMPTS {
            let path = if attempt == 0 {
                self.dir.join(format!("{}.log", stem))
            } else {
                self.dir.join(format!("{}_{}.log", stem, attempt))
            };

            match OpenOptions::new().write(true).create_new(true).open(&path) {
                Ok(file) => return Ok((path, file)),
                Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                    debug!(path = %path.display(), "Rotation file name taken");
                    last = path;
                }
                Err(e) => return Err((path, e)),
            }
        }

        Err((
            last,
            io::Error::new(io::ErrorKind::AlreadyExists, "no free rotation file name"),
        ))
    }
}

/// Render the rotation file body
pub fn render(owner: &str, entries: &[Entry], generated_at: DateTime<Local>) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "=== Chat Log for User: {} ===", owner);
    let _ = writeln!(out, "Generated at: {}", generated_at.format(LOCAL_TIME_FORMAT));
    let _ = writeln!(out, "Total messages: {}", entries.len());
    let _ = writeln!(out, "========================================");
    out.push('\n');

    for entry in entries {
        let _ = writeln!(out, "[{}] {}: {}", entry.local_time(), owner, entry.content());
    }

    out.push('\n');
    let _ = writeln!(out, "=== End of Log ===");
    out
}

/// Deterministic file stem from the owner key and rotation time
pub fn file_stem(owner: &str, at: DateTime<Local>) -> String {
    format!("{}_{}", sanitize_key(owner), at.format("%Y%m%d_%H%M%S_%3f"))
}

/// Restrict a key to characters that are safe in a file name
fn sanitize_key(key: &str) -> String {
    let cleaned: String = key
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();

    if cleaned.is_empty() {
        "_".to_string()
    } else {
        cleaned
    }
}
