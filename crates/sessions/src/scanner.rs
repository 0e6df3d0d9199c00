//! Log scanner — derives per-session summaries from on-disk JSONL logs.
//!
//! The engine writes one append-only `<sessionId>.jsonl` file per session
//! under a per-project subdirectory of the log root.  The scanner walks that
//! tree and produces one [`UnifiedRecord`] per log file in a single pass per
//! file, with no schema knowledge beyond the `type` discriminator.  Parsing
//! is tolerant: a malformed line (including a partially written trailing
//! line) is skipped, and an unreadable file is skipped without aborting the
//! scan of its siblings.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::record::UnifiedRecord;

/// Reserved prefix for engine-internal sub-sessions, hidden from listings.
pub const INTERNAL_SESSION_PREFIX: &str = "agent-";

/// Maximum preview length, in characters.
pub const PREVIEW_MAX_CHARS: usize = 100;

/// Preview used when a log file yields neither a summary nor a user message.
pub(crate) const NO_CONTENT_PREVIEW: &str = "no content";

const LOG_EXTENSION: &str = "jsonl";

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Project key derivation
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Derive the per-project directory name from a working directory path.
///
/// `/` and `_` both map to `-`, so the encoding is lossy (`/a/b` and `/a-b`
/// collide).  Kept as-is for compatibility with logs already on disk.
pub fn derive_project_key(cwd: Option<&str>) -> String {
    match cwd {
        Some(cwd) => cwd.replace(['/', '_'], "-"),
        None => "default".to_owned(),
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Log line shapes
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// One structured log line.  Only the fields the scanner reads are modeled;
/// everything else is ignored.
#[derive(Debug, Deserialize)]
struct LogLine {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    message: Option<LogMessage>,
    #[serde(default)]
    summary: Option<String>,
}

#[derive(Debug, Deserialize)]
struct LogMessage {
    #[serde(default)]
    content: Option<MessageContent>,
}

/// Message bodies come in two shapes depending on the engine's serializer:
/// a plain string or a list of content blocks.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum MessageContent {
    Text(String),
    Blocks(Vec<ContentBlock>),
    Other(serde_json::Value),
}

/// A content block is either an inline string or an object carrying `text`.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ContentBlock {
    Inline(String),
    Typed {
        #[serde(default)]
        text: Option<String>,
    },
    Other(serde_json::Value),
}

impl MessageContent {
    /// First textual chunk, if any.  Empty strings count as no text.
    fn first_text(&self) -> Option<&str> {
        let text = match self {
            Self::Text(s) => Some(s.as_str()),
            Self::Blocks(blocks) => blocks.first().and_then(ContentBlock::text),
            Self::Other(_) => None,
        };
        text.filter(|t| !t.is_empty())
    }
}

impl ContentBlock {
    fn text(&self) -> Option<&str> {
        match self {
            Self::Inline(s) => Some(s.as_str()),
            Self::Typed { text } => text.as_deref(),
            Self::Other(_) => None,
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Per-file digest
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Accumulators from one sequential pass over a session log file.
#[derive(Debug, Default)]
pub struct LogDigest {
    /// Count of `user` and `assistant` entries.
    pub message_count: u64,
    /// First non-empty `user` message text, untruncated.
    pub first_user_message: Option<String>,
    /// First non-empty `summary` entry.
    pub summary: Option<String>,
}

impl LogDigest {
    /// Preview text: summary wins over the first user message; `None` when
    /// the file yielded neither.
    pub fn preview(&self) -> Option<String> {
        self.summary
            .as_deref()
            .or(self.first_user_message.as_deref())
            .map(|text| truncate_chars(text, PREVIEW_MAX_CHARS))
    }

    /// First user message truncated for the listing row.
    pub fn first_message(&self) -> Option<String> {
        self.first_user_message
            .as_deref()
            .map(|text| truncate_chars(text, PREVIEW_MAX_CHARS))
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Scanner
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Walks the log root and summarizes every session log found.
#[derive(Debug, Clone)]
pub struct LogScanner {
    log_root: PathBuf,
}

impl LogScanner {
    pub fn new(log_root: impl Into<PathBuf>) -> Self {
        Self {
            log_root: log_root.into(),
        }
    }

    /// Path where the engine writes (or will write) the log for a session.
    pub fn session_log_path(&self, cwd: Option<&str>, session_id: &str) -> PathBuf {
        self.log_root
            .join(derive_project_key(cwd))
            .join(format!("{session_id}.{LOG_EXTENSION}"))
    }

    /// Summarize every session log under the root, optionally restricted to
    /// the project directory derived from `cwd_filter`.
    ///
    /// A missing log root is a normal state (no history yet) and yields an
    /// empty set.  Records are unordered; callers sort.
    pub fn scan(&self, cwd_filter: Option<&str>) -> Vec<UnifiedRecord> {
        if !self.log_root.exists() {
            return Vec::new();
        }

        let project_dirs: Vec<PathBuf> = match cwd_filter {
            Some(cwd) => vec![self.log_root.join(derive_project_key(Some(cwd)))],
            None => match std::fs::read_dir(&self.log_root) {
                Ok(entries) => entries.flatten().map(|e| e.path()).collect(),
                Err(e) => {
                    tracing::warn!(
                        error = %e,
                        root = %self.log_root.display(),
                        "failed to read log root"
                    );
                    return Vec::new();
                }
            },
        };

        let mut records = Vec::new();
        for dir in project_dirs {
            if !dir.is_dir() {
                continue;
            }
            let project = match dir.file_name().and_then(|n| n.to_str()) {
                Some(name) => name.to_owned(),
                None => continue,
            };
            self.scan_project_dir(&dir, &project, &mut records);
        }
        records
    }

    fn scan_project_dir(&self, dir: &Path, project: &str, records: &mut Vec<UnifiedRecord>) {
        let entries = match std::fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    dir = %dir.display(),
                    "skipping unreadable project dir"
                );
                return;
            }
        };

        for entry in entries.flatten() {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some(LOG_EXTENSION) {
                continue;
            }
            let session_id = match path.file_stem().and_then(|s| s.to_str()) {
                Some(s) => s.to_owned(),
                None => continue,
            };
            if session_id.starts_with(INTERNAL_SESSION_PREFIX) {
                continue;
            }

            let modified = match entry.metadata().and_then(|m| m.modified()) {
                Ok(mtime) => DateTime::<Utc>::from(mtime),
                Err(e) => {
                    tracing::warn!(
                        error = %e,
                        path = %path.display(),
                        "skipping session log without mtime"
                    );
                    continue;
                }
            };

            let digest = match digest_file(&path) {
                Ok(digest) => digest,
                Err(e) => {
                    tracing::warn!(
                        error = %e,
                        path = %path.display(),
                        "skipping unreadable session log"
                    );
                    continue;
                }
            };

            records.push(UnifiedRecord {
                session_id,
                modified,
                preview: digest
                    .preview()
                    .unwrap_or_else(|| NO_CONTENT_PREVIEW.to_owned()),
                project: project.to_owned(),
                message_count: digest.message_count,
                first_message: digest.first_message(),
                active: false,
            });
        }
    }
}

/// Digest one log file in a single pass.  Malformed lines are skipped.
pub fn digest_file(path: &Path) -> std::io::Result<LogDigest> {
    let raw = std::fs::read_to_string(path)?;

    let mut digest = LogDigest::default();
    for line in raw.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let entry: LogLine = match serde_json::from_str(line) {
            Ok(entry) => entry,
            // Append-only logs may end in a partially written line.
            Err(_) => continue,
        };

        match entry.kind.as_str() {
            "user" => {
                digest.message_count += 1;
                if digest.first_user_message.is_none() {
                    digest.first_user_message = entry
                        .message
                        .and_then(|m| m.content)
                        .as_ref()
                        .and_then(MessageContent::first_text)
                        .map(str::to_owned);
                }
            }
            "assistant" => digest.message_count += 1,
            "summary" => {
                if digest.summary.is_none() {
                    digest.summary = entry.summary.filter(|s| !s.is_empty());
                }
            }
            _ => {}
        }
    }
    Ok(digest)
}

/// Truncate to at most `max` characters, respecting char boundaries.
fn truncate_chars(s: &str, max: usize) -> String {
    match s.char_indices().nth(max) {
        Some((idx, _)) => s[..idx].to_owned(),
        None => s.to_owned(),
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
