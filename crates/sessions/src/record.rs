//! Listing row types returned to the host layer.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::connector::SessionStatus;

/// One live session, as returned by `list_active`.
#[derive(Debug, Clone, Serialize)]
pub struct SessionSummary {
    pub session_id: String,
    pub created_at: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
    pub status: SessionStatus,
    pub message_count: u64,
    pub cwd: Option<String>,
}

/// One row of the unified listing: a live session enriched from its log
/// file when one exists, or a session derived purely from disk.
#[derive(Debug, Clone, Serialize)]
pub struct UnifiedRecord {
    pub session_id: String,
    /// Last activity for live sessions, log-file mtime for persisted ones.
    pub modified: DateTime<Utc>,
    pub preview: String,
    /// Derived per-project directory name (see `derive_project_key`).
    pub project: String,
    pub message_count: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_message: Option<String>,
    /// `true` only when the session was live at listing time.
    pub active: bool,
}
