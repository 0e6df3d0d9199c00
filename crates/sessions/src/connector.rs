//! Traits at the engine boundary.
//!
//! The registry never speaks the engine protocol itself.  It builds a
//! connector through [`ConnectorFactory`], drives connect/disconnect, and
//! reads the live fields the connector maintains as the conversation
//! progresses.  The optional [`SyncHook`] carries cross-cutting bookkeeping
//! that must never affect the outcome of a create.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use harbor_domain::error::Result;

/// Whether a session is currently usable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Connecting,
    Active,
    Disconnected,
}

/// Live handle to one engine-backed conversation.
///
/// The connector owns the connection lifecycle and mutates the readable
/// fields in place; the registry only reads them.  `last_activity_at` is
/// expected to be monotonic non-decreasing.
#[async_trait]
pub trait AgentConnector: Send + Sync {
    /// Establish the engine connection.  `resume_hint` carries the session
    /// ID to resume, when resuming.
    async fn connect(&self, resume_hint: Option<&str>) -> Result<()>;

    /// Tear down the engine connection.
    async fn disconnect(&self) -> Result<()>;

    fn status(&self) -> SessionStatus;
    fn created_at(&self) -> DateTime<Utc>;
    fn last_activity_at(&self) -> DateTime<Utc>;
    fn message_count(&self) -> u64;
    fn cwd(&self) -> Option<String>;
}

/// Options for creating (or resuming) a session.
#[derive(Debug, Clone, Default)]
pub struct CreateOptions {
    /// Owner identity, used only for sync bookkeeping.
    pub owner_id: Option<String>,
    /// Session ID to resume.  When set it becomes the live ID.
    pub resume_id: Option<String>,
    pub model: Option<String>,
    pub background_model: Option<String>,
    pub proxy_enabled: bool,
    /// Filled from config when `None` and proxy mode is enabled.
    pub proxy_port: Option<u16>,
    /// Working directory associating the session with a project.
    pub cwd: Option<String>,
}

/// Builds connectors for new sessions.  Construction is cheap; the
/// connection itself is established by [`AgentConnector::connect`].
pub trait ConnectorFactory: Send + Sync {
    fn build(&self, opts: &CreateOptions) -> Arc<dyn AgentConnector>;
}

/// Optional sync-subsystem capability.  When absent, the registry simply
/// skips the bookkeeping; when present, calls are fire-and-forget.
pub trait SyncHook: Send + Sync {
    fn mark_user_synced(&self, owner_id: &str);
    fn associate_project(&self, owner_id: &str, project: &str);
}
