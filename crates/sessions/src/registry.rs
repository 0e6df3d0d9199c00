//! Session registry — live sessions plus log-backed reconciliation.
//!
//! The registry owns the map from session ID to live connector.  Create,
//! get, rename, and close operate on the map alone; `list_unified` merges
//! the live map with the log scanner's output, de-duplicating on session ID
//! with live entries taking precedence.
//!
//! The map lock is never held across an await or during file I/O: live
//! state is snapshotted first and disk work runs on the blocking pool.

use std::collections::{HashMap, HashSet};
use std::path::{Component, Path};
use std::sync::Arc;

use parking_lot::RwLock;

use harbor_domain::config::SessionsConfig;
use harbor_domain::error::{Error, Result};
use harbor_domain::trace::TraceEvent;

use crate::connector::{AgentConnector, ConnectorFactory, CreateOptions, SyncHook};
use crate::record::{SessionSummary, UnifiedRecord};
use crate::scanner::{
    derive_project_key, digest_file, LogDigest, LogScanner, INTERNAL_SESSION_PREFIX,
};

/// Preview for a live session whose log has no usable content yet.
pub(crate) const ACTIVE_SESSION_PREVIEW: &str = "active session, no content yet";

/// One live entry in the registry map.
#[derive(Clone)]
struct LiveSession {
    /// Self-reported ID, kept in lockstep with the map key by `rename`.
    id: String,
    connector: Arc<dyn AgentConnector>,
}

/// Registry of live agent sessions, constructed once at process start and
/// injected into callers.
pub struct SessionRegistry {
    config: SessionsConfig,
    factory: Arc<dyn ConnectorFactory>,
    sync: Option<Arc<dyn SyncHook>>,
    scanner: LogScanner,
    sessions: RwLock<HashMap<String, LiveSession>>,
}

impl SessionRegistry {
    pub fn new(
        config: SessionsConfig,
        factory: Arc<dyn ConnectorFactory>,
        sync: Option<Arc<dyn SyncHook>>,
    ) -> Self {
        let scanner = LogScanner::new(config.log_root.clone());
        Self {
            config,
            factory,
            sync,
            scanner,
            sessions: RwLock::new(HashMap::new()),
        }
    }

    /// Create a new session, or resume one when `resume_id` is set.
    ///
    /// Fails with [`Error::Conflict`] when the resolved ID is already live
    /// and with the connector's error when the connection attempt fails; in
    /// both cases nothing is admitted into the map.
    pub async fn create(&self, mut opts: CreateOptions) -> Result<String> {
        let session_id = opts
            .resume_id
            .clone()
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

        // Fast fail before paying for a connection attempt.
        if self.sessions.read().contains_key(&session_id) {
            return Err(Error::Conflict(session_id));
        }

        if opts.proxy_enabled && opts.proxy_port.is_none() {
            opts.proxy_port = Some(self.config.default_proxy_port);
        }

        let connector = self.factory.build(&opts);
        connector.connect(opts.resume_id.as_deref()).await?;

        // Insert is the atomic conflict check: a concurrent create for the
        // same resumed ID may have won while we were connecting.
        let lost_race = {
            let mut sessions = self.sessions.write();
            if sessions.contains_key(&session_id) {
                true
            } else {
                sessions.insert(
                    session_id.clone(),
                    LiveSession {
                        id: session_id.clone(),
                        connector: connector.clone(),
                    },
                );
                false
            }
        };
        if lost_race {
            let _ = connector.disconnect().await;
            return Err(Error::Conflict(session_id));
        }

        self.record_owner(&opts);

        TraceEvent::SessionCreated {
            session_id: session_id.clone(),
            resumed: opts.resume_id.is_some(),
            cwd: opts.cwd.clone(),
        }
        .emit();

        Ok(session_id)
    }

    /// Sync-subsystem bookkeeping.  Best-effort: a missing hook or one that
    /// does nothing never affects the create.
    fn record_owner(&self, opts: &CreateOptions) {
        let (Some(owner), Some(sync)) = (opts.owner_id.as_deref(), self.sync.as_deref()) else {
            return;
        };
        sync.mark_user_synced(owner);
        if let Some(project) = self.direct_workspace_child(opts.cwd.as_deref()) {
            sync.associate_project(owner, &project);
        }
    }

    /// The project name when `cwd` is a direct child of the workspace root
    /// (`/workspace/proj`, not `/workspace` or `/workspace/a/b`).
    fn direct_workspace_child(&self, cwd: Option<&str>) -> Option<String> {
        let rel = Path::new(cwd?)
            .strip_prefix(&self.config.workspace_root)
            .ok()?;
        let mut parts = rel.components();
        match (parts.next(), parts.next()) {
            (Some(Component::Normal(name)), None) => Some(name.to_string_lossy().into_owned()),
            _ => None,
        }
    }

    /// Look up a live session for direct interaction.  No disk fallback.
    pub fn get(&self, session_id: &str) -> Result<Arc<dyn AgentConnector>> {
        self.sessions
            .read()
            .get(session_id)
            .map(|entry| entry.connector.clone())
            .ok_or_else(|| Error::NotFound(session_id.to_owned()))
    }

    /// Move a session to the authoritative ID the engine revealed after
    /// creation.  A rename to an ID that already exists is a no-op, so
    /// duplicate notifications are tolerated.
    pub fn rename(&self, old_id: &str, new_id: &str) -> Result<()> {
        {
            let mut sessions = self.sessions.write();
            if !sessions.contains_key(old_id) {
                return Err(Error::NotFound(old_id.to_owned()));
            }
            if sessions.contains_key(new_id) {
                return Ok(());
            }
            if let Some(mut entry) = sessions.remove(old_id) {
                entry.id = new_id.to_owned();
                sessions.insert(new_id.to_owned(), entry);
            }
        }

        TraceEvent::SessionRenamed {
            old_session_id: old_id.to_owned(),
            new_session_id: new_id.to_owned(),
        }
        .emit();
        Ok(())
    }

    /// Close a session: disconnect the engine, then remove the entry
    /// regardless of the disconnect outcome.  Closing an unknown ID is a
    /// silent no-op.
    pub async fn close(&self, session_id: &str) -> Result<()> {
        let Some(entry) = self.sessions.read().get(session_id).cloned() else {
            return Ok(());
        };

        let result = entry.connector.disconnect().await;

        // Local removal is unconditional even when teardown errored.
        self.sessions.write().remove(session_id);

        TraceEvent::SessionClosed {
            session_id: session_id.to_owned(),
            clean: result.is_ok(),
        }
        .emit();

        result
    }

    /// Disconnect every live session and clear the map.  Host shutdown path.
    pub async fn shutdown(&self) {
        let entries: Vec<LiveSession> = {
            let mut sessions = self.sessions.write();
            sessions.drain().map(|(_, entry)| entry).collect()
        };

        for entry in entries {
            if let Err(e) = entry.connector.disconnect().await {
                tracing::warn!(
                    session_id = %entry.id,
                    error = %e,
                    "disconnect failed during shutdown"
                );
            }
        }
    }

    pub fn len(&self) -> usize {
        self.sessions.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.read().is_empty()
    }

    /// One summary per live session, optionally filtered by exact working
    /// directory.  Order is unspecified.
    pub fn list_active(&self, cwd_filter: Option<&str>) -> Vec<SessionSummary> {
        let sessions = self.sessions.read();
        sessions
            .values()
            .filter(|entry| !entry.id.starts_with(INTERNAL_SESSION_PREFIX))
            .filter(|entry| match cwd_filter {
                Some(cwd) => entry.connector.cwd().as_deref() == Some(cwd),
                None => true,
            })
            .map(|entry| SessionSummary {
                session_id: entry.id.clone(),
                created_at: entry.connector.created_at(),
                last_activity: entry.connector.last_activity_at(),
                status: entry.connector.status(),
                message_count: entry.connector.message_count(),
                cwd: entry.connector.cwd(),
            })
            .collect()
    }

    /// Unified listing: live sessions merged with persisted logs, one record
    /// per session ID, most recently touched first.
    ///
    /// Live sessions win over their own on-disk representation.  Unreadable
    /// or malformed log content degrades previews; it never fails the call.
    pub async fn list_unified(&self, cwd_filter: Option<&str>) -> Vec<UnifiedRecord> {
        // Snapshot the live map so no lock is held during file probes.
        let live: Vec<LiveSession> = {
            let sessions = self.sessions.read();
            sessions.values().cloned().collect()
        };

        let mut records = Vec::new();
        let mut seen = HashSet::new();

        // Pass 1: live sessions, enriched from their log file when the
        // engine has already flushed one.
        for entry in live {
            if entry.id.starts_with(INTERNAL_SESSION_PREFIX) {
                continue;
            }
            let cwd = entry.connector.cwd();
            if let Some(filter) = cwd_filter {
                if cwd.as_deref() != Some(filter) {
                    continue;
                }
            }

            let digest = self.probe_log(cwd.as_deref(), &entry.id).await;
            records.push(UnifiedRecord {
                session_id: entry.id.clone(),
                modified: entry.connector.last_activity_at(),
                preview: digest
                    .preview()
                    .unwrap_or_else(|| ACTIVE_SESSION_PREVIEW.to_owned()),
                project: derive_project_key(cwd.as_deref()),
                message_count: entry.connector.message_count(),
                first_message: digest.first_message(),
                active: true,
            });
            seen.insert(entry.id);
        }

        // Pass 2: persisted sessions, minus the ones already live.
        let scanner = self.scanner.clone();
        let filter = cwd_filter.map(str::to_owned);
        let persisted = tokio::task::spawn_blocking(move || scanner.scan(filter.as_deref()))
            .await
            .unwrap_or_else(|e| {
                tracing::warn!(error = %e, "log scan task failed");
                Vec::new()
            });
        let mut persisted_kept = 0usize;
        for record in persisted {
            if seen.contains(&record.session_id) {
                continue;
            }
            persisted_kept += 1;
            records.push(record);
        }

        // Stable sort: live entries precede disk entries on equal stamps.
        records.sort_by(|a, b| b.modified.cmp(&a.modified));

        TraceEvent::ListingBuilt {
            live: seen.len(),
            persisted: persisted_kept,
            cwd_filter: cwd_filter.map(str::to_owned),
        }
        .emit();

        records
    }

    /// Best-effort digest of one session's log file.  A missing or
    /// unreadable file yields an empty digest (placeholder preview).
    async fn probe_log(&self, cwd: Option<&str>, session_id: &str) -> LogDigest {
        let path = self.scanner.session_log_path(cwd, session_id);
        tokio::task::spawn_blocking(move || digest_file(&path).unwrap_or_default())
            .await
            .unwrap_or_default()
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
