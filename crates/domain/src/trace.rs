use serde::Serialize;

/// Structured trace events emitted across all Harbor crates.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event")]
pub enum TraceEvent {
    SessionCreated {
        session_id: String,
        resumed: bool,
        cwd: Option<String>,
    },
    SessionRenamed {
        old_session_id: String,
        new_session_id: String,
    },
    SessionClosed {
        session_id: String,
        clean: bool,
    },
    ListingBuilt {
        live: usize,
        persisted: usize,
        cwd_filter: Option<String>,
    },
}

impl TraceEvent {
    pub fn emit(&self) {
        let json = serde_json::to_string(self).unwrap_or_default();
        tracing::info!(trace_event = %json, "harbor_event");
    }
}
