//! Session registry with log-backed reconciliation.
//!
//! Tracks live, in-process agent sessions and unifies them with session
//! summaries derived from the engine's append-only JSONL logs on disk,
//! producing one de-duplicated listing ordered by recency.  Live state is
//! authoritative; disk-derived state is best-effort and never causes a
//! listing to fail.

pub mod connector;
pub mod record;
pub mod registry;
pub mod scanner;

pub use connector::{AgentConnector, ConnectorFactory, CreateOptions, SessionStatus, SyncHook};
pub use record::{SessionSummary, UnifiedRecord};
pub use registry::SessionRegistry;
pub use scanner::{derive_project_key, LogScanner, INTERNAL_SESSION_PREFIX};
