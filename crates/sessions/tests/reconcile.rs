//! End-to-end reconciliation: live registry + on-disk logs merged into one
//! listing.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use harbor_domain::config::SessionsConfig;
use harbor_domain::error::Result;

use harbor_sessions::{
    derive_project_key, AgentConnector, ConnectorFactory, CreateOptions, SessionRegistry,
    SessionStatus,
};

struct StubConnector {
    cwd: Option<String>,
    created_at: DateTime<Utc>,
    last_activity: DateTime<Utc>,
    message_count: u64,
}

#[async_trait]
impl AgentConnector for StubConnector {
    async fn connect(&self, _resume_hint: Option<&str>) -> Result<()> {
        Ok(())
    }
    async fn disconnect(&self) -> Result<()> {
        Ok(())
    }
    fn status(&self) -> SessionStatus {
        SessionStatus::Active
    }
    fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
    fn last_activity_at(&self) -> DateTime<Utc> {
        self.last_activity
    }
    fn message_count(&self) -> u64 {
        self.message_count
    }
    fn cwd(&self) -> Option<String> {
        self.cwd.clone()
    }
}

struct StubFactory;

impl ConnectorFactory for StubFactory {
    fn build(&self, opts: &CreateOptions) -> Arc<dyn AgentConnector> {
        let now = Utc::now();
        Arc::new(StubConnector {
            cwd: opts.cwd.clone(),
            created_at: now,
            last_activity: now,
            message_count: 0,
        })
    }
}

fn registry(log_root: &Path) -> SessionRegistry {
    let config = SessionsConfig {
        log_root: log_root.to_path_buf(),
        ..SessionsConfig::default()
    };
    SessionRegistry::new(config, Arc::new(StubFactory), None)
}

fn write_log(log_root: &Path, cwd: &str, session_id: &str, lines: &[&str]) {
    let dir = log_root.join(derive_project_key(Some(cwd)));
    std::fs::create_dir_all(&dir).unwrap();
    std::fs::write(dir.join(format!("{session_id}.jsonl")), lines.join("\n")).unwrap();
}

fn user_line(text: &str) -> String {
    format!(r#"{{"type":"user","message":{{"content":"{text}"}}}}"#)
}

#[tokio::test]
async fn fresh_session_then_flushed_log() {
    let tmp = tempfile::tempdir().unwrap();
    let reg = registry(tmp.path());

    let id = reg
        .create(CreateOptions {
            cwd: Some("/workspace/proj1".into()),
            ..CreateOptions::default()
        })
        .await
        .unwrap();

    // Before the engine flushes anything: exactly one active record with the
    // placeholder preview.
    let listed = reg.list_unified(Some("/workspace/proj1")).await;
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].session_id, id);
    assert!(listed[0].active);
    assert_eq!(listed[0].preview, "active session, no content yet");

    // Engine flushes the log: the live record picks up the real preview.
    let text = format!(
        "Hello world, please help me write code that {}",
        "does many things ".repeat(10)
    );
    let line = user_line(&text);
    write_log(tmp.path(), "/workspace/proj1", &id, &[line.as_str()]);

    let listed = reg.list_unified(Some("/workspace/proj1")).await;
    assert_eq!(listed.len(), 1);
    assert!(listed[0].active);
    let expected: String = text.chars().take(100).collect();
    assert_eq!(listed[0].preview, expected);
    assert_eq!(listed[0].preview.chars().count(), 100);
}

#[tokio::test]
async fn live_record_suppresses_its_disk_twin() {
    let tmp = tempfile::tempdir().unwrap();
    let reg = registry(tmp.path());

    let id = reg
        .create(CreateOptions {
            resume_id: Some("resumed-1".into()),
            cwd: Some("/workspace/proj1".into()),
            ..CreateOptions::default()
        })
        .await
        .unwrap();
    let hi = user_line("hi from disk");
    write_log(tmp.path(), "/workspace/proj1", &id, &[hi.as_str()]);

    let listed = reg.list_unified(None).await;
    let matching: Vec<_> = listed.iter().filter(|r| r.session_id == id).collect();
    assert_eq!(matching.len(), 1, "one record per session ID");
    assert!(matching[0].active, "live representation wins");
    assert_eq!(matching[0].preview, "hi from disk");
}

#[tokio::test]
async fn disk_only_sessions_order_by_mtime_descending() {
    let tmp = tempfile::tempdir().unwrap();
    let reg = registry(tmp.path());

    let first = user_line("first");
    let second = user_line("second");
    write_log(tmp.path(), "/workspace/proj1", "a", &[first.as_str()]);
    std::thread::sleep(std::time::Duration::from_millis(50));
    write_log(tmp.path(), "/workspace/proj1", "b", &[second.as_str()]);

    let listed = reg.list_unified(None).await;
    let ids: Vec<&str> = listed.iter().map(|r| r.session_id.as_str()).collect();
    assert_eq!(ids, ["b", "a"]);
    assert!(listed.iter().all(|r| !r.active));
}

#[tokio::test]
async fn live_and_disk_interleave_by_recency() {
    let tmp = tempfile::tempdir().unwrap();
    let reg = registry(tmp.path());

    // An old persisted session...
    let old = user_line("old question");
    write_log(tmp.path(), "/workspace/proj1", "old-session", &[old.as_str()]);
    std::thread::sleep(std::time::Duration::from_millis(50));

    // ...and a freshly created live one.
    let id = reg
        .create(CreateOptions {
            cwd: Some("/workspace/proj1".into()),
            ..CreateOptions::default()
        })
        .await
        .unwrap();

    let listed = reg.list_unified(None).await;
    assert_eq!(listed.len(), 2);
    assert_eq!(listed[0].session_id, id);
    assert!(listed[0].active);
    assert_eq!(listed[1].session_id, "old-session");
    assert!(!listed[1].active);
}

#[tokio::test]
async fn no_duplicates_across_create_close_cycles() {
    let tmp = tempfile::tempdir().unwrap();
    let reg = registry(tmp.path());

    // A closed session leaves only its log behind; reopening it makes it
    // live again.  The ID must appear exactly once throughout.
    let id = reg
        .create(CreateOptions {
            resume_id: Some("cycled".into()),
            cwd: Some("/workspace/proj1".into()),
            ..CreateOptions::default()
        })
        .await
        .unwrap();
    let hello = user_line("hello");
    write_log(tmp.path(), "/workspace/proj1", &id, &[hello.as_str()]);

    for _ in 0..2 {
        let listed = reg.list_unified(None).await;
        let count = listed.iter().filter(|r| r.session_id == id).count();
        assert_eq!(count, 1);

        reg.close(&id).await.unwrap();
        let listed = reg.list_unified(None).await;
        let record = listed.iter().find(|r| r.session_id == id).unwrap();
        assert!(!record.active, "closed session survives via its log");

        reg.create(CreateOptions {
            resume_id: Some(id.clone()),
            cwd: Some("/workspace/proj1".into()),
            ..CreateOptions::default()
        })
        .await
        .unwrap();
    }
}

#[tokio::test]
async fn internal_logs_never_surface() {
    let tmp = tempfile::tempdir().unwrap();
    let reg = registry(tmp.path());

    let visible = user_line("visible");
    let hidden = user_line("hidden");
    write_log(tmp.path(), "/workspace/proj1", "normal", &[visible.as_str()]);
    write_log(tmp.path(), "/workspace/proj1", "agent-01234567", &[hidden.as_str()]);

    let listed = reg.list_unified(None).await;
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].session_id, "normal");
}

#[tokio::test]
async fn summary_beats_first_message_in_disk_records() {
    let tmp = tempfile::tempdir().unwrap();
    let reg = registry(tmp.path());

    let question = user_line("the question");
    write_log(
        tmp.path(),
        "/workspace/proj1",
        "summarized",
        &[
            question.as_str(),
            r#"{"type":"summary","summary":"session about testing"}"#,
        ],
    );

    let listed = reg.list_unified(None).await;
    assert_eq!(listed[0].preview, "session about testing");
    assert_eq!(listed[0].first_message.as_deref(), Some("the question"));
    assert_eq!(listed[0].message_count, 1);
}

#[tokio::test]
async fn cwd_filter_limits_both_passes() {
    let tmp = tempfile::tempdir().unwrap();
    let reg = registry(tmp.path());

    let one = user_line("one");
    write_log(tmp.path(), "/workspace/proj2", "other-project", &[one.as_str()]);
    reg.create(CreateOptions {
        cwd: Some("/workspace/proj1".into()),
        ..CreateOptions::default()
    })
    .await
    .unwrap();

    let listed = reg.list_unified(Some("/workspace/proj1")).await;
    assert_eq!(listed.len(), 1);
    assert!(listed[0].active);

    let listed = reg.list_unified(Some("/workspace/proj2")).await;
    assert_eq!(listed.len(), 1);
    assert!(!listed[0].active);
}
