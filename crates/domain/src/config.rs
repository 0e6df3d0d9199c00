use serde::{Deserialize, Serialize};
use std::path::PathBuf;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Session registry
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Configuration for the session registry and the log scanner.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionsConfig {
    /// Root directory holding one subdirectory per project, each containing
    /// append-only `<sessionId>.jsonl` log files written by the engine.
    #[serde(default = "d_log_root")]
    pub log_root: PathBuf,

    /// Workspace root.  When a session's working directory is a direct child
    /// of this root, the child name is reported to the sync subsystem as the
    /// owner's project.
    #[serde(default = "d_workspace_root")]
    pub workspace_root: PathBuf,

    /// Port handed to the connector when proxy mode is requested without an
    /// explicit port.
    #[serde(default = "d_8080")]
    pub default_proxy_port: u16,
}

impl Default for SessionsConfig {
    fn default() -> Self {
        Self {
            log_root: d_log_root(),
            workspace_root: d_workspace_root(),
            default_proxy_port: 8080,
        }
    }
}

// ── serde default helpers ───────────────────────────────────────────

fn d_log_root() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".claude")
        .join("projects")
}

fn d_workspace_root() -> PathBuf {
    PathBuf::from("/workspace")
}

fn d_8080() -> u16 {
    8080
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_from_empty_toml() {
        let cfg: SessionsConfig = toml::from_str("").unwrap();
        assert!(cfg.log_root.ends_with(".claude/projects"));
        assert_eq!(cfg.workspace_root, PathBuf::from("/workspace"));
        assert_eq!(cfg.default_proxy_port, 8080);
    }

    #[test]
    fn explicit_values_override_defaults() {
        let cfg: SessionsConfig = toml::from_str(
            r#"
            log_root = "/var/lib/harbor/projects"
            default_proxy_port = 9090
            "#,
        )
        .unwrap();
        assert_eq!(cfg.log_root, PathBuf::from("/var/lib/harbor/projects"));
        assert_eq!(cfg.workspace_root, PathBuf::from("/workspace"));
        assert_eq!(cfg.default_proxy_port, 9090);
    }
}
