//! Repository groups and the sessions attached to them.

mod attach;
mod cache;
mod discovery;
mod naming;

use async_trait::async_trait;
use serde::Serialize;

use crate::error::Result;

pub use attach::{attach_sessions, has_path_prefix};
pub use cache::GroupCache;
pub use discovery::{discover_groups, load_grouped_sessions, DirLister, TransportDirs};
pub use naming::{
    build_session_name, default_templates, next_session_number, sanitize_session_token,
    trim_repo_prefix, SessionTemplate,
};

/// Workspace name used for the catch-all group and for groups without one.
pub const ROOT_WORKSPACE: &str = "root";

/// Default directory scanned for `<workspace>/data/repos/<repo>`.
pub const DEFAULT_WORKSPACES_ROOT: &str = "/root/workspaces";

/// One live tmux session as reported by the server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Session {
    pub name: String,
    /// Current path of pane 0; empty when tmux did not report one.
    pub workdir: String,
    pub attached: bool,
    pub windows: u32,
}

impl Session {
    pub fn new(name: impl Into<String>, workdir: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            workdir: workdir.into(),
            attached: false,
            windows: 1,
        }
    }
}

/// A path-rooted bucket of sessions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RepoGroup {
    pub workspace: String,
    pub repo: String,
    /// `workspace/repo`, unique within one discovery result.
    pub name: String,
    pub root_path: String,
    pub sessions: Vec<Session>,
}

impl RepoGroup {
    pub fn new(workspace: &str, repo: &str, root_path: impl Into<String>) -> Self {
        Self {
            workspace: workspace.to_string(),
            repo: repo.to_string(),
            name: format!("{workspace}/{repo}"),
            root_path: root_path.into(),
            sessions: Vec::new(),
        }
    }

    /// The catch-all group. Its path matches nothing.
    pub fn root() -> Self {
        Self {
            workspace: ROOT_WORKSPACE.to_string(),
            repo: ROOT_WORKSPACE.to_string(),
            name: ROOT_WORKSPACE.to_string(),
            root_path: "/".to_string(),
            sessions: Vec::new(),
        }
    }

    pub fn is_root(&self) -> bool {
        let p = self.root_path.trim();
        p.is_empty() || p == "/"
    }

    /// Workspace label, falling back to `root` when blank.
    pub fn workspace_name(&self) -> &str {
        let ws = self.workspace.trim();
        if ws.is_empty() {
            ROOT_WORKSPACE
        } else {
            ws
        }
    }

    /// Copy without sessions.
    pub fn skeleton(&self) -> Self {
        Self {
            sessions: Vec::new(),
            ..self.clone()
        }
    }
}

/// Source of the flat live-session list.
#[async_trait]
pub trait SessionSource: Send + Sync {
    /// List every live session. A "no server running" failure is returned
    /// as an error; [`load_grouped_sessions`] decides what it means.
    async fn list_sessions(&self) -> Result<Vec<Session>>;
}
