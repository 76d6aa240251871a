//! Preview of the selected session.
//!
//! Live mode keeps one tmux pane next to the picker running a read-only
//! attach to the selected session. [`PreviewManager`] is the only thing
//! that creates, respawns or kills that pane. Capture mode is stateless
//! and lives in [`capture`].

mod capture;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::remote::{shell_join, shell_quote, ssh_attach_args, RemoteTarget};

pub use capture::{capture_preview, clean_preview, strip_ansi, EMPTY_PREVIEW};

/// How the selected session is previewed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PreviewMode {
    /// Live when running inside tmux, capture otherwise.
    #[default]
    Auto,
    Live,
    Capture,
}

impl PreviewMode {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "auto" => Some(Self::Auto),
            "live" => Some(Self::Live),
            "capture" => Some(Self::Capture),
            _ => None,
        }
    }

    /// Whether a live pane should be attempted.
    pub fn wants_live(self, inside_tmux: bool) -> bool {
        match self {
            Self::Auto => inside_tmux,
            Self::Live => true,
            Self::Capture => false,
        }
    }
}

/// The pane operations the preview needs from the hosting tmux.
#[async_trait]
pub trait PaneHost: Send + Sync {
    /// Pane to split next to, if any can be found.
    async fn resolve_anchor(&self) -> Option<String>;

    /// Split `anchor` and run `command` in the new pane; returns its id.
    async fn split(&self, anchor: &str, command: &str) -> Result<String>;

    /// Replace whatever runs in `pane` with `command`.
    async fn respawn(&self, pane: &str, command: &str) -> Result<()>;

    async fn kill(&self, pane: &str) -> Result<()>;
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum PreviewState {
    #[default]
    Empty,
    Live { pane: String, session: String },
}

impl PreviewState {
    pub fn session(&self) -> Option<&str> {
        match self {
            Self::Empty => None,
            Self::Live { session, .. } => Some(session),
        }
    }
}

/// What [`PreviewManager::show`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShowOutcome {
    /// Already mirroring that session.
    Unchanged,
    Respawned,
    Created,
    /// No anchor pane could be found; nothing is shown.
    Skipped,
}

/// Owner of the single live preview pane.
pub struct PreviewManager<H> {
    host: H,
    target: RemoteTarget,
    state: PreviewState,
}

impl<H: PaneHost> PreviewManager<H> {
    pub fn new(host: H, target: RemoteTarget) -> Self {
        Self {
            host,
            target,
            state: PreviewState::Empty,
        }
    }

    pub fn state(&self) -> &PreviewState {
        &self.state
    }

    pub fn target(&self) -> &RemoteTarget {
        &self.target
    }

    /// Mirror `session` in the preview pane.
    ///
    /// On error the pane is forgotten and the manager is left `Empty`.
    pub async fn show(&mut self, session: &str) -> Result<ShowOutcome> {
        let command = soft_attach_command(&self.target, session);

        if let PreviewState::Live { pane, session: current } = std::mem::take(&mut self.state) {
            if current == session {
                self.state = PreviewState::Live { pane, session: current };
                return Ok(ShowOutcome::Unchanged);
            }
            match self.host.respawn(&pane, &command).await {
                Ok(()) => {
                    self.state = PreviewState::Live {
                        pane,
                        session: session.to_string(),
                    };
                    return Ok(ShowOutcome::Respawned);
                }
                Err(e) => {
                    // The pane may still be alive; never leave two behind.
                    tracing::debug!(pane = %pane, error = %e, "respawn failed, recreating preview pane");
                    if let Err(e) = self.host.kill(&pane).await {
                        tracing::debug!(pane = %pane, error = %e, "kill stale preview pane");
                    }
                }
            }
        }

        let Some(anchor) = self.host.resolve_anchor().await else {
            tracing::debug!("no anchor pane for preview");
            return Ok(ShowOutcome::Skipped);
        };

        let pane = self.host.split(&anchor, &command).await?;
        tracing::debug!(pane = %pane, session, "created preview pane");
        self.state = PreviewState::Live {
            pane,
            session: session.to_string(),
        };
        Ok(ShowOutcome::Created)
    }

    /// Kill the pane if there is one. Failures are ignored; the pane may
    /// already be gone.
    pub async fn teardown(&mut self) {
        if let PreviewState::Live { pane, .. } = std::mem::take(&mut self.state) {
            if let Err(e) = self.host.kill(&pane).await {
                tracing::debug!(pane = %pane, error = %e, "kill preview pane");
            }
        }
    }

    /// Tear down and point future previews at another target.
    pub async fn retarget(&mut self, target: RemoteTarget) {
        self.teardown().await;
        self.target = target;
    }
}

/// Shell command that attaches read-only to `session` on `target`.
///
/// `TMUX` is cleared so the nested client does not refuse to start.
pub fn soft_attach_command(target: &RemoteTarget, session: &str) -> String {
    let attach = format!("tmux attach-session -r -t {}", shell_quote(session));
    if target.is_local() {
        return format!("TMUX= {attach}");
    }
    let mut args = vec!["ssh".to_string()];
    args.extend(ssh_attach_args(target));
    args.push(format!("sh -lc {}", shell_quote(&attach)));
    shell_join(&args)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use parking_lot::Mutex;

    use super::*;
    use crate::error::Error;

    #[derive(Default)]
    struct Calls {
        anchors: usize,
        splits: Vec<(String, String)>,
        respawns: Vec<(String, String)>,
        kills: Vec<String>,
    }

    #[derive(Clone)]
    struct MockHost {
        calls: Arc<Mutex<Calls>>,
        anchor: Option<String>,
        dead_panes: Arc<Mutex<Vec<String>>>,
        next_pane: Arc<Mutex<u32>>,
        fail_split: bool,
        respawn_times_out: bool,
    }

    impl MockHost {
        fn new() -> Self {
            Self {
                calls: Arc::new(Mutex::new(Calls::default())),
                anchor: Some("%0".to_string()),
                dead_panes: Arc::new(Mutex::new(Vec::new())),
                next_pane: Arc::new(Mutex::new(1)),
                fail_split: false,
                respawn_times_out: false,
            }
        }
    }

    #[async_trait]
    impl PaneHost for MockHost {
        async fn resolve_anchor(&self) -> Option<String> {
            self.calls.lock().anchors += 1;
            self.anchor.clone()
        }

        async fn split(&self, anchor: &str, command: &str) -> Result<String> {
            self.calls
                .lock()
                .splits
                .push((anchor.to_string(), command.to_string()));
            if self.fail_split {
                return Err(Error::CommandFailed("create pane failed (no space for new pane)".into()));
            }
            let mut next = self.next_pane.lock();
            let id = format!("%{}", *next);
            *next += 1;
            Ok(id)
        }

        async fn respawn(&self, pane: &str, command: &str) -> Result<()> {
            self.calls
                .lock()
                .respawns
                .push((pane.to_string(), command.to_string()));
            if self.respawn_times_out {
                return Err(Error::Timeout("tmux".to_string()));
            }
            if self.dead_panes.lock().iter().any(|p| p == pane) {
                return Err(Error::CommandFailed(format!("can't find pane: {pane}")));
            }
            Ok(())
        }

        async fn kill(&self, pane: &str) -> Result<()> {
            self.calls.lock().kills.push(pane.to_string());
            Err(Error::CommandFailed(format!("can't find pane: {pane}")))
        }
    }

    fn manager(host: &MockHost) -> PreviewManager<MockHost> {
        PreviewManager::new(host.clone(), RemoteTarget::local())
    }

    #[tokio::test]
    async fn test_empty_select_splits_once() {
        let host = MockHost::new();
        let mut pm = manager(&host);

        assert_eq!(pm.show("app-shell-1").await.unwrap(), ShowOutcome::Created);

        let calls = host.calls.lock();
        assert_eq!(calls.splits.len(), 1);
        assert_eq!(calls.splits[0].0, "%0");
        assert!(calls.splits[0].1.contains("attach-session -r -t app-shell-1"));
        assert!(calls.respawns.is_empty());
        assert_eq!(
            pm.state(),
            &PreviewState::Live {
                pane: "%1".to_string(),
                session: "app-shell-1".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_reselect_same_session_is_noop() {
        let host = MockHost::new();
        let mut pm = manager(&host);
        pm.show("a").await.unwrap();

        assert_eq!(pm.show("a").await.unwrap(), ShowOutcome::Unchanged);
        assert_eq!(pm.show("a").await.unwrap(), ShowOutcome::Unchanged);

        let calls = host.calls.lock();
        assert_eq!(calls.splits.len(), 1);
        assert!(calls.respawns.is_empty());
        assert_eq!(calls.anchors, 1);
    }

    #[tokio::test]
    async fn test_switch_session_respawns_same_pane() {
        let host = MockHost::new();
        let mut pm = manager(&host);
        pm.show("a").await.unwrap();

        assert_eq!(pm.show("b").await.unwrap(), ShowOutcome::Respawned);

        let calls = host.calls.lock();
        assert_eq!(calls.splits.len(), 1);
        assert_eq!(calls.respawns.len(), 1);
        assert_eq!(calls.respawns[0].0, "%1");
        assert!(calls.respawns[0].1.ends_with("-t b"));
        assert_eq!(pm.state().session(), Some("b"));
    }

    #[tokio::test]
    async fn test_dead_pane_falls_back_to_split() {
        let host = MockHost::new();
        let mut pm = manager(&host);
        pm.show("a").await.unwrap();
        host.dead_panes.lock().push("%1".to_string());

        assert_eq!(pm.show("b").await.unwrap(), ShowOutcome::Created);

        let calls = host.calls.lock();
        assert_eq!(calls.respawns.len(), 1);
        assert_eq!(calls.kills, vec!["%1".to_string()]);
        assert_eq!(calls.splits.len(), 2);
        assert_eq!(
            pm.state(),
            &PreviewState::Live {
                pane: "%2".to_string(),
                session: "b".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_respawn_timeout_kills_old_pane_before_split() {
        let mut host = MockHost::new();
        host.respawn_times_out = true;
        let mut pm = manager(&host);
        pm.show("a").await.unwrap();

        assert_eq!(pm.show("b").await.unwrap(), ShowOutcome::Created);

        let calls = host.calls.lock();
        assert_eq!(calls.kills, vec!["%1".to_string()]);
        assert_eq!(calls.splits.len(), 2);
        // Only the new pane is left alive.
        let live = calls.splits.len() - calls.kills.len();
        assert_eq!(live, 1);
        assert_eq!(
            pm.state(),
            &PreviewState::Live {
                pane: "%2".to_string(),
                session: "b".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_no_anchor_skips_without_error() {
        let mut host = MockHost::new();
        host.anchor = None;
        let mut pm = manager(&host);

        assert_eq!(pm.show("a").await.unwrap(), ShowOutcome::Skipped);
        assert_eq!(pm.state(), &PreviewState::Empty);
        assert!(host.calls.lock().splits.is_empty());
    }

    #[tokio::test]
    async fn test_split_failure_leaves_empty() {
        let mut host = MockHost::new();
        host.fail_split = true;
        let mut pm = manager(&host);

        assert!(pm.show("a").await.is_err());
        assert_eq!(pm.state(), &PreviewState::Empty);
    }

    #[tokio::test]
    async fn test_teardown_kills_once_and_ignores_errors() {
        let host = MockHost::new();
        let mut pm = manager(&host);
        pm.show("a").await.unwrap();

        pm.teardown().await;
        pm.teardown().await;

        assert_eq!(host.calls.lock().kills, vec!["%1".to_string()]);
        assert_eq!(pm.state(), &PreviewState::Empty);
    }

    #[tokio::test]
    async fn test_retarget_tears_down_and_uses_ssh() {
        let host = MockHost::new();
        let mut pm = manager(&host);
        pm.show("a").await.unwrap();

        pm.retarget(RemoteTarget::new("dev@box")).await;
        assert_eq!(pm.state(), &PreviewState::Empty);
        pm.show("a").await.unwrap();

        let calls = host.calls.lock();
        assert_eq!(calls.kills.len(), 1);
        assert!(calls.splits[1].1.starts_with("ssh -t "));
    }

    #[test]
    fn test_soft_attach_command() {
        assert_eq!(
            soft_attach_command(&RemoteTarget::local(), "app-shell-1"),
            "TMUX= tmux attach-session -r -t app-shell-1"
        );
        let remote = soft_attach_command(&RemoteTarget::new("dev@box"), "my session");
        assert!(remote.starts_with("ssh -t -o ControlMaster=auto"));
        assert!(remote.contains(" dev@box "));
        assert!(remote.contains("attach-session -r -t"));
    }

    #[test]
    fn test_preview_mode() {
        assert_eq!(PreviewMode::parse(" Live "), Some(PreviewMode::Live));
        assert_eq!(PreviewMode::parse("nope"), None);
        assert!(PreviewMode::Auto.wants_live(true));
        assert!(!PreviewMode::Auto.wants_live(false));
        assert!(!PreviewMode::Capture.wants_live(true));
    }
}
