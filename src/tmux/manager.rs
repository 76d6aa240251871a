use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;

use crate::error::Result;
use crate::remote::{shell_quote, ssh_attach_args, RemoteTarget, Transport};
use crate::workspace::{build_session_name, Session, SessionSource, SessionTemplate};

use super::parse::{
    parse_first_pane_workdirs, parse_sessions, parse_tmux_targets, PANE_FORMAT, SESSION_FORMAT,
};

/// Lines of history captured for the static preview.
const CAPTURE_HISTORY: &str = "-80";

/// Tmux manager - every tmux operation against one remote target
#[derive(Debug, Clone)]
pub struct TmuxManager {
    transport: Transport,
}

impl TmuxManager {
    pub fn new(transport: Transport) -> Self {
        Self { transport }
    }

    pub fn for_target(target: RemoteTarget, timeout: Duration) -> Self {
        Self::new(Transport::new(target, timeout))
    }

    pub fn target(&self) -> &RemoteTarget {
        self.transport.target()
    }

    pub fn transport(&self) -> &Transport {
        &self.transport
    }

    /// Names of all live sessions; empty when no server is running.
    pub async fn session_names(&self) -> Result<Vec<String>> {
        match self
            .transport
            .run_tmux(&["list-sessions", "-F", "#{session_name}"])
            .await
        {
            Ok(out) => Ok(parse_tmux_targets(&out)),
            Err(e) if e.is_no_server() => Ok(Vec::new()),
            Err(e) => Err(e),
        }
    }

    /// Create a detached session, optionally typing a command into it.
    pub async fn create_session(
        &self,
        name: &str,
        working_dir: &str,
        command: Option<&str>,
    ) -> Result<()> {
        let mut args = vec!["new-session", "-d", "-s", name];
        if !working_dir.trim().is_empty() {
            args.extend(["-c", working_dir]);
        }
        self.transport.run_tmux(&args).await?;

        if let Some(command) = command.filter(|c| !c.trim().is_empty()) {
            self.send_keys(name, command).await?;
        }

        tracing::info!(remote = %self.target(), session = name, "created session");
        Ok(())
    }

    /// Create a session named after `repo` and the template, returning its name.
    pub async fn create_from_template(
        &self,
        repo: &str,
        template: &SessionTemplate,
        working_dir: &str,
    ) -> Result<String> {
        let existing = self.session_names().await?;
        let name = build_session_name(repo, &template.name, &existing);
        self.create_session(&name, working_dir, Some(template.command.as_str()))
            .await?;
        Ok(name)
    }

    /// Kill a tmux session
    pub async fn kill_session(&self, name: &str) -> Result<()> {
        let exact = format!("={name}");
        self.transport
            .run_tmux(&["kill-session", "-t", &exact])
            .await?;
        tracing::info!(remote = %self.target(), session = name, "killed session");
        Ok(())
    }

    /// Type a line into a session and press Enter.
    pub async fn send_keys(&self, name: &str, keys: &str) -> Result<()> {
        self.transport
            .run_tmux(&["send-keys", "-t", name, keys, "C-m"])
            .await?;
        Ok(())
    }

    /// Raw text of the session's active pane, joined and with recent history.
    ///
    /// Prefers the alternate screen (full-screen programs) and retries on
    /// the normal screen when the pane has none.
    pub async fn capture_pane(&self, name: &str) -> Result<String> {
        let alt = ["capture-pane", "-a", "-p", "-J", "-N", "-S", CAPTURE_HISTORY, "-t", name];
        match self.transport.run_tmux(&alt).await {
            Ok(out) => Ok(out),
            Err(e) if e.to_string().contains("alternate") => {
                self.transport
                    .run_tmux(&["capture-pane", "-p", "-J", "-N", "-S", CAPTURE_HISTORY, "-t", name])
                    .await
            }
            Err(e) => Err(e),
        }
    }

    /// Set the server-wide mouse option.
    pub async fn set_mouse_mode(&self, mode: &str) -> Result<()> {
        self.transport
            .run_tmux(&["set-option", "-g", "mouse", mode])
            .await?;
        Ok(())
    }

    /// Command that takes over the terminal to attach to `name`.
    ///
    /// Inside a local tmux client this switches the client instead of
    /// nesting. Remote targets attach over `ssh -t`.
    pub fn attach_command(&self, name: &str, inside_tmux: bool) -> Command {
        if self.target().is_local() {
            let mut cmd = Command::new("tmux");
            if inside_tmux {
                cmd.args(["switch-client", "-t", name]);
            } else {
                cmd.args(["attach-session", "-t", name]);
            }
            return cmd;
        }

        let remote_cmd = format!("tmux attach-session -t {}", shell_quote(name));
        let mut cmd = Command::new("ssh");
        cmd.args(ssh_attach_args(self.target()))
            .arg(format!("sh -lc {}", shell_quote(&remote_cmd)));
        cmd
    }
}

#[async_trait]
impl SessionSource for TmuxManager {
    async fn list_sessions(&self) -> Result<Vec<Session>> {
        let meta = self
            .transport
            .run_tmux(&["list-sessions", "-F", SESSION_FORMAT])
            .await?;
        if meta.trim().is_empty() {
            return Ok(Vec::new());
        }

        // Workdirs are best-effort; sessions still list without them.
        let panes = match self
            .transport
            .run_tmux(&["list-panes", "-a", "-F", PANE_FORMAT])
            .await
        {
            Ok(out) => out,
            Err(e) => {
                tracing::debug!(error = %e, "list-panes failed");
                String::new()
            }
        };

        Ok(parse_sessions(&meta, &parse_first_pane_workdirs(&panes)))
    }
}

/// True when this process runs inside a tmux client.
pub fn inside_tmux() -> bool {
    std::env::var("TMUX").is_ok_and(|v| !v.trim().is_empty())
}
