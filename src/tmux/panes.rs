use std::time::Duration;

use async_trait::async_trait;

use crate::error::{Error, Result};
use crate::preview::PaneHost;
use crate::remote::{RemoteTarget, Transport};

/// Width of the preview split, as a share of the anchor pane.
const PREVIEW_SPLIT: &str = "40%";

/// Preview panes on the tmux server hosting this terminal.
///
/// Always local: even when browsing a remote target, the preview pane
/// lives next to the picker and runs ssh itself.
#[derive(Debug, Clone)]
pub struct LocalPanes {
    transport: Transport,
}

impl LocalPanes {
    pub fn new(timeout: Duration) -> Self {
        Self {
            transport: Transport::new(RemoteTarget::local(), timeout),
        }
    }

    async fn pane_ttys(&self) -> Result<Vec<(String, String)>> {
        let out = self
            .transport
            .run_tmux(&["list-panes", "-a", "-F", "#{pane_id}|#{pane_tty}"])
            .await?;
        Ok(parse_pane_ttys(&out))
    }
}

fn parse_pane_ttys(out: &str) -> Vec<(String, String)> {
    out.lines()
        .filter_map(|line| {
            let (id, tty) = line.trim().split_once('|')?;
            let id = id.trim();
            (!id.is_empty()).then(|| (id.to_string(), tty.trim().to_string()))
        })
        .collect()
}

/// Path of the terminal on our stdin, if it is one.
fn controlling_tty() -> Option<String> {
    let path = std::fs::read_link("/proc/self/fd/0").ok()?;
    let path = path.to_string_lossy().to_string();
    path.starts_with("/dev/").then_some(path)
}

/// Pick the anchor: the pane on our tty, then `$TMUX_PANE`, then any pane.
fn choose_anchor(
    panes: &[(String, String)],
    tty: Option<&str>,
    env_pane: Option<&str>,
) -> Option<String> {
    if let Some(tty) = tty {
        if let Some((id, _)) = panes.iter().find(|(_, t)| t == tty) {
            return Some(id.clone());
        }
    }
    if let Some(pane) = env_pane.map(str::trim).filter(|p| !p.is_empty()) {
        if panes.iter().any(|(id, _)| id == pane) {
            return Some(pane.to_string());
        }
    }
    panes.first().map(|(id, _)| id.clone())
}

#[async_trait]
impl PaneHost for LocalPanes {
    async fn resolve_anchor(&self) -> Option<String> {
        let panes = match self.pane_ttys().await {
            Ok(panes) => panes,
            Err(e) => {
                tracing::debug!(error = %e, "list-panes for anchor failed");
                return None;
            }
        };
        let tty = controlling_tty();
        let env_pane = std::env::var("TMUX_PANE").ok();
        choose_anchor(&panes, tty.as_deref(), env_pane.as_deref())
    }

    async fn split(&self, anchor: &str, command: &str) -> Result<String> {
        let out = self
            .transport
            .run_tmux(&[
                "split-window", "-h", "-d", "-P", "-F", "#{pane_id}", "-l", PREVIEW_SPLIT, "-t",
                anchor, command,
            ])
            .await?;
        let pane = out.trim();
        if pane.is_empty() {
            return Err(Error::tmux("split-window returned no pane id"));
        }
        Ok(pane.to_string())
    }

    async fn respawn(&self, pane: &str, command: &str) -> Result<()> {
        self.transport
            .run_tmux(&["respawn-pane", "-k", "-t", pane, command])
            .await?;
        Ok(())
    }

    async fn kill(&self, pane: &str) -> Result<()> {
        self.transport.run_tmux(&["kill-pane", "-t", pane]).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn panes() -> Vec<(String, String)> {
        parse_pane_ttys("%0|/dev/pts/1\n%3|/dev/pts/4\n\n|/dev/pts/9\n%7|/dev/pts/2\n")
    }

    #[test]
    fn test_parse_pane_ttys() {
        let p = panes();
        assert_eq!(p.len(), 3);
        assert_eq!(p[1], ("%3".to_string(), "/dev/pts/4".to_string()));
    }

    #[test]
    fn test_anchor_prefers_tty_match() {
        assert_eq!(
            choose_anchor(&panes(), Some("/dev/pts/4"), Some("%7")),
            Some("%3".to_string())
        );
    }

    #[test]
    fn test_anchor_falls_back_to_env_then_first() {
        assert_eq!(
            choose_anchor(&panes(), Some("/dev/pts/99"), Some("%7")),
            Some("%7".to_string())
        );
        assert_eq!(
            choose_anchor(&panes(), None, Some("%gone")),
            Some("%0".to_string())
        );
        assert_eq!(choose_anchor(&[], Some("/dev/pts/1"), Some("%0")), None);
    }
}
