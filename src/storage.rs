//! Remembered remote targets and the last workspace used on each.
//!
//! Both files are plain text under the config dir. A missing or unreadable
//! file reads as "nothing remembered".

use std::path::{Path, PathBuf};

use tokio::fs;
use tokio::io::AsyncWriteExt;

use crate::config::config_dir;
use crate::error::Result;
use crate::remote::{RemoteTarget, LOCAL_TARGET};

const TARGETS_FILE: &str = "targets.txt";
const WORKSPACES_FILE: &str = "workspaces.txt";
const MAX_ENTRIES: usize = 20;

/// Persistence handler for picker state
#[derive(Debug, Clone)]
pub struct Storage {
    dir: PathBuf,
}

impl Storage {
    /// Storage in the user's config dir
    pub fn new() -> Result<Self> {
        Ok(Self::at(config_dir()?))
    }

    pub fn at(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    async fn read_lines(&self, file: &str) -> Vec<String> {
        match fs::read_to_string(self.dir.join(file)).await {
            Ok(raw) => raw
                .lines()
                .map(str::trim)
                .filter(|l| !l.is_empty())
                .map(String::from)
                .collect(),
            Err(_) => Vec::new(),
        }
    }

    async fn write_lines(&self, file: &str, lines: &[String]) -> Result<()> {
        fs::create_dir_all(&self.dir).await?;
        let path = self.dir.join(file);

        // Atomic write: write to temp file, then rename
        let temp_path = path.with_extension("tmp");
        let mut f = fs::File::create(&temp_path).await?;
        f.write_all(format!("{}\n", lines.join("\n")).as_bytes())
            .await?;
        f.sync_all().await?;
        drop(f);

        fs::rename(&temp_path, &path).await?;
        Ok(())
    }

    /// Most recently used target, if any.
    pub async fn last_target(&self) -> Option<RemoteTarget> {
        self.read_lines(TARGETS_FILE)
            .await
            .first()
            .map(|t| RemoteTarget::new(t))
    }

    /// Remembered targets, most recent first, always including `local`.
    pub async fn targets(&self) -> Vec<String> {
        let mut out: Vec<String> = Vec::new();
        for line in self.read_lines(TARGETS_FILE).await {
            if !out.contains(&line) {
                out.push(line);
            }
        }
        if !out.iter().any(|t| t == LOCAL_TARGET) {
            out.push(LOCAL_TARGET.to_string());
        }
        out
    }

    /// Move `target` to the front of the MRU list.
    pub async fn remember_target(&self, target: &RemoteTarget) -> Result<()> {
        let target = target.as_str().to_string();
        let mut lines = vec![target.clone()];
        lines.extend(
            self.read_lines(TARGETS_FILE)
                .await
                .into_iter()
                .filter(|l| *l != target),
        );
        lines.truncate(MAX_ENTRIES);
        self.write_lines(TARGETS_FILE, &lines).await
    }

    /// Workspace last selected while browsing `target`.
    pub async fn last_workspace(&self, target: &RemoteTarget) -> Option<String> {
        self.read_lines(WORKSPACES_FILE)
            .await
            .iter()
            .filter_map(|l| parse_workspace_row(l))
            .find(|(t, _)| t == target)
            .map(|(_, ws)| ws)
    }

    pub async fn remember_workspace(&self, target: &RemoteTarget, workspace: &str) -> Result<()> {
        let workspace = workspace.trim();
        if workspace.is_empty() {
            return Ok(());
        }
        let mut rows = vec![format!("{target}|{workspace}")];
        rows.extend(
            self.read_lines(WORKSPACES_FILE)
                .await
                .iter()
                .filter_map(|l| parse_workspace_row(l))
                .filter(|(t, _)| t != target)
                .map(|(t, ws)| format!("{t}|{ws}")),
        );
        rows.truncate(MAX_ENTRIES);
        self.write_lines(WORKSPACES_FILE, &rows).await
    }
}

fn parse_workspace_row(line: &str) -> Option<(RemoteTarget, String)> {
    let (target, ws) = line.split_once('|')?;
    let ws = ws.trim();
    if ws.is_empty() {
        return None;
    }
    Some((RemoteTarget::new(target), ws.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn storage() -> (TempDir, Storage) {
        let tmp = TempDir::new().unwrap();
        let storage = Storage::at(tmp.path().join("echoshell"));
        (tmp, storage)
    }

    #[tokio::test]
    async fn test_missing_files_mean_nothing_remembered() {
        let (_tmp, storage) = storage();
        assert_eq!(storage.last_target().await, None);
        assert_eq!(storage.targets().await, vec!["local"]);
        assert_eq!(storage.last_workspace(&RemoteTarget::local()).await, None);
    }

    #[tokio::test]
    async fn test_remember_target_is_mru() {
        let (_tmp, storage) = storage();
        storage.remember_target(&RemoteTarget::new("a@one")).await.unwrap();
        storage.remember_target(&RemoteTarget::new("b@two")).await.unwrap();
        storage.remember_target(&RemoteTarget::new("a@one")).await.unwrap();

        assert_eq!(storage.last_target().await, Some(RemoteTarget::new("a@one")));
        assert_eq!(storage.targets().await, vec!["a@one", "b@two", "local"]);
        assert!(!storage.dir().join("targets.tmp").exists());
    }

    #[tokio::test]
    async fn test_target_list_is_capped() {
        let (_tmp, storage) = storage();
        for i in 0..30 {
            storage
                .remember_target(&RemoteTarget::new(&format!("host{i}")))
                .await
                .unwrap();
        }
        let targets = storage.targets().await;
        // 20 remembered plus the implicit local entry
        assert_eq!(targets.len(), 21);
        assert_eq!(targets[0], "host29");
    }

    #[tokio::test]
    async fn test_workspace_per_target() {
        let (_tmp, storage) = storage();
        let local = RemoteTarget::local();
        let remote = RemoteTarget::new("dev@box");

        storage.remember_workspace(&local, "git").await.unwrap();
        storage.remember_workspace(&remote, "mono").await.unwrap();
        storage.remember_workspace(&local, "infra").await.unwrap();
        storage.remember_workspace(&local, "  ").await.unwrap();

        assert_eq!(storage.last_workspace(&local).await.as_deref(), Some("infra"));
        assert_eq!(storage.last_workspace(&remote).await.as_deref(), Some("mono"));
        // localhost aliases share the local row
        assert_eq!(
            storage
                .last_workspace(&RemoteTarget::new("root@localhost"))
                .await
                .as_deref(),
            Some("infra")
        );
    }

    #[tokio::test]
    async fn test_malformed_workspace_rows_are_skipped() {
        let (_tmp, storage) = storage();
        std::fs::create_dir_all(storage.dir()).unwrap();
        std::fs::write(
            storage.dir().join("workspaces.txt"),
            "garbage\nlocal|\ndev@box|git\n",
        )
        .unwrap();
        assert_eq!(
            storage
                .last_workspace(&RemoteTarget::new("dev@box"))
                .await
                .as_deref(),
            Some("git")
        );
        assert_eq!(storage.last_workspace(&RemoteTarget::local()).await, None);
    }
}
