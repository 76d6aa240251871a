use async_trait::async_trait;
use futures::future::join_all;

use super::{attach_sessions, GroupCache, RepoGroup, SessionSource};
use crate::error::Result;
use crate::remote::{shell_quote, RemoteTarget, Transport};

/// Lists the immediate subdirectories of a path.
#[async_trait]
pub trait DirLister: Send + Sync {
    /// Sorted subdirectory names. A path that does not exist yields an
    /// empty list rather than an error.
    async fn list_dir_names(&self, path: &str) -> Result<Vec<String>>;
}

/// [`DirLister`] that reads the local filesystem or shells out over ssh,
/// depending on the transport's target.
#[derive(Debug, Clone)]
pub struct TransportDirs {
    transport: Transport,
}

impl TransportDirs {
    pub fn new(transport: Transport) -> Self {
        Self { transport }
    }
}

#[async_trait]
impl DirLister for TransportDirs {
    async fn list_dir_names(&self, path: &str) -> Result<Vec<String>> {
        if self.transport.target().is_local() {
            return list_local(path).await;
        }

        let cmd = format!(
            "root={}; [ -d \"$root\" ] || exit 0; for d in \"$root\"/*; do [ -d \"$d\" ] || continue; basename \"$d\"; done",
            shell_quote(path)
        );
        let out = self.transport.run_sh(&cmd).await?;
        let mut names: Vec<String> = out
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(String::from)
            .collect();
        names.sort();
        Ok(names)
    }
}

async fn list_local(path: &str) -> Result<Vec<String>> {
    let mut entries = match tokio::fs::read_dir(path).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e.into()),
    };

    let mut names = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        // Follow symlinks so linked checkouts still count as repos.
        let is_dir = tokio::fs::metadata(entry.path())
            .await
            .map(|m| m.is_dir())
            .unwrap_or(false);
        if !is_dir {
            continue;
        }
        if let Some(name) = entry.file_name().to_str() {
            names.push(name.to_string());
        }
    }
    names.sort();
    Ok(names)
}

/// Enumerate `<root>/<workspace>/data/repos/<repo>` into group skeletons.
///
/// The root group always comes first. Listing failures are logged and
/// treated as "nothing found" so a flaky remote still yields a usable,
/// if partial, picker.
pub async fn discover_groups(lister: &dyn DirLister, root: &str) -> Vec<RepoGroup> {
    let mut groups = vec![RepoGroup::root()];
    let root = match root.trim().trim_end_matches('/') {
        "" => "/",
        r => r,
    };

    let workspaces = match lister.list_dir_names(root).await {
        Ok(ws) => ws,
        Err(e) => {
            tracing::debug!(root, error = %e, "workspace listing failed");
            return groups;
        }
    };

    // Workspaces are listed concurrently; over ssh each listing is a round trip.
    let base = root.trim_end_matches('/');
    let listings = join_all(workspaces.iter().map(|ws| async move {
        let repo_root = format!("{base}/{ws}/data/repos");
        let repos = lister.list_dir_names(&repo_root).await;
        (ws, repo_root, repos)
    }))
    .await;

    for (ws, repo_root, repos) in listings {
        let repos = match repos {
            Ok(repos) => repos,
            Err(e) => {
                tracing::debug!(path = %repo_root, error = %e, "repo listing failed");
                continue;
            }
        };
        for repo in repos {
            let path = format!("{repo_root}/{repo}");
            groups.push(RepoGroup::new(ws, &repo, path));
        }
    }

    groups[1..].sort_by(|a, b| a.name.cmp(&b.name));
    tracing::debug!(count = groups.len() - 1, "discovered repo groups");
    groups
}

impl GroupCache {
    /// Skeleton for `target`, enumerating directories only on a miss.
    pub async fn discover(
        &self,
        target: &RemoteTarget,
        lister: &dyn DirLister,
        root: &str,
    ) -> Vec<RepoGroup> {
        if let Some(groups) = self.get(target) {
            return groups;
        }
        let groups = discover_groups(lister, root).await;
        self.insert(target.clone(), &groups);
        groups
    }
}

/// Discover groups for `target` and attach a fresh session list.
///
/// A tmux server that is not running means zero sessions, not a failure.
/// Any other session query error is returned.
pub async fn load_grouped_sessions(
    cache: &GroupCache,
    target: &RemoteTarget,
    lister: &dyn DirLister,
    source: &dyn SessionSource,
    root: &str,
) -> Result<Vec<RepoGroup>> {
    let groups = cache.discover(target, lister, root).await;

    let sessions = match source.list_sessions().await {
        Ok(sessions) => sessions,
        Err(e) if e.is_no_server() => {
            tracing::debug!(%target, "no tmux server running");
            Vec::new()
        }
        Err(e) => return Err(e),
    };

    Ok(attach_sessions(groups, sessions))
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::error::Error;
    use crate::workspace::Session;

    #[derive(Default)]
    struct MockDirs {
        tree: HashMap<String, Vec<String>>,
        failing: Vec<String>,
        calls: AtomicUsize,
    }

    impl MockDirs {
        fn with(mut self, path: &str, names: &[&str]) -> Self {
            self.tree
                .insert(path.to_string(), names.iter().map(|s| s.to_string()).collect());
            self
        }

        fn failing(mut self, path: &str) -> Self {
            self.failing.push(path.to_string());
            self
        }
    }

    #[async_trait]
    impl DirLister for MockDirs {
        async fn list_dir_names(&self, path: &str) -> Result<Vec<String>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.failing.iter().any(|p| p == path) {
                return Err(Error::remote("ssh: connect to host box port 22: Connection refused"));
            }
            Ok(self.tree.get(path).cloned().unwrap_or_default())
        }
    }

    enum MockSource {
        Sessions(Vec<Session>),
        NoServer,
        Broken,
    }

    #[async_trait]
    impl SessionSource for MockSource {
        async fn list_sessions(&self) -> Result<Vec<Session>> {
            match self {
                MockSource::Sessions(s) => Ok(s.clone()),
                MockSource::NoServer => Err(Error::CommandFailed(
                    "no server running on /tmp/tmux-0/default".to_string(),
                )),
                MockSource::Broken => Err(Error::Timeout("ssh".to_string())),
            }
        }
    }

    fn sample_dirs() -> MockDirs {
        MockDirs::default()
            .with("/ws", &["mono", "git"])
            .with("/ws/git/data/repos", &["tools", "app"])
            .with("/ws/mono/data/repos", &["core"])
    }

    #[tokio::test]
    async fn test_discover_layout_and_order() {
        let groups = discover_groups(&sample_dirs(), "/ws/").await;
        let names: Vec<&str> = groups.iter().map(|g| g.name.as_str()).collect();
        assert_eq!(names, vec!["root", "git/app", "git/tools", "mono/core"]);
        assert_eq!(groups[1].root_path, "/ws/git/data/repos/app");
        assert_eq!(groups[1].workspace, "git");
        assert_eq!(groups[1].repo, "app");
    }

    #[tokio::test]
    async fn test_listing_failure_yields_root_only() {
        let dirs = MockDirs::default().failing("/ws");
        let groups = discover_groups(&dirs, "/ws").await;
        assert_eq!(groups, vec![RepoGroup::root()]);
    }

    #[tokio::test]
    async fn test_repo_listing_failure_skips_workspace() {
        let dirs = sample_dirs().failing("/ws/git/data/repos");
        let groups = discover_groups(&dirs, "/ws").await;
        let names: Vec<&str> = groups.iter().map(|g| g.name.as_str()).collect();
        assert_eq!(names, vec!["root", "mono/core"]);
    }

    #[tokio::test]
    async fn test_cache_avoids_second_enumeration() {
        let dirs = sample_dirs();
        let cache = GroupCache::new();
        let target = RemoteTarget::new("dev@box");

        let first = cache.discover(&target, &dirs, "/ws").await;
        let calls = dirs.calls.load(Ordering::SeqCst);
        let second = cache.discover(&target, &dirs, "/ws").await;
        assert_eq!(first, second);
        assert_eq!(dirs.calls.load(Ordering::SeqCst), calls);

        cache.invalidate(&target);
        cache.discover(&target, &dirs, "/ws").await;
        assert!(dirs.calls.load(Ordering::SeqCst) > calls);
    }

    #[tokio::test]
    async fn test_no_server_means_empty_sessions() {
        let cache = GroupCache::new();
        let groups = load_grouped_sessions(
            &cache,
            &RemoteTarget::local(),
            &sample_dirs(),
            &MockSource::NoServer,
            "/ws",
        )
        .await
        .unwrap();
        assert_eq!(groups.len(), 4);
        assert!(groups.iter().all(|g| g.sessions.is_empty()));
    }

    #[tokio::test]
    async fn test_other_query_failures_propagate() {
        let cache = GroupCache::new();
        let err = load_grouped_sessions(
            &cache,
            &RemoteTarget::local(),
            &sample_dirs(),
            &MockSource::Broken,
            "/ws",
        )
        .await
        .unwrap_err();
        assert!(matches!(err, Error::Timeout(_)));
    }

    #[tokio::test]
    async fn test_sessions_are_fresh_on_every_load() {
        let cache = GroupCache::new();
        let target = RemoteTarget::local();
        let dirs = sample_dirs();

        let source = MockSource::Sessions(vec![Session::new(
            "app-shell-1",
            "/ws/git/data/repos/app",
        )]);
        let groups = load_grouped_sessions(&cache, &target, &dirs, &source, "/ws")
            .await
            .unwrap();
        assert_eq!(groups[1].sessions.len(), 1);

        let source = MockSource::Sessions(Vec::new());
        let groups = load_grouped_sessions(&cache, &target, &dirs, &source, "/ws")
            .await
            .unwrap();
        assert!(groups.iter().all(|g| g.sessions.is_empty()));
    }

    #[tokio::test]
    async fn test_local_missing_dir_is_empty() {
        let dirs = TransportDirs::new(Transport::new(
            RemoteTarget::local(),
            std::time::Duration::from_secs(2),
        ));
        let names = dirs
            .list_dir_names("/definitely/not/here/echoshell")
            .await
            .unwrap();
        assert!(names.is_empty());
    }

    #[tokio::test]
    async fn test_local_lists_only_directories() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::create_dir(tmp.path().join("beta")).unwrap();
        std::fs::create_dir(tmp.path().join("alpha")).unwrap();
        std::fs::write(tmp.path().join("file.txt"), "x").unwrap();

        let dirs = TransportDirs::new(Transport::new(
            RemoteTarget::local(),
            std::time::Duration::from_secs(2),
        ));
        let names = dirs
            .list_dir_names(tmp.path().to_str().unwrap())
            .await
            .unwrap();
        assert_eq!(names, vec!["alpha", "beta"]);
    }
}
