//! Self-update from a source checkout: fast-forward pull, then rebuild.

use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{Error, Result};
use crate::remote::{find_in_path, run_out_in_dir};

const STATUS_TIMEOUT: Duration = Duration::from_secs(8);
const PULL_TIMEOUT: Duration = Duration::from_secs(25);
const BUILD_TIMEOUT: Duration = Duration::from_secs(90);

fn has_git_dir(dir: &Path) -> bool {
    dir.join(".git").is_dir()
}

/// Nearest ancestor of `dir` (inclusive) containing a `.git` directory.
pub fn find_git_root(dir: &Path) -> Option<PathBuf> {
    dir.ancestors().find(|d| has_git_dir(d)).map(Path::to_path_buf)
}

/// Checkout to update: the configured dir, then the cwd, then the
/// directory holding the running executable.
pub fn detect_repo_dir(configured: Option<&Path>) -> Option<PathBuf> {
    if let Some(root) = configured.and_then(find_git_root) {
        return Some(root);
    }
    if let Some(root) = std::env::current_dir().ok().and_then(|d| find_git_root(&d)) {
        return Some(root);
    }
    let exe = std::env::current_exe().ok()?;
    let exe = std::fs::canonicalize(&exe).unwrap_or(exe);
    find_git_root(exe.parent()?)
}

/// Pull `origin/main` and rebuild in `repo_dir`, returning a status line.
///
/// Refuses to touch a dirty working tree.
pub async fn update_and_rebuild(repo_dir: Option<&Path>) -> Result<String> {
    let dir = repo_dir.ok_or_else(|| Error::Other("update unavailable (no local git repo)".into()))?;
    for tool in ["git", "cargo"] {
        if find_in_path(tool).is_none() {
            return Err(Error::Other(format!("{tool} not found")));
        }
    }

    let dirty = run_out_in_dir(dir, "git", &args(&["status", "--porcelain"]), STATUS_TIMEOUT).await?;
    if !dirty.trim().is_empty() {
        return Err(Error::Other("working tree is dirty".into()));
    }

    tracing::info!(dir = %dir.display(), "pulling origin/main");
    run_out_in_dir(
        dir,
        "git",
        &args(&["pull", "--ff-only", "origin", "main"]),
        PULL_TIMEOUT,
    )
    .await?;

    tracing::info!(dir = %dir.display(), "rebuilding");
    run_out_in_dir(dir, "cargo", &args(&["build", "--release"]), BUILD_TIMEOUT).await?;

    Ok("Updated from origin/main. Restart echoshell.".to_string())
}

fn args(a: &[&str]) -> Vec<String> {
    a.iter().map(|s| s.to_string()).collect()
}
