use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use tokio::process::Command;

use crate::error::{Error, Result};

/// Run a program with a deadline and return its stdout.
///
/// On failure the error carries stderr (or stdout when stderr is empty) so
/// tmux's own diagnostics, such as "no server running", reach the caller.
pub async fn run_out(program: &str, args: &[String], timeout: Duration) -> Result<String> {
    let mut cmd = Command::new(program);
    cmd.args(args);
    run(cmd, program, timeout).await
}

/// Like [`run_out`] but with a working directory.
pub async fn run_out_in_dir(
    dir: &Path,
    program: &str,
    args: &[String],
    timeout: Duration,
) -> Result<String> {
    let mut cmd = Command::new(program);
    cmd.args(args).current_dir(dir);
    run(cmd, program, timeout).await
}

async fn run(mut cmd: Command, program: &str, timeout: Duration) -> Result<String> {
    cmd.stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let output = match tokio::time::timeout(timeout, cmd.output()).await {
        Ok(Ok(output)) => output,
        Ok(Err(e)) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(Error::missing_tool(program));
        }
        Ok(Err(e)) => return Err(e.into()),
        Err(_) => {
            tracing::warn!(program, ?timeout, "command timed out");
            return Err(Error::Timeout(program.to_string()));
        }
    };

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    if output.status.success() {
        return Ok(stdout);
    }

    let stderr = String::from_utf8_lossy(&output.stderr);
    let mut msg = stderr.trim().to_string();
    if msg.is_empty() {
        msg = stdout.trim().to_string();
    }
    if msg.is_empty() {
        msg = format!("{program} exited with {}", output.status);
    }
    tracing::debug!(program, %msg, "command failed");
    Err(Error::CommandFailed(msg))
}

/// Locate an executable on `$PATH`.
pub fn find_in_path(tool: &str) -> Option<PathBuf> {
    let path = std::env::var_os("PATH")?;
    std::env::split_paths(&path)
        .map(|dir| dir.join(tool))
        .find(|candidate| candidate.is_file())
}
