//! Remote targets and the shell transport used to reach them.
//!
//! Every tmux or directory query is issued against an explicit
//! [`RemoteTarget`]. The `local` target runs commands directly; anything
//! else is an ssh destination and commands are wrapped in `sh -lc` on the
//! far side. ssh connections share a ControlMaster socket so the periodic
//! refresh does not pay a handshake on every tick.

mod exec;

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use crate::error::Result;

pub use exec::{find_in_path, run_out, run_out_in_dir};

/// Name of the target that runs everything on this machine.
pub const LOCAL_TARGET: &str = "local";

/// Seconds an idle ssh master connection is kept alive.
const CONTROL_PERSIST_SECS: u32 = 120;

/// Normalized identifier of the endpoint subsequent queries run against.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RemoteTarget(String);

impl RemoteTarget {
    /// Normalize a user-supplied target.
    ///
    /// Blank input, `localhost` and `root@localhost` all mean `local`.
    pub fn new(raw: &str) -> Self {
        let v = raw.trim();
        if v.is_empty()
            || v.eq_ignore_ascii_case(LOCAL_TARGET)
            || v.eq_ignore_ascii_case("localhost")
            || v.eq_ignore_ascii_case("root@localhost")
        {
            return Self::local();
        }
        Self(v.to_string())
    }

    pub fn local() -> Self {
        Self(LOCAL_TARGET.to_string())
    }

    pub fn is_local(&self) -> bool {
        self.0 == LOCAL_TARGET
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for RemoteTarget {
    fn default() -> Self {
        Self::local()
    }
}

impl fmt::Display for RemoteTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RemoteTarget {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// Quote a single word for a POSIX shell.
pub fn shell_quote(s: &str) -> String {
    const SPECIAL: &[char] = &[
        ' ', '\t', '\n', '\'', '"', '`', '$', '&', '|', ';', '<', '>', '*', '?', '[', ']', '{',
        '}', '(', ')', '!',
    ];
    if s.is_empty() {
        return "''".to_string();
    }
    if !s.contains(SPECIAL) {
        return s.to_string();
    }
    format!("'{}'", s.replace('\'', "'\"'\"'"))
}

/// Quote and join words into one shell command line.
pub fn shell_join<S: AsRef<str>>(args: &[S]) -> String {
    args.iter()
        .map(|a| shell_quote(a.as_ref()))
        .collect::<Vec<_>>()
        .join(" ")
}

fn control_path() -> PathBuf {
    std::env::temp_dir().join("echoshell-ssh-%C")
}

fn control_args() -> Vec<String> {
    vec![
        "-o".to_string(),
        "ControlMaster=auto".to_string(),
        "-o".to_string(),
        format!("ControlPersist={CONTROL_PERSIST_SECS}"),
        "-o".to_string(),
        format!("ControlPath={}", control_path().display()),
    ]
}

/// ssh arguments for non-interactive queries.
pub fn ssh_base_args(target: &RemoteTarget) -> Vec<String> {
    let mut args = vec![
        "-o".to_string(),
        "BatchMode=yes".to_string(),
        "-o".to_string(),
        "ConnectTimeout=8".to_string(),
    ];
    args.extend(control_args());
    args.push(target.as_str().to_string());
    args
}

/// ssh arguments for an interactive session (forces a tty).
pub fn ssh_attach_args(target: &RemoteTarget) -> Vec<String> {
    let mut args = vec!["-t".to_string()];
    args.extend(control_args());
    args.push(target.as_str().to_string());
    args
}

/// Runs shell and tmux commands against one target with a fixed timeout.
#[derive(Debug, Clone)]
pub struct Transport {
    target: RemoteTarget,
    timeout: Duration,
}

impl Transport {
    pub fn new(target: RemoteTarget, timeout: Duration) -> Self {
        Self { target, timeout }
    }

    pub fn target(&self) -> &RemoteTarget {
        &self.target
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Run `tmux <args>` on the target and return stdout.
    pub async fn run_tmux(&self, args: &[&str]) -> Result<String> {
        if self.target.is_local() {
            let args: Vec<String> = args.iter().map(|s| s.to_string()).collect();
            return run_out("tmux", &args, self.timeout).await;
        }
        let cmd = format!("tmux {}", shell_join(args));
        self.run_sh(&cmd).await
    }

    /// Run a shell snippet on the target via `sh -lc`.
    pub async fn run_sh(&self, command: &str) -> Result<String> {
        if self.target.is_local() {
            let args = vec!["-lc".to_string(), command.to_string()];
            return run_out("sh", &args, self.timeout).await;
        }
        let mut args = ssh_base_args(&self.target);
        args.push(format!("sh -lc {}", shell_quote(command)));
        tracing::trace!(remote = %self.target, command, "ssh");
        run_out("ssh", &args, self.timeout).await
    }
}
