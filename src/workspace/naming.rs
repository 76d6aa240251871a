/// A command offered by the "new session" picker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionTemplate {
    pub label: String,
    /// Short name used in the generated session name.
    pub name: String,
    /// Typed into the new session; empty for a plain shell.
    pub command: String,
}

impl SessionTemplate {
    fn new(label: &str, name: &str, command: &str) -> Self {
        Self {
            label: label.to_string(),
            name: name.to_string(),
            command: command.to_string(),
        }
    }
}

pub fn default_templates() -> Vec<SessionTemplate> {
    vec![
        SessionTemplate::new("Shell (default)", "shell", ""),
        SessionTemplate::new("Claude (claude)", "claude", "claude"),
        SessionTemplate::new(
            "Claude FULL (IS_SANDBOX=1 claude --dangerously-skip-permissions)",
            "claude-full",
            "IS_SANDBOX=1 claude --dangerously-skip-permissions",
        ),
        SessionTemplate::new("OpenCode (opencode)", "opencode", "opencode"),
        SessionTemplate::new("Lazygit (lazygit)", "lazygit", "lazygit"),
    ]
}

/// Lowercase, collapse runs of non-alphanumerics to `-`, trim dashes.
pub fn sanitize_session_token(s: &str) -> String {
    let mut out = String::new();
    let mut last_dash = false;
    for ch in s.trim().to_lowercase().chars() {
        if ch.is_ascii_lowercase() || ch.is_ascii_digit() {
            out.push(ch);
            last_dash = false;
        } else if !last_dash {
            out.push('-');
            last_dash = true;
        }
    }
    out.trim_matches('-').to_string()
}

/// Parse leading digits, stopping at the first non-digit.
fn leading_number(s: &str) -> u32 {
    s.chars()
        .map_while(|c| c.to_digit(10))
        .fold(0u32, |n, d| n.saturating_mul(10).saturating_add(d))
}

/// One past the highest numeric suffix among names starting with `prefix`.
pub fn next_session_number<S: AsRef<str>>(prefix: &str, existing: &[S]) -> u32 {
    existing
        .iter()
        .map(|n| n.as_ref().trim())
        .filter_map(|n| n.strip_prefix(prefix))
        .map(leading_number)
        .max()
        .unwrap_or(0)
        + 1
}

/// `<repo>-<command>-<n>` with both tokens sanitized and length-capped.
pub fn build_session_name<S: AsRef<str>>(repo: &str, command_name: &str, existing: &[S]) -> String {
    let mut repo_token = sanitize_session_token(repo);
    if repo_token.is_empty() {
        repo_token = "repo".to_string();
    }
    let mut cmd_token = sanitize_session_token(command_name);
    if cmd_token.is_empty() {
        cmd_token = "shell".to_string();
    }
    repo_token.truncate(24);
    cmd_token.truncate(12);

    let prefix = format!("{repo_token}-{cmd_token}-");
    let n = next_session_number(&prefix, existing);
    format!("{prefix}{n}")
}

/// Drop a leading `<repo>-` from a session name for display.
pub fn trim_repo_prefix<'a>(repo: &str, session: &'a str) -> &'a str {
    let r = repo.trim();
    let s = session.trim();
    if r.is_empty() || s.is_empty() {
        return session;
    }
    match s.strip_prefix(r).and_then(|rest| rest.strip_prefix('-')) {
        Some(rest) if !rest.is_empty() => rest,
        _ => session,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_session_token() {
        assert_eq!(sanitize_session_token("My Repo.rs"), "my-repo-rs");
        assert_eq!(sanitize_session_token("--a__b--"), "a-b");
        assert_eq!(sanitize_session_token("   "), "");
    }

    #[test]
    fn test_build_session_name_numbers() {
        let existing = ["app-shell-1", "app-shell-3", "app-claude-7", "other-shell-9"];
        assert_eq!(build_session_name("app", "shell", &existing), "app-shell-4");
        assert_eq!(build_session_name("app", "lazygit", &existing), "app-lazygit-1");
        let none: [&str; 0] = [];
        assert_eq!(build_session_name("", "", &none), "repo-shell-1");
    }

    #[test]
    fn test_build_session_name_caps_token_length() {
        let none: [&str; 0] = [];
        let name = build_session_name(
            "an-extremely-long-repository-name",
            "claude-full-mode",
            &none,
        );
        assert_eq!(name, "an-extremely-long-reposi-claude-full--1");
    }

    #[test]
    fn test_trim_repo_prefix() {
        assert_eq!(trim_repo_prefix("app", "app-shell-1"), "shell-1");
        assert_eq!(trim_repo_prefix("app", "app-"), "app-");
        assert_eq!(trim_repo_prefix("app", "application"), "application");
        assert_eq!(trim_repo_prefix("", "app-shell-1"), "app-shell-1");
    }

    #[test]
    fn test_default_templates() {
        let t = default_templates();
        assert_eq!(t[0].name, "shell");
        assert!(t[0].command.is_empty());
        assert!(t.iter().any(|t| t.name == "lazygit"));
    }
}
