//! Parsers for tmux's `-F` formatted reports.

use std::collections::HashMap;

use crate::workspace::Session;

/// `list-sessions` format consumed by [`parse_sessions`].
pub const SESSION_FORMAT: &str = "#{session_name}|#{session_attached}|#{session_windows}";

/// `list-panes -a` format consumed by [`parse_first_pane_workdirs`].
pub const PANE_FORMAT: &str = "#{session_name}|#{pane_index}|#{pane_current_path}";

fn atoi(s: &str) -> u32 {
    s.trim()
        .chars()
        .map_while(|c| c.to_digit(10))
        .fold(0u32, |n, d| n.saturating_mul(10).saturating_add(d))
}

/// Map each session to the working directory of its pane 0.
///
/// Only the first pane-0 row per session counts, which is pane 0 of the
/// first window in tmux's listing order.
pub fn parse_first_pane_workdirs(out: &str) -> HashMap<String, String> {
    let mut map = HashMap::new();
    for line in out.lines() {
        let mut parts = line.splitn(3, '|');
        let (Some(name), Some(index), Some(path)) = (parts.next(), parts.next(), parts.next())
        else {
            continue;
        };
        let name = name.trim();
        if name.is_empty() || index.trim() != "0" {
            continue;
        }
        map.entry(name.to_string())
            .or_insert_with(|| path.trim().to_string());
    }
    map
}

/// Parse `list-sessions` rows, filling workdirs from a pane report.
pub fn parse_sessions(meta_out: &str, workdirs: &HashMap<String, String>) -> Vec<Session> {
    let mut sessions = Vec::new();
    for line in meta_out.lines() {
        let mut parts = line.trim().splitn(3, '|');
        let (Some(name), Some(attached), Some(windows)) =
            (parts.next(), parts.next(), parts.next())
        else {
            continue;
        };
        let name = name.trim();
        if name.is_empty() {
            continue;
        }
        sessions.push(Session {
            name: name.to_string(),
            workdir: workdirs.get(name).cloned().unwrap_or_default(),
            // session_attached counts clients; anything but 0 means attached.
            attached: atoi(attached) > 0,
            windows: atoi(windows),
        });
    }
    sessions
}

/// Non-empty, trimmed, de-duplicated lines in first-seen order.
pub fn parse_tmux_targets(out: &str) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    out.lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .filter(|l| seen.insert(l.to_string()))
        .map(String::from)
        .collect()
}
