use super::{RepoGroup, Session};

/// Lexically clean a slash-separated path: drop empty and `.` segments,
/// resolve `..`, and strip any trailing separator.
fn clean_path(path: &str) -> String {
    let path = path.trim();
    if path.is_empty() {
        return String::new();
    }
    let absolute = path.starts_with('/');
    let mut parts: Vec<&str> = Vec::new();
    for seg in path.split('/') {
        match seg {
            "" | "." => {}
            ".." => {
                if parts.last().is_some_and(|p| *p != "..") {
                    parts.pop();
                } else if !absolute {
                    parts.push("..");
                }
            }
            s => parts.push(s),
        }
    }
    let joined = parts.join("/");
    if absolute {
        format!("/{joined}")
    } else if joined.is_empty() {
        ".".to_string()
    } else {
        joined
    }
}

/// True when `prefix` is `path` itself or one of its ancestors.
///
/// The match must end on a separator boundary, so `/w/app` is not a prefix
/// of `/w/application`.
pub fn has_path_prefix(path: &str, prefix: &str) -> bool {
    let p = clean_path(path);
    let pr = clean_path(prefix);
    if p.is_empty() || pr.is_empty() {
        return false;
    }
    if p == pr {
        return true;
    }
    p.strip_prefix(pr.as_str())
        .is_some_and(|rest| rest.starts_with('/'))
}

/// Assign each session to the group with the longest matching root path.
///
/// Sessions that match no group land in the root group, which is inserted
/// at the front when `groups` has none. Among equally long matches the
/// first group in `groups` wins. Existing session lists are replaced, and
/// each group's sessions come back sorted by name.
pub fn attach_sessions(mut groups: Vec<RepoGroup>, sessions: Vec<Session>) -> Vec<RepoGroup> {
    let root_idx = match groups.iter().position(RepoGroup::is_root) {
        Some(idx) => idx,
        None => {
            groups.insert(0, RepoGroup::root());
            0
        }
    };

    for g in groups.iter_mut() {
        g.sessions.clear();
    }

    for sess in sessions {
        let mut best = root_idx;
        let mut best_len = 0usize;
        for (idx, g) in groups.iter().enumerate() {
            if g.is_root() {
                continue;
            }
            let gp = g.root_path.trim();
            if gp.len() > best_len && has_path_prefix(&sess.workdir, gp) {
                best = idx;
                best_len = gp.len();
            }
        }
        groups[best].sessions.push(sess);
    }

    for g in groups.iter_mut() {
        g.sessions.sort_by(|a, b| a.name.cmp(&b.name));
    }

    groups
}
