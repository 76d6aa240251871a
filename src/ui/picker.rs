use crate::workspace::{RepoGroup, Session, ROOT_WORKSPACE};

/// Browse-mode selection over the grouped sessions.
///
/// Selection is remembered by group and session *name* so that it survives
/// refreshes that reorder or replace the underlying lists.
#[derive(Debug, Default)]
pub struct Picker {
    groups: Vec<RepoGroup>,
    group: usize,
    session: usize,
    active_group: Option<String>,
    active_session: Option<String>,
    preferred_workspace: Option<String>,
    workspace_change: Option<String>,
}

impl Picker {
    pub fn new(preferred_workspace: Option<String>) -> Self {
        Self {
            preferred_workspace,
            ..Default::default()
        }
    }

    pub fn groups(&self) -> &[RepoGroup] {
        &self.groups
    }

    pub fn group_index(&self) -> usize {
        self.group
    }

    pub fn session_index(&self) -> usize {
        self.session
    }

    /// Replace the groups after a refresh and restore the selection.
    pub fn set_groups(&mut self, groups: Vec<RepoGroup>) {
        self.groups = groups;
        self.restore();
    }

    /// Forget everything, e.g. after switching remote targets.
    pub fn reset(&mut self, preferred_workspace: Option<String>) {
        *self = Self::new(preferred_workspace);
    }

    /// Workspace that became selected since the last call, for persisting.
    pub fn take_workspace_change(&mut self) -> Option<String> {
        self.workspace_change.take()
    }

    pub fn current_group(&self) -> Option<&RepoGroup> {
        self.groups.get(self.group)
    }

    pub fn current_sessions(&self) -> &[Session] {
        self.current_group()
            .map(|g| g.sessions.as_slice())
            .unwrap_or_default()
    }

    pub fn selected_session(&self) -> Option<&Session> {
        self.current_sessions().get(self.session)
    }

    pub fn current_workspace(&self) -> &str {
        self.current_group()
            .map(|g| g.workspace_name())
            .unwrap_or(ROOT_WORKSPACE)
    }

    /// Workspaces in first-seen order.
    pub fn workspaces(&self) -> Vec<&str> {
        let mut out: Vec<&str> = Vec::new();
        for g in &self.groups {
            let ws = g.workspace_name();
            if !out.contains(&ws) {
                out.push(ws);
            }
        }
        if out.is_empty() {
            out.push(ROOT_WORKSPACE);
        }
        out
    }

    pub fn workspace_total(&self, workspace: &str) -> usize {
        self.groups
            .iter()
            .filter(|g| g.workspace_name() == workspace)
            .map(|g| g.sessions.len())
            .sum()
    }

    pub fn repo_indexes(&self, workspace: &str) -> Vec<usize> {
        self.groups
            .iter()
            .enumerate()
            .filter(|(_, g)| g.workspace_name() == workspace)
            .map(|(i, _)| i)
            .collect()
    }

    /// Group indexes in display order: by workspace, then discovery order.
    pub fn repo_order(&self) -> Vec<usize> {
        self.workspaces()
            .into_iter()
            .flat_map(|ws| self.repo_indexes(ws))
            .collect()
    }

    /// Move to the next (`1`) or previous (`-1`) repo, wrapping around.
    pub fn shift_repo(&mut self, direction: isize) -> bool {
        let order = self.repo_order();
        if order.is_empty() {
            return false;
        }
        let pos = order.iter().position(|&i| i == self.group).unwrap_or(0) as isize;
        let len = order.len() as isize;
        let next = (pos + direction).rem_euclid(len) as usize;
        self.select_group(order[next]);
        true
    }

    /// Jump to the `n`th repo in display order (0-based).
    pub fn jump_repo(&mut self, n: usize) -> bool {
        match self.repo_order().get(n) {
            Some(&idx) => {
                self.select_group(idx);
                true
            }
            None => false,
        }
    }

    /// Move the session cursor without wrapping. Returns whether it moved.
    pub fn move_session(&mut self, delta: isize) -> bool {
        let len = self.current_sessions().len();
        if len == 0 {
            return false;
        }
        let next = (self.session as isize + delta).clamp(0, len as isize - 1) as usize;
        if next == self.session {
            return false;
        }
        self.session = next;
        self.capture_active();
        true
    }

    /// Remember `session` in the current group as the selection for the
    /// next refresh, e.g. right after creating it.
    pub fn focus_session(&mut self, session: &str) {
        self.active_group = self.current_group().map(|g| g.name.clone());
        self.active_session = Some(session.to_string());
    }

    /// The session to attach to: the selected one, else the first session
    /// of the current group, else the first session anywhere.
    pub fn attachable_session(&mut self) -> Option<Session> {
        if let Some(s) = self.selected_session() {
            return Some(s.clone());
        }
        if !self.current_sessions().is_empty() {
            self.session = 0;
            self.capture_active();
            return self.selected_session().cloned();
        }
        let idx = self.repo_order().into_iter().find(|&i| !self.groups[i].sessions.is_empty())?;
        self.select_group(idx);
        self.selected_session().cloned()
    }

    /// Directory for a new session: the repo root, else the selected
    /// session's workdir, else `/`.
    pub fn new_session_path(&self) -> String {
        if let Some(g) = self.current_group().filter(|g| !g.is_root()) {
            return g.root_path.clone();
        }
        match self.selected_session() {
            Some(s) if !s.workdir.trim().is_empty() => s.workdir.clone(),
            _ => "/".to_string(),
        }
    }

    /// Repo token used to name a new session.
    pub fn new_session_repo(&self) -> String {
        if let Some(g) = self.current_group().filter(|g| !g.is_root()) {
            return g.repo.clone();
        }
        self.selected_session()
            .and_then(|s| {
                std::path::Path::new(s.workdir.trim())
                    .file_name()
                    .map(|n| n.to_string_lossy().to_string())
            })
            .unwrap_or_else(|| "sh".to_string())
    }

    fn select_group(&mut self, idx: usize) {
        self.group = idx;
        self.session = 0;
        self.capture_active();
    }

    fn restore(&mut self) {
        if self.groups.is_empty() {
            self.group = 0;
            self.session = 0;
            return;
        }

        let by_name = self
            .active_group
            .as_ref()
            .and_then(|name| self.groups.iter().position(|g| &g.name == name));
        let by_workspace = || {
            let ws = self.preferred_workspace.as_deref()?.trim();
            self.groups.iter().position(|g| g.workspace_name() == ws)
        };
        if let Some(idx) = by_name.or_else(|| {
            if self.active_group.is_none() {
                by_workspace()
            } else {
                None
            }
        }) {
            self.group = idx;
        }
        self.group = self.group.min(self.groups.len() - 1);

        let sessions = self.current_sessions();
        let len = sessions.len();
        let found = self
            .active_session
            .as_ref()
            .and_then(|name| sessions.iter().position(|s| &s.name == name));
        if let Some(idx) = found {
            self.session = idx;
        }
        self.session = self.session.min(len.saturating_sub(1));
        self.capture_active();
    }

    fn capture_active(&mut self) {
        let Some(group) = self.groups.get(self.group) else {
            self.active_group = None;
            self.active_session = None;
            return;
        };

        let ws = group.workspace_name().to_string();
        if self.preferred_workspace.as_deref() != Some(ws.as_str()) {
            self.preferred_workspace = Some(ws.clone());
            self.workspace_change = Some(ws);
        }

        self.active_group = Some(group.name.clone());
        self.active_session = group.sessions.get(self.session).map(|s| s.name.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn group(ws: &str, repo: &str, sessions: &[&str]) -> RepoGroup {
        let mut g = RepoGroup::new(ws, repo, format!("/w/{ws}/data/repos/{repo}"));
        g.sessions = sessions
            .iter()
            .map(|s| Session::new(*s, format!("/w/{ws}/data/repos/{repo}")))
            .collect();
        g
    }

    fn sample() -> Vec<RepoGroup> {
        vec![
            RepoGroup::root(),
            group("git", "app", &["app-shell-1", "app-shell-2"]),
            group("mono", "core", &[]),
            group("git", "tools", &["tools-lazygit-1"]),
        ]
    }

    #[test]
    fn test_repo_order_groups_by_workspace() {
        let mut p = Picker::new(None);
        p.set_groups(sample());
        assert_eq!(p.workspaces(), vec!["root", "git", "mono"]);
        assert_eq!(p.repo_order(), vec![0, 1, 3, 2]);
        assert_eq!(p.workspace_total("git"), 3);
    }

    #[test]
    fn test_shift_repo_wraps() {
        let mut p = Picker::new(None);
        p.set_groups(sample());
        assert!(p.shift_repo(1));
        assert_eq!(p.group_index(), 1);
        assert!(p.shift_repo(1));
        assert_eq!(p.group_index(), 3);
        assert!(p.shift_repo(-1));
        assert!(p.shift_repo(-1));
        assert!(p.shift_repo(-1));
        assert_eq!(p.group_index(), 2);
    }

    #[test]
    fn test_selection_survives_refresh() {
        let mut p = Picker::new(None);
        p.set_groups(sample());
        p.jump_repo(1);
        p.move_session(1);
        assert_eq!(p.selected_session().unwrap().name, "app-shell-2");

        // A new session sorts first and the mono workspace disappears.
        let mut groups = sample();
        groups.remove(2);
        groups[1].sessions.insert(0, Session::new("app-claude-1", ""));
        p.set_groups(groups);

        assert_eq!(p.current_group().unwrap().name, "git/app");
        assert_eq!(p.selected_session().unwrap().name, "app-shell-2");
    }

    #[test]
    fn test_restore_keeps_empty_group_selected() {
        let mut p = Picker::new(None);
        p.set_groups(sample());
        assert_eq!(p.group_index(), 0);
        assert!(p.selected_session().is_none());
        p.set_groups(sample());
        assert_eq!(p.group_index(), 0);
    }

    #[test]
    fn test_preferred_workspace_on_first_load() {
        let mut p = Picker::new(Some("mono".to_string()));
        p.set_groups(sample());
        assert_eq!(p.current_group().unwrap().name, "mono/core");
        assert_eq!(p.take_workspace_change(), None);

        p.shift_repo(1);
        assert_eq!(p.take_workspace_change().as_deref(), Some("root"));
        assert_eq!(p.take_workspace_change(), None);
    }

    #[test]
    fn test_attachable_falls_back_to_first_group_with_sessions() {
        let mut p = Picker::new(None);
        p.set_groups(sample());
        let s = p.attachable_session().unwrap();
        assert_eq!(s.name, "app-shell-1");
        assert_eq!(p.group_index(), 1);
        assert_eq!(p.session_index(), 0);
    }

    #[test]
    fn test_move_session_clamps() {
        let mut p = Picker::new(None);
        p.set_groups(sample());
        p.jump_repo(1);
        assert!(!p.move_session(-1));
        assert!(p.move_session(5));
        assert_eq!(p.session_index(), 1);
        assert!(!p.move_session(1));
    }

    #[test]
    fn test_focus_session_after_create() {
        let mut p = Picker::new(None);
        p.set_groups(sample());
        p.jump_repo(1);
        p.focus_session("app-shell-3");

        let mut groups = sample();
        groups[1].sessions.push(Session::new("app-shell-3", ""));
        p.set_groups(groups);
        assert_eq!(p.selected_session().unwrap().name, "app-shell-3");
    }

    #[test]
    fn test_new_session_location() {
        let mut p = Picker::new(None);
        p.set_groups(sample());
        assert_eq!(p.new_session_path(), "/");
        assert_eq!(p.new_session_repo(), "sh");

        p.jump_repo(1);
        assert_eq!(p.new_session_path(), "/w/git/data/repos/app");
        assert_eq!(p.new_session_repo(), "app");

        let mut groups = sample();
        groups[0].sessions = vec![Session::new("misc", "/srv/scratch")];
        p.reset(None);
        p.set_groups(groups);
        assert_eq!(p.new_session_path(), "/srv/scratch");
        assert_eq!(p.new_session_repo(), "scratch");
    }
}
