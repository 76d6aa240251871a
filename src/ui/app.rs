use std::io;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use chrono::{DateTime, Local};
use crossterm::{
    event::{self, Event as CrosstermEvent, KeyCode, KeyEventKind, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{backend::CrosstermBackend, Terminal};
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};

use crate::config::{KeyBindings, Settings};
use crate::error::{Error, Result};
use crate::matcher::QuickCandidate;
use crate::preview::{capture_preview, PreviewManager, ShowOutcome};
use crate::remote::{find_in_path, RemoteTarget};
use crate::storage::Storage;
use crate::tmux::{inside_tmux, LocalPanes, TmuxManager};
use crate::update::{detect_repo_dir, update_and_rebuild};
use crate::workspace::{
    default_templates, load_grouped_sessions, GroupCache, SessionTemplate, TransportDirs,
};

use super::{Mode, Msg, Picker};

/// Label of the pseudo-entry that opens the "add target" prompt.
const ADD_TARGET_LABEL: &str = "+ Add new remote...";

/// Shown in place of capture text while the live pane mirrors the session.
const LIVE_PREVIEW_NOTE: &str = "(live preview in the adjacent pane)";

/// Screen the picker opens on.
#[derive(Debug, Clone)]
pub enum StartMode {
    Browse,
    Targets,
    Quick {
        query: String,
        candidates: Vec<QuickCandidate>,
    },
}

/// Main TUI application
pub struct App {
    settings: Settings,
    keys: KeyBindings,
    storage: Storage,
    repo_dir: Option<PathBuf>,

    // Target state
    target: RemoteTarget,
    tmux: TmuxManager,
    cache: GroupCache,
    browsing: bool,

    // Selection and preview
    picker: Picker,
    preview: PreviewManager<LocalPanes>,
    live_preview: bool,
    preview_text: String,

    mode: Mode,
    should_quit: bool,
    status: String,
    last_refresh: Option<DateTime<Local>>,

    // Background work
    tx: UnboundedSender<Msg>,
    rx: UnboundedReceiver<Msg>,
    loading: bool,
    reload_queued: bool,
    update_busy: bool,

    // Target picker
    targets: Vec<String>,
    target_idx: usize,
    target_input: String,

    // New session picker
    templates: Vec<SessionTemplate>,
    template_idx: usize,

    // Quick attach
    quick_query: String,
    quick: Vec<QuickCandidate>,
    quick_idx: usize,

    // Deferred actions that require terminal access
    pending_attach: Option<String>,
}

impl App {
    pub async fn new(
        settings: Settings,
        keys: KeyBindings,
        storage: Storage,
        target: RemoteTarget,
        start: StartMode,
    ) -> Self {
        let (tx, rx) = unbounded_channel();
        let preferred = storage.last_workspace(&target).await;
        let tmux = TmuxManager::for_target(target.clone(), settings.query_timeout);
        let preview = PreviewManager::new(LocalPanes::new(settings.query_timeout), target.clone());
        let live_preview = settings.preview.wants_live(inside_tmux());
        let repo_dir = detect_repo_dir(settings.repo_dir.as_deref());

        let mut app = Self {
            settings,
            keys,
            storage,
            repo_dir,
            target,
            tmux,
            cache: GroupCache::new(),
            browsing: true,
            picker: Picker::new(preferred),
            preview,
            live_preview,
            preview_text: String::new(),
            mode: Mode::Browse,
            should_quit: false,
            status: "Loading sessions...".to_string(),
            last_refresh: None,
            tx,
            rx,
            loading: false,
            reload_queued: false,
            update_busy: false,
            targets: Vec::new(),
            target_idx: 0,
            target_input: String::new(),
            templates: default_templates(),
            template_idx: 0,
            quick_query: String::new(),
            quick: Vec::new(),
            quick_idx: 0,
            pending_attach: None,
        };

        match start {
            StartMode::Browse => {}
            StartMode::Targets => {
                app.browsing = false;
                app.open_targets().await;
            }
            StartMode::Quick { query, candidates } => {
                app.status = format!("{} matches for {:?}", candidates.len(), query);
                app.quick_query = query;
                app.quick = candidates;
                app.mode = Mode::Quick;
            }
        }
        app
    }

    // Accessors used by the renderer.

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn picker(&self) -> &Picker {
        &self.picker
    }

    pub fn target(&self) -> &RemoteTarget {
        &self.target
    }

    pub fn status(&self) -> &str {
        &self.status
    }

    pub fn preview_text(&self) -> &str {
        &self.preview_text
    }

    pub fn last_refresh(&self) -> Option<DateTime<Local>> {
        self.last_refresh
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn targets(&self) -> &[String] {
        &self.targets
    }

    pub fn target_idx(&self) -> usize {
        self.target_idx
    }

    pub fn target_input(&self) -> &str {
        &self.target_input
    }

    pub fn templates(&self) -> &[SessionTemplate] {
        &self.templates
    }

    pub fn template_idx(&self) -> usize {
        self.template_idx
    }

    pub fn quick_query(&self) -> &str {
        &self.quick_query
    }

    pub fn quick(&self) -> &[QuickCandidate] {
        &self.quick
    }

    pub fn quick_idx(&self) -> usize {
        self.quick_idx
    }

    /// Run the TUI application
    pub async fn run(&mut self) -> Result<()> {
        if self.target.is_local() {
            if let Some(mode) = self.settings.mouse.tmux_value() {
                if let Err(e) = self.tmux.set_mouse_mode(mode).await {
                    tracing::debug!(error = %e, "set tmux mouse mode");
                }
            }
        }

        // Setup terminal
        enable_raw_mode()?;
        let mut stdout = io::stdout();
        execute!(stdout, EnterAlternateScreen)?;
        let backend = CrosstermBackend::new(stdout);
        let mut terminal = Terminal::new(backend)?;

        terminal.clear()?;

        let result = self.event_loop(&mut terminal).await;

        self.preview.teardown().await;

        // Restore terminal
        disable_raw_mode()?;
        execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
        terminal.show_cursor()?;

        result
    }

    /// Main event loop
    async fn event_loop(
        &mut self,
        terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    ) -> Result<()> {
        let poll_rate = Duration::from_millis(100);
        let mut last_tick = Instant::now();

        if self.browsing {
            self.reload();
        }

        loop {
            terminal.draw(|f| super::render::draw(f, self))?;

            if event::poll(poll_rate)? {
                if let CrosstermEvent::Key(key) = event::read()? {
                    if key.kind == KeyEventKind::Press {
                        self.handle_key(key.code, key.modifiers).await;
                    }
                }
            }

            while let Ok(msg) = self.rx.try_recv() {
                self.handle_msg(msg).await;
            }

            if last_tick.elapsed() >= self.settings.refresh_interval {
                last_tick = Instant::now();
                if self.browsing && !self.loading {
                    self.reload();
                }
            }

            if let Some(name) = self.pending_attach.take() {
                self.perform_attach(terminal, &name).await?;
            }

            if self.should_quit {
                break;
            }
        }

        Ok(())
    }

    async fn perform_attach(
        &mut self,
        terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
        name: &str,
    ) -> Result<()> {
        self.preview.teardown().await;

        disable_raw_mode()?;
        execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
        terminal.show_cursor()?;

        let status = self.tmux.attach_command(name, inside_tmux()).status().await;

        enable_raw_mode()?;
        execute!(terminal.backend_mut(), EnterAlternateScreen)?;
        terminal.clear()?;

        self.status = match status {
            Ok(s) if s.success() => format!("Detached from {name}"),
            Ok(s) => format!("Action failed: attach exited with {s}"),
            Err(e) => format!("Action failed: {e}"),
        };
        tracing::info!(remote = %self.target, session = name, "attach finished");
        self.reload();
        Ok(())
    }

    /// Start a background load unless one is already running.
    fn reload(&mut self) {
        if self.loading {
            self.reload_queued = true;
            return;
        }
        self.loading = true;

        let tx = self.tx.clone();
        let cache = self.cache.clone();
        let target = self.target.clone();
        let tmux = self.tmux.clone();
        let dirs = TransportDirs::new(self.tmux.transport().clone());
        let root = self.settings.workspaces_root.clone();
        tokio::spawn(async move {
            let result = load_grouped_sessions(&cache, &target, &dirs, &tmux, &root).await;
            let _ = tx.send(Msg::Loaded { target, result });
        });
    }

    async fn handle_msg(&mut self, msg: Msg) {
        match msg {
            Msg::Loaded { target, result } => {
                self.loading = false;
                if target == self.target {
                    match result {
                        Ok(groups) => {
                            let count = groups.len();
                            self.picker.set_groups(groups);
                            self.last_refresh = Some(Local::now());
                            if self.mode == Mode::Browse {
                                self.status = format!("Loaded {count} repo entries");
                            }
                            self.on_selection().await;
                        }
                        Err(e) => {
                            tracing::warn!(remote = %target, error = %e, "refresh failed");
                            self.status = format!("Refresh failed: {e}");
                        }
                    }
                }
                if std::mem::take(&mut self.reload_queued) {
                    self.reload();
                }
            }
            Msg::Preview { session, result } => {
                // Drop captures for a selection that has since moved on.
                if self.picker.selected_session().map(|s| s.name.as_str()) != Some(session.as_str()) {
                    return;
                }
                self.preview_text = match result {
                    Ok(text) => text,
                    Err(e) => format!("Preview error: {e}"),
                };
            }
            Msg::Created { result } => match result {
                Ok(name) => {
                    self.picker.focus_session(&name);
                    self.status = format!("Created {name}");
                    self.reload();
                }
                Err(e) => self.status = format!("Action failed: {e}"),
            },
            Msg::Action { result } => self.finish_action(result),
            Msg::Updated { result } => {
                self.update_busy = false;
                self.finish_action(result);
            }
        }
    }

    fn finish_action(&mut self, result: Result<String>) {
        match result {
            Ok(status) => {
                self.status = status;
                self.reload();
            }
            Err(e) => self.status = format!("Action failed: {e}"),
        }
    }

    /// Persist the workspace and refresh the preview after the selection moved.
    async fn on_selection(&mut self) {
        if let Some(ws) = self.picker.take_workspace_change() {
            let storage = self.storage.clone();
            let target = self.target.clone();
            tokio::spawn(async move {
                if let Err(e) = storage.remember_workspace(&target, &ws).await {
                    tracing::debug!(error = %e, "remember workspace");
                }
            });
        }
        self.sync_preview().await;
    }

    async fn sync_preview(&mut self) {
        let Some(session) = self.picker.selected_session().map(|s| s.name.clone()) else {
            self.preview_text.clear();
            return;
        };

        if self.live_preview {
            match self.preview.show(&session).await {
                Ok(ShowOutcome::Skipped) => {}
                Ok(_) => {
                    self.preview_text = LIVE_PREVIEW_NOTE.to_string();
                    return;
                }
                Err(e) => self.live_preview_failed(&session, &e),
            }
        }

        let tx = self.tx.clone();
        let tmux = self.tmux.clone();
        tokio::spawn(async move {
            let result = capture_preview(&tmux, &session).await;
            let _ = tx.send(Msg::Preview { session, result });
        });
    }

    /// Surface the error and let capture text fill in.
    fn live_preview_failed(&mut self, session: &str, error: &Error) {
        tracing::debug!(session = %session, error = %error, "live preview failed");
        self.status = format!("Preview failed: {error}");
    }

    async fn handle_key(&mut self, code: KeyCode, modifiers: KeyModifiers) {
        match self.mode {
            Mode::Browse => self.handle_browse_key(code, modifiers).await,
            Mode::Targets => self.handle_targets_key(code, modifiers).await,
            Mode::AddTarget => self.handle_add_target_key(code, modifiers).await,
            Mode::Templates => self.handle_templates_key(code, modifiers),
            Mode::Quick => self.handle_quick_key(code, modifiers),
        }
    }

    async fn handle_browse_key(&mut self, code: KeyCode, modifiers: KeyModifiers) {
        if self.keys.matches("quit", &code, modifiers) {
            self.should_quit = true;
            return;
        }

        let moved = if self.keys.matches("next_repo", &code, modifiers) {
            self.picker.shift_repo(1)
        } else if self.keys.matches("prev_repo", &code, modifiers) {
            self.picker.shift_repo(-1)
        } else if self.keys.matches("up", &code, modifiers) {
            self.picker.move_session(-1)
        } else if self.keys.matches("down", &code, modifiers) {
            self.picker.move_session(1)
        } else if let KeyCode::Char(c @ '1'..='9') = code {
            self.picker.jump_repo(c as usize - '1' as usize)
        } else if self.keys.matches("select", &code, modifiers) {
            if let Some(session) = self.picker.attachable_session() {
                self.status = format!("Attaching {}...", session.name);
                self.pending_attach = Some(session.name);
            }
            false
        } else if self.keys.matches("refresh_all", &code, modifiers) {
            self.cache.invalidate(&self.target);
            self.status = "Rescanning workspaces...".to_string();
            self.reload();
            false
        } else if self.keys.matches("refresh", &code, modifiers) {
            self.status = "Refreshing...".to_string();
            self.reload();
            false
        } else if self.keys.matches("target", &code, modifiers) {
            self.open_targets().await;
            false
        } else if self.keys.matches("new_session", &code, modifiers) {
            self.mode = Mode::Templates;
            self.template_idx = 0;
            self.status = "Pick command for new session".to_string();
            false
        } else if self.keys.matches("destroy", &code, modifiers) {
            self.destroy_selected();
            false
        } else if self.keys.matches("update", &code, modifiers) {
            self.start_update();
            false
        } else {
            false
        };

        if moved {
            self.on_selection().await;
        }
    }

    async fn handle_targets_key(&mut self, code: KeyCode, modifiers: KeyModifiers) {
        if code == KeyCode::Esc && self.browsing {
            self.mode = Mode::Browse;
            self.status = format!("Remote: {}", self.target);
            return;
        }
        if self.keys.matches("quit", &code, modifiers) {
            self.should_quit = true;
            return;
        }
        if self.keys.matches("up", &code, modifiers) {
            self.target_idx = self.target_idx.saturating_sub(1);
        } else if self.keys.matches("down", &code, modifiers) {
            if self.target_idx + 1 < self.targets.len() {
                self.target_idx += 1;
            }
        } else if self.keys.matches("select", &code, modifiers) {
            let Some(selected) = self.targets.get(self.target_idx).cloned() else {
                return;
            };
            if selected == ADD_TARGET_LABEL {
                self.mode = Mode::AddTarget;
                self.target_input.clear();
                return;
            }
            self.switch_target(&selected).await;
        }
    }

    async fn handle_add_target_key(&mut self, code: KeyCode, modifiers: KeyModifiers) {
        match code {
            KeyCode::Esc => {
                self.mode = Mode::Targets;
                self.target_input.clear();
            }
            KeyCode::Char('c') if modifiers.contains(KeyModifiers::CONTROL) => {
                self.mode = Mode::Targets;
                self.target_input.clear();
            }
            KeyCode::Enter => {
                let input = self.target_input.trim().to_string();
                if !input.is_empty() {
                    self.switch_target(&input).await;
                }
            }
            KeyCode::Backspace => {
                self.target_input.pop();
            }
            KeyCode::Char(c) if !c.is_control() => self.target_input.push(c),
            _ => {}
        }
    }

    fn handle_templates_key(&mut self, code: KeyCode, modifiers: KeyModifiers) {
        if code == KeyCode::Esc {
            self.mode = Mode::Browse;
            self.status = "Cancelled new session".to_string();
            return;
        }
        if self.keys.matches("quit", &code, modifiers) {
            self.should_quit = true;
            return;
        }
        if self.keys.matches("up", &code, modifiers) {
            self.template_idx = self.template_idx.saturating_sub(1);
        } else if self.keys.matches("down", &code, modifiers) {
            if self.template_idx + 1 < self.templates.len() {
                self.template_idx += 1;
            }
        } else if self.keys.matches("select", &code, modifiers) {
            self.mode = Mode::Browse;
            match self.templates.get(self.template_idx).cloned() {
                Some(template) => self.create_session(template),
                None => self.status = "No session templates".to_string(),
            }
        }
    }

    fn handle_quick_key(&mut self, code: KeyCode, modifiers: KeyModifiers) {
        if self.keys.matches("quit", &code, modifiers) {
            self.should_quit = true;
            return;
        }
        if self.keys.matches("up", &code, modifiers) {
            self.quick_idx = self.quick_idx.saturating_sub(1);
        } else if self.keys.matches("down", &code, modifiers) {
            if self.quick_idx + 1 < self.quick.len() {
                self.quick_idx += 1;
            }
        } else if self.keys.matches("select", &code, modifiers) {
            let Some(candidate) = self.quick.get(self.quick_idx) else {
                self.should_quit = true;
                return;
            };
            let name = candidate.session.name.clone();
            self.status = format!("Attaching {name}...");
            self.pending_attach = Some(name);
            self.mode = Mode::Browse;
        }
    }

    async fn open_targets(&mut self) {
        let mut targets = self.storage.targets().await;
        self.target_idx = targets
            .iter()
            .position(|t| RemoteTarget::new(t) == self.target)
            .unwrap_or(0);
        targets.push(ADD_TARGET_LABEL.to_string());
        self.targets = targets;
        self.target_input.clear();
        self.mode = Mode::Targets;
        self.status = "Select remote target...".to_string();
    }

    /// Point every query at `raw` and reload from scratch.
    async fn switch_target(&mut self, raw: &str) {
        let target = RemoteTarget::new(raw);
        if let Err(e) = self.storage.remember_target(&target).await {
            tracing::warn!(error = %e, "remember target");
        }
        if target.is_local() && find_in_path("tmux").is_none() {
            self.status = "Error: tmux is required for local mode".to_string();
            self.mode = Mode::Targets;
            return;
        }

        tracing::info!(remote = %target, "switching target");
        self.preview.retarget(target.clone()).await;
        self.tmux = TmuxManager::for_target(target.clone(), self.settings.query_timeout);
        let preferred = self.storage.last_workspace(&target).await;
        self.picker.reset(preferred);
        self.preview_text.clear();
        self.target = target;
        self.browsing = true;
        self.mode = Mode::Browse;
        self.status = "Loading sessions...".to_string();
        self.reload();
    }

    fn create_session(&mut self, template: SessionTemplate) {
        let path = self.picker.new_session_path();
        let repo = self.picker.new_session_repo();
        self.status = format!("Creating {} session...", template.label);

        let tx = self.tx.clone();
        let tmux = self.tmux.clone();
        tokio::spawn(async move {
            let result = tmux.create_from_template(&repo, &template, &path).await;
            let _ = tx.send(Msg::Created { result });
        });
    }

    fn destroy_selected(&mut self) {
        let Some(name) = self.picker.selected_session().map(|s| s.name.clone()) else {
            return;
        };
        self.status = format!("Destroying {name}...");

        let tx = self.tx.clone();
        let tmux = self.tmux.clone();
        tokio::spawn(async move {
            let result = tmux
                .kill_session(&name)
                .await
                .map(|()| format!("Destroyed {name}"));
            let _ = tx.send(Msg::Action { result });
        });
    }

    fn start_update(&mut self) {
        if self.update_busy {
            return;
        }
        self.update_busy = true;
        self.status = "Updating from origin/main...".to_string();

        let tx = self.tx.clone();
        let repo_dir = self.repo_dir.clone();
        tokio::spawn(async move {
            let result = update_and_rebuild(repo_dir.as_deref()).await;
            let _ = tx.send(Msg::Updated { result });
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    async fn app() -> (TempDir, App) {
        let tmp = TempDir::new().unwrap();
        let storage = Storage::at(tmp.path().join("echoshell"));
        let app = App::new(
            Settings::default(),
            KeyBindings::default(),
            storage,
            RemoteTarget::local(),
            StartMode::Browse,
        )
        .await;
        (tmp, app)
    }

    #[tokio::test]
    async fn test_destroy_result_does_not_release_update() {
        let (_tmp, mut app) = app().await;
        app.update_busy = true;

        app.handle_msg(Msg::Action {
            result: Err(Error::CommandFailed("can't find session: a".into())),
        })
        .await;
        assert!(app.update_busy);
        assert_eq!(app.status(), "Action failed: can't find session: a");

        app.handle_msg(Msg::Updated {
            result: Err(Error::Other("working tree has local changes".into())),
        })
        .await;
        assert!(!app.update_busy);
        assert_eq!(app.status(), "Action failed: working tree has local changes");
    }

    #[tokio::test]
    async fn test_live_preview_failure_sets_status() {
        let (_tmp, mut app) = app().await;
        app.live_preview_failed("app-shell-1", &Error::Timeout("tmux".into()));
        assert_eq!(app.status(), "Preview failed: tmux timed out");
    }
}
