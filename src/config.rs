use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crossterm::event::{KeyCode, KeyModifiers};
use serde::Deserialize;
use tokio::fs;

use crate::error::{Error, Result};
use crate::preview::PreviewMode;
use crate::workspace::DEFAULT_WORKSPACES_ROOT;

pub const DEFAULT_REFRESH_SECS: u64 = 2;
pub const DEFAULT_QUERY_TIMEOUT_SECS: u64 = 8;

/// `<config dir>/echoshell`, honouring `XDG_CONFIG_HOME`.
pub fn config_dir() -> Result<PathBuf> {
    let base =
        dirs::config_dir().ok_or_else(|| Error::config("Cannot determine config directory"))?;
    Ok(base.join("echoshell"))
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum OneOrMany {
    One(String),
    Many(Vec<String>),
}

impl OneOrMany {
    fn into_vec(self) -> Vec<String> {
        match self {
            OneOrMany::One(s) => vec![s],
            OneOrMany::Many(v) => v,
        }
    }
}

/// Contents of `config.toml`. Every key is optional.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct ConfigFile {
    pub workspaces_root: Option<String>,
    pub refresh_interval_secs: Option<u64>,
    pub query_timeout_secs: Option<u64>,
    pub preview: Option<PreviewMode>,
    pub tmux_mouse: Option<String>,
    keybindings: HashMap<String, OneOrMany>,
}

impl ConfigFile {
    pub async fn load() -> Result<Option<Self>> {
        Self::load_from(&config_dir()?.join("config.toml")).await
    }

    pub async fn load_from(path: &Path) -> Result<Option<Self>> {
        let content = match fs::read_to_string(path).await {
            Ok(c) => c,
            Err(_) => return Ok(None),
        };
        Ok(Some(Self::parse(&content)?))
    }

    pub fn parse(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }
}

/// What to do with tmux's global `mouse` option at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MouseMode {
    On,
    Off,
    /// Leave the user's setting alone.
    Keep,
}

impl MouseMode {
    /// Blank means the default (`on`); unknown values fall back to it too.
    pub fn parse(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "off" | "0" | "false" | "no" => Self::Off,
            "keep" | "skip" | "none" => Self::Keep,
            "" | "on" | "1" | "true" | "yes" => Self::On,
            other => {
                tracing::warn!(value = other, "unknown tmux mouse mode, using on");
                Self::On
            }
        }
    }

    /// Value for `set-option -g mouse`, or `None` when unmanaged.
    pub fn tmux_value(self) -> Option<&'static str> {
        match self {
            Self::On => Some("on"),
            Self::Off => Some("off"),
            Self::Keep => None,
        }
    }
}

/// Effective settings: config file overlaid with the environment.
#[derive(Debug, Clone)]
pub struct Settings {
    pub workspaces_root: String,
    pub refresh_interval: Duration,
    pub query_timeout: Duration,
    pub preview: PreviewMode,
    pub mouse: MouseMode,
    /// Checkout used by the update action, from `ECHOSHELL_REPO_DIR`.
    pub repo_dir: Option<PathBuf>,
}

impl Default for Settings {
    fn default() -> Self {
        Self::resolve_with(&ConfigFile::default(), |_| None)
    }
}

impl Settings {
    pub fn resolve(file: &ConfigFile) -> Self {
        Self::resolve_with(file, |key| std::env::var(key).ok())
    }

    /// Resolve against an arbitrary environment lookup.
    pub fn resolve_with(file: &ConfigFile, env: impl Fn(&str) -> Option<String>) -> Self {
        let env = |key: &str| env(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let preview = match env("ECHOSHELL_PREVIEW") {
            Some(v) => PreviewMode::parse(&v).unwrap_or_else(|| {
                tracing::warn!(value = %v, "unknown preview mode, using auto");
                PreviewMode::Auto
            }),
            None => file.preview.unwrap_or_default(),
        };

        let mouse = env("ECHOSHELL_TMUX_MOUSE")
            .or_else(|| file.tmux_mouse.clone())
            .map(|v| MouseMode::parse(&v))
            .unwrap_or(MouseMode::On);

        Self {
            workspaces_root: file
                .workspaces_root
                .clone()
                .filter(|r| !r.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_WORKSPACES_ROOT.to_string()),
            refresh_interval: Duration::from_secs(
                file.refresh_interval_secs
                    .filter(|s| *s > 0)
                    .unwrap_or(DEFAULT_REFRESH_SECS),
            ),
            query_timeout: Duration::from_secs(
                file.query_timeout_secs
                    .filter(|s| *s > 0)
                    .unwrap_or(DEFAULT_QUERY_TIMEOUT_SECS),
            ),
            preview,
            mouse,
            repo_dir: env("ECHOSHELL_REPO_DIR").map(PathBuf::from),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeySpec {
    pub code: KeyCode,
    pub modifiers: KeyModifiers,
}

impl KeySpec {
    const fn plain(code: KeyCode) -> Self {
        Self {
            code,
            modifiers: KeyModifiers::NONE,
        }
    }

    const fn ch(c: char) -> Self {
        Self::plain(KeyCode::Char(c))
    }
}

/// Shift is implied by the character itself (`R`, `?`) and by BackTab, so
/// it is ignored when comparing those keys.
fn effective_modifiers(code: &KeyCode, modifiers: KeyModifiers) -> KeyModifiers {
    match code {
        KeyCode::Char(_) | KeyCode::BackTab => modifiers - KeyModifiers::SHIFT,
        _ => modifiers,
    }
}

#[derive(Debug, Clone)]
pub struct KeyBindings {
    bindings: HashMap<&'static str, Vec<KeySpec>>,
}

impl Default for KeyBindings {
    fn default() -> Self {
        let defaults: [(&'static str, Vec<KeySpec>); 12] = [
            (
                "quit",
                vec![
                    KeySpec::ch('q'),
                    KeySpec::plain(KeyCode::Esc),
                    KeySpec {
                        code: KeyCode::Char('c'),
                        modifiers: KeyModifiers::CONTROL,
                    },
                ],
            ),
            ("up", vec![KeySpec::plain(KeyCode::Up), KeySpec::ch('k')]),
            ("down", vec![KeySpec::plain(KeyCode::Down), KeySpec::ch('j')]),
            (
                "next_repo",
                vec![
                    KeySpec::plain(KeyCode::Tab),
                    KeySpec::plain(KeyCode::Right),
                    KeySpec::ch('l'),
                ],
            ),
            (
                "prev_repo",
                vec![
                    KeySpec::plain(KeyCode::BackTab),
                    KeySpec::plain(KeyCode::Left),
                    KeySpec::ch('h'),
                ],
            ),
            ("select", vec![KeySpec::plain(KeyCode::Enter)]),
            ("refresh", vec![KeySpec::ch('r')]),
            ("refresh_all", vec![KeySpec::ch('R')]),
            ("new_session", vec![KeySpec::ch('n')]),
            ("destroy", vec![KeySpec::ch('d')]),
            ("target", vec![KeySpec::ch('t')]),
            ("update", vec![KeySpec::ch('u')]),
        ];

        Self {
            bindings: defaults.into_iter().collect(),
        }
    }
}

impl KeyBindings {
    /// Defaults with any valid overrides from the config file applied.
    /// Unknown actions and unparsable specs are ignored.
    pub fn from_config(cfg: &ConfigFile) -> Self {
        let mut kb = Self::default();
        for (action, spec) in cfg.keybindings.clone() {
            let parsed: Vec<KeySpec> = spec
                .into_vec()
                .iter()
                .filter_map(|s| parse_key_spec(s))
                .collect();
            if parsed.is_empty() {
                continue;
            }
            match kb.bindings.get_mut(action.as_str()) {
                Some(slot) => *slot = parsed,
                None => tracing::warn!(action = %action, "unknown keybinding action"),
            }
        }
        kb
    }

    pub fn matches(&self, action: &'static str, code: &KeyCode, modifiers: KeyModifiers) -> bool {
        let modifiers = effective_modifiers(code, modifiers);
        self.bindings.get(action).is_some_and(|v| {
            v.iter()
                .any(|k| &k.code == code && effective_modifiers(&k.code, k.modifiers) == modifiers)
        })
    }
}

fn parse_key_spec(s: &str) -> Option<KeySpec> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }

    let mut modifiers = KeyModifiers::NONE;
    let parts: Vec<&str> = s.split('+').map(|p| p.trim()).collect();
    let (mods, key_part) = match parts.split_last() {
        Some((key, mods)) if !mods.is_empty() => (mods, *key),
        _ => (&[][..], s),
    };

    for m in mods {
        match m.to_lowercase().as_str() {
            "ctrl" | "control" => modifiers |= KeyModifiers::CONTROL,
            "alt" => modifiers |= KeyModifiers::ALT,
            "shift" => modifiers |= KeyModifiers::SHIFT,
            _ => return None,
        }
    }

    let code = match key_part.to_lowercase().as_str() {
        "enter" => KeyCode::Enter,
        "esc" | "escape" => KeyCode::Esc,
        "tab" => KeyCode::Tab,
        "backtab" => KeyCode::BackTab,
        "backspace" => KeyCode::Backspace,
        "space" => KeyCode::Char(' '),
        "up" => KeyCode::Up,
        "down" => KeyCode::Down,
        "left" => KeyCode::Left,
        "right" => KeyCode::Right,
        _ => {
            // Single-character fallback (keeps case for e.g. "R")
            let mut chars = key_part.chars();
            match (chars.next(), chars.next()) {
                (Some(c), None) => KeyCode::Char(c),
                _ => return None,
            }
        }
    };

    Some(KeySpec { code, modifiers })
}
