mod manager;
mod panes;
mod parse;

pub use manager::{inside_tmux, TmuxManager};
pub use panes::LocalPanes;
pub use parse::{
    parse_first_pane_workdirs, parse_sessions, parse_tmux_targets, PANE_FORMAT, SESSION_FORMAT,
};
