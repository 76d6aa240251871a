mod app;
mod picker;
mod render;

pub use app::{App, StartMode};
pub use picker::Picker;

use crate::error::Result;
use crate::remote::RemoteTarget;
use crate::workspace::RepoGroup;

/// Which screen owns the keyboard.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Browse,
    Targets,
    AddTarget,
    Templates,
    Quick,
}

/// Results of background work, delivered back to the event loop.
#[derive(Debug)]
pub enum Msg {
    Loaded {
        target: RemoteTarget,
        result: Result<Vec<RepoGroup>>,
    },
    Preview {
        session: String,
        result: Result<String>,
    },
    Created {
        result: Result<String>,
    },
    Action {
        result: Result<String>,
    },
    /// Finished self-update; the only message that clears the update guard.
    Updated {
        result: Result<String>,
    },
}
