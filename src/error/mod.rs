use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parsing error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("{0} is required")]
    MissingTool(String),

    #[error("{0}")]
    Tmux(String),

    #[error("{0}")]
    Remote(String),

    #[error("{0} timed out")]
    Timeout(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("{0}")]
    CommandFailed(String),

    #[error("{0}")]
    Other(String),
}

impl Error {
    pub fn tmux(msg: impl Into<String>) -> Self {
        Self::Tmux(msg.into())
    }

    pub fn remote(msg: impl Into<String>) -> Self {
        Self::Remote(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn missing_tool(tool: impl Into<String>) -> Self {
        Self::MissingTool(tool.into())
    }

    /// True when tmux reported that no server is running yet.
    ///
    /// An idle machine with zero sessions is a normal state, so callers
    /// normalize this to an empty result instead of surfacing it.
    pub fn is_no_server(&self) -> bool {
        let msg = self.to_string().to_lowercase();
        msg.contains("no server running")
            || msg.contains("failed to connect")
            || msg.contains("no sessions")
            || msg.contains("error connecting to")
    }
}
