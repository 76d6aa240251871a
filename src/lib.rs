pub mod cli;
pub mod config;
pub mod error;
pub mod matcher;
pub mod preview;
pub mod remote;
pub mod storage;
pub mod tmux;
pub mod ui;
pub mod update;
pub mod workspace;

pub use error::{Error, Result};

/// Version of echoshell
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
