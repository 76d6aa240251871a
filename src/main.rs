use std::fs::OpenOptions;
use std::sync::Mutex;

use clap::Parser;
use echoshell::cli::{run_cli, Args};
use echoshell::config::config_dir;
use tracing_subscriber::{fmt, EnvFilter};

/// Logs go to a file because the TUI owns the terminal.
/// `ECHOSHELL_LOG=stderr` sends them to stderr instead.
fn init_logging() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("echoshell=info"));

    if std::env::var("ECHOSHELL_LOG").is_ok_and(|v| v == "stderr") {
        fmt()
            .with_env_filter(filter)
            .with_target(false)
            .with_writer(std::io::stderr)
            .init();
        return;
    }

    let file = config_dir().ok().and_then(|dir| {
        std::fs::create_dir_all(&dir).ok()?;
        OpenOptions::new()
            .create(true)
            .append(true)
            .open(dir.join("echoshell.log"))
            .ok()
    });
    if let Some(file) = file {
        fmt()
            .with_env_filter(filter)
            .with_target(false)
            .with_ansi(false)
            .with_writer(Mutex::new(file))
            .init();
    }
}

#[tokio::main]
async fn main() {
    init_logging();

    let args = Args::parse();

    if let Err(e) = run_cli(args).await {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
