use crate::cli::{Args, Command};
use crate::config::{ConfigFile, KeyBindings, Settings};
use crate::error::{Error, Result};
use crate::matcher::rank_candidates;
use crate::preview::PreviewMode;
use crate::remote::{find_in_path, RemoteTarget};
use crate::storage::Storage;
use crate::tmux::{inside_tmux, TmuxManager};
use crate::ui::{App, StartMode};
use crate::workspace::{load_grouped_sessions, GroupCache, RepoGroup, TransportDirs};

pub async fn run_cli(args: Args) -> Result<()> {
    let storage = Storage::new()?;

    if let Some(Command::Targets) = args.command {
        for target in storage.targets().await {
            println!("{target}");
        }
        return Ok(());
    }

    if find_in_path("ssh").is_none() {
        return Err(Error::missing_tool("ssh"));
    }

    let file = ConfigFile::load().await?.unwrap_or_default();
    let mut settings = Settings::resolve(&file);
    if args.capture_preview {
        settings.preview = PreviewMode::Capture;
    }

    let target = match args.remote.as_deref() {
        Some(raw) => RemoteTarget::new(raw),
        None => storage.last_target().await.unwrap_or_default(),
    };
    if target.is_local() && find_in_path("tmux").is_none() {
        return Err(Error::missing_tool("tmux"));
    }
    tracing::info!(remote = %target, "starting");

    let tmux = TmuxManager::for_target(target.clone(), settings.query_timeout);
    let cache = GroupCache::new();
    let dirs = TransportDirs::new(tmux.transport().clone());

    if let Some(Command::List { json }) = args.command {
        let groups =
            load_grouped_sessions(&cache, &target, &dirs, &tmux, &settings.workspaces_root).await?;
        if json {
            println!("{}", serde_json::to_string_pretty(&groups)?);
        } else {
            print_groups(&groups);
        }
        return Ok(());
    }

    let start = if args.select_remote {
        StartMode::Targets
    } else if args.query.is_empty() {
        StartMode::Browse
    } else {
        match load_grouped_sessions(&cache, &target, &dirs, &tmux, &settings.workspaces_root).await {
            Ok(groups) => {
                let mut matches = rank_candidates(&args.query, &groups);
                match matches.len() {
                    0 => StartMode::Browse,
                    1 => {
                        let only = matches.remove(0);
                        return attach_now(&tmux, &only.session.name).await;
                    }
                    _ => StartMode::Quick {
                        query: args.query.join(" "),
                        candidates: matches,
                    },
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "quick attach lookup failed");
                StartMode::Browse
            }
        }
    };

    let keys = KeyBindings::from_config(&file);
    let mut app = App::new(settings, keys, storage, target, start).await;
    app.run().await
}

/// Attach in the foreground, returning when the client detaches.
async fn attach_now(tmux: &TmuxManager, session: &str) -> Result<()> {
    tracing::info!(remote = %tmux.target(), session, "quick attach");
    let status = tmux.attach_command(session, inside_tmux()).status().await?;
    if !status.success() {
        return Err(Error::CommandFailed(format!("attach exited with {status}")));
    }
    Ok(())
}

fn print_groups(groups: &[RepoGroup]) {
    for g in groups {
        println!("{} ({})", g.name, g.sessions.len());
        for s in &g.sessions {
            let mark = if s.attached { "*" } else { " " };
            println!("  {} {}\t{}", mark, s.name, s.workdir);
        }
    }
}
