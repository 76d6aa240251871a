use clap::builder::BoolishValueParser;
use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "echoshell")]
#[command(version, about = "Pick, create and attach tmux sessions grouped by repo", long_about = None)]
pub struct Args {
    /// Quick-attach query: attach directly on a single match
    #[arg(value_name = "QUERY")]
    pub query: Vec<String>,

    /// Remote target (user@host, or "local")
    #[arg(short, long, global = true, env = "ECHOSHELL_REMOTE")]
    pub remote: Option<String>,

    /// Open the remote target picker first
    #[arg(
        long,
        env = "ECHOSHELL_SELECT_REMOTE",
        value_parser = BoolishValueParser::new(),
        default_value_t = false,
        num_args = 0..=1,
        default_missing_value = "true"
    )]
    pub select_remote: bool,

    /// Preview with captured text instead of a live pane
    #[arg(long)]
    pub capture_preview: bool,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// List sessions grouped by workspace and repo
    List {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print remembered remote targets, most recent first
    Targets,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_words() {
        let args = Args::try_parse_from(["echoshell", "op", "la"]).unwrap();
        assert_eq!(args.query, vec!["op", "la"]);
        assert!(args.command.is_none());
    }

    #[test]
    fn test_subcommand_with_remote() {
        let args = Args::try_parse_from(["echoshell", "list", "--json", "--remote", "dev@box"]).unwrap();
        assert!(matches!(args.command, Some(Command::List { json: true })));
        assert_eq!(args.remote.as_deref(), Some("dev@box"));
    }

    #[test]
    fn test_select_remote_flag() {
        let args = Args::try_parse_from(["echoshell", "--select-remote"]).unwrap();
        assert!(args.select_remote);
        let args = Args::try_parse_from(["echoshell", "--select-remote=0"]).unwrap();
        assert!(!args.select_remote);
    }
}
