use clap::{Args, Parser, Subcommand, ValueEnum};
use storm_proto::config::{Config, ViewStrategy};
use storm_proto::protocol::TorrentState;

#[derive(Parser)]
#[command(name = "storm-watch", about = "Follow a storm daemon's torrents from the terminal", version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Daemon API base URL (overrides the config file)
    #[arg(long, global = true)]
    pub base_url: Option<String>,

    /// Log to stderr instead of the log file
    #[arg(long, global = true)]
    pub log_stderr: bool,
}

#[derive(Subcommand)]
pub enum Command {
    /// Poll the daemon and print every new snapshot
    Watch(WatchArgs),
    /// Show label suggestions for a torrent, optionally applying one
    Suggest(SuggestArgs),
}

#[derive(Args)]
pub struct WatchArgs {
    /// Only show torrents in this state (e.g. seeding, paused)
    #[arg(long, value_parser = parse_state)]
    pub state: Option<TorrentState>,

    /// Poll interval in milliseconds
    #[arg(long)]
    pub interval_ms: Option<u64>,

    #[arg(long, value_enum)]
    pub strategy: Option<StrategyArg>,

    /// Enable a missing label plugin without asking
    #[arg(long)]
    pub yes: bool,
}

#[derive(Args)]
pub struct SuggestArgs {
    /// Torrent id (info hash)
    pub id: String,

    #[arg(long, default_value = "")]
    pub query: String,

    /// Apply the suggestion with this number
    #[arg(long)]
    pub apply: Option<usize>,
}

#[derive(Clone, Copy, ValueEnum)]
pub enum StrategyArg {
    Combined,
    Split,
}

impl From<StrategyArg> for ViewStrategy {
    fn from(arg: StrategyArg) -> Self {
        match arg {
            StrategyArg::Combined => ViewStrategy::Combined,
            StrategyArg::Split => ViewStrategy::Split,
        }
    }
}

fn parse_state(s: &str) -> Result<TorrentState, String> {
    s.parse()
}

impl Cli {
    /// Fold command-line overrides into the loaded config.
    pub fn apply_overrides(&self, config: &mut Config) {
        if let Some(base_url) = &self.base_url {
            config.daemon.base_url = base_url.clone();
        }
        if let Command::Watch(args) = &self.command {
            if let Some(interval_ms) = args.interval_ms {
                config.polling.interval_ms = interval_ms;
            }
            if let Some(strategy) = args.strategy {
                config.polling.strategy = strategy.into();
            }
        }
    }
}
