use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use engine::EngineConfig;

#[derive(Debug, Parser)]
#[clap(name = "tickaudit", version, about = "Streaming order-book audit for one instrument")]
pub struct Cli {
    /// Engine config file (JSON). Defaults apply to anything it omits.
    #[clap(long, env = "TICKAUDIT_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Emit JSON logs instead of pretty terminal output
    #[clap(long, env = "TICKAUDIT_JSON_LOGS", global = true)]
    pub json_logs: bool,

    #[clap(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Audit every quote of a JSON-lines file, in order
    Replay(ReplayArgs),

    /// Poll a quote file on a fixed interval
    Watch(WatchArgs),
}

#[derive(Debug, Clone, Args)]
pub struct SessionArgs {
    /// Instrument code being monitored
    #[clap(long, env = "TICKAUDIT_INSTRUMENT", default_value = "002415")]
    pub instrument: String,

    /// Capital used to turn the suggested position share into an amount
    #[clap(long, env = "TICKAUDIT_CAPITAL", default_value = "100000")]
    pub capital: f64,
}

#[derive(Debug, Args)]
pub struct ReplayArgs {
    /// JSON-lines file, one raw quote per line
    #[clap(long)]
    pub input: PathBuf,

    /// Clock step for quotes without a timestamp
    #[clap(long, default_value = "3000")]
    pub step_ms: u64,

    #[clap(flatten)]
    pub session: SessionArgs,
}

#[derive(Debug, Args)]
pub struct WatchArgs {
    /// JSON file holding the latest raw quote, rewritten by the feed
    #[clap(long)]
    pub input: PathBuf,

    #[clap(long, env = "TICKAUDIT_INTERVAL_MS", default_value = "3000")]
    pub interval_ms: u64,

    /// Per-fetch timeout; a slow fetch skips the cycle
    #[clap(long, default_value = "1000")]
    pub timeout_ms: u64,

    /// Stop after this many cycles (runs until Ctrl-C when omitted)
    #[clap(long)]
    pub max_cycles: Option<u64>,

    #[clap(flatten)]
    pub session: SessionArgs,
}

impl WatchArgs {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms.max(1))
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms.max(1))
    }
}

/// Load the engine config named on the command line, or the defaults.
pub fn load_config(cli: &Cli) -> anyhow::Result<EngineConfig> {
    match &cli.config {
        Some(path) => EngineConfig::from_json_file(path)
            .with_context(|| format!("failed to load config {}", path.display())),
        None => {
            let cfg = EngineConfig::default();
            cfg.validate()?;
            Ok(cfg)
        }
    }
}
