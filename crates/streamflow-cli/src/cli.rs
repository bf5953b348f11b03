use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use clap_complete::Shell;

/// Output format for CLI commands
#[derive(ValueEnum, Clone, Copy, Debug, Default)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

impl OutputFormat {
    pub fn is_json(self) -> bool {
        matches!(self, OutputFormat::Json)
    }
}

#[derive(Parser)]
#[command(name = "streamflow")]
#[command(version, about = "StreamFlow - replay chat push streams into chat history")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Config file (defaults to ~/.config/streamflow/config.toml)
    #[arg(long, global = true, env = "STREAMFLOW_CONFIG")]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Output format
    #[arg(long, global = true, default_value = "text")]
    pub format: OutputFormat,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Generate shell completions
    Completions {
        #[arg(value_enum)]
        shell: Shell,
    },

    /// Replay a recorded event log through the stream engine
    Replay(ReplayArgs),
}

#[derive(Args)]
pub struct ReplayArgs {
    /// JSON Lines file of inbound events (each may carry `delayMs`)
    pub events: PathBuf,

    /// Chat the final message belongs to
    #[arg(long)]
    pub chat_id: Option<String>,

    /// Request id to subscribe with (random if omitted)
    #[arg(long)]
    pub request_id: Option<String>,

    /// Chat history file to commit into
    #[arg(long)]
    pub history: Option<PathBuf>,

    /// Label shown until content arrives
    #[arg(long)]
    pub label: Option<String>,

    /// Inactivity timeout in seconds
    #[arg(long)]
    pub timeout_secs: Option<u64>,

    /// Confirm a user stop after this many events
    #[arg(long)]
    pub stop_after: Option<usize>,
}
