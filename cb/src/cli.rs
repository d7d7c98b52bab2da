//! CLI command definitions and subcommands

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use tracing::debug;

use crate::channel::ChannelKind;

/// ChannelBridge - reactive consumers over message channels
#[derive(Parser)]
#[command(
    name = "cb",
    about = "Run reactive consumer bridges over direct, broadcast and queue channels",
    version = env!("CARGO_PKG_VERSION"),
    after_help = after_help(),
)]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true, help = "Path to config file")]
    pub config: Option<PathBuf>,

    /// Log level (TRACE, DEBUG, INFO, WARN, ERROR)
    #[arg(
        short = 'l',
        long = "log-level",
        global = true,
        help = "Log level (TRACE, DEBUG, INFO, WARN, ERROR)"
    )]
    pub log_level: Option<String>,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Command,
}

/// CLI subcommands
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Attach a bridge to a channel, send messages and cycle stop/start
    Demo {
        /// Channel kind to bridge
        #[arg(value_enum, value_name = "KIND")]
        kind: DemoKind,

        /// Messages to send before the stop/start cycle
        #[arg(short = 'n', long, default_value_t = 3)]
        count: usize,

        /// Demand requested per batch (unbounded when omitted)
        #[arg(short, long)]
        request: Option<u64>,
    },

    /// Print the effective configuration as YAML
    Config,
}

/// Channel kinds selectable from the command line
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum DemoKind {
    Direct,
    Broadcast,
    Queue,
}

impl From<DemoKind> for ChannelKind {
    fn from(kind: DemoKind) -> Self {
        match kind {
            DemoKind::Direct => ChannelKind::Direct,
            DemoKind::Broadcast => ChannelKind::Broadcast,
            DemoKind::Queue => ChannelKind::Queue,
        }
    }
}

/// Directory holding the log file
pub fn get_log_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("channelbridge")
        .join("logs")
}

pub fn get_log_path() -> PathBuf {
    debug!("get_log_path: called");
    get_log_dir().join("cb.log")
}

fn after_help() -> String {
    format!("Logs are written to: {}", get_log_path().display())
}
