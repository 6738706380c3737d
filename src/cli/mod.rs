pub mod commands;

use clap::{Parser, Subcommand};

use crate::config::PAGE_SIZE;

#[derive(Parser)]
#[command(name = "sift")]
#[command(about = "A self-sorting news feed", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Fetch, dedup and classify new items once
    Ingest,
    /// Print a tab
    Tab {
        /// Which tab: liked, disliked or all
        tab: String,

        /// Maximum rows to print
        #[arg(short, long, default_value_t = PAGE_SIZE)]
        limit: usize,
    },
    /// Reclassify one item
    Swipe {
        /// Canonical item id, e.g. "hn-41234567"
        id: String,

        /// "like" or "dislike"
        action: String,
    },
    /// Pending and history counts
    Status,
    /// Background daemon for periodic ingestion
    Daemon {
        #[command(subcommand)]
        action: DaemonAction,
    },
}

#[derive(Subcommand)]
pub enum DaemonAction {
    /// Start the background daemon
    Start {
        /// Cycle interval (e.g., "1h", "30m", "6h", "1d")
        #[arg(short, long, default_value = "1h")]
        interval: String,

        /// Skip initial cycle on start
        #[arg(long)]
        no_initial_cycle: bool,

        /// Log file path (default: stdout)
        #[arg(short, long)]
        log: Option<std::path::PathBuf>,

        /// Run in foreground (don't detach)
        #[arg(short, long)]
        foreground: bool,
    },
    /// Stop the running daemon
    Stop,
    /// Check daemon status
    Status,
}
