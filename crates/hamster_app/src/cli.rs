use std::path::PathBuf;

use clap::{Parser, Subcommand};
use hamster_core::ReadyWait;

use crate::logging::LogDestination;

/// Backup Hamster - batch personalize and download purchased assets
#[derive(Parser, Debug)]
#[command(name = "hamster")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// RON config file (defaults to ./hamster.ron when present)
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// JSON file backing the extension storage
    #[arg(long, global = true, value_name = "PATH")]
    pub store: Option<PathBuf>,

    /// Where log output goes
    #[arg(long, global = true, value_enum)]
    pub log: Option<LogDestination>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// List downloadable rows of an assets page with their history state
    Scan {
        /// Saved assets page (HTML)
        #[arg(long, value_name = "FILE")]
        page: PathBuf,

        /// Only list rows whose title contains every word
        #[arg(long, default_value = "")]
        filter: String,
    },

    /// Apply a title filter to an assets page and print the visible row count
    Filter {
        #[arg(long, value_name = "FILE")]
        page: PathBuf,

        #[arg(long)]
        filter: String,
    },

    /// Run the personalize, ready and download workflow against a page
    Run {
        #[arg(long, value_name = "FILE")]
        page: PathBuf,

        #[arg(long)]
        filter: String,

        /// Seconds between consecutive clicks
        #[arg(long)]
        delay: Option<u64>,

        /// Wait before the ready phase: per-file, fixed:SECONDS or poll:INTERVAL_MS:TIMEOUT_SECONDS
        #[arg(long, value_name = "POLICY")]
        wait: Option<ReadyWait>,

        /// Skip files downloaded since their last update
        #[arg(long)]
        skip_unchanged: bool,
    },

    /// Show the stored download history
    History,

    /// Show or update preferences
    Prefs {
        #[arg(long)]
        setting1: Option<String>,

        #[arg(long)]
        setting2: Option<String>,

        /// Remove stored preferences
        #[arg(long, conflicts_with_all = ["setting1", "setting2"])]
        clear: bool,
    },

    /// Download a single file to disk
    Fetch {
        url: String,

        path: PathBuf,
    },
}
