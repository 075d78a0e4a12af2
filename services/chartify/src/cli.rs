//! Command-line interface

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use radio_charts::ChartKind;

#[derive(Debug, Parser)]
#[command(name = "chartify", version, about = "Turn Radio 357 charts into Spotify playlists")]
pub struct Cli {
    /// Config file (default: $CONFIG_PATH, then ./chartify.toml)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    pub log_json: bool,

    /// Print counters in Prometheus text format to stderr on exit
    #[arg(long, global = true)]
    pub metrics: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Authorize chartify with your Spotify account
    Login {
        /// Path handed back after a successful login
        #[arg(long, default_value = "/")]
        return_to: String,

        /// Seconds to wait for the browser redirect
        #[arg(long, default_value_t = 300)]
        timeout_secs: u64,
    },

    /// Forget the stored session
    Logout,

    /// Show the session state
    Status,

    /// Show the Spotify profile of the logged-in user
    Profile,

    /// List published charts, newest first
    Summaries {
        #[arg(long, default_value = "weekly")]
        kind: ChartKind,
    },

    /// Print a chart as `artist - title` lines
    Chart {
        #[arg(long, default_value = "weekly")]
        kind: ChartKind,

        /// Chart number (default: latest)
        number: Option<u32>,
    },

    /// Create a Spotify playlist from a chart
    Playlist {
        #[arg(long, default_value = "weekly")]
        kind: ChartKind,

        /// Chart number (default: latest)
        number: Option<u32>,

        /// Create the playlist as private
        #[arg(long)]
        private: bool,

        /// Search tracks and report, without creating anything
        #[arg(long)]
        dry_run: bool,
    },
}
