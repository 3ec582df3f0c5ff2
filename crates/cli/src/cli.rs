//! CLI argument definitions for flipcast.
//!
//! All `clap` structures live here so that `main.rs` stays focused on
//! dispatching subcommands.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// flipcast -- inspect and maintain the local in-app message cache.
#[derive(Parser)]
#[command(
    name = "flipcast",
    version,
    about = "Inspect and maintain the flipcast in-app message cache",
    long_about = "Operator tool for the bounded local cache of in-app messages. \
                  Configuration comes from FLIPCAST_* environment variables and the \
                  TOML file named by FLIPCAST_CONFIG_FILE. Output is JSON on stdout."
)]
pub struct Cli {
    /// Cache database to open, overriding the configured db_path.
    #[arg(long, global = true)]
    pub db: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// List cached messages, newest first.
    List {
        /// Only list messages with this status (e.g. NEW, READ).
        #[arg(long, short)]
        status: Option<String>,
    },

    /// Show one message by id.
    Get {
        id: String,
    },

    /// Count cached messages.
    Count {
        #[arg(long, short)]
        status: Option<String>,
    },

    /// Store a message given as JSON, replacing any message with the same id.
    Insert {
        /// Message JSON. Read from stdin when omitted or `-`.
        json: Option<String>,
    },

    /// Delete one message by id.
    Delete {
        id: String,
    },

    /// Delete every cached message.
    Clear,

    /// Mark a message as read.
    MarkRead {
        id: String,
    },

    /// Show or change the cache limit.
    Limit {
        #[command(subcommand)]
        action: LimitAction,
    },

    /// Show or change the stored polling preferences.
    Prefs {
        #[command(subcommand)]
        action: PrefsAction,
    },

    /// Resolve a content:// address and list the messages it names.
    Resolve {
        uri: String,
    },
}

/// Actions on the cache limit.
#[derive(Subcommand)]
pub enum LimitAction {
    /// Print the current limit.
    Get,
    /// Store a new limit: -1 disables trimming, 0 restores the default.
    Set {
        #[arg(allow_hyphen_values = true)]
        limit: i64,
    },
}

/// Actions on the polling preferences.
#[derive(Subcommand)]
pub enum PrefsAction {
    /// Print the poll interval and boot-persist flag.
    Get,
    /// Change one or both preferences.
    Set {
        /// Interval between message polls, in milliseconds.
        #[arg(long)]
        poll_interval_ms: Option<u64>,

        /// Whether polling resumes after a restart.
        #[arg(long)]
        boot_persist: Option<bool>,
    },
}
