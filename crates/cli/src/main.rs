//! flipcast CLI entry point.
//!
//! Opens the configured message cache, runs one subcommand and prints its
//! JSON result on stdout. Logging goes to stderr so stdout stays parseable.

use anyhow::{Context, Result};
use clap::Parser;
use flipcast_core::{AppConfig, MessageCache};
use tokio::io::AsyncReadExt;
use tracing_subscriber::EnvFilter;

use cli::{Cli, Commands, LimitAction, PrefsAction};

mod cli;
mod commands;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .json()
        .init();

    let args = Cli::parse();

    let mut config = AppConfig::load().context("failed to load configuration")?;
    if let Some(db) = args.db {
        config.db_path = db;
    }
    let scheme = config.address_scheme()?;

    tracing::info!(db_path = %config.db_path.display(), "Opening message cache");
    let cache = MessageCache::open(&config).await?;

    let output = match args.command {
        Commands::List { status } => commands::list(&cache, status.as_deref()).await,
        Commands::Get { id } => commands::get(&cache, &id).await,
        Commands::Count { status } => commands::count(&cache, status.as_deref()).await,
        Commands::Insert { json } => match read_message_json(json).await {
            Ok(raw) => commands::insert(&cache, &raw).await,
            Err(e) => Err(e),
        },
        Commands::Delete { id } => commands::delete(&cache, &id).await,
        Commands::Clear => commands::clear(&cache).await,
        Commands::MarkRead { id } => commands::mark_read(&cache, &id).await,
        Commands::Limit { action: LimitAction::Get } => commands::limit_get(&cache).await,
        Commands::Limit { action: LimitAction::Set { limit } } => commands::limit_set(&cache, limit).await,
        Commands::Prefs { action: PrefsAction::Get } => commands::prefs_get(&cache).await,
        Commands::Prefs { action: PrefsAction::Set { poll_interval_ms, boot_persist } } => {
            commands::prefs_set(&cache, poll_interval_ms, boot_persist).await
        }
        Commands::Resolve { uri } => commands::resolve(&cache, &scheme, &uri).await,
    };

    cache.close().await?;

    println!("{}", serde_json::to_string_pretty(&output?)?);
    Ok(())
}

/// The message argument, or stdin when it is absent or `-`.
async fn read_message_json(arg: Option<String>) -> Result<String> {
    match arg {
        Some(json) if json != "-" => Ok(json),
        _ => {
            let mut buf = String::new();
            tokio::io::stdin()
                .read_to_string(&mut buf)
                .await
                .context("failed to read message JSON from stdin")?;
            Ok(buf)
        }
    }
}
