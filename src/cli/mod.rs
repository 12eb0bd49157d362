//! Operational command-line interface.
//!
//! The auth core itself is a library; these commands cover deployment
//! chores (config bootstrap, migrations) and audit forensics.

use anyhow::Result;
use clap::{Parser, Subcommand};

use crate::config::Config;
use crate::db::Store;

/// Retropodo - account-security core for podiatry practice administration
#[derive(Parser)]
#[command(name = "retropodo")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Write a default config.toml if none exists
    Init,

    /// Connect to the configured database and apply pending migrations
    Migrate,

    /// Print the most recent audit events, newest first
    Events {
        /// Number of events to show
        #[arg(long, default_value_t = 20)]
        limit: u64,
    },
}

pub async fn execute(command: Commands, config: Config) -> Result<()> {
    match command {
        Commands::Init => cmd_init(),
        Commands::Migrate => cmd_migrate(&config).await,
        Commands::Events { limit } => cmd_events(&config, limit).await,
    }
}

fn cmd_init() -> Result<()> {
    if Config::create_default_if_missing()? {
        println!("Created default config.toml");
    } else {
        println!("config.toml already exists, leaving it untouched");
    }
    Ok(())
}

async fn cmd_migrate(config: &Config) -> Result<()> {
    let store = connect(config).await?;
    store.ping().await?;

    println!("Database ready: {}", config.general.database_path);
    Ok(())
}

async fn cmd_events(config: &Config, limit: u64) -> Result<()> {
    let store = connect(config).await?;
    let events = store.recent_auth_events(limit).await?;

    if events.is_empty() {
        println!("No audit events recorded.");
        return Ok(());
    }

    println!("Recent audit events (last {}):", events.len());
    println!("{:-<100}", "");

    for event in events {
        let outcome = if event.success { "ok" } else { "fail" };
        let user = event
            .user_id
            .map_or_else(|| "-".to_string(), |id| id.to_string());
        let email = event.email_normalized.as_deref().unwrap_or("-");

        println!(
            "{}  {:<22} {:<4} user={user} email={email}",
            event.created_at.format("%Y-%m-%d %H:%M:%S"),
            event.event_type,
            outcome,
        );

        if let Some(details) = &event.details {
            println!("  {details}");
        }
    }

    Ok(())
}

async fn connect(config: &Config) -> Result<Store> {
    Store::with_pool_options(
        &config.general.database_path,
        config.general.max_db_connections,
        config.general.min_db_connections,
    )
    .await
}
