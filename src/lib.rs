pub mod cli;
pub mod config;
pub mod db;
pub mod entities;
pub mod lockout;
pub mod services;
pub mod validation;

pub use config::Config;

use clap::Parser;
use tracing_subscriber::EnvFilter;

pub async fn run() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let args = cli::Cli::parse();

    let config = Config::load()?;
    config.validate()?;

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.general.log_level));

    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    cli::execute(args.command, config).await
}
