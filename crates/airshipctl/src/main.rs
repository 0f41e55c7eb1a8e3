//! airshipctl - fleet deployment and lifecycle commands

mod cli;
mod commander;
mod commands;
mod output;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use cli::{Cli, Commands};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_target(false)
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Serve => {
            let config = cli
                .config_file
                .as_deref()
                .context("serve requires --config <file>")?;
            commands::serve::execute(config).await
        }
        ref command => {
            let commander = commander::create(&cli).await?;
            commands::execute(commander.as_ref(), command, cli.force).await
        }
    }
}
