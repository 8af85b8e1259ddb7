//! CLI Module
//!
//! Command-line interface for WaCrab using Clap v4. Running with no
//! subcommand starts the bot and the web console.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::sync::Arc;

use crate::bot::{BotState, Supervisor};
use crate::config::Config;
use crate::gateway;

/// WaCrab - WhatsApp Automation Bot
#[derive(Parser, Debug)]
#[command(name = "wacrab")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Enable debug mode (creates log files in .wacrab/logs/)
    #[arg(short, long, global = true)]
    pub debug: bool,

    /// Configuration file path
    #[arg(short, long, global = true)]
    pub config: Option<String>,

    /// Override the web console port
    #[arg(short, long, global = true)]
    pub port: Option<u16>,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Write a default configuration file (./wacrab.toml)
    Init {
        /// Force overwrite existing configuration
        #[arg(short, long)]
        force: bool,
    },
}

/// Run the CLI application.
pub async fn run() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Init { force }) => init_config(force),
        None => run_bot(&cli).await,
    }
}

/// Write a default config file for the user to edit.
fn init_config(force: bool) -> Result<()> {
    let path = std::path::Path::new("./wacrab.toml");
    if path.exists() && !force {
        anyhow::bail!("{:?} already exists (use --force to overwrite)", path);
    }
    Config::default().save(path)?;
    println!("Wrote default configuration to {:?}", path);
    Ok(())
}

/// Start the supervisor and serve the web console until shutdown.
async fn run_bot(cli: &Cli) -> Result<()> {
    let mut config = match &cli.config {
        Some(path) => Config::load_from_path(path)
            .with_context(|| format!("Failed to load config from {path}"))?,
        None => Config::load().context("Failed to load configuration")?,
    };
    if let Some(port) = cli.port {
        config.gateway.port = port;
    }

    tracing::info!(
        "🦀 {} v{} starting (prefix: {:?}, port: {})",
        config.bot.name,
        crate::VERSION,
        config.bot.prefix,
        config.gateway.port,
    );

    let state = Arc::new(BotState::new(&config.bot.name, &config.bot.prefix));
    let supervisor = Supervisor::spawn(state.clone(), config.bot.clone());

    gateway::serve(&config.gateway, state, supervisor).await
}
