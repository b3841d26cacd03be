//! TagIt - chat bot that organizes links under user-defined tags

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tagit::{Bot, TagItConfig};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "tagit")]
#[command(version)]
#[command(about = "Chat bot that organizes links under user-defined tags")]
struct Cli {
    /// Configuration file path
    #[arg(short, long, env = "TAGIT_CONFIG")]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the bot
    Run,

    /// Show configuration
    Config {
        /// Show default configuration
        #[arg(long)]
        default: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("tagit={}", log_level).into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = if let Some(config_path) = &cli.config {
        let content = std::fs::read_to_string(config_path)?;
        toml::from_str(&content)?
    } else {
        TagItConfig::default()
    };

    match cli.command {
        Commands::Run => {
            run_bot(config).await?;
        }
        Commands::Config { default } => {
            show_config(if default { None } else { Some(&config) })?;
        }
    }

    Ok(())
}

async fn run_bot(config: TagItConfig) -> Result<()> {
    let bot = Bot::new(config).await?;
    bot.start().await?;

    tracing::info!("TagIt is running. Press Ctrl+C to stop.");
    tokio::signal::ctrl_c().await?;

    tracing::info!("Shutting down...");
    bot.stop().await?;

    Ok(())
}

fn show_config(config: Option<&TagItConfig>) -> Result<()> {
    let config = config.cloned().unwrap_or_default();
    let toml = toml::to_string_pretty(&config)?;
    println!("{}", toml);
    Ok(())
}
