//! Token Scout - autonomous token discovery and trading engine
//!
//! # WARNING
//! - This bot trades with real money. Only use funds you can afford to lose.
//! - Most newly listed tokens go to zero (rug pulls, abandonment).
//! - Paper results do NOT equal live results.

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::error;

// Use the library crate
use tokenscout::cli::commands;
use tokenscout::config::Config;

/// Token scout - discovery, scoring and position lifecycle engine
#[derive(Parser)]
#[command(name = "tokenscout")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to config file
    #[arg(short, long, default_value = "config.toml")]
    config: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the scout engine
    Start {
        /// Trade with a simulated balance instead of real funds
        #[arg(long)]
        paper: bool,
    },

    /// Show persisted positions and cooldown state
    Status,

    /// Show current configuration (secrets masked)
    Config,

    /// Check provider reachability
    Health,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("tokenscout=info".parse().unwrap()),
        )
        .with_target(true)
        .init();

    // Parse CLI arguments
    let cli = Cli::parse();

    // Load configuration; invalid configuration is fatal.
    let config = match Config::load(&cli.config) {
        Ok(cfg) => cfg,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };

    let result = match cli.command {
        Commands::Start { paper } => commands::start(&config, paper).await,
        Commands::Status => commands::status(&config).await,
        Commands::Config => commands::show_config(&config),
        Commands::Health => commands::health(&config).await,
    };

    if let Err(e) = result {
        error!("Command failed: {}", e);
        std::process::exit(1);
    }

    Ok(())
}
