//! Solana wallet tax normalizer
//!
//! Fetches a wallet's transaction history, normalizes it into classified
//! tax-ledger records and reports spam and losses along the way.

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::error;

use soltax::cli::commands;
use soltax::config::Config;

/// Wallet activity normalization and classification for tax reporting
#[derive(Parser)]
#[command(name = "soltax")]
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
    /// Fetch a wallet's history and run the full pipeline
    Fetch {
        /// Wallet address (base58)
        wallet: String,

        /// Maximum number of transactions to fetch
        #[arg(short, long, default_value = "100")]
        limit: usize,

        /// Write JSON output to this file instead of stdout
        #[arg(short, long)]
        output: Option<String>,

        /// Keep spam transactions in the output
        #[arg(long)]
        include_spam: bool,

        /// Skip the external model, heuristics only
        #[arg(long)]
        no_model: bool,
    },

    /// Run the pipeline offline over a JSON transfer dump
    Process {
        /// Path to a JSON array of raw transfers
        input: String,

        /// Keep spam transactions in the output
        #[arg(long)]
        include_spam: bool,
    },

    /// Show current configuration (secrets masked)
    Config,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("soltax=info".parse().unwrap()),
        )
        .with_target(true)
        .init();

    // Parse CLI arguments
    let cli = Cli::parse();

    // Load configuration
    let config = match Config::load(&cli.config) {
        Ok(cfg) => cfg,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };

    // Execute command
    let result = match cli.command {
        Commands::Fetch {
            wallet,
            limit,
            output,
            include_spam,
            no_model,
        } => {
            commands::fetch(
                &config,
                &wallet,
                limit,
                output.as_deref(),
                include_spam,
                no_model,
            )
            .await
        }
        Commands::Process {
            input,
            include_spam,
        } => commands::process(&config, &input, include_spam).await,
        Commands::Config => commands::show_config(&config),
    };

    if let Err(e) = result {
        error!("Command failed: {}", e);
        std::process::exit(1);
    }

    Ok(())
}
