//! Secret Song Stash CLI
//!
//! Command-line tools for the confidential submission layer.
//!
//! # Usage
//!
//! ```bash
//! # Write the local preset configuration
//! stash config init --network local
//!
//! # Generate a session key pair
//! stash keygen
//!
//! # Encrypt a play duration with its range proof
//! stash encrypt 125 --kind play
//!
//! # Run the end-to-end flow against the in-memory ledger
//! stash demo --plays 125,240 --royalties 1000
//! ```

use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod commands;
mod config;
mod keyfile;
mod logging;

use commands::{ConfigCommand, Context, DemoCommand, EncryptCommand, KeygenCommand};
use logging::LogFormat;

/// Secret Song Stash
#[derive(Parser)]
#[command(name = "stash")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Confidential song telemetry and royalty submission", long_about = None)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, global = true, env = "STASH_CONFIG")]
    config: Option<PathBuf>,

    /// Data directory
    #[arg(short, long, global = true, env = "STASH_DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// Network preset (local, sepolia)
    #[arg(short, long, global = true, env = "STASH_NETWORK", default_value = "local")]
    network: String,

    /// Log level (trace, debug, info, warn, error), overrides the config file
    #[arg(long, global = true, env = "STASH_LOG_LEVEL")]
    log_level: Option<String>,

    /// Output logs as JSON
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate a session key pair
    Keygen(KeygenCommand),

    /// Encrypt a value with a range proof
    Encrypt(EncryptCommand),

    /// Run the end-to-end flow against an in-memory ledger
    Demo(DemoCommand),

    /// Manage the configuration file
    Config(ConfigCommand),

    /// Show version information
    Version,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let data_dir = cli
        .data_dir
        .unwrap_or_else(|| config::default_data_dir(&cli.network));
    let ctx = Context::new(cli.network, data_dir, cli.config);

    // Logging follows the config file unless overridden on the command line
    let logging = ctx.load_config().map(|c| c.logging).unwrap_or_default();
    let level = cli.log_level.unwrap_or(logging.level);
    logging::init(&level, LogFormat::resolve(cli.json_logs, &logging.format))?;

    match cli.command {
        Commands::Keygen(cmd) => cmd.execute(&ctx).await,
        Commands::Encrypt(cmd) => cmd.execute(&ctx).await,
        Commands::Demo(cmd) => cmd.execute(&ctx).await,
        Commands::Config(cmd) => cmd.execute(&ctx).await,
        Commands::Version => {
            println!("stash {}", env!("CARGO_PKG_VERSION"));
            println!("Scheme: Paillier + Catalano-Fiore, range proof v{}", stash_fhe::PROOF_VERSION);
            println!("Contract: {}", stash_contracts::CONTRACT_NAME);
            Ok(())
        }
    }
}
