//! Config Command - Create or show the configuration file

use clap::{Args, Subcommand};
use tracing::info;

use super::Context;
use crate::config::StashConfig;

/// Manage the configuration file
#[derive(Args)]
pub struct ConfigCommand {
    #[command(subcommand)]
    action: ConfigAction,
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Write the preset for the selected network
    Init {
        /// Force overwrite existing configuration
        #[arg(short, long)]
        force: bool,
    },

    /// Print the effective configuration
    Show,
}

impl ConfigCommand {
    pub async fn execute(self, ctx: &Context) -> anyhow::Result<()> {
        match self.action {
            ConfigAction::Init { force } => {
                if ctx.config_path.exists() && !force {
                    anyhow::bail!(
                        "Configuration already exists at {}. Use --force to overwrite.",
                        ctx.config_path.display()
                    );
                }
                let config = StashConfig::for_network(&ctx.network);
                config.save(&ctx.config_path)?;
                info!(network = %ctx.network, path = %ctx.config_path.display(), "configuration saved");

                println!("Configuration written to {}", ctx.config_path.display());
                println!("Network: {} (chain id {})", config.network.name, config.network.chain_id);
                Ok(())
            }
            ConfigAction::Show => {
                let config = ctx.load_config()?;
                print!("{}", toml::to_string_pretty(&config)?);
                Ok(())
            }
        }
    }
}
