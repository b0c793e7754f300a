//! Keygen Command - Generate a session key pair

use std::path::PathBuf;

use clap::Args;
use stash_fhe::KeyPair;
use tracing::info;

use super::Context;
use crate::keyfile;

/// Generate a session key pair and store it in the data directory
#[derive(Args)]
pub struct KeygenCommand {
    /// Key file to write (default: <data-dir>/keys/session.key)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Overwrite an existing key file
    #[arg(short, long)]
    force: bool,
}

impl KeygenCommand {
    pub async fn execute(self, ctx: &Context) -> anyhow::Result<()> {
        let config = ctx.load_config()?;
        let path = self
            .output
            .unwrap_or_else(|| keyfile::default_key_path(&ctx.data_dir));
        if path.exists() && !self.force {
            anyhow::bail!(
                "Key file {} already exists. Use --force to overwrite.",
                path.display()
            );
        }

        info!(modulus_bits = config.fhe.modulus_bits, "generating key pair");
        let fhe = config.fhe.clone();
        let pair = tokio::task::spawn_blocking(move || KeyPair::generate(&fhe)).await??;
        keyfile::save(&pair, &path)?;

        let summary = serde_json::json!({
            "key_id": pair.id().to_string(),
            "modulus_bits": pair.public.modulus_bits(),
            "public_key_len": pair.public.modulus_len(),
            "path": path.display().to_string(),
        });
        println!("{}", serde_json::to_string_pretty(&summary)?);
        Ok(())
    }
}
