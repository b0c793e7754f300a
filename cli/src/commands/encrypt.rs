//! Encrypt Command - Encrypt a value with a range proof

use std::path::PathBuf;

use clap::{Args, ValueEnum};
use stash_fhe::{DomainValue, EncryptionEngine, KeyPair, ProofValidator, ValueRange};
use tracing::{debug, info};

use super::Context;
use crate::keyfile;

#[derive(Clone, Copy, Debug, ValueEnum)]
enum ValueKind {
    /// Play duration in seconds
    Play,
    /// Royalty amount
    Royalty,
    /// Royalty rate, 0-100
    Rate,
}

/// Encrypt a value and print the ciphertext and proof
#[derive(Args)]
pub struct EncryptCommand {
    /// Plaintext value
    value: u64,

    /// Range the proof attests
    #[arg(short, long, value_enum, default_value = "play")]
    kind: ValueKind,

    /// Key file (default: <data-dir>/keys/session.key, or a throwaway key)
    #[arg(long)]
    key: Option<PathBuf>,
}

impl EncryptCommand {
    pub async fn execute(self, ctx: &Context) -> anyhow::Result<()> {
        let config = ctx.load_config()?;
        let range = match self.kind {
            ValueKind::Play => ValueRange::play_duration(config.submission.max_play_seconds),
            ValueKind::Royalty => ValueRange::royalty_amount(),
            ValueKind::Rate => ValueRange::royalty_rate(),
        };
        let value = DomainValue::new(self.value, range)?;

        let key_path = self
            .key
            .unwrap_or_else(|| keyfile::default_key_path(&ctx.data_dir));
        let pair = if key_path.exists() {
            debug!(path = %key_path.display(), "loading key file");
            keyfile::load(&key_path)?
        } else {
            info!("no key file found, using a throwaway key");
            let fhe = config.fhe.clone();
            tokio::task::spawn_blocking(move || KeyPair::generate(&fhe)).await??
        };

        let engine = EncryptionEngine::new(config.fhe.clone());
        let public_key = pair.public.clone();
        let encrypted =
            tokio::task::spawn_blocking(move || engine.encrypt(&value, &public_key)).await??;
        let valid = ProofValidator::with_key(&pair.public).validate_value(&encrypted, range);

        let output = serde_json::json!({
            "key_id": encrypted.public_key_ref().to_string(),
            "range_max": range.max(),
            "ciphertext": hex::encode(encrypted.ciphertext()),
            "proof": encrypted.proof().map(hex::encode),
            "valid": valid,
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
        Ok(())
    }
}
