//! Demo Command - End-to-end flow against the in-memory ledger

use std::sync::Arc;

use clap::Args;
use stash_client::{
    CiphertextHandle, EventSink, InMemoryLedger, LifecycleEvent, SongMetadata, StashSession,
    StepStatus, TransactionState, TransactionStatus,
};
use tokio::sync::mpsc;
use tracing::info;

use super::Context;

/// Register a song, record encrypted plays and royalties, then read back
/// and decrypt the contract totals
#[derive(Args)]
pub struct DemoCommand {
    #[arg(long, default_value = "Midnight Frequencies")]
    title: String,

    #[arg(long, default_value = "Luna Echo")]
    artist: String,

    #[arg(long, default_value = "QmSecretSongStashDemo")]
    ipfs_hash: String,

    /// Royalty rate in percent
    #[arg(long, default_value_t = 90)]
    royalty_rate: u64,

    /// Play durations to record, in seconds
    #[arg(long, value_delimiter = ',', default_value = "125,240,61")]
    plays: Vec<u64>,

    /// Royalty amount to distribute
    #[arg(long, default_value_t = 1000)]
    royalties: u64,

    /// Print the summary as JSON
    #[arg(long)]
    json: bool,
}

impl DemoCommand {
    pub async fn execute(self, ctx: &Context) -> anyhow::Result<()> {
        let config = ctx.load_config()?.client_config();
        let ledger = Arc::new(InMemoryLedger::new(config.max_play_seconds));

        let (event_tx, event_rx) = mpsc::channel(64);
        let printer = tokio::spawn(print_events(event_rx, !self.json));

        info!(modulus_bits = config.fhe.modulus_bits, "starting session");
        let session = StashSession::connect(config, ledger.clone(), ledger.clone())
            .await?
            .with_events(EventSink::new(event_tx));
        ledger.register_key(session.public_key());

        let metadata = SongMetadata::new(&self.title, &self.artist, &self.ipfs_hash)
            .with_royalty_rate(self.royalty_rate);
        let created = session.create_song(metadata).await?;
        let hash = created.hash;
        finish(&session, created)?;
        let song_id = hash
            .and_then(|hash| ledger.returned_id(&hash))
            .ok_or_else(|| anyhow::anyhow!("createSong confirmed without a song id"))?;

        for duration in &self.plays {
            finish(&session, session.record_play(song_id, *duration).await?)?;
        }
        finish(&session, session.distribute_royalties(song_id, self.royalties).await?)?;

        let record = session.song_info(song_id).await?;
        let plays = match &record.total_plays {
            Some(handle) => session.decrypt(handle).await?,
            None => 0,
        };
        let earnings = match &record.total_earnings {
            Some(handle) => session.decrypt(handle).await?,
            None => 0,
        };
        let listening_time = ledger.with_registry(|registry| {
            registry
                .listening_time(song_id)
                .map(|total| total.map(|v| CiphertextHandle::new(v.ciphertext().to_vec())))
        })?;
        let listening_secs = match &listening_time {
            Some(handle) => session.decrypt(handle).await?,
            None => 0,
        };

        drop(session);
        printer.await?;

        let summary = serde_json::json!({
            "song_id": song_id,
            "title": record.title,
            "artist": record.artist,
            "royalty_rate": record.royalty_rate,
            "owner": format!("0x{}", hex::encode(record.owner)),
            "total_plays": plays,
            "total_listening_seconds": listening_secs,
            "total_earnings": earnings,
            "ledger_blocks": ledger.block_number(),
        });
        if self.json {
            println!("{}", serde_json::to_string_pretty(&summary)?);
        } else {
            println!();
            println!("Song #{}: {} by {}", song_id, record.title, record.artist);
            println!("  royalty rate:    {}%", record.royalty_rate);
            println!("  plays:           {}", plays);
            println!("  listening time:  {}s", listening_secs);
            println!("  earnings:        {}", earnings);
        }
        Ok(())
    }
}

fn finish(session: &StashSession, state: TransactionState) -> anyhow::Result<()> {
    match state.status {
        TransactionStatus::Confirmed => {
            session.reset();
            Ok(())
        }
        other => anyhow::bail!(
            "transaction ended in {:?}: {}",
            other,
            state.error.unwrap_or_default()
        ),
    }
}

async fn print_events(mut events: mpsc::Receiver<LifecycleEvent>, verbose: bool) {
    while let Some(event) = events.recv().await {
        if !verbose {
            continue;
        }
        let marker = match event.status {
            StepStatus::Processing => "..",
            StepStatus::Completed => "ok",
            StepStatus::Failed => "!!",
        };
        println!("[{}] {:<20} {:?}", marker, event.operation.to_string(), event.step);
    }
}
