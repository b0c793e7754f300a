//! Contract payload preparation
//!
//! Maps a domain operation and its plaintext arguments to the exact call the
//! contract expects. Sensitive fields are encrypted on a blocking worker,
//! then validated locally; a field that fails validation aborts the
//! operation and no request is produced.

use std::sync::Arc;

use stash_contracts::abi::MAX_PARAM_SIZE;
use stash_contracts::ContractCall;
use stash_fhe::{
    DomainValue, EncryptedValue, EncryptionEngine, ProofValidator, PublicKey, ValueRange,
    DEFAULT_ROYALTY_RATE, MAX_ROYALTY_RATE,
};

use crate::config::ClientConfig;
use crate::errors::{ClientError, ClientResult};
use crate::lifecycle::{EventSink, StepStatus, WorkflowStep};
use crate::transaction::{Operation, TransactionRequest};

/// Public metadata of a new song
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SongMetadata {
    pub title: String,
    pub artist: String,
    pub ipfs_hash: String,
    /// Percentage paid to the artist, 90 when unset
    pub royalty_rate: Option<u64>,
}

impl SongMetadata {
    pub fn new(title: impl Into<String>, artist: impl Into<String>, ipfs_hash: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            artist: artist.into(),
            ipfs_hash: ipfs_hash.into(),
            royalty_rate: None,
        }
    }

    pub fn with_royalty_rate(mut self, rate: u64) -> Self {
        self.royalty_rate = Some(rate);
        self
    }

    /// Check all fields, returning the effective royalty rate
    pub fn validate(&self) -> ClientResult<u64> {
        for (name, value) in [
            ("title", &self.title),
            ("artist", &self.artist),
            ("ipfsHash", &self.ipfs_hash),
        ] {
            if value.trim().is_empty() {
                return Err(ClientError::Validation(format!("{} must not be empty", name)));
            }
            if value.len() > MAX_PARAM_SIZE {
                return Err(ClientError::Validation(format!("{} is too long", name)));
            }
        }
        let rate = self.royalty_rate.unwrap_or(DEFAULT_ROYALTY_RATE);
        if rate > MAX_ROYALTY_RATE {
            return Err(ClientError::Validation(format!(
                "royalty rate {} exceeds {}",
                rate, MAX_ROYALTY_RATE
            )));
        }
        Ok(rate)
    }
}

/// Builds validated [`TransactionRequest`]s
pub struct ContractDataPreparer {
    engine: EncryptionEngine,
    public_key: PublicKey,
    validator: Arc<ProofValidator>,
    max_play_seconds: u64,
    events: EventSink,
}

impl ContractDataPreparer {
    pub fn new(
        engine: EncryptionEngine,
        public_key: PublicKey,
        validator: Arc<ProofValidator>,
        max_play_seconds: u64,
    ) -> Self {
        Self {
            engine,
            public_key,
            validator,
            max_play_seconds,
            events: EventSink::disabled(),
        }
    }

    /// Preparer that encrypts under `public_key` and self-checks against it
    pub fn for_key(public_key: &PublicKey, config: &ClientConfig) -> Self {
        Self::new(
            EncryptionEngine::new(config.fhe.clone()),
            public_key.clone(),
            Arc::new(ProofValidator::with_key(public_key)),
            config.max_play_seconds,
        )
    }

    pub fn with_events(mut self, events: EventSink) -> Self {
        self.events = events;
        self
    }

    pub fn public_key(&self) -> &PublicKey {
        &self.public_key
    }

    /// Accepted range for play durations
    pub fn play_duration_range(&self) -> ValueRange {
        ValueRange::play_duration(self.max_play_seconds)
    }

    /// `createSong(title, artist, ipfsHash, royaltyRate)`, all plaintext
    pub async fn create_song(&self, metadata: &SongMetadata) -> ClientResult<TransactionRequest> {
        let op = Operation::CreateSong;
        let rate = self.collect(op, || metadata.validate()).await?;
        let call = ContractCall::create_song(&metadata.title, &metadata.artist, &metadata.ipfs_hash, rate);
        Ok(TransactionRequest::new(op, call, Vec::new()))
    }

    /// `recordPlay(songId, playDuration, inputProof)`
    pub async fn record_play(&self, song_id: u64, duration_secs: u64) -> ClientResult<TransactionRequest> {
        let op = Operation::RecordPlay;
        let range = self.play_duration_range();
        self.collect(op, || {
            check_song_id(song_id)?;
            check_range("playDuration", duration_secs, range)
        })
        .await?;

        let duration = self.encrypt_field(op, "playDuration", duration_secs, range).await?;
        let call = ContractCall::record_play(song_id, duration.ciphertext().to_vec(), proof_bytes(&duration)?);
        Ok(TransactionRequest::new(op, call, vec![duration]))
    }

    /// `distributeRoyalties(songId, totalAmount, inputProof)`
    pub async fn distribute_royalties(&self, song_id: u64, amount: u64) -> ClientResult<TransactionRequest> {
        let op = Operation::DistributeRoyalties;
        let range = ValueRange::royalty_amount();
        self.collect(op, || check_song_id(song_id)).await?;

        let total = self.encrypt_field(op, "totalAmount", amount, range).await?;
        let call = ContractCall::distribute_royalties(song_id, total.ciphertext().to_vec(), proof_bytes(&total)?);
        Ok(TransactionRequest::new(op, call, vec![total]))
    }

    async fn collect<T>(&self, op: Operation, check: impl FnOnce() -> ClientResult<T>) -> ClientResult<T> {
        self.events.emit(op, WorkflowStep::Collect, StepStatus::Processing);
        match check() {
            Ok(value) => {
                self.events.emit(op, WorkflowStep::Collect, StepStatus::Completed);
                Ok(value)
            }
            Err(err) => {
                tracing::debug!(%op, error = %err, "arguments rejected");
                self.events.emit(op, WorkflowStep::Collect, StepStatus::Failed);
                Err(err)
            }
        }
    }

    /// Encrypt one field off the async executor, then validate its proof
    async fn encrypt_field(
        &self,
        op: Operation,
        field: &'static str,
        value: u64,
        range: ValueRange,
    ) -> ClientResult<EncryptedValue> {
        let domain = DomainValue::new(value, range)?;

        self.events.emit(op, WorkflowStep::Encrypt, StepStatus::Processing);
        let engine = self.engine.clone();
        let public_key = self.public_key.clone();
        let encrypted = tokio::task::spawn_blocking(move || engine.encrypt(&domain, &public_key))
            .await
            .map_err(ClientError::from)
            .and_then(|result| result.map_err(ClientError::from));
        let encrypted = match encrypted {
            Ok(encrypted) => encrypted,
            Err(err) => {
                tracing::warn!(%op, field, error = %err, "encryption failed");
                self.events.emit(op, WorkflowStep::Encrypt, StepStatus::Failed);
                return Err(err);
            }
        };
        self.events.emit(op, WorkflowStep::Encrypt, StepStatus::Completed);

        self.events.emit(op, WorkflowStep::Prove, StepStatus::Processing);
        let validator = Arc::clone(&self.validator);
        let (encrypted, valid) = tokio::task::spawn_blocking(move || {
            let valid = validator.validate_value(&encrypted, range);
            (encrypted, valid)
        })
        .await?;
        if !valid {
            tracing::warn!(%op, field, "local proof validation failed");
            self.events.emit(op, WorkflowStep::Prove, StepStatus::Failed);
            return Err(ClientError::Proof(format!(
                "{} failed local proof validation",
                field
            )));
        }
        self.events.emit(op, WorkflowStep::Prove, StepStatus::Completed);

        tracing::debug!(
            %op,
            field,
            key_id = %encrypted.public_key_ref(),
            ciphertext_len = encrypted.ciphertext().len(),
            "field encrypted and validated"
        );
        Ok(encrypted)
    }
}

fn check_song_id(song_id: u64) -> ClientResult<()> {
    if song_id == 0 {
        return Err(ClientError::Validation("song ids start at 1".into()));
    }
    Ok(())
}

fn check_range(field: &str, value: u64, range: ValueRange) -> ClientResult<()> {
    if !range.contains(value) {
        return Err(ClientError::Validation(format!(
            "{} {} outside 0..={}",
            field,
            value,
            range.max()
        )));
    }
    Ok(())
}

fn proof_bytes(value: &EncryptedValue) -> ClientResult<Vec<u8>> {
    value
        .proof()
        .map(<[u8]>::to_vec)
        .ok_or_else(|| ClientError::Proof("encrypted value carries no proof".into()))
}
