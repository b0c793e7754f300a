//! Session facade
//!
//! Owns the session key pair and wires the preparer, submitter and read
//! adapter to one connected account.

use std::sync::Arc;
use std::time::Duration;

use stash_contracts::Address;
use stash_fhe::{EncryptionEngine, KeyManager, KeyPair, KeyRef, PublicKey};
use tokio::sync::watch;

use crate::account::{AccountSession, TxHash};
use crate::config::ClientConfig;
use crate::errors::{ClientError, ClientResult};
use crate::lifecycle::{EventSink, TransactionState, TransactionSubmitter};
use crate::preparer::{ContractDataPreparer, SongMetadata};
use crate::reader::{CiphertextHandle, ContractReadAdapter, ContractReader, SongRecord};
use crate::transaction::TransactionRequest;

/// One client session against the song stash contract
pub struct StashSession {
    config: ClientConfig,
    keys: Arc<KeyPair>,
    engine: EncryptionEngine,
    preparer: ContractDataPreparer,
    submitter: TransactionSubmitter,
    reader: ContractReadAdapter<Arc<dyn ContractReader>>,
    account: Arc<dyn AccountSession>,
}

impl StashSession {
    /// Start a session with a freshly generated key pair
    pub async fn connect(
        config: ClientConfig,
        account: Arc<dyn AccountSession>,
        reader: Arc<dyn ContractReader>,
    ) -> ClientResult<Self> {
        config.validate()?;
        let mut manager = KeyManager::new(config.fhe.clone());
        let keys = tokio::task::spawn_blocking(move || manager.generate_key_pair())
            .await
            .map_err(|e| ClientError::KeyGeneration(e.to_string()))??;
        tracing::info!(key_id = %keys.id(), "session key generated");
        Self::with_keys(config, keys, account, reader)
    }

    /// Start a session with an existing key pair
    pub fn with_keys(
        config: ClientConfig,
        keys: Arc<KeyPair>,
        account: Arc<dyn AccountSession>,
        reader: Arc<dyn ContractReader>,
    ) -> ClientResult<Self> {
        config.validate()?;
        Ok(Self {
            engine: EncryptionEngine::new(config.fhe.clone()),
            preparer: ContractDataPreparer::for_key(&keys.public, &config),
            submitter: TransactionSubmitter::new(Arc::clone(&account)),
            reader: ContractReadAdapter::new(reader),
            account,
            keys,
            config,
        })
    }

    /// Report workflow progress of every operation to `events`
    pub fn with_events(mut self, events: EventSink) -> Self {
        self.preparer = self.preparer.with_events(events.clone());
        self.submitter = self.submitter.with_events(events);
        self
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn public_key(&self) -> &PublicKey {
        &self.keys.public
    }

    pub fn key_id(&self) -> KeyRef {
        self.keys.id()
    }

    /// Register a song with public metadata
    pub async fn create_song(&self, metadata: SongMetadata) -> ClientResult<TransactionState> {
        self.ready().await?;
        let request = self.preparer.create_song(&metadata).await?;
        self.submit(request).await
    }

    /// Record an encrypted play duration for `song_id`
    pub async fn record_play(&self, song_id: u64, duration_secs: u64) -> ClientResult<TransactionState> {
        self.ready().await?;
        let request = self.preparer.record_play(song_id, duration_secs).await?;
        self.submit(request).await
    }

    /// Add an encrypted royalty amount to the earnings of `song_id`
    pub async fn distribute_royalties(&self, song_id: u64, amount: u64) -> ClientResult<TransactionState> {
        self.ready().await?;
        let request = self.preparer.distribute_royalties(song_id, amount).await?;
        self.submit(request).await
    }

    /// Resume waiting on a transaction left pending by a timeout
    pub async fn wait_for_confirmation(&self, timeout: Duration) -> ClientResult<TransactionState> {
        self.submitter.wait_for_confirmation(timeout).await
    }

    pub async fn song_info(&self, song_id: u64) -> ClientResult<SongRecord> {
        self.reader.get_info(song_id).await
    }

    /// Decrypt a contract total produced under this session's key
    pub async fn decrypt(&self, handle: &CiphertextHandle) -> ClientResult<u64> {
        let value = handle.to_encrypted_value()?;
        let engine = self.engine.clone();
        let keys = Arc::clone(&self.keys);
        let plaintext = tokio::task::spawn_blocking(move || engine.decrypt(&value, &keys.private))
            .await
            .map_err(|e| ClientError::Decryption(e.to_string()))??;
        Ok(plaintext)
    }

    pub fn state(&self) -> TransactionState {
        self.submitter.state()
    }

    pub fn subscribe(&self) -> watch::Receiver<TransactionState> {
        self.submitter.subscribe()
    }

    pub fn is_loading(&self) -> bool {
        self.state().is_loading()
    }

    pub fn is_success(&self) -> bool {
        self.state().is_success()
    }

    pub fn error(&self) -> Option<String> {
        self.state().error
    }

    pub fn hash(&self) -> Option<TxHash> {
        self.state().hash
    }

    /// Clear a finished transaction
    pub fn reset(&self) -> bool {
        self.submitter.reset()
    }

    pub async fn is_connected(&self) -> bool {
        self.account.is_connected().await
    }

    pub async fn address(&self) -> Option<Address> {
        self.account.current_address().await
    }

    /// Account and concurrency checks, before any crypto work
    async fn ready(&self) -> ClientResult<()> {
        if !self.account.is_connected().await {
            tracing::warn!("operation attempted without a connected account");
            return Err(ClientError::Account("account not connected".into()));
        }
        if self.submitter.is_busy() {
            return Err(ClientError::ConcurrentSubmission);
        }
        Ok(())
    }

    async fn submit(&self, request: TransactionRequest) -> ClientResult<TransactionState> {
        self.submitter
            .submit(request, self.config.confirmation_timeout())
            .await
    }
}
