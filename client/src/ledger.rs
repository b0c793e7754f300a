//! In-memory reference ledger
//!
//! A single-account ledger backed by a [`SongRegistry`]. Calls travel as ABI
//! call data, are mined in submission order and produce receipts. Used by
//! tests and the CLI demo in place of a real network.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use parking_lot::Mutex;
use stash_contracts::abi::encode_return;
use stash_contracts::{
    ABIValue, Address, ContractCall, ContractError, ExecutionContext, SongRegistry,
};
use stash_fhe::PublicKey;
use tokio::sync::Notify;
use tokio::time::Instant;

use crate::account::{AccountSession, ReceiptStatus, TxHash};
use crate::errors::{ClientError, ClientResult};
use crate::reader::ContractReader;

/// Seconds between mined blocks
const BLOCK_TIME: u64 = 12;

/// Receipts kept before the oldest are forgotten
pub const DEFAULT_RECEIPT_LIMIT: usize = 4096;

/// Outcome of one mined transaction
struct MinedTx {
    status: ReceiptStatus,
    output: Vec<ABIValue>,
}

struct Chain {
    address: Address,
    connected: bool,
    auto_mine: bool,
    mempool: Vec<(TxHash, Vec<u8>)>,
    receipts: HashMap<TxHash, MinedTx>,
    receipt_order: VecDeque<TxHash>,
    receipt_limit: usize,
    reject_next: Option<String>,
    block_number: u64,
    timestamp: u64,
    submitted: u64,
}

impl Chain {
    fn tx_hash(&self, data: &[u8]) -> TxHash {
        let mut hasher = blake3::Hasher::new();
        hasher.update(&self.address);
        hasher.update(&self.submitted.to_be_bytes());
        hasher.update(data);
        TxHash(*hasher.finalize().as_bytes())
    }

    fn record(&mut self, hash: TxHash, mined: MinedTx) {
        self.receipts.insert(hash, mined);
        self.receipt_order.push_back(hash);
        while self.receipt_order.len() > self.receipt_limit {
            if let Some(oldest) = self.receipt_order.pop_front() {
                self.receipts.remove(&oldest);
            }
        }
    }
}

/// Contract state and chain bookkeeping under separate locks, so receipt
/// lookups never wait on proof verification.
struct LedgerCore {
    registry: Mutex<SongRegistry>,
    chain: Mutex<Chain>,
    receipts_changed: Notify,
}

impl LedgerCore {
    /// Execute every pending transaction in one block
    fn mine(&self) -> usize {
        // held across the whole block so batches execute in mempool order
        let mut registry = self.registry.lock();
        let (batch, ctx, block) = {
            let mut chain = self.chain.lock();
            if chain.mempool.is_empty() {
                return 0;
            }
            chain.block_number += 1;
            chain.timestamp += BLOCK_TIME;
            let ctx = ExecutionContext {
                caller: chain.address,
                timestamp: chain.timestamp,
            };
            // stays in the mempool until its receipt is recorded
            (chain.mempool.clone(), ctx, chain.block_number)
        };

        let included = batch.len();
        let mut mined = Vec::with_capacity(included);
        for (hash, data) in batch {
            let outcome = ContractCall::decode(&data).and_then(|call| registry.execute(&call, &ctx));
            let tx = match outcome {
                Ok(output) => MinedTx {
                    status: ReceiptStatus::Confirmed,
                    output,
                },
                Err(err) => {
                    tracing::debug!(%hash, error = %err, "transaction reverted");
                    MinedTx {
                        status: ReceiptStatus::Reverted {
                            reason: err.to_string(),
                        },
                        output: Vec::new(),
                    }
                }
            };
            mined.push((hash, tx));
        }
        drop(registry);

        {
            let mut chain = self.chain.lock();
            chain.mempool.drain(..included);
            for (hash, tx) in mined {
                chain.record(hash, tx);
            }
        }
        tracing::debug!(block, included, "mined block");
        self.receipts_changed.notify_waiters();
        included
    }
}

/// Simple in-memory ledger for testing and demos
pub struct InMemoryLedger {
    core: Arc<LedgerCore>,
}

impl InMemoryLedger {
    /// Connected ledger that mines every submission immediately
    pub fn new(max_play_seconds: u64) -> Self {
        let address = blake3::hash(b"stash/in-memory-ledger/account");
        let mut account = [0u8; 20];
        account.copy_from_slice(&address.as_bytes()[..20]);
        Self::with_address(max_play_seconds, account)
    }

    pub fn with_address(max_play_seconds: u64, address: Address) -> Self {
        Self {
            core: Arc::new(LedgerCore {
                registry: Mutex::new(SongRegistry::new(max_play_seconds)),
                chain: Mutex::new(Chain {
                    address,
                    connected: true,
                    auto_mine: true,
                    mempool: Vec::new(),
                    receipts: HashMap::new(),
                    receipt_order: VecDeque::new(),
                    receipt_limit: DEFAULT_RECEIPT_LIMIT,
                    reject_next: None,
                    block_number: 0,
                    timestamp: now(),
                    submitted: 0,
                }),
                receipts_changed: Notify::new(),
            }),
        }
    }

    /// Keep at most `limit` receipts, forgetting the oldest first
    pub fn with_receipt_limit(self, limit: usize) -> Self {
        self.core.chain.lock().receipt_limit = limit.max(1);
        self
    }

    /// Accept encrypted inputs produced under `public_key`
    pub fn register_key(&self, public_key: &PublicKey) {
        self.core.registry.lock().register_key(public_key);
    }

    pub fn connect(&self) {
        self.core.chain.lock().connected = true;
    }

    pub fn disconnect(&self) {
        self.core.chain.lock().connected = false;
    }

    /// Mine on every submission (default) or only on [`InMemoryLedger::mine`]
    pub fn set_auto_mine(&self, auto_mine: bool) {
        self.core.chain.lock().auto_mine = auto_mine;
    }

    /// Refuse the next submission with `reason`
    pub fn reject_next_submission(&self, reason: impl Into<String>) {
        self.core.chain.lock().reject_next = Some(reason.into());
    }

    pub fn pending_count(&self) -> usize {
        self.core.chain.lock().mempool.len()
    }

    pub fn block_number(&self) -> u64 {
        self.core.chain.lock().block_number
    }

    /// Receipt of `hash`, if mined and still retained
    pub fn receipt(&self, hash: &TxHash) -> Option<ReceiptStatus> {
        self.core
            .chain
            .lock()
            .receipts
            .get(hash)
            .map(|tx| tx.status.clone())
    }

    /// Values returned by the call mined as `hash`. Empty for reverted or
    /// unknown transactions.
    pub fn output(&self, hash: &TxHash) -> Vec<ABIValue> {
        self.core
            .chain
            .lock()
            .receipts
            .get(hash)
            .map(|tx| tx.output.clone())
            .unwrap_or_default()
    }

    /// Id returned by a confirmed `createSong`, `recordPlay` or
    /// `distributeRoyalties`
    pub fn returned_id(&self, hash: &TxHash) -> Option<u64> {
        self.output(hash).first().and_then(|value| value.as_uint().ok())
    }

    /// Read the contract state directly
    pub fn with_registry<T>(&self, f: impl FnOnce(&SongRegistry) -> T) -> T {
        f(&self.core.registry.lock())
    }

    /// Mine all pending transactions into one block. Returns how many were
    /// included.
    pub fn mine(&self) -> usize {
        self.core.mine()
    }
}

#[async_trait::async_trait]
impl AccountSession for InMemoryLedger {
    async fn current_address(&self) -> Option<Address> {
        let chain = self.core.chain.lock();
        chain.connected.then_some(chain.address)
    }

    async fn is_connected(&self) -> bool {
        self.core.chain.lock().connected
    }

    async fn submit(&self, call: &ContractCall) -> ClientResult<TxHash> {
        if !call.function().mutates() {
            return Err(ClientError::Submission(format!(
                "{} is read-only",
                call.name()
            )));
        }
        let data = call.encode()?;

        let (hash, auto_mine) = {
            let mut chain = self.core.chain.lock();
            if !chain.connected {
                return Err(ClientError::Account("account not connected".into()));
            }
            if let Some(reason) = chain.reject_next.take() {
                return Err(ClientError::Submission(reason));
            }
            let hash = chain.tx_hash(&data);
            chain.submitted += 1;
            chain.mempool.push((hash, data));
            (hash, chain.auto_mine)
        };
        tracing::debug!(function = call.name(), %hash, "accepted transaction");

        if auto_mine {
            // proof verification is CPU-bound
            let core = Arc::clone(&self.core);
            tokio::task::spawn_blocking(move || core.mine()).await?;
        }
        Ok(hash)
    }

    async fn await_receipt(&self, hash: &TxHash, timeout: Duration) -> ClientResult<ReceiptStatus> {
        let deadline = Instant::now() + timeout;
        loop {
            // register interest before checking, so a block mined in between wakes us
            let changed = self.core.receipts_changed.notified();
            {
                let chain = self.core.chain.lock();
                if let Some(tx) = chain.receipts.get(hash) {
                    return Ok(tx.status.clone());
                }
                if !chain.mempool.iter().any(|(pending, _)| pending == hash) {
                    return Err(ClientError::Submission(format!("unknown transaction {}", hash)));
                }
            }
            if tokio::time::timeout_at(deadline, changed).await.is_err() {
                return Ok(ReceiptStatus::Pending);
            }
        }
    }
}

#[async_trait::async_trait]
impl ContractReader for InMemoryLedger {
    async fn call(&self, call: &ContractCall) -> ClientResult<Vec<u8>> {
        if call.function().mutates() {
            return Err(ContractError::InvalidInput(format!(
                "{} changes state and cannot be read",
                call.name()
            ))
            .into());
        }
        let values = self.core.registry.lock().view(call)?;
        Ok(encode_return(&values)?)
    }
}

fn now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}
