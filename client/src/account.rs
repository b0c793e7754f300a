//! Account/session collaborator
//!
//! The ledger is reached only through the connected account: it reports the
//! current address, submits calls and reports receipts.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use stash_contracts::{Address, ContractCall};

use crate::errors::ClientResult;

/// Transaction hash returned by the ledger on acceptance
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TxHash(pub [u8; 32]);

impl TxHash {
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        format!("0x{}", hex::encode(self.0))
    }
}

impl std::fmt::Display for TxHash {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl std::fmt::Debug for TxHash {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "TxHash({})", hex::encode(&self.0[..8]))
    }
}

/// Outcome of waiting for a receipt
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReceiptStatus {
    /// Included and executed successfully
    Confirmed,
    /// Included but execution reverted
    Reverted { reason: String },
    /// No receipt before the timeout
    Pending,
}

/// Connected account used to reach the ledger
#[async_trait::async_trait]
pub trait AccountSession: Send + Sync {
    /// Address of the connected account, `None` when disconnected
    async fn current_address(&self) -> Option<Address>;

    async fn is_connected(&self) -> bool;

    /// Send a state-changing call. Fails with `ClientError::Account` when
    /// disconnected and `ClientError::Submission` when the ledger rejects it.
    async fn submit(&self, call: &ContractCall) -> ClientResult<TxHash>;

    /// Wait up to `timeout` for the receipt of `hash`
    async fn await_receipt(&self, hash: &TxHash, timeout: Duration) -> ClientResult<ReceiptStatus>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tx_hash_display() {
        let hash = TxHash([0xab; 32]);
        assert_eq!(hash.to_string(), format!("0x{}", "ab".repeat(32)));
        assert_eq!(format!("{:?}", hash), "TxHash(abababababababab)");
    }
}
