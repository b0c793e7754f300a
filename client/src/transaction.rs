//! Prepared transaction requests

use serde::{Deserialize, Serialize};
use stash_contracts::{ABIValue, ContractCall, SongStashFunction};
use stash_fhe::EncryptedValue;

/// State-changing operations a client can submit
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Operation {
    CreateSong,
    RecordPlay,
    DistributeRoyalties,
}

impl Operation {
    pub fn function(&self) -> SongStashFunction {
        match self {
            Operation::CreateSong => SongStashFunction::CreateSong,
            Operation::RecordPlay => SongStashFunction::RecordPlay,
            Operation::DistributeRoyalties => SongStashFunction::DistributeRoyalties,
        }
    }

    /// Contract argument names, in call order
    pub fn arg_names(&self) -> &'static [&'static str] {
        match self {
            Operation::CreateSong => &["title", "artist", "ipfsHash", "royaltyRate"],
            Operation::RecordPlay => &["songId", "playDuration", "inputProof"],
            Operation::DistributeRoyalties => &["songId", "totalAmount", "inputProof"],
        }
    }
}

impl std::fmt::Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.function().name())
    }
}

/// A call payload ready for submission
///
/// Only [`ContractDataPreparer`](crate::ContractDataPreparer) builds requests,
/// so every encrypted field has passed local proof validation.
#[derive(Clone, Debug, PartialEq)]
pub struct TransactionRequest {
    operation: Operation,
    call: ContractCall,
    encrypted: Vec<EncryptedValue>,
}

impl TransactionRequest {
    pub(crate) fn new(operation: Operation, call: ContractCall, encrypted: Vec<EncryptedValue>) -> Self {
        Self {
            operation,
            call,
            encrypted,
        }
    }

    pub fn operation(&self) -> Operation {
        self.operation
    }

    pub fn call(&self) -> &ContractCall {
        &self.call
    }

    /// Encrypted arguments, in call order
    pub fn encrypted_fields(&self) -> &[EncryptedValue] {
        &self.encrypted
    }

    pub fn song_id(&self) -> Option<u64> {
        self.call.song_id()
    }

    /// Arguments paired with their contract names
    pub fn named_args(&self) -> Vec<(&'static str, &ABIValue)> {
        self.operation
            .arg_names()
            .iter()
            .copied()
            .zip(self.call.params())
            .collect()
    }

    /// Argument by contract name
    pub fn arg(&self, name: &str) -> Option<&ABIValue> {
        self.named_args()
            .into_iter()
            .find(|(arg, _)| *arg == name)
            .map(|(_, value)| value)
    }

    /// Selector-prefixed call data
    pub fn encode(&self) -> Result<Vec<u8>, stash_contracts::ContractError> {
        self.call.encode()
    }
}
