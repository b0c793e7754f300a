//! Client error taxonomy

use stash_contracts::ContractError;
use stash_fhe::FHEError;
use thiserror::Error;

/// Errors surfaced by the confidential submission layer
///
/// Each variant marks where a flow stopped: validation and account errors
/// abort before any crypto work, crypto errors abort before anything is sent,
/// and submission errors leave the transaction state in `Failed`.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ClientError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Key generation failed: {0}")]
    KeyGeneration(String),

    #[error("Encryption failed: {0}")]
    Encryption(String),

    #[error("Decryption failed: {0}")]
    Decryption(String),

    #[error("Proof error: {0}")]
    Proof(String),

    #[error("A transaction is already in flight for this account")]
    ConcurrentSubmission,

    #[error("Submission failed: {0}")]
    Submission(String),

    #[error("Account error: {0}")]
    Account(String),

    #[error("Read failed: {0}")]
    Read(String),

    #[error("Contract error: {0}")]
    Contract(#[from] ContractError),
}

/// Result type for client operations
pub type ClientResult<T> = Result<T, ClientError>;

impl From<FHEError> for ClientError {
    fn from(err: FHEError) -> Self {
        match err {
            FHEError::KeyGenerationFailed(msg) => ClientError::KeyGeneration(msg),
            FHEError::DecryptionFailed(msg) => ClientError::Decryption(msg),
            FHEError::OutOfRange { .. } => ClientError::Validation(err.to_string()),
            FHEError::ProofGenerationFailed(msg) => ClientError::Proof(msg),
            FHEError::ConfigError(msg) => ClientError::Validation(msg),
            other => ClientError::Encryption(other.to_string()),
        }
    }
}

impl From<tokio::task::JoinError> for ClientError {
    fn from(err: tokio::task::JoinError) -> Self {
        ClientError::Encryption(format!("crypto worker stopped: {}", err))
    }
}
