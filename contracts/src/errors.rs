//! Error types for the song stash contract

use thiserror::Error;

/// Errors that can occur while encoding calls or executing them
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ContractError {
    #[error("ABI encoding error: {0}")]
    ABIEncodingError(String),

    #[error("ABI decoding error: {0}")]
    ABIDecodingError(String),

    #[error("Unknown function selector: {0}")]
    UnknownSelector(String),

    #[error("Unknown function: {0}")]
    UnknownFunction(String),

    #[error("Parameter count mismatch: expected {expected}, got {got}")]
    ParameterCountMismatch { expected: usize, got: usize },

    #[error("Invalid parameter type at index {index}: {message}")]
    InvalidParameterType { index: usize, message: String },

    #[error("Song not found: {0}")]
    SongNotFound(u64),

    #[error("Song is not active: {0}")]
    SongInactive(u64),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Input proof rejected for {0}")]
    ProofRejected(&'static str),

    #[error("Encrypted input uses key {got}, song totals use {expected}")]
    KeyMismatch { expected: String, got: String },

    #[error("FHE operation failed: {0}")]
    FHEError(String),
}

impl From<stash_fhe::FHEError> for ContractError {
    fn from(err: stash_fhe::FHEError) -> Self {
        ContractError::FHEError(err.to_string())
    }
}
