//! FHE Error types

use thiserror::Error;

/// Errors that can occur during key generation, encryption and evaluation
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FHEError {
    /// Key generation failed (random source unavailable)
    #[error("Key generation failed: {0}")]
    KeyGenerationFailed(String),

    /// Encryption failed
    #[error("Encryption failed: {0}")]
    EncryptionFailed(String),

    /// Decryption failed
    #[error("Decryption failed: {0}")]
    DecryptionFailed(String),

    /// Invalid ciphertext
    #[error("Invalid ciphertext: {0}")]
    InvalidCiphertext(String),

    /// Invalid key
    #[error("Invalid key: {0}")]
    InvalidKey(String),

    /// Operands were encrypted under different public keys
    #[error("Key mismatch: {left} vs {right}")]
    KeyMismatch { left: String, right: String },

    /// Plaintext outside of its declared range
    #[error("Value {value} outside of range [0, {max}]")]
    OutOfRange { value: u64, max: u64 },

    /// Multiplication would exceed the supported ciphertext degree
    #[error("Ciphertext degree exceeded: only one multiplication is supported")]
    DegreeExceeded,

    /// Range proof could not be produced
    #[error("Proof generation failed: {0}")]
    ProofGenerationFailed(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigError(String),
}
