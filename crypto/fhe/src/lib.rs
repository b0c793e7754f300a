//! Stash FHE
//!
//! Homomorphic encryption for confidential telemetry using Paillier with the
//! Catalano-Fiore transform, plus range proofs bound to every fresh ciphertext.
//!
//! # Key Features:
//! - Encrypt/decrypt u64 values (results reduced mod 2^64)
//! - Homomorphic addition at any depth, one ciphertext-ciphertext multiplication
//! - Scalar addition and multiplication
//! - Non-interactive range proofs verified with the public key only
//!
//! # Architecture:
//! - PrivateKey: for decryption (held by the session owner)
//! - PublicKey: for encryption, evaluation and proof verification (can be published)
//! - KeyRef: blake3 identifier embedded in every ciphertext

mod codec;
pub mod ciphertext;
pub mod domain;
pub mod errors;
pub mod keys;
pub mod operations;
mod paillier;
mod range_proof;
pub mod validator;

pub use ciphertext::{ciphertext_key_ref, CiphertextLevel, EncryptedValue};
pub use domain::{
    DomainValue, ValueRange, DEFAULT_MAX_PLAY_SECONDS, DEFAULT_ROYALTY_RATE, MAX_ROYALTY_RATE,
};
pub use errors::FHEError;
pub use keys::{KeyManager, KeyPair, KeyRef, PrivateKey, PublicKey};
pub use operations::{EncryptionEngine, FHEOps, HomomorphicOps};
pub use range_proof::PROOF_VERSION;
pub use validator::ProofValidator;

use rand::rngs::OsRng;
use rand::SeedableRng;
use rand_chacha::ChaCha20Rng;
use serde::{Deserialize, Serialize};

/// Smallest accepted modulus size
pub const MIN_MODULUS_BITS: u32 = 512;

/// FHE Configuration
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FHEConfig {
    /// Size of the Paillier modulus n (bits)
    pub modulus_bits: u32,
}

impl Default for FHEConfig {
    fn default() -> Self {
        Self {
            modulus_bits: 2048,
        }
    }
}

impl FHEConfig {
    /// Small modulus for tests and local demos. Not secure.
    pub fn insecure_testing() -> Self {
        Self {
            modulus_bits: MIN_MODULUS_BITS,
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> FHEResult<()> {
        if self.modulus_bits < MIN_MODULUS_BITS {
            return Err(FHEError::ConfigError(format!(
                "modulus_bits must be at least {}",
                MIN_MODULUS_BITS
            )));
        }
        if self.modulus_bits % 16 != 0 {
            return Err(FHEError::ConfigError(
                "modulus_bits must be a multiple of 16".into(),
            ));
        }
        Ok(())
    }
}

/// Result type for FHE operations
pub type FHEResult<T> = Result<T, FHEError>;

/// ChaCha20 generator seeded from the operating system
pub(crate) fn os_seeded_rng() -> Result<ChaCha20Rng, rand::Error> {
    ChaCha20Rng::from_rng(OsRng)
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_default() {
        let config = FHEConfig::default();
        assert_eq!(config.modulus_bits, 2048);
        assert!(config.validate().is_ok());
        assert!(FHEConfig::insecure_testing().validate().is_ok());
    }

    #[test]
    fn test_config_validation() {
        let small = FHEConfig {
            modulus_bits: 256,
            ..Default::default()
        };
        assert!(small.validate().is_err());

        let odd = FHEConfig {
            modulus_bits: 1000,
            ..Default::default()
        };
        assert!(odd.validate().is_err());
    }
}
