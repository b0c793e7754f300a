//! Secret Song Stash: confidential telemetry submission
//!
//! This is the root crate that re-exports the workspace crates for
//! integration testing and benchmarks.
//!
//! ## Architecture Overview
//!
//! Play durations and royalty amounts are encrypted on the client, each with
//! a range proof bound to its ciphertext. The contract checks the proofs and
//! keeps per-song totals homomorphically; only the key owner can open them.
//!
//! - **Additive + one multiplication**: Paillier with the Catalano-Fiore transform
//! - **Range proofs**: bit decomposition with OR-proofs over a Fiat-Shamir transcript
//! - **Fail-closed submission**: every encrypted field is validated locally first
//! - **Explicit lifecycle**: one in-flight transaction per account, observable state
//!
//! ## Crate Organization
//!
//! - `stash-fhe`: keys, encryption, homomorphic operations, proof validation
//! - `stash-contracts`: contract ABI, call surface and reference registry
//! - `stash-client`: payload preparation, transaction lifecycle, reads, session facade

pub use stash_client as client;
pub use stash_contracts as contracts;
pub use stash_fhe as fhe;

/// Workspace version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Prelude module for convenient imports
pub mod prelude {
    pub use stash_client::{
        ClientConfig, ClientError, InMemoryLedger, SongMetadata, StashSession, TransactionState,
        TransactionStatus,
    };
    pub use stash_contracts::{ContractCall, SongInfo, SongRegistry};
    pub use stash_fhe::{
        DomainValue, EncryptedValue, EncryptionEngine, FHEConfig, FHEOps, KeyPair,
        ProofValidator, ValueRange,
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_exists() {
        assert!(!VERSION.is_empty());
    }

    #[test]
    fn test_prelude_reexports() {
        use prelude::*;
        assert_eq!(ValueRange::royalty_rate().max(), 100);
        assert_eq!(TransactionState::default().status, TransactionStatus::Idle);
        assert_eq!(ContractCall::get_info(1).name(), "getInfo");
    }
}
