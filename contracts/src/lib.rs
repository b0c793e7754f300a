//! Secret Song Stash contract surface
//!
//! Typed call construction for the song stash contract and a reference
//! registry that executes those calls over encrypted inputs.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │                 Contract Call Flow                   │
//! ├─────────────────────────────────────────────────────┤
//! │  ContractCall (function + typed arguments)          │
//! │      ↓                                              │
//! │  ABI encoding (selector + tagged parameters)        │
//! │      ↓                                              │
//! │  SongRegistry (proof check, homomorphic totals)     │
//! │      ↓                                              │
//! │  SongInfo (plain fields + opaque ciphertexts)       │
//! └─────────────────────────────────────────────────────┘
//! ```
//!
//! # Key Features
//!
//! - **Encrypted Inputs**: play durations and royalty amounts arrive as ciphertexts
//! - **Bound Proofs**: every encrypted input is range checked before it is used
//! - **Homomorphic Totals**: plays, listening time and earnings stay encrypted

pub mod abi;
pub mod contract;
pub mod errors;
pub mod state;

// Re-export main types
pub use abi::{ABIDecoder, ABIEncoder, ABIType, ABIValue, Address, ContractABI, FunctionABI};
pub use contract::{song_stash_abi, ContractCall, SongInfo, SongStashFunction, CONTRACT_NAME};
pub use errors::ContractError;
pub use state::{ExecutionContext, SongEntry, SongRegistry};

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::abi::{ABIType, ABIValue, Address};
    pub use crate::contract::{ContractCall, SongInfo, SongStashFunction};
    pub use crate::errors::ContractError;
    pub use crate::state::{ExecutionContext, SongRegistry};
}
