//! Secret Song Stash client
//!
//! Confidential submission layer:
//! - Payload preparation with local encryption and proof self-checks
//! - Transaction lifecycle state machine (one in-flight transaction per account)
//! - Typed read access with opaque ciphertext handles
//! - Workflow progress events
//! - In-memory reference ledger for tests and demos

pub mod account;
pub mod config;
pub mod errors;
pub mod ledger;
pub mod lifecycle;
pub mod preparer;
pub mod reader;
pub mod session;
pub mod transaction;

pub use account::{AccountSession, ReceiptStatus, TxHash};
pub use config::ClientConfig;
pub use errors::{ClientError, ClientResult};
pub use ledger::InMemoryLedger;
pub use lifecycle::{
    EventSink, LifecycleEvent, StepStatus, TransactionState, TransactionStatus,
    TransactionSubmitter, WorkflowStep,
};
pub use preparer::{ContractDataPreparer, SongMetadata};
pub use reader::{CiphertextHandle, ContractReadAdapter, ContractReader, SongRecord};
pub use session::StashSession;
pub use transaction::{Operation, TransactionRequest};
