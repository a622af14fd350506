//! Agreement confirmation orchestration.
//!
//! # Data Flow
//! ```text
//! confirm_agreement(id, actor)
//!     → AgreementStore: load, check status and counter-party
//!     → AgreementStore: metadata record → URI
//!     → AgreementStore: participant wallets
//!     → identifiers.rs: keccak-256 ledger ids
//!     → Ledger::submit → tx hash
//!     → TransactionMonitor: await terminal callback
//!     → Verified: compare-and-set accepted → confirmed
//! ```
//!
//! # Design Decisions
//! - Every precondition is checked before the ledger is touched
//! - The only status write is the compare-and-set after verification
//! - A failed flow leaves the agreement untouched and can be retried

pub mod confirm;
pub mod identifiers;
pub mod memory;
pub mod store;

use alloy::primitives::TxHash;
use thiserror::Error;

use crate::ledger::LedgerError;
use crate::monitor::MonitorError;

pub use confirm::{ConfirmationOrchestrator, ConfirmationOutcome, EngineStatus};
pub use identifiers::{derive_agreement_id, derive_property_id};
pub use memory::MemoryAgreementStore;
pub use store::{
    Agreement, AgreementMetadata, AgreementStatus, AgreementStore, CasOutcome, ConfirmationUpdate,
    MetadataRef, StoreError,
};

#[derive(Debug, Error)]
pub enum ConfirmationError {
    #[error("Agreement {0} not found")]
    NotFound(String),

    #[error("Agreement {agreement_id} is {status}, expected accepted")]
    InvalidState {
        agreement_id: String,
        status: AgreementStatus,
    },

    #[error("User {actor} may not confirm agreement {agreement_id}")]
    Forbidden { agreement_id: String, actor: String },

    #[error("No wallet address for user {0}")]
    MissingWallet(String),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Ledger error: {0}")]
    Ledger(#[from] LedgerError),

    #[error("Monitor error: {0}")]
    Monitor(#[from] MonitorError),

    #[error("Transaction {tx_hash} failed secondary verification on: {}", networks.join(", "))]
    VerificationFailed { tx_hash: TxHash, networks: Vec<String> },

    #[error("Transaction {tx_hash} not confirmed after {attempts} attempts")]
    Timeout { tx_hash: TxHash, attempts: u32 },

    #[error("Monitoring of transaction {tx_hash} failed: {reason}")]
    MonitorFailed { tx_hash: TxHash, reason: String },

    #[error("Monitoring of transaction {tx_hash} was cancelled")]
    Cancelled { tx_hash: TxHash },
}

impl ConfirmationError {
    /// Transaction hash for failures that happened after submission.
    pub fn tx_hash(&self) -> Option<TxHash> {
        match self {
            ConfirmationError::VerificationFailed { tx_hash, .. }
            | ConfirmationError::Timeout { tx_hash, .. }
            | ConfirmationError::MonitorFailed { tx_hash, .. }
            | ConfirmationError::Cancelled { tx_hash } => Some(*tx_hash),
            _ => None,
        }
    }
}
