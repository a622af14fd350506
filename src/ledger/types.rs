//! Chain-specific types and error definitions.

use serde::Serialize;
use thiserror::Error;

use crate::resilience::Transient;

pub use crate::config::schema::LedgerConfig;

/// Chain ID type for strong typing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ChainId(pub u64);

impl From<u64> for ChainId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

impl From<ChainId> for u64 {
    fn from(id: ChainId) -> Self {
        id.0
    }
}

/// Errors that can occur during ledger operations.
#[derive(Debug, Error)]
pub enum LedgerError {
    /// RPC endpoint unreachable or the transport failed.
    #[error("Connection error: {0}")]
    Connection(String),

    /// RPC request timed out.
    #[error("RPC timeout after {0} seconds")]
    Timeout(u64),

    /// Signing key, contract address or chain settings are unusable.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// A payload field failed type or range conversion.
    #[error("Invalid argument: {0}")]
    Argument(String),

    /// The node answered with a JSON-RPC error.
    #[error("RPC error: {0}")]
    Rpc(String),

    /// Gas price exceeded maximum allowed.
    #[error("Gas price {current_gwei} gwei exceeds maximum {max_gwei} gwei")]
    GasPriceTooHigh { current_gwei: u64, max_gwei: u64 },

    /// Chain configuration mismatch.
    #[error("Chain ID mismatch: expected {expected}, got {actual}")]
    ChainMismatch { expected: u64, actual: u64 },

    /// A contract call returned data that does not match its ABI.
    #[error("Failed to decode call result: {0}")]
    Decode(String),
}

impl Transient for LedgerError {
    fn is_transient(&self) -> bool {
        matches!(self, LedgerError::Connection(_) | LedgerError::Timeout(_))
    }
}

/// Result type for ledger operations.
pub type LedgerResult<T> = Result<T, LedgerError>;

/// The parts of a transaction receipt the engine cares about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ReceiptSummary {
    pub block_number: u64,
    pub gas_used: u64,
    /// False when the transaction reverted.
    pub success: bool,
}

/// Snapshot of a transaction's inclusion state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TxStatus {
    pub mined: bool,
    pub block_number: Option<u64>,
    /// `current_block - receipt.block_number` when mined, else 0.
    pub confirmations: u64,
    pub receipt: Option<ReceiptSummary>,
}

impl TxStatus {
    /// Status of a transaction without a receipt yet.
    pub fn pending() -> Self {
        Self {
            mined: false,
            block_number: None,
            confirmations: 0,
            receipt: None,
        }
    }

    /// Status of a mined transaction.
    pub fn mined(receipt: ReceiptSummary, current_block: u64) -> Self {
        Self {
            mined: true,
            block_number: Some(receipt.block_number),
            confirmations: current_block.saturating_sub(receipt.block_number),
            receipt: Some(receipt),
        }
    }

    /// True when mined with a reverted receipt.
    pub fn reverted(&self) -> bool {
        matches!(self.receipt, Some(r) if !r.success)
    }
}
