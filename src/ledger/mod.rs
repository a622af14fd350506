//! Primary ledger integration subsystem.
//!
//! # Data Flow
//! ```text
//! Environment variable (private key) + LedgerConfig
//!     → wallet.rs (key loading, signing wallet)
//!     → rpc.rs (RPC connection with timeouts, failover, retries)
//!     → transaction.rs (nonce, gas, sign)
//!     → client.rs (submit / get_status / call against the registry)
//! ```
//!
//! # Security Constraints
//! - Private keys ONLY from environment variables
//! - Never log private keys or sensitive data
//! - All RPC calls have configurable timeouts

pub mod client;
pub mod contract;
pub mod payload;
pub mod rpc;
pub mod transaction;
pub mod types;
pub mod wallet;

use alloy::primitives::{Address, Bytes, TxHash};
use async_trait::async_trait;

pub use client::LedgerClient;
pub use contract::IRentalRegistry;
pub use payload::ConfirmationPayload;
pub use types::{LedgerError, LedgerResult, ReceiptSummary, TxStatus};
pub use wallet::Wallet;

/// Operations the engine needs from the primary ledger.
#[async_trait]
pub trait Ledger: Send + Sync {
    /// Sign and broadcast one confirmation transaction.
    async fn submit(&self, payload: &ConfirmationPayload) -> LedgerResult<TxHash>;

    /// Single, non-blocking inclusion check.
    async fn get_status(&self, tx_hash: TxHash) -> LedgerResult<TxStatus>;

    /// Read-only contract call returning raw ABI-encoded output.
    async fn call(&self, to: Address, input: Bytes) -> LedgerResult<Bytes>;
}
