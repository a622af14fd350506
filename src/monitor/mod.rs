//! Transaction confirmation monitor.
//!
//! # Data Flow
//! ```text
//! monitor(tx_hash, subject, callbacks)
//!     → registry entry (one active loop per hash)
//!     → tracker loop: get_status → confirmations → threshold
//!     → Confirmed → SecondaryNetworks::cross_verify
//!     → terminal state → exactly one callback
//! ```
//!
//! # Design Decisions
//! - Timeout counts polls, not wall-clock time
//! - Cancellation is cooperative through a per-transaction watch channel
//! - Terminal records stay queryable until pruned by age

pub mod state;
pub mod tracker;

use alloy::primitives::TxHash;
use serde::Serialize;
use std::time::{SystemTime, UNIX_EPOCH};
use thiserror::Error;

use crate::secondary::VerificationResult;

pub use state::TxState;
pub use tracker::TransactionMonitor;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum MonitorError {
    #[error("Transaction {0} is already being monitored")]
    AlreadyMonitoring(TxHash),
}

/// Observable state of a monitored transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InFlightTransaction {
    pub tx_hash: TxHash,
    pub status: TxState,
    /// Every state entered, in order.
    pub history: Vec<TxState>,
    pub attempts: u32,
    /// Never decreases while the transaction is monitored.
    pub confirmations: u64,
    pub block_number: Option<u64>,
    /// Unix millis.
    pub started_at: u64,
    pub last_checked_at: Option<u64>,
    pub finished_at: Option<u64>,
    pub error: Option<String>,
    pub verification: Option<VerificationResult>,
}

impl InFlightTransaction {
    pub fn new(tx_hash: TxHash) -> Self {
        Self {
            tx_hash,
            status: TxState::Pending,
            history: vec![TxState::Pending],
            attempts: 0,
            confirmations: 0,
            block_number: None,
            started_at: unix_time_millis(),
            last_checked_at: None,
            finished_at: None,
            error: None,
            verification: None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}

type Callback = Box<dyn FnOnce(InFlightTransaction) + Send + 'static>;

/// Completion hooks. Exactly one is invoked when monitoring ends.
pub struct MonitorCallbacks {
    pub on_success: Callback,
    pub on_failure: Callback,
}

impl MonitorCallbacks {
    pub fn new<S, F>(on_success: S, on_failure: F) -> Self
    where
        S: FnOnce(InFlightTransaction) + Send + 'static,
        F: FnOnce(InFlightTransaction) + Send + 'static,
    {
        Self {
            on_success: Box::new(on_success),
            on_failure: Box::new(on_failure),
        }
    }

    /// Callbacks that do nothing.
    pub fn noop() -> Self {
        Self::new(|_| {}, |_| {})
    }
}

/// What a transaction is being confirmed for, written to audit records.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuditSubject {
    pub reference: String,
    pub metadata_uri: Option<String>,
}

/// Result of a cancellation request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", content = "state", rename_all = "snake_case")]
pub enum CancelOutcome {
    /// The loop will stop at its next check and end in `Cancelled`.
    Requested,
    /// Already finished; nothing was changed and no callback fires.
    AlreadyTerminal(TxState),
    /// Confirmed and under secondary verification, which is not interruptible.
    Verifying,
    NotFound,
}

pub(crate) fn unix_time_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}
