//! Monitored transaction state machine.
//!
//! # States
//! - Pending: broadcast, no receipt yet
//! - Confirming: mined, below the confirmation threshold
//! - Confirmed: threshold reached, secondary verification pending
//! - Verified: success terminal
//! - VerificationFailed / Error / Timeout / Cancelled: failure terminals
//!
//! # State Transitions
//! ```text
//! Pending → Confirming: receipt observed
//! Confirming → Confirmed: confirmations >= threshold
//! Confirmed → Verified | VerificationFailed: cross-network verification
//! Pending | Confirming → Error | Timeout | Cancelled
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TxState {
    Pending,
    Confirming,
    Confirmed,
    Verified,
    VerificationFailed,
    Error,
    Timeout,
    Cancelled,
}

impl TxState {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            TxState::Verified
                | TxState::VerificationFailed
                | TxState::Error
                | TxState::Timeout
                | TxState::Cancelled
        )
    }

    pub fn is_success(self) -> bool {
        self == TxState::Verified
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TxState::Pending => "pending",
            TxState::Confirming => "confirming",
            TxState::Confirmed => "confirmed",
            TxState::Verified => "verified",
            TxState::VerificationFailed => "verification_failed",
            TxState::Error => "error",
            TxState::Timeout => "timeout",
            TxState::Cancelled => "cancelled",
        }
    }

    /// Whether `next` is a legal successor of `self`.
    pub fn can_transition_to(self, next: TxState) -> bool {
        use TxState::*;
        match (self, next) {
            (Pending, Confirming) => true,
            (Confirming, Confirmed) => true,
            (Confirmed, Verified | VerificationFailed) => true,
            (Pending | Confirming, Error | Timeout | Cancelled) => true,
            _ => false,
        }
    }
}

impl fmt::Display for TxState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
