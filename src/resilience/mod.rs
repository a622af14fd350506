//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Read call to ledger RPC or secondary network:
//!     → per-call deadline (tokio::time::timeout / client timeout)
//!     → On transient failure: retries.rs (retry with backoff.rs delay)
//! ```
//!
//! # Design Decisions
//! - Every external call has a deadline
//! - Retries only for reads; broadcasts are never replayed
//! - Backoff delays are jittered

pub mod backoff;
pub mod retries;

pub use retries::{retry_transient, Transient};
