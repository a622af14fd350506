//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Config → wallet → ledger client → secondaries → monitor/cache → store → orchestrator
//!
//! Shutdown (shutdown.rs):
//!     Signal received → broadcast → background tasks exit → snapshot saved
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → trigger graceful shutdown
//! ```
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal
//! - Background tasks are bounded by a drain deadline on shutdown

pub mod shutdown;
pub mod signals;
pub mod startup;

pub use shutdown::Shutdown;
pub use startup::{build_engine, Engine, StartupError};
