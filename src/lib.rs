//! Rental agreement ledger confirmation engine.

pub mod api;
pub mod cache;
pub mod config;
pub mod ledger;
pub mod lifecycle;
pub mod monitor;
pub mod observability;
pub mod orchestrator;
pub mod resilience;
pub mod secondary;

pub use config::EngineConfig;
pub use lifecycle::Shutdown;
pub use orchestrator::ConfirmationOrchestrator;
