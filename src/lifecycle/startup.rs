//! Startup orchestration.
//!
//! Components are built in dependency order from a validated `EngineConfig`.
//! Nothing here spawns background tasks; the caller owns those.

use std::sync::Arc;
use thiserror::Error;

use crate::cache::ContractCallCache;
use crate::config::{EngineConfig, SecondaryConfig};
use crate::ledger::{Ledger, LedgerClient, LedgerError, Wallet};
use crate::monitor::TransactionMonitor;
use crate::orchestrator::{AgreementStore, ConfirmationOrchestrator, MemoryAgreementStore, StoreError};
use crate::secondary::{
    ExplorerClient, PermissionedLedgerClient, SecondaryError, SecondaryNetwork, SecondaryNetworks,
};

#[derive(Debug, Error)]
pub enum StartupError {
    #[error("Ledger setup failed: {0}")]
    Ledger(#[from] LedgerError),

    #[error("Secondary network setup failed: {0}")]
    Secondary(#[from] SecondaryError),

    #[error("Agreement store setup failed: {0}")]
    Store(#[from] StoreError),
}

/// Fully wired engine components.
pub struct Engine {
    pub orchestrator: Arc<ConfirmationOrchestrator>,
    pub ledger: Arc<LedgerClient>,
    pub store: MemoryAgreementStore,
}

pub async fn build_engine(config: &EngineConfig) -> Result<Engine, StartupError> {
    let wallet = Wallet::from_env(&config.ledger.private_key_env, config.ledger.chain_id)?;
    tracing::info!(sender = %wallet.address(), chain_id = config.ledger.chain_id, "Signing wallet loaded");

    let ledger = Arc::new(LedgerClient::new(config.ledger.clone(), wallet).await?);
    let secondaries = build_secondaries(&config.secondary)?;
    tracing::info!(networks = ?secondaries.names(), "Secondary networks configured");

    let store = MemoryAgreementStore::load_from_file(&config.store)?;

    let dyn_ledger: Arc<dyn Ledger> = ledger.clone();
    let monitor = TransactionMonitor::new(dyn_ledger.clone(), secondaries, config.monitor.clone());
    let cache = ContractCallCache::new(dyn_ledger.clone(), &config.cache);
    let dyn_store: Arc<dyn AgreementStore> = Arc::new(store.clone());

    let orchestrator = Arc::new(ConfirmationOrchestrator::new(
        dyn_store,
        dyn_ledger,
        monitor,
        cache,
        ledger.contract_address(),
    ));

    Ok(Engine {
        orchestrator,
        ledger,
        store,
    })
}

pub fn build_secondaries(config: &SecondaryConfig) -> Result<SecondaryNetworks, SecondaryError> {
    let mut networks: Vec<Arc<dyn SecondaryNetwork>> = Vec::new();
    if let Some(explorer) = &config.explorer {
        networks.push(Arc::new(ExplorerClient::new(explorer)?));
    }
    if let Some(permissioned) = &config.permissioned {
        networks.push(Arc::new(PermissionedLedgerClient::new(permissioned)?));
    }
    Ok(SecondaryNetworks::new(networks, config.require_audit_record))
}
