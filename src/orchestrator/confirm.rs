//! End-to-end confirmation of an accepted agreement.

use alloy::primitives::{Address, TxHash};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::oneshot;

use crate::cache::ContractCallCache;
use crate::ledger::{ConfirmationPayload, IRentalRegistry, Ledger};
use crate::monitor::{
    AuditSubject, CancelOutcome, InFlightTransaction, MonitorCallbacks, TransactionMonitor, TxState,
};
use crate::observability::metrics;
use crate::orchestrator::identifiers::{derive_agreement_id, derive_property_id};
use crate::orchestrator::store::{
    Agreement, AgreementMetadata, AgreementStatus, AgreementStore, CasOutcome, ConfirmationUpdate,
};
use crate::orchestrator::ConfirmationError;
use crate::secondary::{unix_time_secs, VerificationResult};

/// Status an agreement must hold before it can be confirmed.
pub const EXPECTED_PRIOR_STATUS: AgreementStatus = AgreementStatus::Accepted;

/// Result of a successful confirmation.
#[derive(Debug, Clone, Serialize)]
pub struct ConfirmationOutcome {
    pub agreement: Agreement,
    pub tx_hash: TxHash,
    pub metadata_uri: String,
    pub verification: Option<VerificationResult>,
    /// False when another writer had already moved the agreement on.
    pub applied: bool,
}

/// How monitoring of a submitted confirmation ended.
enum Terminal {
    /// Verified, with the outcome of the status compare-and-set.
    Verified(InFlightTransaction, Result<(Agreement, bool), ConfirmationError>),
    Failed(InFlightTransaction),
}

/// Engine summary for operators.
#[derive(Debug, Clone, Serialize)]
pub struct EngineStatus {
    pub contract: Address,
    pub active_transactions: usize,
    pub cache_entries: usize,
    pub secondary_networks: Vec<String>,
}

/// Coordinates store, ledger, monitor and cache for agreement confirmation.
pub struct ConfirmationOrchestrator {
    store: Arc<dyn AgreementStore>,
    ledger: Arc<dyn Ledger>,
    monitor: TransactionMonitor,
    cache: ContractCallCache,
    contract: Address,
}

impl ConfirmationOrchestrator {
    pub fn new(
        store: Arc<dyn AgreementStore>,
        ledger: Arc<dyn Ledger>,
        monitor: TransactionMonitor,
        cache: ContractCallCache,
        contract: Address,
    ) -> Self {
        Self {
            store,
            ledger,
            monitor,
            cache,
            contract,
        }
    }

    /// Confirm `agreement_id` on the ledger on behalf of `actor`.
    ///
    /// Returns once monitoring has reached a terminal state.
    pub async fn confirm_agreement(
        &self,
        agreement_id: &str,
        actor: &str,
    ) -> Result<ConfirmationOutcome, ConfirmationError> {
        let agreement = self
            .store
            .load_agreement(agreement_id)
            .await?
            .ok_or_else(|| ConfirmationError::NotFound(agreement_id.to_string()))?;

        if agreement.status != EXPECTED_PRIOR_STATUS {
            return Err(ConfirmationError::InvalidState {
                agreement_id: agreement.id,
                status: agreement.status,
            });
        }
        if agreement.counter_party() != Some(actor) {
            return Err(ConfirmationError::Forbidden {
                agreement_id: agreement.id,
                actor: actor.to_string(),
            });
        }

        let metadata = AgreementMetadata::from_agreement(&agreement, unix_time_secs());
        let metadata_ref = self.store.create_metadata_record(&metadata).await?;

        let tenant = self.wallet_of(&agreement.tenant_id).await?;
        let landlord = self.wallet_of(&agreement.landlord_id).await?;

        let payload = ConfirmationPayload::from_parts(
            derive_agreement_id(&agreement.id),
            derive_property_id(&agreement.property_id),
            &tenant,
            &landlord,
            &metadata_ref.uri,
        )?;

        let tx_hash = self.ledger.submit(&payload).await?;
        tracing::info!(
            agreement_id = %agreement.id,
            tx_hash = %tx_hash,
            metadata_uri = %metadata_ref.uri,
            "Confirmation submitted"
        );

        let record = match self.await_terminal(tx_hash, &agreement, &metadata_ref.uri).await? {
            Terminal::Verified(record, reconciled) => {
                let (agreement, applied) = reconciled?;
                return Ok(ConfirmationOutcome {
                    agreement,
                    tx_hash,
                    metadata_uri: metadata_ref.uri,
                    verification: record.verification,
                    applied,
                });
            }
            Terminal::Failed(record) => record,
        };

        match record.status {
            TxState::VerificationFailed => Err(ConfirmationError::VerificationFailed {
                tx_hash,
                networks: record
                    .verification
                    .as_ref()
                    .map(|v| v.failed_networks().iter().map(|n| n.to_string()).collect())
                    .unwrap_or_default(),
            }),
            TxState::Timeout => Err(ConfirmationError::Timeout {
                tx_hash,
                attempts: record.attempts,
            }),
            TxState::Cancelled => Err(ConfirmationError::Cancelled { tx_hash }),
            _ => Err(ConfirmationError::MonitorFailed {
                tx_hash,
                reason: record.error.unwrap_or_else(|| format!("ended in {}", record.status)),
            }),
        }
    }

    /// Move the agreement from `accepted` to `confirmed`.
    ///
    /// Safe to repeat: when the status has already moved on, the stored record
    /// is returned unchanged with `applied = false`.
    pub async fn reconcile(
        &self,
        agreement_id: &str,
        tx_hash: TxHash,
        metadata_uri: &str,
    ) -> Result<(Agreement, bool), ConfirmationError> {
        reconcile_status(self.store.as_ref(), agreement_id, tx_hash, metadata_uri).await
    }

    pub fn transaction_status(&self, tx_hash: TxHash) -> Option<InFlightTransaction> {
        self.monitor.status(tx_hash)
    }

    pub fn cancel_monitoring(&self, tx_hash: TxHash) -> CancelOutcome {
        self.monitor.cancel(tx_hash)
    }

    pub fn active_transactions(&self) -> Vec<InFlightTransaction> {
        self.monitor.active()
    }

    /// Whether the registry contract reports the agreement as confirmed.
    pub async fn onchain_confirmed(&self, agreement_id: &str) -> Result<bool, ConfirmationError> {
        let call = IRentalRegistry::isConfirmedCall {
            agreementId: derive_agreement_id(agreement_id),
        };
        Ok(self.cache.cached_call(self.contract, &call).await?)
    }

    pub fn status(&self) -> EngineStatus {
        EngineStatus {
            contract: self.contract,
            active_transactions: self.monitor.active_count(),
            cache_entries: self.cache.len(),
            secondary_networks: self.monitor.secondary_networks(),
        }
    }

    pub fn monitor(&self) -> &TransactionMonitor {
        &self.monitor
    }

    pub fn cache(&self) -> &ContractCallCache {
        &self.cache
    }

    async fn wallet_of(&self, user_id: &str) -> Result<String, ConfirmationError> {
        self.store
            .resolve_wallet_address(user_id)
            .await?
            .filter(|address| !address.trim().is_empty())
            .ok_or_else(|| ConfirmationError::MissingWallet(user_id.to_string()))
    }

    /// Monitor `tx_hash` until it ends.
    ///
    /// On `Verified` the success callback itself runs the compare-and-set, so
    /// the agreement is reconciled even when nobody awaits the outcome anymore.
    async fn await_terminal(
        &self,
        tx_hash: TxHash,
        agreement: &Agreement,
        metadata_uri: &str,
    ) -> Result<Terminal, ConfirmationError> {
        let (success_tx, success_rx) = oneshot::channel();
        let (failure_tx, failure_rx) = oneshot::channel();
        let store = self.store.clone();
        let agreement_id = agreement.id.clone();
        let uri = metadata_uri.to_string();
        let callbacks = MonitorCallbacks::new(
            move |record: InFlightTransaction| {
                tokio::spawn(async move {
                    let reconciled = reconcile_status(store.as_ref(), &agreement_id, record.tx_hash, &uri).await;
                    if let Err(e) = &reconciled {
                        tracing::error!(
                            agreement_id = %agreement_id,
                            tx_hash = %record.tx_hash,
                            error = %e,
                            "Failed to reconcile verified transaction"
                        );
                    }
                    let _ = success_tx.send(Terminal::Verified(record, reconciled));
                });
            },
            move |record| {
                let _ = failure_tx.send(Terminal::Failed(record));
            },
        );
        let subject = AuditSubject {
            reference: agreement.id.clone(),
            metadata_uri: Some(metadata_uri.to_string()),
        };

        self.monitor.monitor(tx_hash, subject, callbacks)?;

        // The unused callback is dropped with the task, closing its channel.
        tokio::select! {
            Ok(terminal) = success_rx => Ok(terminal),
            Ok(terminal) = failure_rx => Ok(terminal),
            else => Err(ConfirmationError::MonitorFailed {
                tx_hash,
                reason: "monitor task ended without reporting".into(),
            }),
        }
    }
}

/// Compare-and-set `accepted → confirmed`; a mismatch returns the stored record.
async fn reconcile_status(
    store: &dyn AgreementStore,
    agreement_id: &str,
    tx_hash: TxHash,
    metadata_uri: &str,
) -> Result<(Agreement, bool), ConfirmationError> {
    let update = ConfirmationUpdate {
        tx_hash,
        metadata_uri: metadata_uri.to_string(),
        confirmed_at: unix_time_secs(),
    };

    match store
        .compare_and_set_status(agreement_id, EXPECTED_PRIOR_STATUS, AgreementStatus::Confirmed, update)
        .await?
    {
        CasOutcome::Applied(agreement) => {
            metrics::record_reconciliation("applied");
            tracing::info!(agreement_id = %agreement_id, tx_hash = %tx_hash, "Agreement confirmed");
            Ok((agreement, true))
        }
        CasOutcome::Mismatch(agreement) => {
            metrics::record_reconciliation("skipped");
            tracing::warn!(
                agreement_id = %agreement_id,
                tx_hash = %tx_hash,
                current_status = %agreement.status,
                recorded_tx = ?agreement.tx_hash,
                "Agreement status changed before reconciliation, leaving it as is"
            );
            Ok((agreement, false))
        }
    }
}
