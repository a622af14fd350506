//! Per-transaction polling loop and the registry of monitored transactions.

use alloy::primitives::TxHash;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;

use crate::config::MonitorConfig;
use crate::ledger::Ledger;
use crate::monitor::{
    unix_time_millis, AuditSubject, CancelOutcome, InFlightTransaction, MonitorCallbacks,
    MonitorError, TxState,
};
use crate::observability::metrics;
use crate::secondary::{unix_time_secs, AuditRecord, SecondaryNetworks};

const PRUNE_INTERVAL: Duration = Duration::from_secs(60);

struct Tracked {
    record: InFlightTransaction,
    cancel: watch::Sender<bool>,
}

/// Drives monitored transactions to a terminal state.
#[derive(Clone)]
pub struct TransactionMonitor {
    ledger: Arc<dyn Ledger>,
    secondaries: SecondaryNetworks,
    config: MonitorConfig,
    registry: Arc<DashMap<TxHash, Tracked>>,
}

impl TransactionMonitor {
    pub fn new(ledger: Arc<dyn Ledger>, secondaries: SecondaryNetworks, config: MonitorConfig) -> Self {
        Self {
            ledger,
            secondaries,
            config,
            registry: Arc::new(DashMap::new()),
        }
    }

    /// Start monitoring `tx_hash` in a background task.
    ///
    /// A hash whose previous monitoring ended may be monitored again; one that
    /// is still active is rejected.
    pub fn monitor(
        &self,
        tx_hash: TxHash,
        subject: AuditSubject,
        callbacks: MonitorCallbacks,
    ) -> Result<InFlightTransaction, MonitorError> {
        let record = InFlightTransaction::new(tx_hash);
        let (cancel_tx, cancel_rx) = watch::channel(false);
        let tracked = Tracked {
            record: record.clone(),
            cancel: cancel_tx,
        };

        match self.registry.entry(tx_hash) {
            Entry::Occupied(mut entry) => {
                if !entry.get().record.is_terminal() {
                    return Err(MonitorError::AlreadyMonitoring(tx_hash));
                }
                entry.insert(tracked);
            }
            Entry::Vacant(entry) => {
                entry.insert(tracked);
            }
        }
        metrics::record_active_transactions(self.active_count());

        tracing::info!(
            tx_hash = %tx_hash,
            reference = %subject.reference,
            threshold = self.config.confirmation_threshold,
            max_attempts = self.config.max_attempts,
            "Monitoring transaction"
        );

        let monitor = self.clone();
        let initial = record.clone();
        tokio::spawn(async move {
            monitor.run(record, subject, cancel_rx, callbacks).await;
        });

        Ok(initial)
    }

    /// Request cancellation. Idempotent.
    pub fn cancel(&self, tx_hash: TxHash) -> CancelOutcome {
        let Some(tracked) = self.registry.get_mut(&tx_hash) else {
            return CancelOutcome::NotFound;
        };

        match tracked.record.status {
            state if state.is_terminal() => CancelOutcome::AlreadyTerminal(state),
            TxState::Confirmed => CancelOutcome::Verifying,
            _ => {
                tracked.cancel.send_replace(true);
                tracing::info!(tx_hash = %tx_hash, "Cancellation requested");
                CancelOutcome::Requested
            }
        }
    }

    /// Snapshot of one transaction, active or retained.
    pub fn status(&self, tx_hash: TxHash) -> Option<InFlightTransaction> {
        self.registry.get(&tx_hash).map(|t| t.record.clone())
    }

    /// Snapshots of every non-terminal transaction.
    pub fn active(&self) -> Vec<InFlightTransaction> {
        self.registry
            .iter()
            .filter(|t| !t.record.is_terminal())
            .map(|t| t.record.clone())
            .collect()
    }

    pub fn secondary_networks(&self) -> Vec<String> {
        self.secondaries.names()
    }

    pub fn active_count(&self) -> usize {
        self.registry.iter().filter(|t| !t.record.is_terminal()).count()
    }

    /// Drop terminal records that finished at least `max_age` ago.
    pub fn prune_finished(&self, max_age: Duration) -> usize {
        let cutoff = unix_time_millis().saturating_sub(max_age.as_millis() as u64);
        let before = self.registry.len();
        self.registry.retain(|_, tracked| match tracked.record.finished_at {
            Some(finished) if tracked.record.is_terminal() => finished > cutoff,
            _ => true,
        });
        before.saturating_sub(self.registry.len())
    }

    /// Periodically prune history older than `monitor.history_retention_secs`.
    pub fn spawn_pruner(&self, mut shutdown: broadcast::Receiver<()>) -> JoinHandle<()> {
        let monitor = self.clone();
        let retention = Duration::from_secs(self.config.history_retention_secs);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(PRUNE_INTERVAL);
            ticker.tick().await;
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let removed = monitor.prune_finished(retention);
                        if removed > 0 {
                            tracing::debug!(removed, "Pruned finished transactions");
                        }
                    }
                    _ = shutdown.recv() => {
                        tracing::info!("Monitor pruner received shutdown signal, exiting loop");
                        break;
                    }
                }
            }
        })
    }

    async fn run(
        self,
        mut record: InFlightTransaction,
        subject: AuditSubject,
        mut cancel: watch::Receiver<bool>,
        callbacks: MonitorCallbacks,
    ) {
        self.drive(&mut record, &subject, &mut cancel).await;

        metrics::record_monitor_terminal(record.status.as_str());
        metrics::record_active_transactions(self.active_count());

        if record.status.is_success() {
            tracing::info!(
                tx_hash = %record.tx_hash,
                confirmations = record.confirmations,
                attempts = record.attempts,
                "Transaction verified"
            );
            (callbacks.on_success)(record);
        } else {
            tracing::warn!(
                tx_hash = %record.tx_hash,
                state = %record.status,
                error = record.error.as_deref().unwrap_or(""),
                attempts = record.attempts,
                "Transaction monitoring failed"
            );
            (callbacks.on_failure)(record);
        }
    }

    /// Poll until a terminal state is reached.
    async fn drive(
        &self,
        record: &mut InFlightTransaction,
        subject: &AuditSubject,
        cancel: &mut watch::Receiver<bool>,
    ) {
        let interval = Duration::from_millis(self.config.polling_interval_ms);

        loop {
            if *cancel.borrow() {
                record.error = Some("cancelled by request".into());
                self.advance(record, TxState::Cancelled);
                return;
            }

            let polled = self.ledger.get_status(record.tx_hash).await;
            record.attempts += 1;
            record.last_checked_at = Some(unix_time_millis());

            let status = match polled {
                Ok(status) => status,
                Err(e) => {
                    record.error = Some(e.to_string());
                    self.advance(record, TxState::Error);
                    return;
                }
            };

            if status.reverted() {
                record.block_number = status.block_number;
                record.error = Some(format!(
                    "transaction reverted in block {}",
                    status.block_number.unwrap_or_default()
                ));
                self.advance(record, TxState::Error);
                return;
            }

            if status.mined {
                record.block_number = status.block_number;
                record.confirmations = record.confirmations.max(status.confirmations);

                if record.status == TxState::Pending && self.advance(record, TxState::Confirming).is_terminal() {
                    return;
                }

                if record.confirmations >= self.config.confirmation_threshold {
                    if self.advance(record, TxState::Confirmed).is_terminal() {
                        return;
                    }
                    self.verify(record, subject).await;
                    return;
                }
            } else if record.status == TxState::Confirming {
                tracing::warn!(
                    tx_hash = %record.tx_hash,
                    block_number = ?record.block_number,
                    "Receipt disappeared, possible reorg"
                );
            }

            tracing::debug!(
                tx_hash = %record.tx_hash,
                state = %record.status,
                confirmations = record.confirmations,
                attempt = record.attempts,
                "Polled transaction"
            );
            self.publish(record);

            if record.attempts >= self.config.max_attempts {
                record.error = Some(format!(
                    "not confirmed after {} attempts ({} confirmations)",
                    record.attempts, record.confirmations
                ));
                self.advance(record, TxState::Timeout);
                return;
            }

            tokio::select! {
                _ = tokio::time::sleep(interval) => {}
                Ok(()) = cancel.changed() => {}
            }
        }
    }

    async fn verify(&self, record: &mut InFlightTransaction, subject: &AuditSubject) {
        let audit = AuditRecord {
            primary_tx_hash: record.tx_hash,
            reference: subject.reference.clone(),
            metadata_uri: subject.metadata_uri.clone(),
            block_number: record.block_number,
            confirmations: record.confirmations,
            recorded_at: unix_time_secs(),
        };

        let result = self.secondaries.cross_verify(&audit).await;
        let next = if result.success {
            TxState::Verified
        } else {
            record.error = Some(format!(
                "verification failed on {}",
                result.failed_networks().join(", ")
            ));
            TxState::VerificationFailed
        };
        record.verification = Some(result);
        self.advance(record, next);
    }

    /// Enter `next` and publish. A pending cancellation takes precedence
    /// wherever `Cancelled` is a legal successor. Returns the state entered.
    fn advance(&self, record: &mut InFlightTransaction, next: TxState) -> TxState {
        let Some(mut tracked) = self.registry.get_mut(&record.tx_hash) else {
            return Self::enter(record, next);
        };

        let cancelled = *tracked.cancel.borrow();
        let next = if cancelled && next != TxState::Cancelled && record.status.can_transition_to(TxState::Cancelled) {
            record.error = Some("cancelled by request".into());
            TxState::Cancelled
        } else {
            next
        };

        let entered = Self::enter(record, next);
        tracked.record = record.clone();
        entered
    }

    fn enter(record: &mut InFlightTransaction, next: TxState) -> TxState {
        if !record.status.can_transition_to(next) {
            tracing::error!(
                tx_hash = %record.tx_hash,
                from = %record.status,
                to = %next,
                "Illegal monitor transition"
            );
            return record.status;
        }

        tracing::debug!(tx_hash = %record.tx_hash, from = %record.status, to = %next, "Monitor transition");
        record.status = next;
        record.history.push(next);
        if next.is_terminal() {
            record.finished_at = Some(unix_time_millis());
        }
        next
    }

    fn publish(&self, record: &InFlightTransaction) {
        if let Some(mut tracked) = self.registry.get_mut(&record.tx_hash) {
            tracked.record = record.clone();
        }
    }
}
