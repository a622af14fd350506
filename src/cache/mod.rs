//! Contract call cache.
//!
//! Time-bounded memoization of read-only registry calls.
//!
//! # Data Flow
//! ```text
//! cached_call(contract, call)
//!     → key = contract + method signature + encoded args
//!     → fresh entry? return decoded bytes, no RPC
//!     → otherwise Ledger::call, store (bytes, now), return
//!
//! sweeper task (fixed interval, independent of traffic)
//!     → retain entries that are not expired
//! ```
//!
//! Reads and the sweeper share `CacheEntry::is_expired`, so a stale entry is
//! never served even if the sweeper has not reached it yet.

use alloy::primitives::{Address, Bytes};
use alloy::sol_types::SolCall;
use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::Instant;

use crate::config::CacheConfig;
use crate::ledger::{Ledger, LedgerError, LedgerResult};
use crate::observability::metrics;

/// Composite key of a contract read.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub contract: Address,
    pub method: &'static str,
    /// ABI-encoded arguments without the selector.
    pub args: Bytes,
}

/// A cached raw call result.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub value: Bytes,
    pub inserted_at: Instant,
}

impl CacheEntry {
    pub fn is_expired(&self, now: Instant, ttl: Duration) -> bool {
        now.saturating_duration_since(self.inserted_at) > ttl
    }
}

/// Read-through cache in front of `Ledger::call`.
#[derive(Clone)]
pub struct ContractCallCache {
    ledger: Arc<dyn Ledger>,
    entries: Arc<DashMap<CacheKey, CacheEntry>>,
    ttl: Duration,
    sweep_interval: Duration,
}

impl ContractCallCache {
    pub fn new(ledger: Arc<dyn Ledger>, config: &CacheConfig) -> Self {
        Self {
            ledger,
            entries: Arc::new(DashMap::new()),
            ttl: Duration::from_secs(config.ttl_secs),
            sweep_interval: Duration::from_secs(config.sweep_interval_secs),
        }
    }

    /// Execute `call` against `contract`, serving fresh results from the cache.
    pub async fn cached_call<C: SolCall>(&self, contract: Address, call: &C) -> LedgerResult<C::Return> {
        let input = call.abi_encode();
        let key = CacheKey {
            contract,
            method: C::SIGNATURE,
            args: Bytes::copy_from_slice(&input[C::SELECTOR.len()..]),
        };

        let raw = match self.lookup(&key) {
            Some(value) => {
                metrics::record_cache_lookup(true);
                value
            }
            None => {
                metrics::record_cache_lookup(false);
                let value = self.ledger.call(contract, input.into()).await?;
                self.entries.insert(
                    key,
                    CacheEntry {
                        value: value.clone(),
                        inserted_at: Instant::now(),
                    },
                );
                metrics::record_cache_size(self.entries.len());
                value
            }
        };

        C::abi_decode_returns(&raw).map_err(|e| LedgerError::Decode(format!("{}: {}", C::SIGNATURE, e)))
    }

    fn lookup(&self, key: &CacheKey) -> Option<Bytes> {
        let now = Instant::now();
        let stale = match self.entries.get(key) {
            Some(entry) if !entry.is_expired(now, self.ttl) => return Some(entry.value.clone()),
            Some(_) => true,
            None => false,
        };
        if stale {
            self.entries.remove_if(key, |_, entry| entry.is_expired(now, self.ttl));
        }
        None
    }

    /// Remove every expired entry. Returns how many were removed.
    pub fn sweep(&self) -> usize {
        let now = Instant::now();
        let before = self.entries.len();
        self.entries.retain(|_, entry| !entry.is_expired(now, self.ttl));
        let after = self.entries.len();
        metrics::record_cache_size(after);
        before.saturating_sub(after)
    }

    /// Run `sweep` on the configured interval until shutdown.
    pub fn spawn_sweeper(&self, mut shutdown: broadcast::Receiver<()>) -> JoinHandle<()> {
        let cache = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(cache.sweep_interval);
            ticker.tick().await;
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let removed = cache.sweep();
                        if removed > 0 {
                            tracing::debug!(removed, remaining = cache.len(), "Contract cache sweep");
                        }
                    }
                    _ = shutdown.recv() => {
                        tracing::info!("Contract cache sweeper received shutdown signal, exiting loop");
                        break;
                    }
                }
            }
        })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }
}
