//! JSON-RPC access with timeout, failover and error classification.
//!
//! # Responsibilities
//! - Connect to the primary endpoint and any failover endpoints
//! - Query chain state (chain id, block number, nonce, gas, receipts)
//! - Retry transient read failures with backoff
//! - Broadcast raw transactions on the primary endpoint only, exactly once

use alloy::primitives::{Address, Bytes, TxHash};
use alloy::providers::{Provider, ProviderBuilder};
use alloy::rpc::types::{TransactionReceipt, TransactionRequest};
use alloy::transports::TransportError;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::timeout;

use crate::ledger::types::{ChainId, LedgerConfig, LedgerError, LedgerResult};
use crate::observability::metrics;
use crate::resilience::retry_transient;

type DynProvider = Arc<dyn Provider + Send + Sync>;

/// RPC client wrapper with failover support.
#[derive(Clone)]
pub struct RpcClient {
    /// Primary provider first, then failovers.
    providers: Vec<DynProvider>,
    config: LedgerConfig,
    timeout_duration: Duration,
}

impl RpcClient {
    /// Create a new RPC client.
    ///
    /// An unreachable endpoint is not an error here; a malformed primary URL is.
    pub async fn new(config: LedgerConfig) -> LedgerResult<Self> {
        let timeout_duration = Duration::from_secs(config.rpc_timeout_secs);
        let mut providers = Vec::new();

        let primary_url: url::Url = config.rpc_url.parse().map_err(|e| {
            LedgerError::Configuration(format!("Invalid RPC URL '{}': {}", config.rpc_url, e))
        })?;
        providers.push(Arc::new(ProviderBuilder::new().connect_http(primary_url)) as DynProvider);

        for url_str in &config.failover_urls {
            if let Ok(url) = url_str.parse() {
                providers.push(Arc::new(ProviderBuilder::new().connect_http(url)) as DynProvider);
            } else {
                tracing::warn!(url = %url_str, "Ignoring invalid failover RPC URL");
            }
        }

        let client = Self {
            providers,
            config: config.clone(),
            timeout_duration,
        };

        match client.verify_chain_id().await {
            Ok(()) => {
                tracing::info!(
                    rpc_url = %config.rpc_url,
                    chain_id = config.chain_id,
                    "Ledger RPC client initialized"
                );
            }
            Err(e) => {
                // Submissions re-check before signing.
                tracing::warn!(
                    error = %e,
                    "Ledger RPC client initialized but chain verification failed"
                );
            }
        }

        Ok(client)
    }

    /// Verify the connected chain ID matches configuration.
    pub async fn verify_chain_id(&self) -> LedgerResult<()> {
        let actual = u64::from(self.get_chain_id().await?);
        if actual != self.config.chain_id {
            return Err(LedgerError::ChainMismatch {
                expected: self.config.chain_id,
                actual,
            });
        }
        Ok(())
    }

    pub async fn get_chain_id(&self) -> LedgerResult<ChainId> {
        self.read("get chain id", |p| async move { p.get_chain_id().await })
            .await
            .map(ChainId::from)
    }

    pub async fn get_block_number(&self) -> LedgerResult<u64> {
        self.read("get block number", |p| async move { p.get_block_number().await })
            .await
    }

    /// Nonce including transactions still in the mempool.
    pub async fn get_pending_nonce(&self, address: Address) -> LedgerResult<u64> {
        self.read("get transaction count", move |p| async move {
            p.get_transaction_count(address).pending().await
        })
        .await
    }

    pub async fn get_transaction_receipt(
        &self,
        tx_hash: TxHash,
    ) -> LedgerResult<Option<TransactionReceipt>> {
        self.read("get receipt", move |p| async move {
            p.get_transaction_receipt(tx_hash).await
        })
        .await
    }

    /// Current gas price in wei.
    pub async fn get_gas_price(&self) -> LedgerResult<u128> {
        self.read("get gas price", |p| async move { p.get_gas_price().await })
            .await
    }

    /// Simulate a transaction and return its gas usage.
    pub async fn estimate_gas(&self, tx: TransactionRequest) -> LedgerResult<u64> {
        self.read("estimate gas", move |p| {
            let tx = tx.clone();
            async move { p.estimate_gas(tx).await }
        })
        .await
    }

    /// Read-only contract call.
    pub async fn call(&self, tx: TransactionRequest) -> LedgerResult<Bytes> {
        self.read("eth_call", move |p| {
            let tx = tx.clone();
            async move { p.call(tx).await }
        })
        .await
    }

    /// Broadcast a signed transaction on the primary endpoint.
    ///
    /// Never retried and never sent to a failover endpoint.
    pub async fn send_raw_transaction(&self, raw: &[u8]) -> LedgerResult<TxHash> {
        let provider = &self.providers[0];
        match timeout(self.timeout_duration, provider.send_raw_transaction(raw)).await {
            Ok(Ok(pending)) => Ok(*pending.tx_hash()),
            Ok(Err(e)) if e.is_error_resp() => Err(LedgerError::Rpc(e.to_string())),
            Ok(Err(e)) => Err(LedgerError::Connection(format!("Broadcast failed: {}", e))),
            Err(_) => Err(LedgerError::Timeout(self.config.rpc_timeout_secs)),
        }
    }

    /// Check if the primary ledger endpoint is reachable.
    pub async fn is_healthy(&self) -> bool {
        let healthy = self.get_block_number().await.is_ok();
        metrics::record_rpc_health(&self.config.rpc_url, healthy);
        healthy
    }

    /// Probe the primary endpoint on `ledger.health_check_interval_secs` until shutdown.
    pub fn spawn_health_probe(&self, mut shutdown: broadcast::Receiver<()>) -> JoinHandle<()> {
        let client = self.clone();
        tokio::spawn(async move {
            if client.config.health_check_interval_secs == 0 {
                tracing::info!("Ledger health probe disabled");
                return;
            }

            let mut ticker = tokio::time::interval(Duration::from_secs(client.config.health_check_interval_secs));
            let mut was_healthy = true;
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let healthy = client.is_healthy().await;
                        if healthy != was_healthy {
                            if healthy {
                                tracing::info!(rpc_url = %client.config.rpc_url, "Ledger RPC reachable again");
                            } else {
                                tracing::warn!(rpc_url = %client.config.rpc_url, "Ledger RPC unreachable");
                            }
                            was_healthy = healthy;
                        }
                    }
                    _ = shutdown.recv() => {
                        tracing::info!("Ledger health probe received shutdown signal, exiting loop");
                        break;
                    }
                }
            }
        })
    }

    pub fn config(&self) -> &LedgerConfig {
        &self.config
    }

    async fn read<T, F, Fut>(&self, op: &'static str, f: F) -> LedgerResult<T>
    where
        F: Fn(DynProvider) -> Fut,
        Fut: Future<Output = Result<T, TransportError>>,
    {
        retry_transient(&self.config.retry, op, || self.read_once(op, &f)).await
    }

    async fn read_once<T, F, Fut>(&self, op: &'static str, f: &F) -> LedgerResult<T>
    where
        F: Fn(DynProvider) -> Fut,
        Fut: Future<Output = Result<T, TransportError>>,
    {
        let mut last_error = String::from("no providers");
        for (i, provider) in self.providers.iter().enumerate() {
            match timeout(self.timeout_duration, f(provider.clone())).await {
                Ok(Ok(result)) => return Ok(result),
                // The node understood the request and rejected it; another node would too.
                Ok(Err(e)) if e.is_error_resp() => return Err(LedgerError::Rpc(e.to_string())),
                Ok(Err(e)) => {
                    tracing::warn!(provider_idx = i, op, error = %e, "RPC error, trying next provider");
                    last_error = e.to_string();
                }
                Err(_) => {
                    tracing::warn!(provider_idx = i, op, "RPC timeout, trying next provider");
                    last_error = format!("timeout after {}s", self.config.rpc_timeout_secs);
                }
            }
        }
        Err(LedgerError::Connection(format!(
            "All RPC providers failed to {}: {}",
            op, last_error
        )))
    }
}

impl std::fmt::Debug for RpcClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RpcClient")
            .field("rpc_url", &self.config.rpc_url)
            .field("failovers", &(self.providers.len() - 1))
            .field("chain_id", &self.config.chain_id)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RetryConfig;

    fn unreachable_config() -> LedgerConfig {
        LedgerConfig {
            rpc_url: "http://127.0.0.1:1".to_string(),
            failover_urls: vec!["not a url".to_string(), "http://127.0.0.1:2".to_string()],
            rpc_timeout_secs: 2,
            retry: RetryConfig {
                max_attempts: 2,
                base_delay_ms: 1,
                max_delay_ms: 1,
            },
            ..LedgerConfig::default()
        }
    }

    #[tokio::test]
    async fn test_creation_survives_unreachable_endpoint() {
        let client = RpcClient::new(unreachable_config()).await.unwrap();
        // Invalid failover URL is skipped.
        assert_eq!(client.providers.len(), 2);
    }

    #[tokio::test]
    async fn test_invalid_primary_url_is_configuration_error() {
        let mut config = unreachable_config();
        config.rpc_url = "::::".to_string();
        let err = RpcClient::new(config).await.unwrap_err();
        assert!(matches!(err, LedgerError::Configuration(_)));
    }

    #[tokio::test]
    async fn test_failover_exhaustion_is_connection_error() {
        let client = RpcClient::new(unreachable_config()).await.unwrap();
        let err = client.get_block_number().await.unwrap_err();
        assert!(matches!(err, LedgerError::Connection(_)));
        assert!(err.to_string().contains("All RPC providers failed"));
        assert!(!client.is_healthy().await);
    }

    #[tokio::test]
    async fn test_health_probe_stops_on_shutdown() {
        let mut config = unreachable_config();
        config.failover_urls.clear();
        let client = RpcClient::new(config).await.unwrap();
        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);

        let handle = client.spawn_health_probe(shutdown_rx);
        shutdown_tx.send(()).unwrap();
        handle.await.unwrap();
    }
}
