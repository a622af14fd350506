//! Transaction building and signing.
//!
//! # Responsibilities
//! - Resolve a fresh pending nonce for every build
//! - Estimate gas, falling back to the configured default limit
//! - Apply the gas price ceiling and multiplier
//! - Sign into an EIP-2718 encoded raw transaction

use alloy::eips::eip2718::Encodable2718;
use alloy::network::TransactionBuilder;
use alloy::primitives::{Address, Bytes, TxHash};
use alloy::rpc::types::TransactionRequest;

use crate::ledger::rpc::RpcClient;
use crate::ledger::types::{LedgerError, LedgerResult};
use crate::ledger::wallet::Wallet;

/// A signed transaction ready for broadcast.
#[derive(Debug, Clone)]
pub struct SignedTx {
    pub hash: TxHash,
    pub nonce: u64,
    pub gas_limit: u64,
    pub raw: Vec<u8>,
}

/// Transaction builder for contract calls from the platform wallet.
#[derive(Clone)]
pub struct TxBuilder {
    rpc: RpcClient,
    wallet: Wallet,
}

impl TxBuilder {
    pub fn new(rpc: RpcClient, wallet: Wallet) -> Self {
        Self { rpc, wallet }
    }

    /// Build a contract call transaction request.
    ///
    /// # Arguments
    /// * `to` - Contract address
    /// * `input` - ABI-encoded call data
    pub async fn build(&self, to: Address, input: Bytes) -> LedgerResult<TransactionRequest> {
        let from = self.wallet.address();
        let nonce = self.rpc.get_pending_nonce(from).await?;

        let gas_price = self.rpc.get_gas_price().await?;
        let gas_price_gwei = gas_price / 1_000_000_000;

        let config = self.rpc.config();
        if gas_price_gwei > config.max_gas_price_gwei as u128 {
            return Err(LedgerError::GasPriceTooHigh {
                current_gwei: gas_price_gwei as u64,
                max_gwei: config.max_gas_price_gwei,
            });
        }
        let adjusted_gas_price = (gas_price as f64 * config.gas_price_multiplier) as u128;

        let request = TransactionRequest::default()
            .with_from(from)
            .with_to(to)
            .with_input(input)
            .with_nonce(nonce)
            .with_chain_id(self.wallet.chain_id());

        let gas_limit = match self.rpc.estimate_gas(request.clone()).await {
            // 20% headroom over the simulation.
            Ok(estimate) => estimate.saturating_add(estimate / 5),
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    default_gas_limit = config.default_gas_limit,
                    "Gas estimation failed, using default gas limit"
                );
                config.default_gas_limit
            }
        };

        Ok(request
            .with_gas_price(adjusted_gas_price)
            .with_gas_limit(gas_limit))
    }

    /// Sign a fully populated request with the platform key.
    pub async fn sign(&self, request: TransactionRequest) -> LedgerResult<SignedTx> {
        let nonce = request
            .nonce
            .ok_or_else(|| LedgerError::Argument("transaction request has no nonce".to_string()))?;
        let gas_limit = request
            .gas
            .ok_or_else(|| LedgerError::Argument("transaction request has no gas limit".to_string()))?;

        let envelope = request
            .build(&self.wallet.ethereum_wallet())
            .await
            .map_err(|e| LedgerError::Configuration(format!("Failed to sign transaction: {}", e)))?;

        Ok(SignedTx {
            hash: *envelope.tx_hash(),
            nonce,
            gas_limit,
            raw: envelope.encoded_2718(),
        })
    }

    pub fn address(&self) -> Address {
        self.wallet.address()
    }
}
