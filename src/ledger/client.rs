//! Ledger client bound to the rental registry contract.
//!
//! # Responsibilities
//! - Turn a `ConfirmationPayload` into exactly one signed, broadcast transaction
//! - Report a transaction's inclusion state without blocking
//! - Serve read-only contract calls

use alloy::network::TransactionBuilder;
use alloy::primitives::{Address, Bytes, TxHash};
use alloy::rpc::types::TransactionRequest;
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::Mutex;

use crate::ledger::payload::ConfirmationPayload;
use crate::ledger::rpc::RpcClient;
use crate::ledger::transaction::TxBuilder;
use crate::ledger::types::{LedgerConfig, LedgerError, LedgerResult, ReceiptSummary, TxStatus};
use crate::ledger::wallet::Wallet;
use crate::ledger::Ledger;
use crate::observability::metrics;

/// Signing client for the registry contract on the primary ledger.
pub struct LedgerClient {
    rpc: RpcClient,
    builder: TxBuilder,
    contract: Address,
    /// Held from nonce lookup through broadcast.
    submit_lock: Mutex<()>,
    chain_verified: AtomicBool,
}

impl LedgerClient {
    /// Create a client for the configured contract.
    ///
    /// # Errors
    /// `Configuration` when the contract address is malformed or the wallet
    /// is bound to a different chain.
    pub async fn new(config: LedgerConfig, wallet: Wallet) -> LedgerResult<Self> {
        let contract: Address = config.contract_address.parse().map_err(|e| {
            LedgerError::Configuration(format!(
                "Invalid contract address '{}': {}",
                config.contract_address, e
            ))
        })?;
        if wallet.chain_id() != config.chain_id {
            return Err(LedgerError::Configuration(format!(
                "Wallet chain {} does not match ledger chain {}",
                wallet.chain_id(),
                config.chain_id
            )));
        }

        let rpc = RpcClient::new(config).await?;
        let builder = TxBuilder::new(rpc.clone(), wallet);

        Ok(Self {
            rpc,
            builder,
            contract,
            submit_lock: Mutex::new(()),
            chain_verified: AtomicBool::new(false),
        })
    }

    pub fn contract_address(&self) -> Address {
        self.contract
    }

    pub fn sender(&self) -> Address {
        self.builder.address()
    }

    pub fn rpc(&self) -> &RpcClient {
        &self.rpc
    }

    async fn ensure_chain(&self) -> LedgerResult<()> {
        if self.chain_verified.load(Ordering::Acquire) {
            return Ok(());
        }
        match self.rpc.verify_chain_id().await {
            Ok(()) => {
                self.chain_verified.store(true, Ordering::Release);
                Ok(())
            }
            Err(e @ LedgerError::ChainMismatch { .. }) => {
                Err(LedgerError::Configuration(e.to_string()))
            }
            Err(e) => Err(e),
        }
    }
}

#[async_trait]
impl Ledger for LedgerClient {
    async fn submit(&self, payload: &ConfirmationPayload) -> LedgerResult<TxHash> {
        let _guard = self.submit_lock.lock().await;
        self.ensure_chain().await?;

        let request = self.builder.build(self.contract, payload.calldata()).await?;
        let signed = self.builder.sign(request).await?;

        match self.rpc.send_raw_transaction(&signed.raw).await {
            Ok(tx_hash) => {
                metrics::record_submission("broadcast");
                tracing::info!(
                    tx_hash = %tx_hash,
                    nonce = signed.nonce,
                    gas_limit = signed.gas_limit,
                    agreement_id = %payload.agreement_id(),
                    "Confirmation transaction broadcast"
                );
                Ok(tx_hash)
            }
            Err(e) => {
                metrics::record_submission("failed");
                // The node may still have accepted it; the local hash is the only trace.
                tracing::error!(
                    local_tx_hash = %signed.hash,
                    nonce = signed.nonce,
                    error = %e,
                    "Confirmation transaction broadcast failed"
                );
                Err(e)
            }
        }
    }

    async fn get_status(&self, tx_hash: TxHash) -> LedgerResult<TxStatus> {
        let Some(receipt) = self.rpc.get_transaction_receipt(tx_hash).await? else {
            return Ok(TxStatus::pending());
        };

        let current_block = self.rpc.get_block_number().await?;
        let summary = ReceiptSummary {
            block_number: receipt.block_number.unwrap_or(current_block),
            gas_used: receipt.gas_used,
            success: receipt.status(),
        };
        Ok(TxStatus::mined(summary, current_block))
    }

    async fn call(&self, to: Address, input: Bytes) -> LedgerResult<Bytes> {
        let request = TransactionRequest::default().with_to(to).with_input(input);
        self.rpc.call(request).await
    }
}

impl std::fmt::Debug for LedgerClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LedgerClient")
            .field("rpc", &self.rpc)
            .field("contract", &self.contract)
            .field("sender", &self.sender())
            .finish()
    }
}
