//! Shared fixtures for integration tests.

#![allow(dead_code)]

use alloy::primitives::{hex, keccak256, Address, Bytes, TxHash, U256};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

use rental_ledger::cache::ContractCallCache;
use rental_ledger::config::{CacheConfig, LedgerConfig, MonitorConfig, RetryConfig, StoreConfig};
use rental_ledger::ledger::{
    ConfirmationPayload, Ledger, LedgerError, LedgerResult, ReceiptSummary, TxStatus, Wallet,
};
use rental_ledger::monitor::TransactionMonitor;
use rental_ledger::orchestrator::{
    Agreement, AgreementStatus, ConfirmationOrchestrator, MemoryAgreementStore,
};
use rental_ledger::secondary::{
    AuditRecord, SecondaryNetwork, SecondaryNetworks, SecondaryResult, VerificationDetail,
};

/// Anvil's first development account.
pub const DEV_PRIVATE_KEY: &str = "ac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";
pub const DEV_ADDRESS: &str = "0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266";
pub const TENANT_WALLET: &str = "0x70997970C51812dc3A010C7d01b50e0d17dc79C8";
pub const LANDLORD_WALLET: &str = "0x3C44CdDdB6a900fa2b585dd299e03d12FA4293BC";
pub const CONTRACT: &str = "0x5FbDB2315678afecb367f032d93F642f64180aa3";
pub const CHAIN_ID: u64 = 31337;

// ---------------------------------------------------------------------------
// Mock JSON-RPC node
// ---------------------------------------------------------------------------

/// Mutable state behind the mock node.
pub struct NodeState {
    pub chain_id: AtomicU64,
    pub block_number: AtomicU64,
    pub nonce: AtomicU64,
    pub gas_price_wei: AtomicU64,
    pub estimate_gas: AtomicU64,
    pub estimate_fails: AtomicBool,
    /// When set, a broadcast transaction is mined in the next block and the
    /// head jumps this many blocks past it.
    pub auto_mine_depth: Mutex<Option<u64>>,
    pub call_result: Mutex<Bytes>,
    pub receipts: Mutex<HashMap<TxHash, Value>>,
    pub raw_transactions: Mutex<Vec<Vec<u8>>>,
    pub method_counts: Mutex<HashMap<String, usize>>,
}

impl Default for NodeState {
    fn default() -> Self {
        Self {
            chain_id: AtomicU64::new(CHAIN_ID),
            block_number: AtomicU64::new(100),
            nonce: AtomicU64::new(5),
            gas_price_wei: AtomicU64::new(1_000_000_000),
            estimate_gas: AtomicU64::new(100_000),
            estimate_fails: AtomicBool::new(false),
            auto_mine_depth: Mutex::new(None),
            call_result: Mutex::new(Bytes::from(U256::ZERO.to_be_bytes::<32>().to_vec())),
            receipts: Mutex::new(HashMap::new()),
            raw_transactions: Mutex::new(Vec::new()),
            method_counts: Mutex::new(HashMap::new()),
        }
    }
}

impl NodeState {
    pub fn count(&self, method: &str) -> usize {
        self.method_counts.lock().unwrap().get(method).copied().unwrap_or(0)
    }

    pub fn set_call_result_bool(&self, value: bool) {
        *self.call_result.lock().unwrap() =
            Bytes::from(U256::from(value as u8).to_be_bytes::<32>().to_vec());
    }

    /// Record a receipt for `tx_hash` in `block`.
    pub fn mine(&self, tx_hash: TxHash, block: u64, success: bool) {
        self.receipts
            .lock()
            .unwrap()
            .insert(tx_hash, receipt_json(tx_hash, block, success));
    }

    fn answer(&self, method: &str, params: &Value) -> Result<Value, Value> {
        *self
            .method_counts
            .lock()
            .unwrap()
            .entry(method.to_string())
            .or_default() += 1;

        match method {
            "eth_chainId" => Ok(quantity(self.chain_id.load(Ordering::SeqCst))),
            "eth_blockNumber" => Ok(quantity(self.block_number.load(Ordering::SeqCst))),
            "eth_getTransactionCount" => Ok(quantity(self.nonce.load(Ordering::SeqCst))),
            "eth_gasPrice" => Ok(quantity(self.gas_price_wei.load(Ordering::SeqCst))),
            "eth_estimateGas" => {
                if self.estimate_fails.load(Ordering::SeqCst) {
                    Err(json!({"code": -32000, "message": "execution reverted"}))
                } else {
                    Ok(quantity(self.estimate_gas.load(Ordering::SeqCst)))
                }
            }
            "eth_call" => Ok(json!(self.call_result.lock().unwrap().to_string())),
            "eth_sendRawTransaction" => {
                let raw_hex = params[0].as_str().unwrap_or_default();
                let raw = hex::decode(raw_hex).map_err(|e| json!({"code": -32602, "message": e.to_string()}))?;
                let tx_hash = keccak256(&raw);
                self.raw_transactions.lock().unwrap().push(raw);
                self.nonce.fetch_add(1, Ordering::SeqCst);

                if let Some(depth) = *self.auto_mine_depth.lock().unwrap() {
                    let block = self.block_number.load(Ordering::SeqCst) + 1;
                    self.mine(tx_hash, block, true);
                    self.block_number.store(block + depth, Ordering::SeqCst);
                }
                Ok(json!(tx_hash.to_string()))
            }
            "eth_getTransactionReceipt" => {
                let requested: TxHash = params[0].as_str().unwrap_or_default().parse().unwrap_or_default();
                Ok(self
                    .receipts
                    .lock()
                    .unwrap()
                    .get(&requested)
                    .cloned()
                    .unwrap_or(Value::Null))
            }
            other => Err(json!({"code": -32601, "message": format!("method {} not found", other)})),
        }
    }
}

fn quantity(n: u64) -> Value {
    json!(format!("0x{:x}", n))
}

pub fn receipt_json(tx_hash: TxHash, block: u64, success: bool) -> Value {
    json!({
        "transactionHash": tx_hash.to_string(),
        "transactionIndex": "0x0",
        "blockHash": TxHash::repeat_byte(0xbb).to_string(),
        "blockNumber": format!("0x{:x}", block),
        "from": DEV_ADDRESS,
        "to": CONTRACT,
        "cumulativeGasUsed": "0xcb20",
        "gasUsed": "0xcb20",
        "effectiveGasPrice": "0x3b9aca00",
        "contractAddress": null,
        "logs": [],
        "logsBloom": format!("0x{}", "0".repeat(512)),
        "status": if success { "0x1" } else { "0x0" },
        "type": "0x0"
    })
}

struct JsonRpcResponder(Arc<NodeState>);

impl JsonRpcResponder {
    fn reply(&self, request: &Value) -> Value {
        let id = request.get("id").cloned().unwrap_or(Value::Null);
        let method = request["method"].as_str().unwrap_or_default();
        match self.0.answer(method, &request["params"]) {
            Ok(result) => json!({"jsonrpc": "2.0", "id": id, "result": result}),
            Err(error) => json!({"jsonrpc": "2.0", "id": id, "error": error}),
        }
    }
}

impl Respond for JsonRpcResponder {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        let body: Value = match serde_json::from_slice(&request.body) {
            Ok(body) => body,
            Err(_) => return ResponseTemplate::new(400),
        };
        let reply = match body {
            Value::Array(batch) => Value::Array(batch.iter().map(|r| self.reply(r)).collect()),
            single => self.reply(&single),
        };
        ResponseTemplate::new(200).set_body_json(reply)
    }
}

/// Start a mock JSON-RPC node.
pub async fn start_mock_node() -> (MockServer, Arc<NodeState>) {
    let server = MockServer::start().await;
    let state = Arc::new(NodeState::default());
    Mock::given(wiremock::matchers::method("POST"))
        .respond_with(JsonRpcResponder(state.clone()))
        .mount(&server)
        .await;
    (server, state)
}

pub fn ledger_config(rpc_url: &str) -> LedgerConfig {
    LedgerConfig {
        rpc_url: rpc_url.to_string(),
        chain_id: CHAIN_ID,
        contract_address: CONTRACT.to_string(),
        rpc_timeout_secs: 5,
        retry: RetryConfig {
            max_attempts: 1,
            base_delay_ms: 1,
            max_delay_ms: 1,
        },
        ..LedgerConfig::default()
    }
}

pub fn dev_wallet() -> Wallet {
    Wallet::from_private_key(DEV_PRIVATE_KEY, CHAIN_ID).unwrap()
}

// ---------------------------------------------------------------------------
// In-process fakes
// ---------------------------------------------------------------------------

/// Ledger double: every submission gets a fresh hash and reports `status`.
pub struct FakeLedger {
    status: Mutex<LedgerResult<TxStatus>>,
    submit_error: Mutex<Option<String>>,
    pub submitted: Mutex<Vec<ConfirmationPayload>>,
    pub polls: AtomicUsize,
    pub calls: AtomicUsize,
    pub call_result: bool,
}

impl FakeLedger {
    fn with_status(status: LedgerResult<TxStatus>) -> Arc<Self> {
        Arc::new(Self {
            status: Mutex::new(status),
            submit_error: Mutex::new(None),
            submitted: Mutex::new(Vec::new()),
            polls: AtomicUsize::new(0),
            calls: AtomicUsize::new(0),
            call_result: true,
        })
    }

    /// Mined `depth` blocks deep on every poll.
    pub fn mined(depth: u64) -> Arc<Self> {
        let receipt = ReceiptSummary {
            block_number: 1_000,
            gas_used: 60_000,
            success: true,
        };
        Self::with_status(Ok(TxStatus::mined(receipt, 1_000 + depth)))
    }

    pub fn never_mined() -> Arc<Self> {
        Self::with_status(Ok(TxStatus::pending()))
    }

    pub fn fail_submissions(&self, message: &str) {
        *self.submit_error.lock().unwrap() = Some(message.to_string());
    }

    pub fn submit_count(&self) -> usize {
        self.submitted.lock().unwrap().len()
    }
}

#[async_trait]
impl Ledger for FakeLedger {
    async fn submit(&self, payload: &ConfirmationPayload) -> LedgerResult<TxHash> {
        if let Some(message) = self.submit_error.lock().unwrap().clone() {
            return Err(LedgerError::Connection(message));
        }
        let mut submitted = self.submitted.lock().unwrap();
        submitted.push(payload.clone());
        Ok(TxHash::with_last_byte(submitted.len() as u8))
    }

    async fn get_status(&self, _tx_hash: TxHash) -> LedgerResult<TxStatus> {
        self.polls.fetch_add(1, Ordering::SeqCst);
        match &*self.status.lock().unwrap() {
            Ok(status) => Ok(status.clone()),
            Err(e) => Err(LedgerError::Rpc(e.to_string())),
        }
    }

    async fn call(&self, _to: Address, _input: Bytes) -> LedgerResult<Bytes> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(Bytes::from(U256::from(self.call_result as u8).to_be_bytes::<32>().to_vec()))
    }
}

/// Secondary network double with a fixed verdict.
pub struct StaticNetwork {
    pub name: &'static str,
    pub verified: bool,
    pub records: Mutex<Vec<AuditRecord>>,
    verify_delay: Option<Duration>,
}

impl StaticNetwork {
    pub fn new(name: &'static str, verified: bool) -> Arc<Self> {
        Arc::new(Self {
            name,
            verified,
            records: Mutex::new(Vec::new()),
            verify_delay: None,
        })
    }

    /// Verifies successfully, but only after `delay`.
    pub fn slow(name: &'static str, delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            name,
            verified: true,
            records: Mutex::new(Vec::new()),
            verify_delay: Some(delay),
        })
    }
}

#[async_trait]
impl SecondaryNetwork for StaticNetwork {
    fn name(&self) -> &str {
        self.name
    }

    async fn verify(&self, _tx_hash: TxHash) -> SecondaryResult<VerificationDetail> {
        if let Some(delay) = self.verify_delay {
            tokio::time::sleep(delay).await;
        }
        Ok(if self.verified {
            VerificationDetail::verified()
        } else {
            VerificationDetail::rejected("no matching record")
        })
    }

    async fn record(&self, record: &AuditRecord) -> SecondaryResult<Option<String>> {
        let mut records = self.records.lock().unwrap();
        records.push(record.clone());
        Ok(Some(format!("{}-{}", self.name, records.len())))
    }

    async fn query(&self, _reference: &str) -> SecondaryResult<Option<Value>> {
        Ok(None)
    }
}

pub fn accepted_agreement(id: &str) -> Agreement {
    Agreement {
        id: id.to_string(),
        property_id: "property-7".to_string(),
        tenant_id: "tenant-1".to_string(),
        landlord_id: "landlord-1".to_string(),
        proposed_by: "tenant-1".to_string(),
        status: AgreementStatus::Accepted,
        terms: json!({"monthlyRent": 1450, "currency": "EUR", "months": 12}),
        tx_hash: None,
        metadata_uri: None,
        confirmed_at: None,
    }
}

/// Store with one accepted agreement and both participants' wallets.
pub fn seeded_store(agreement_id: &str) -> MemoryAgreementStore {
    let store = MemoryAgreementStore::new(&StoreConfig::default());
    store.insert_agreement(accepted_agreement(agreement_id));
    store.set_wallet("tenant-1", TENANT_WALLET);
    store.set_wallet("landlord-1", LANDLORD_WALLET);
    store
}

pub fn fast_monitor_config(max_attempts: u32) -> MonitorConfig {
    MonitorConfig {
        confirmation_threshold: 12,
        polling_interval_ms: 0,
        max_attempts,
        history_retention_secs: 3600,
    }
}

pub fn orchestrator(
    store: MemoryAgreementStore,
    ledger: Arc<dyn Ledger>,
    networks: Vec<Arc<dyn SecondaryNetwork>>,
    monitor_config: MonitorConfig,
) -> ConfirmationOrchestrator {
    let monitor = TransactionMonitor::new(
        ledger.clone(),
        SecondaryNetworks::new(networks, false),
        monitor_config,
    );
    let cache = ContractCallCache::new(ledger.clone(), &CacheConfig::default());
    let contract: Address = CONTRACT.parse().unwrap();
    ConfirmationOrchestrator::new(Arc::new(store), ledger, monitor, cache, contract)
}
