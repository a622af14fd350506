//! Secondary verification networks.
//!
//! # Data Flow
//! ```text
//! Transaction reaches Confirmed
//!     → SecondaryNetworks::cross_verify
//!         → each network: record(audit) → external record id (optional)
//!         → each network: verify(tx_hash) → VerificationDetail
//!     → VerificationResult (success only if every network verified)
//! ```
//!
//! # Design Decisions
//! - "Not found" is a negative verification, never an error
//! - Each client owns its own request timeout, independent of the monitor
//! - Audit record failures are partial success unless configured otherwise

pub mod explorer;
pub mod permissioned;

use alloy::primitives::TxHash;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use thiserror::Error;

use crate::observability::metrics;

pub use explorer::ExplorerClient;
pub use permissioned::PermissionedLedgerClient;

/// Errors from a secondary network client.
#[derive(Debug, Error)]
pub enum SecondaryError {
    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Request timed out after {0} seconds")]
    Timeout(u64),

    #[error("Unexpected HTTP status {status}: {body}")]
    Http { status: u16, body: String },

    #[error("API error: {0}")]
    Api(String),

    #[error("Malformed response: {0}")]
    Decode(String),

    #[error("Invalid client configuration: {0}")]
    Configuration(String),
}

pub type SecondaryResult<T> = Result<T, SecondaryError>;

impl SecondaryError {
    pub(crate) fn from_reqwest(e: reqwest::Error, timeout_secs: u64) -> Self {
        if e.is_timeout() {
            SecondaryError::Timeout(timeout_secs)
        } else if e.is_decode() {
            SecondaryError::Decode(e.to_string())
        } else {
            SecondaryError::Connection(e.to_string())
        }
    }
}

/// Cross-reference written to a secondary network for audit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditRecord {
    pub primary_tx_hash: TxHash,
    /// Application reference, e.g. the agreement id.
    pub reference: String,
    pub metadata_uri: Option<String>,
    pub block_number: Option<u64>,
    pub confirmations: u64,
    pub recorded_at: u64,
}

/// One network's verdict.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationDetail {
    pub verified: bool,
    /// Why verification was negative.
    pub reason: Option<String>,
    /// Id of the audit record on this network, when one was written.
    pub record_id: Option<String>,
    pub record_error: Option<String>,
}

impl VerificationDetail {
    pub fn verified() -> Self {
        Self {
            verified: true,
            reason: None,
            record_id: None,
            record_error: None,
        }
    }

    pub fn rejected(reason: impl Into<String>) -> Self {
        Self {
            verified: false,
            reason: Some(reason.into()),
            record_id: None,
            record_error: None,
        }
    }
}

/// Outcome of cross-network verification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationResult {
    pub success: bool,
    /// Keyed by network name.
    pub details: BTreeMap<String, VerificationDetail>,
    pub confirmations: u64,
    pub timestamp: u64,
}

impl VerificationResult {
    /// Names of networks that did not verify.
    pub fn failed_networks(&self) -> Vec<&str> {
        self.details
            .iter()
            .filter(|(_, detail)| !detail.verified)
            .map(|(name, _)| name.as_str())
            .collect()
    }
}

/// A secondary network able to corroborate a primary transaction.
#[async_trait]
pub trait SecondaryNetwork: Send + Sync {
    /// Stable name used in results, logs and metrics.
    fn name(&self) -> &str;

    /// Ask the network whether it independently confirms `tx_hash`.
    async fn verify(&self, tx_hash: TxHash) -> SecondaryResult<VerificationDetail>;

    /// Durably write an audit cross-reference. `None` when the network is read-only.
    async fn record(&self, record: &AuditRecord) -> SecondaryResult<Option<String>>;

    /// Raw lookup by a network-specific reference.
    async fn query(&self, reference: &str) -> SecondaryResult<Option<serde_json::Value>>;
}

/// The configured set of secondary networks.
#[derive(Clone, Default)]
pub struct SecondaryNetworks {
    networks: Vec<Arc<dyn SecondaryNetwork>>,
    require_audit_record: bool,
}

impl SecondaryNetworks {
    pub fn new(networks: Vec<Arc<dyn SecondaryNetwork>>, require_audit_record: bool) -> Self {
        Self {
            networks,
            require_audit_record,
        }
    }

    pub fn len(&self) -> usize {
        self.networks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.networks.is_empty()
    }

    pub fn names(&self) -> Vec<String> {
        self.networks.iter().map(|n| n.name().to_string()).collect()
    }

    /// Record and verify on every network. Succeeds only if all verify.
    pub async fn cross_verify(&self, audit: &AuditRecord) -> VerificationResult {
        let mut details = BTreeMap::new();

        for network in &self.networks {
            let name = network.name().to_string();

            let (record_id, record_error) = match network.record(audit).await {
                Ok(id) => (id, None),
                Err(e) => {
                    tracing::warn!(
                        network = %name,
                        tx_hash = %audit.primary_tx_hash,
                        error = %e,
                        "Audit record failed"
                    );
                    (None, Some(e.to_string()))
                }
            };

            let mut detail = match network.verify(audit.primary_tx_hash).await {
                Ok(detail) => detail,
                Err(e) => {
                    tracing::warn!(
                        network = %name,
                        tx_hash = %audit.primary_tx_hash,
                        error = %e,
                        "Secondary verification failed"
                    );
                    VerificationDetail::rejected(e.to_string())
                }
            };
            detail.record_id = record_id;
            if let Some(err) = record_error {
                if self.require_audit_record && detail.verified {
                    detail.verified = false;
                    detail.reason = Some(format!("audit record required: {}", err));
                }
                detail.record_error = Some(err);
            }

            metrics::record_verification(&name, detail.verified);
            details.insert(name, detail);
        }

        let success = details.values().all(|d| d.verified);
        VerificationResult {
            success,
            details,
            confirmations: audit.confirmations,
            timestamp: unix_time_secs(),
        }
    }
}

pub(crate) fn unix_time_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}
