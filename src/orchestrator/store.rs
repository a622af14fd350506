//! Persistence boundary for agreement records.

use alloy::primitives::TxHash;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Agreement {0} not found")]
    NotFound(String),

    #[error("Snapshot I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("Snapshot serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Store backend error: {0}")]
    Backend(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgreementStatus {
    Proposed,
    Accepted,
    Confirmed,
    Rejected,
    Cancelled,
}

impl fmt::Display for AgreementStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            AgreementStatus::Proposed => "proposed",
            AgreementStatus::Accepted => "accepted",
            AgreementStatus::Confirmed => "confirmed",
            AgreementStatus::Rejected => "rejected",
            AgreementStatus::Cancelled => "cancelled",
        };
        f.write_str(s)
    }
}

/// Off-chain rental agreement as owned by the application.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Agreement {
    pub id: String,
    pub property_id: String,
    pub tenant_id: String,
    pub landlord_id: String,
    /// User who authored the proposal; the other participant confirms.
    pub proposed_by: String,
    pub status: AgreementStatus,
    #[serde(default)]
    pub terms: serde_json::Value,
    #[serde(default)]
    pub tx_hash: Option<TxHash>,
    #[serde(default)]
    pub metadata_uri: Option<String>,
    #[serde(default)]
    pub confirmed_at: Option<u64>,
}

impl Agreement {
    /// The participant who did not author the proposal.
    pub fn counter_party(&self) -> Option<&str> {
        if self.proposed_by == self.tenant_id {
            Some(self.landlord_id.as_str())
        } else if self.proposed_by == self.landlord_id {
            Some(self.tenant_id.as_str())
        } else {
            None
        }
    }
}

/// Fields written together with a successful status transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfirmationUpdate {
    pub tx_hash: TxHash,
    pub metadata_uri: String,
    pub confirmed_at: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub enum CasOutcome {
    /// The expected status matched and the update was written.
    Applied(Agreement),
    /// Someone else changed the status first; the current record is returned.
    Mismatch(Agreement),
}

/// Immutable description of the agreed terms, referenced from the ledger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgreementMetadata {
    pub agreement_id: String,
    pub property_id: String,
    pub tenant_id: String,
    pub landlord_id: String,
    pub terms: serde_json::Value,
    pub created_at: u64,
}

impl AgreementMetadata {
    pub fn from_agreement(agreement: &Agreement, created_at: u64) -> Self {
        Self {
            agreement_id: agreement.id.clone(),
            property_id: agreement.property_id.clone(),
            tenant_id: agreement.tenant_id.clone(),
            landlord_id: agreement.landlord_id.clone(),
            terms: agreement.terms.clone(),
            created_at,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetadataRef {
    pub id: String,
    pub uri: String,
}

/// Operations the orchestrator needs from the application's persistence layer.
#[async_trait]
pub trait AgreementStore: Send + Sync {
    async fn load_agreement(&self, id: &str) -> StoreResult<Option<Agreement>>;

    /// Atomically move `id` from `expected` to `next`, writing `update`.
    async fn compare_and_set_status(
        &self,
        id: &str,
        expected: AgreementStatus,
        next: AgreementStatus,
        update: ConfirmationUpdate,
    ) -> StoreResult<CasOutcome>;

    async fn create_metadata_record(&self, metadata: &AgreementMetadata) -> StoreResult<MetadataRef>;

    async fn resolve_wallet_address(&self, user_id: &str) -> StoreResult<Option<String>>;
}
