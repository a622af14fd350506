//! In-memory agreement store with optional JSON snapshot persistence.

use async_trait::async_trait;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;
use std::sync::Arc;

use crate::config::StoreConfig;
use crate::orchestrator::store::{
    Agreement, AgreementMetadata, AgreementStatus, AgreementStore, CasOutcome, ConfirmationUpdate,
    MetadataRef, StoreError, StoreResult,
};

#[derive(Debug, Default, Serialize, Deserialize)]
struct Snapshot {
    agreements: HashMap<String, Agreement>,
    metadata: HashMap<String, AgreementMetadata>,
    wallets: HashMap<String, String>,
}

/// A thread-safe agreement store backed by `DashMap`.
#[derive(Clone, Default)]
pub struct MemoryAgreementStore {
    agreements: Arc<DashMap<String, Agreement>>,
    metadata: Arc<DashMap<String, AgreementMetadata>>,
    wallets: Arc<DashMap<String, String>>,
    metadata_base_uri: String,
    snapshot_path: Option<String>,
}

impl MemoryAgreementStore {
    pub fn new(config: &StoreConfig) -> Self {
        Self {
            metadata_base_uri: config.metadata_base_uri.clone(),
            snapshot_path: config.snapshot_path.clone(),
            ..Self::default()
        }
    }

    /// Create the store and load the snapshot file if it exists.
    pub fn load_from_file(config: &StoreConfig) -> StoreResult<Self> {
        let store = Self::new(config);
        let Some(path) = &store.snapshot_path else {
            return Ok(store);
        };
        if !Path::new(path).exists() {
            return Ok(store);
        }

        let reader = BufReader::new(File::open(path)?);
        let snapshot: Snapshot = serde_json::from_reader(reader)?;
        for (k, v) in snapshot.agreements {
            store.agreements.insert(k, v);
        }
        for (k, v) in snapshot.metadata {
            store.metadata.insert(k, v);
        }
        for (k, v) in snapshot.wallets {
            store.wallets.insert(k, v);
        }
        tracing::info!(
            path = %path,
            agreements = store.agreements.len(),
            wallets = store.wallets.len(),
            "Loaded agreement store snapshot"
        );
        Ok(store)
    }

    /// Write the snapshot file. No-op without a configured path.
    pub fn save_to_file(&self) -> StoreResult<()> {
        let Some(path) = &self.snapshot_path else {
            return Ok(());
        };

        let snapshot = Snapshot {
            agreements: self.agreements.iter().map(|r| (r.key().clone(), r.value().clone())).collect(),
            metadata: self.metadata.iter().map(|r| (r.key().clone(), r.value().clone())).collect(),
            wallets: self.wallets.iter().map(|r| (r.key().clone(), r.value().clone())).collect(),
        };
        let writer = BufWriter::new(File::create(path)?);
        serde_json::to_writer_pretty(writer, &snapshot)?;
        tracing::info!(path = %path, agreements = snapshot.agreements.len(), "Saved agreement store snapshot");
        Ok(())
    }

    pub fn insert_agreement(&self, agreement: Agreement) {
        self.agreements.insert(agreement.id.clone(), agreement);
    }

    pub fn set_wallet(&self, user_id: impl Into<String>, address: impl Into<String>) {
        self.wallets.insert(user_id.into(), address.into());
    }

    pub fn metadata_record(&self, id: &str) -> Option<AgreementMetadata> {
        self.metadata.get(id).map(|r| r.value().clone())
    }

    pub fn agreement_count(&self) -> usize {
        self.agreements.len()
    }
}

#[async_trait]
impl AgreementStore for MemoryAgreementStore {
    async fn load_agreement(&self, id: &str) -> StoreResult<Option<Agreement>> {
        Ok(self.agreements.get(id).map(|r| r.value().clone()))
    }

    async fn compare_and_set_status(
        &self,
        id: &str,
        expected: AgreementStatus,
        next: AgreementStatus,
        update: ConfirmationUpdate,
    ) -> StoreResult<CasOutcome> {
        // The shard write lock makes check-and-write a single step.
        let mut entry = self
            .agreements
            .get_mut(id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;

        if entry.status != expected {
            return Ok(CasOutcome::Mismatch(entry.value().clone()));
        }

        entry.status = next;
        entry.tx_hash = Some(update.tx_hash);
        entry.metadata_uri = Some(update.metadata_uri);
        entry.confirmed_at = Some(update.confirmed_at);
        Ok(CasOutcome::Applied(entry.value().clone()))
    }

    async fn create_metadata_record(&self, metadata: &AgreementMetadata) -> StoreResult<MetadataRef> {
        let id = uuid::Uuid::new_v4().to_string();
        let uri = format!("{}{}", self.metadata_base_uri, id);
        self.metadata.insert(id.clone(), metadata.clone());
        tracing::debug!(agreement_id = %metadata.agreement_id, uri = %uri, "Created metadata record");
        Ok(MetadataRef { id, uri })
    }

    async fn resolve_wallet_address(&self, user_id: &str) -> StoreResult<Option<String>> {
        Ok(self.wallets.get(user_id).map(|r| r.value().clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::primitives::TxHash;
    use serde_json::json;

    fn config(snapshot_path: Option<String>) -> StoreConfig {
        StoreConfig {
            snapshot_path,
            metadata_base_uri: "urn:rental-metadata:".into(),
        }
    }

    fn accepted(id: &str) -> Agreement {
        Agreement {
            id: id.into(),
            property_id: "prop-1".into(),
            tenant_id: "tenant".into(),
            landlord_id: "landlord".into(),
            proposed_by: "tenant".into(),
            status: AgreementStatus::Accepted,
            terms: json!({"rent": 900}),
            tx_hash: None,
            metadata_uri: None,
            confirmed_at: None,
        }
    }

    fn update() -> ConfirmationUpdate {
        ConfirmationUpdate {
            tx_hash: TxHash::repeat_byte(9),
            metadata_uri: "urn:rental-metadata:x".into(),
            confirmed_at: 100,
        }
    }

    #[tokio::test]
    async fn test_compare_and_set_applies_once() {
        let store = MemoryAgreementStore::new(&config(None));
        store.insert_agreement(accepted("agr-1"));

        let first = store
            .compare_and_set_status("agr-1", AgreementStatus::Accepted, AgreementStatus::Confirmed, update())
            .await
            .unwrap();
        let applied = match first {
            CasOutcome::Applied(agreement) => agreement,
            other => panic!("expected applied, got {:?}", other),
        };
        assert_eq!(applied.status, AgreementStatus::Confirmed);
        assert_eq!(applied.tx_hash, Some(TxHash::repeat_byte(9)));

        let second = store
            .compare_and_set_status("agr-1", AgreementStatus::Accepted, AgreementStatus::Confirmed, update())
            .await
            .unwrap();
        assert!(matches!(second, CasOutcome::Mismatch(a) if a.status == AgreementStatus::Confirmed));
    }

    #[tokio::test]
    async fn test_compare_and_set_missing() {
        let store = MemoryAgreementStore::new(&config(None));
        let err = store
            .compare_and_set_status("nope", AgreementStatus::Accepted, AgreementStatus::Confirmed, update())
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_metadata_records_get_distinct_uris() {
        let store = MemoryAgreementStore::new(&config(None));
        let metadata = AgreementMetadata::from_agreement(&accepted("agr-1"), 1);

        let a = store.create_metadata_record(&metadata).await.unwrap();
        let b = store.create_metadata_record(&metadata).await.unwrap();
        assert_ne!(a.uri, b.uri);
        assert!(a.uri.starts_with("urn:rental-metadata:"));
        assert_eq!(store.metadata_record(&a.id).unwrap(), metadata);
    }

    #[tokio::test]
    async fn test_snapshot_round_trip() {
        let path = std::env::temp_dir().join(format!("rental-ledger-{}.json", uuid::Uuid::new_v4()));
        let path_str = path.to_string_lossy().to_string();

        let store = MemoryAgreementStore::new(&config(Some(path_str.clone())));
        store.insert_agreement(accepted("agr-1"));
        store.set_wallet("tenant", "0x70997970C51812dc3A010C7d01b50e0d17dc79C8");
        store.save_to_file().unwrap();

        let loaded = MemoryAgreementStore::load_from_file(&config(Some(path_str))).unwrap();
        assert_eq!(loaded.agreement_count(), 1);
        assert_eq!(
            loaded.resolve_wallet_address("tenant").await.unwrap().as_deref(),
            Some("0x70997970C51812dc3A010C7d01b50e0d17dc79C8")
        );

        std::fs::remove_file(path).unwrap_or_default();
    }

    #[test]
    fn test_missing_snapshot_file_is_empty_store() {
        let path = std::env::temp_dir().join("rental-ledger-does-not-exist.json");
        let store = MemoryAgreementStore::load_from_file(&config(Some(path.to_string_lossy().to_string()))).unwrap();
        assert_eq!(store.agreement_count(), 0);
    }
}
