//! Permissioned ledger gateway client.
//!
//! Audit records are written to a channel on a permissioned ledger through
//! its REST gateway. A primary transaction is corroborated once the gateway
//! reports a committed record for it with status `VALID`.

use alloy::primitives::TxHash;
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::config::PermissionedConfig;
use crate::secondary::{
    AuditRecord, SecondaryError, SecondaryNetwork, SecondaryResult, VerificationDetail,
};

const VALID_STATUS: &str = "VALID";

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct RecordRequest<'a> {
    #[serde(flatten)]
    record: &'a AuditRecord,
    channel: &'a str,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RecordCreated {
    record_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LedgerRecord {
    record_id: String,
    primary_tx_hash: String,
    status: String,
}

/// Client for the permissioned ledger REST gateway.
pub struct PermissionedLedgerClient {
    client: Client,
    records_url: String,
    channel: String,
    auth_token: String,
    timeout_secs: u64,
}

impl PermissionedLedgerClient {
    pub fn new(config: &PermissionedConfig) -> SecondaryResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| SecondaryError::Configuration(e.to_string()))?;

        Ok(Self {
            client,
            records_url: format!(
                "{}/api/v1/channels/{}/records",
                config.gateway_url.trim_end_matches('/'),
                config.channel
            ),
            channel: config.channel.clone(),
            auth_token: config.auth_token.clone(),
            timeout_secs: config.timeout_secs,
        })
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        if self.auth_token.is_empty() {
            request
        } else {
            request.bearer_auth(&self.auth_token)
        }
    }

    /// Send and decode; 404 maps to `None`.
    async fn fetch<T: serde::de::DeserializeOwned>(&self, request: RequestBuilder) -> SecondaryResult<Option<T>> {
        let response = self
            .authorized(request)
            .send()
            .await
            .map_err(|e| SecondaryError::from_reqwest(e, self.timeout_secs))?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SecondaryError::Http {
                status: status.as_u16(),
                body,
            });
        }

        response
            .json()
            .await
            .map(Some)
            .map_err(|e| SecondaryError::from_reqwest(e, self.timeout_secs))
    }
}

#[async_trait]
impl SecondaryNetwork for PermissionedLedgerClient {
    fn name(&self) -> &str {
        "permissioned"
    }

    async fn verify(&self, tx_hash: TxHash) -> SecondaryResult<VerificationDetail> {
        let hash = tx_hash.to_string();
        let request = self
            .client
            .get(&self.records_url)
            .query(&[("primaryTxHash", hash.as_str())]);

        let Some(record) = self.fetch::<LedgerRecord>(request).await? else {
            return Ok(VerificationDetail::rejected(format!(
                "no record for transaction on channel {}",
                self.channel
            )));
        };

        if !record.primary_tx_hash.eq_ignore_ascii_case(&hash) {
            return Ok(VerificationDetail::rejected(format!(
                "record {} references {}",
                record.record_id, record.primary_tx_hash
            )));
        }
        if record.status != VALID_STATUS {
            return Ok(VerificationDetail::rejected(format!(
                "record {} has status {}",
                record.record_id, record.status
            )));
        }

        let mut detail = VerificationDetail::verified();
        detail.record_id = Some(record.record_id);
        Ok(detail)
    }

    async fn record(&self, record: &AuditRecord) -> SecondaryResult<Option<String>> {
        let request = self.client.post(&self.records_url).json(&RecordRequest {
            record,
            channel: &self.channel,
        });

        match self.fetch::<RecordCreated>(request).await? {
            Some(created) => {
                tracing::info!(
                    tx_hash = %record.primary_tx_hash,
                    record_id = %created.record_id,
                    channel = %self.channel,
                    "Audit record written"
                );
                Ok(Some(created.record_id))
            }
            None => Err(SecondaryError::Http {
                status: 404,
                body: format!("channel {} not found", self.channel),
            }),
        }
    }

    async fn query(&self, reference: &str) -> SecondaryResult<Option<serde_json::Value>> {
        let request = self.client.get(format!("{}/{}", self.records_url, reference));
        self.fetch(request).await
    }
}
