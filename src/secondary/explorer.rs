//! Etherscan-compatible explorer API client.
//!
//! The explorer indexes the public chain independently of our RPC node, so a
//! successful receipt status there corroborates the primary confirmation.

use alloy::primitives::TxHash;
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;

use crate::config::ExplorerConfig;
use crate::secondary::{
    AuditRecord, SecondaryError, SecondaryNetwork, SecondaryResult, VerificationDetail,
};

#[derive(Debug, Deserialize)]
struct ExplorerResponse<T> {
    status: String,
    message: String,
    result: Option<T>,
}

#[derive(Debug, Deserialize)]
struct ReceiptStatus {
    /// "1" success, "0" failure, "" unknown to the explorer.
    status: String,
}

#[derive(Debug, Deserialize)]
struct ProxyResponse {
    result: Option<serde_json::Value>,
}

/// Read-only client for an explorer-style public chain API.
pub struct ExplorerClient {
    client: Client,
    base_url: String,
    api_key: String,
    timeout_secs: u64,
}

impl ExplorerClient {
    pub fn new(config: &ExplorerConfig) -> SecondaryResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| SecondaryError::Configuration(e.to_string()))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            timeout_secs: config.timeout_secs,
        })
    }

    async fn get<T: serde::de::DeserializeOwned>(&self, params: &[(&str, &str)]) -> SecondaryResult<T> {
        let response = self
            .client
            .get(format!("{}/api", self.base_url))
            .query(params)
            .query(&[("apikey", self.api_key.as_str())])
            .send()
            .await
            .map_err(|e| SecondaryError::from_reqwest(e, self.timeout_secs))?;

        let status = response.status();
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
            .map_err(|e| SecondaryError::from_reqwest(e, self.timeout_secs))
    }
}

#[async_trait]
impl SecondaryNetwork for ExplorerClient {
    fn name(&self) -> &str {
        "explorer"
    }

    async fn verify(&self, tx_hash: TxHash) -> SecondaryResult<VerificationDetail> {
        let hash = tx_hash.to_string();
        let response: ExplorerResponse<ReceiptStatus> = self
            .get(&[
                ("module", "transaction"),
                ("action", "gettxreceiptstatus"),
                ("txhash", hash.as_str()),
            ])
            .await?;

        if response.status != "1" {
            return Err(SecondaryError::Api(response.message));
        }

        let detail = match response.result.map(|r| r.status) {
            Some(s) if s == "1" => VerificationDetail::verified(),
            Some(s) if s == "0" => VerificationDetail::rejected("explorer reports the transaction failed"),
            _ => VerificationDetail::rejected("transaction not found on explorer"),
        };
        tracing::debug!(tx_hash = %tx_hash, verified = detail.verified, "Explorer verification");
        Ok(detail)
    }

    async fn record(&self, _record: &AuditRecord) -> SecondaryResult<Option<String>> {
        Ok(None)
    }

    async fn query(&self, reference: &str) -> SecondaryResult<Option<serde_json::Value>> {
        let response: ProxyResponse = self
            .get(&[
                ("module", "proxy"),
                ("action", "eth_getTransactionByHash"),
                ("txhash", reference),
            ])
            .await?;
        Ok(response.result.filter(|v| !v.is_null()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_for(server: &MockServer) -> ExplorerClient {
        ExplorerClient::new(&ExplorerConfig {
            base_url: server.uri(),
            api_key: "test-key".into(),
            timeout_secs: 2,
        })
        .unwrap()
    }

    async fn mount_receipt_status(server: &MockServer, body: serde_json::Value) {
        Mock::given(method("GET"))
            .and(path("/api"))
            .and(query_param("action", "gettxreceiptstatus"))
            .and(query_param("apikey", "test-key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn test_verified_receipt() {
        let server = MockServer::start().await;
        mount_receipt_status(&server, json!({"status": "1", "message": "OK", "result": {"status": "1"}})).await;

        let detail = client_for(&server).verify(TxHash::repeat_byte(1)).await.unwrap();
        assert!(detail.verified);
    }

    #[tokio::test]
    async fn test_unknown_transaction_is_negative_not_error() {
        let server = MockServer::start().await;
        mount_receipt_status(&server, json!({"status": "1", "message": "OK", "result": {"status": ""}})).await;

        let detail = client_for(&server).verify(TxHash::repeat_byte(1)).await.unwrap();
        assert!(!detail.verified);
        assert!(detail.reason.unwrap().contains("not found"));
    }

    #[tokio::test]
    async fn test_api_error() {
        let server = MockServer::start().await;
        mount_receipt_status(&server, json!({"status": "0", "message": "NOTOK", "result": "Invalid API Key"})).await;

        let err = client_for(&server).verify(TxHash::repeat_byte(1)).await.unwrap_err();
        assert!(matches!(err, SecondaryError::Api(_) | SecondaryError::Decode(_)));
    }

    #[tokio::test]
    async fn test_http_error_status() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503).set_body_string("maintenance"))
            .mount(&server)
            .await;

        let err = client_for(&server).verify(TxHash::repeat_byte(1)).await.unwrap_err();
        assert!(matches!(err, SecondaryError::Http { status: 503, .. }));
    }

    #[tokio::test]
    async fn test_record_is_not_applicable() {
        let server = MockServer::start().await;
        let record = AuditRecord {
            primary_tx_hash: TxHash::ZERO,
            reference: "agr".into(),
            metadata_uri: None,
            block_number: None,
            confirmations: 0,
            recorded_at: 0,
        };
        assert!(client_for(&server).record(&record).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_query_transaction() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(query_param("action", "eth_getTransactionByHash"))
            .respond_with(ResponseTemplate::new(200).set_body_json(
                json!({"jsonrpc": "2.0", "id": 1, "result": {"hash": "0x01", "blockNumber": "0x10"}}),
            ))
            .mount(&server)
            .await;

        let tx = client_for(&server).query("0x01").await.unwrap().unwrap();
        assert_eq!(tx["blockNumber"], "0x10");
    }
}
