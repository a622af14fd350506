use alloy::primitives::TxHash;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::str::FromStr;

use crate::api::AppState;
use crate::ledger::LedgerError;
use crate::monitor::{CancelOutcome, InFlightTransaction};
use crate::orchestrator::{ConfirmationError, ConfirmationOutcome, EngineStatus};

#[derive(Serialize)]
pub struct SystemStatus {
    pub version: &'static str,
    pub status: &'static str,
    pub uptime_secs: u64,
    #[serde(flatten)]
    pub engine: EngineStatus,
}

#[derive(Debug, Deserialize)]
pub struct ConfirmRequest {
    pub actor: String,
}

#[derive(Serialize)]
pub struct OnchainStatus {
    pub agreement_id: String,
    pub confirmed: bool,
}

/// Error body returned by every admin endpoint.
#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    NotFound(String),
    Confirmation(ConfirmationError),
}

impl From<ConfirmationError> for ApiError {
    fn from(e: ConfirmationError) -> Self {
        ApiError::Confirmation(e)
    }
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Confirmation(e) => match e {
                ConfirmationError::NotFound(_) => StatusCode::NOT_FOUND,
                ConfirmationError::InvalidState { .. } => StatusCode::CONFLICT,
                ConfirmationError::Forbidden { .. } => StatusCode::FORBIDDEN,
                ConfirmationError::MissingWallet(_) => StatusCode::UNPROCESSABLE_ENTITY,
                ConfirmationError::Ledger(LedgerError::Argument(_)) => StatusCode::UNPROCESSABLE_ENTITY,
                ConfirmationError::Ledger(_) => StatusCode::BAD_GATEWAY,
                ConfirmationError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
                ConfirmationError::Monitor(_) => StatusCode::CONFLICT,
                ConfirmationError::VerificationFailed { .. } => StatusCode::UNPROCESSABLE_ENTITY,
                ConfirmationError::Timeout { .. } => StatusCode::GATEWAY_TIMEOUT,
                ConfirmationError::MonitorFailed { .. } => StatusCode::BAD_GATEWAY,
                ConfirmationError::Cancelled { .. } => StatusCode::CONFLICT,
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = match &self {
            ApiError::BadRequest(msg) | ApiError::NotFound(msg) => json!({ "error": msg }),
            ApiError::Confirmation(e) => json!({
                "error": e.to_string(),
                "tx_hash": e.tx_hash(),
            }),
        };
        if status.is_server_error() {
            tracing::error!(status = %status, error = %body["error"], "Admin request failed");
        }
        (status, Json(body)).into_response()
    }
}

fn parse_hash(raw: &str) -> Result<TxHash, ApiError> {
    TxHash::from_str(raw).map_err(|e| ApiError::BadRequest(format!("invalid transaction hash {}: {}", raw, e)))
}

pub async fn get_status(State(state): State<AppState>) -> Json<SystemStatus> {
    Json(SystemStatus {
        version: env!("CARGO_PKG_VERSION"),
        status: "operational",
        uptime_secs: state.started_at.elapsed().as_secs(),
        engine: state.orchestrator.status(),
    })
}

pub async fn confirm_agreement(
    State(state): State<AppState>,
    Path(agreement_id): Path<String>,
    Json(request): Json<ConfirmRequest>,
) -> Result<Json<ConfirmationOutcome>, ApiError> {
    let outcome = state
        .orchestrator
        .confirm_agreement(&agreement_id, &request.actor)
        .await?;
    Ok(Json(outcome))
}

pub async fn get_onchain_status(
    State(state): State<AppState>,
    Path(agreement_id): Path<String>,
) -> Result<Json<OnchainStatus>, ApiError> {
    let confirmed = state.orchestrator.onchain_confirmed(&agreement_id).await?;
    Ok(Json(OnchainStatus {
        agreement_id,
        confirmed,
    }))
}

pub async fn list_transactions(State(state): State<AppState>) -> Json<Vec<InFlightTransaction>> {
    Json(state.orchestrator.active_transactions())
}

pub async fn get_transaction(
    State(state): State<AppState>,
    Path(hash): Path<String>,
) -> Result<Json<InFlightTransaction>, ApiError> {
    let tx_hash = parse_hash(&hash)?;
    state
        .orchestrator
        .transaction_status(tx_hash)
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("transaction {} is not monitored", tx_hash)))
}

pub async fn cancel_transaction(
    State(state): State<AppState>,
    Path(hash): Path<String>,
) -> Result<(StatusCode, Json<CancelOutcome>), ApiError> {
    let tx_hash = parse_hash(&hash)?;
    let outcome = state.orchestrator.cancel_monitoring(tx_hash);
    let status = match outcome {
        CancelOutcome::Requested => StatusCode::ACCEPTED,
        CancelOutcome::AlreadyTerminal(_) | CancelOutcome::Verifying => StatusCode::CONFLICT,
        CancelOutcome::NotFound => StatusCode::NOT_FOUND,
    };
    Ok((status, Json(outcome)))
}
