//! Authenticated admin HTTP API.
//!
//! ```text
//! GET    /admin/status
//! POST   /admin/agreements/{id}/confirm     {"actor": "..."}
//! GET    /admin/agreements/{id}/onchain
//! GET    /admin/transactions
//! GET    /admin/transactions/{hash}
//! DELETE /admin/transactions/{hash}
//! ```

pub mod auth;
pub mod handlers;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use self::auth::admin_auth_middleware;
use self::handlers::*;
use crate::config::AdminConfig;
use crate::orchestrator::ConfirmationOrchestrator;

#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<ConfirmationOrchestrator>,
    pub api_key: Arc<String>,
    pub started_at: Instant,
}

impl AppState {
    pub fn new(orchestrator: Arc<ConfirmationOrchestrator>, config: &AdminConfig) -> Self {
        Self {
            orchestrator,
            api_key: Arc::new(config.api_key.clone()),
            started_at: Instant::now(),
        }
    }
}

pub fn setup_admin_router(state: AppState, request_timeout: Duration) -> Router {
    Router::new()
        .route("/admin/status", get(get_status))
        .route("/admin/agreements/{id}/confirm", post(confirm_agreement))
        .route("/admin/agreements/{id}/onchain", get(get_onchain_status))
        .route("/admin/transactions", get(list_transactions))
        .route(
            "/admin/transactions/{hash}",
            get(get_transaction).delete(cancel_transaction),
        )
        .layer(middleware::from_fn_with_state(state.clone(), admin_auth_middleware))
        .layer(TimeoutLayer::new(request_timeout))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
