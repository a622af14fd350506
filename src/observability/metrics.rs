//! Metrics collection and exposition.
//!
//! # Metrics
//! - `ledger_submissions_total` (counter): submissions by outcome
//! - `ledger_rpc_health` (gauge): 1=reachable, 0=unreachable, per endpoint
//! - `monitor_terminal_total` (counter): finished transactions by terminal state
//! - `monitor_active_transactions` (gauge): transactions still being polled
//! - `contract_cache_requests_total` (counter): hits and misses
//! - `contract_cache_entries` (gauge): current cache size
//! - `secondary_verifications_total` (counter): by network and verdict
//! - `agreement_reconciliations_total` (counter): applied vs. already applied
//!
//! Without an installed recorder every call is a no-op, which keeps tests quiet.

use metrics::{counter, gauge};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;

/// Install the Prometheus exporter with its own HTTP listener.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_submission(outcome: &'static str) {
    counter!("ledger_submissions_total", "outcome" => outcome).increment(1);
}

pub fn record_rpc_health(endpoint: &str, healthy: bool) {
    gauge!("ledger_rpc_health", "endpoint" => endpoint.to_string())
        .set(if healthy { 1.0 } else { 0.0 });
}

pub fn record_monitor_terminal(state: &'static str) {
    counter!("monitor_terminal_total", "state" => state).increment(1);
}

pub fn record_active_transactions(count: usize) {
    gauge!("monitor_active_transactions").set(count as f64);
}

pub fn record_cache_lookup(hit: bool) {
    let result = if hit { "hit" } else { "miss" };
    counter!("contract_cache_requests_total", "result" => result).increment(1);
}

pub fn record_cache_size(size: usize) {
    gauge!("contract_cache_entries").set(size as f64);
}

pub fn record_verification(network: &str, verified: bool) {
    counter!(
        "secondary_verifications_total",
        "network" => network.to_string(),
        "verified" => if verified { "true" } else { "false" }
    )
    .increment(1);
}

pub fn record_reconciliation(outcome: &'static str) {
    counter!("agreement_reconciliations_total", "outcome" => outcome).increment(1);
}
