//! Rental agreement ledger confirmation engine.
//!
//! ```text
//!   admin API ──▶ orchestrator ──▶ ledger client ──▶ EVM RPC
//!                     │                 ▲
//!                     ▼                 │
//!                  monitor ─────────────┘
//!                     │
//!                     ▼
//!            secondary networks (explorer, permissioned ledger)
//! ```

use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;
use tokio::net::TcpListener;

use rental_ledger::api::{setup_admin_router, AppState};
use rental_ledger::config::load_or_default;
use rental_ledger::lifecycle::{build_engine, signals, Shutdown};
use rental_ledger::observability::{init_logging, metrics};

const DRAIN_DEADLINE: Duration = Duration::from_secs(10);

#[derive(Parser)]
#[command(name = "rental-ledger")]
#[command(about = "Confirms rental agreements on an EVM ledger", long_about = None)]
struct Args {
    /// Path to the TOML configuration file. Validated defaults are used when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let config = load_or_default(args.config.as_deref())?;
    init_logging(&config.observability);

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        rpc_url = %config.ledger.rpc_url,
        chain_id = config.ledger.chain_id,
        contract = %config.ledger.contract_address,
        "rental-ledger starting"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let engine = build_engine(&config).await?;
    let shutdown = Shutdown::new();

    let background = vec![
        engine.orchestrator.cache().spawn_sweeper(shutdown.subscribe()),
        engine.orchestrator.monitor().spawn_pruner(shutdown.subscribe()),
        engine.ledger.rpc().spawn_health_probe(shutdown.subscribe()),
    ];

    let state = AppState::new(engine.orchestrator.clone(), &config.admin);
    let app = setup_admin_router(state, Duration::from_secs(config.admin.request_timeout_secs));

    let listener = TcpListener::bind(&config.admin.bind_address).await?;
    tracing::info!(
        address = %listener.local_addr()?,
        sender = %engine.ledger.sender(),
        "Admin API listening"
    );

    let mut server_shutdown = shutdown.subscribe();
    let server = tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = server_shutdown.recv().await;
            })
            .await
    });

    signals::wait_for_shutdown_signal().await;
    shutdown.trigger();

    match tokio::time::timeout(DRAIN_DEADLINE, server).await {
        Ok(Ok(Err(e))) => tracing::error!(error = %e, "Admin server error"),
        Ok(Err(e)) => tracing::error!(error = %e, "Admin server task failed"),
        Err(_) => tracing::warn!("Admin server did not stop in time"),
        Ok(Ok(Ok(()))) => {}
    }
    Shutdown::drain(background, DRAIN_DEADLINE).await;

    if let Err(e) = engine.store.save_to_file() {
        tracing::error!(error = %e, "Failed to save agreement store snapshot");
    }

    tracing::info!("Shutdown complete");
    Ok(())
}
