// node/src/main.rs

//! Voting-chain node binary.
//!
//! Wires up the `chain` crate into a full node:
//!
//! - loads the voter's JSON configuration (first CLI argument),
//! - exposes the peer RPC surface over HTTP (axum),
//! - runs the miner, chain-updater, and gossip background tasks,
//! - runs the operator CLI on stdin,
//! - exports Prometheus metrics on `/metrics`.

mod cli;
mod routes;
mod state;

use std::sync::Arc;

use axum::{
    Router,
    routing::{get, post},
};
use tokio::signal;
use tokio::sync::broadcast;

use chain::{ChainState, ChainUpdater, Configuration, MetricsRegistry, Miner,
    network::gossip, run_prometheus_http_server};
use routes::{health, rpc};
use state::{AppState, SharedState};

#[tokio::main]
async fn main() {
    // Basic tracing setup.
    tracing_subscriber::fmt()
        .with_env_filter(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "node=info,chain=info".to_string()),
        )
        .init();

    if let Err(e) = run().await {
        eprintln!("fatal error: {e}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), String> {
    // ---------------------------
    // Configuration
    // ---------------------------

    let config_path = std::env::args()
        .nth(1)
        .ok_or_else(|| "usage: node <config.json>".to_string())?;
    let config = Configuration::load(&config_path)
        .map_err(|e| format!("failed to load {config_path}: {e}"))?;

    tracing::info!(
        token = %config.my_token,
        endpoint = %config.endpoint(),
        "starting voting-chain node"
    );

    // ---------------------------
    // Metrics registry + exporter
    // ---------------------------

    let metrics = Arc::new(
        MetricsRegistry::new().map_err(|e| format!("failed to initialise metrics registry: {e}"))?,
    );

    if config.metrics.enabled {
        let metrics_clone = metrics.clone();
        let addr = config.metrics.listen_addr;
        tokio::spawn(async move {
            if let Err(e) = run_prometheus_http_server(metrics_clone, addr).await {
                tracing::error!("metrics HTTP server error: {e}");
            }
        });
        tracing::info!("metrics exporter listening on http://{}/metrics", addr);
    }

    // ---------------------------
    // Chain state + background tasks
    // ---------------------------

    let listen_port = config.my_port;
    let (chain_state, update_rx) = ChainState::new(config, metrics)
        .map_err(|e| format!("failed to build chain state: {e}"))?;

    let (quit_tx, _) = broadcast::channel(4);

    let (miner, miner_handle) = Miner::new(chain_state.clone(), quit_tx.subscribe());
    let miner_task = tokio::spawn(miner.run());

    let updater = ChainUpdater::new(
        chain_state.clone(),
        miner_handle.clone(),
        update_rx,
        quit_tx.subscribe(),
    );
    let updater_task = tokio::spawn(updater.run());

    let peer_sync_task = tokio::spawn(gossip::run_peer_sync(
        chain_state.clone(),
        quit_tx.subscribe(),
    ));
    let share_gossip_task = tokio::spawn(gossip::run_share_gossip(
        chain_state.clone(),
        quit_tx.subscribe(),
    ));

    // Mining runs from startup; the updater pauses it around chain swaps.
    miner_handle.start().await;

    // ---------------------------
    // Shared state + operator CLI
    // ---------------------------

    let app_state: SharedState = Arc::new(AppState {
        chain: chain_state,
        quit: quit_tx.clone(),
    });

    let cli_task = tokio::spawn(cli::run(app_state.clone()));

    // ---------------------------
    // HTTP router
    // ---------------------------

    let app = Router::new()
        .route("/health", get(health::health))
        .route("/transactions", post(rpc::receive_transaction))
        .route("/blocks", post(rpc::receive_block_update))
        .route("/key-shares", post(rpc::receive_key_share))
        .route("/chain", get(rpc::get_chain))
        .route("/peers", post(rpc::get_peers))
        .with_state(app_state);

    let listen_addr = format!("0.0.0.0:{listen_port}");
    tracing::info!("RPC surface listening on http://{listen_addr}");

    let listener = tokio::net::TcpListener::bind(&listen_addr)
        .await
        .map_err(|e| format!("failed to bind {listen_addr}: {e}"))?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(quit_tx.clone()))
        .await
        .map_err(|e| format!("RPC server error: {e}"))?;

    // The server is down; make sure every sibling task observes quit,
    // then wait for them.
    let _ = quit_tx.send(());
    let _ = tokio::join!(
        miner_task,
        updater_task,
        peer_sync_task,
        share_gossip_task,
    );
    cli_task.abort();

    tracing::info!("node stopped");
    Ok(())
}

/// Resolves when either the CLI broadcasts quit or Ctrl-C arrives; in
/// the latter case the quit signal is re-published so the background
/// tasks shut down too.
async fn shutdown_signal(quit: broadcast::Sender<()>) {
    let mut quit_rx = quit.subscribe();
    tokio::select! {
        _ = quit_rx.recv() => {}
        _ = signal::ctrl_c() => {
            tracing::info!("shutdown signal received");
            let _ = quit.send(());
        }
    }
}
