//! `node chain`: boots a node and runs its four concurrent loops.
//!
//! Grounded on `api-gateway/src/main.rs`'s bootstrap order: metrics
//! exporter, storage, shared state, background tasks, then the axum
//! server with graceful shutdown.

use std::net::SocketAddr;
use std::sync::Arc;

use ledger::config::NodeConfig;
use ledger::http::{AppState, router, shutdown_signal};
use ledger::storage::SingleKeyStore;
use ledger::{MetricsRegistry, NodeHandle, NodeState, consensus, miner, peer, run_prometheus_http_server};

use crate::ChainArgs;

pub async fn run(args: ChainArgs) -> Result<(), String> {
    let listen_addr: SocketAddr = format!("0.0.0.0:{}", args.port)
        .parse()
        .map_err(|e| format!("invalid port {}: {e}", args.port))?;
    let self_address = format!("http://127.0.0.1:{}", args.port);

    let cfg = NodeConfig::default();
    let http_client = peer::build_http_client();

    let store = SingleKeyStore::open(&cfg.storage)
        .map_err(|e| format!("failed to open storage at {}: {e}", cfg.storage.path))?;

    let node = if let Some(remote) = &args.remote_node {
        tracing::info!("bootstrapping from remote node {remote}");
        let remote_state: NodeState = http_client
            .get(remote)
            .send()
            .await
            .map_err(|e| format!("failed to reach remote node {remote}: {e}"))?
            .json()
            .await
            .map_err(|e| format!("failed to parse remote node state from {remote}: {e}"))?;
        NodeHandle::boot_from_peer(remote_state, self_address.clone(), store, cfg.protocol.clone())
            .map_err(|e| format!("failed to persist bootstrapped state: {e}"))?
    } else {
        NodeHandle::boot_fresh(self_address.clone(), store, cfg.protocol.clone())
            .map_err(|e| format!("failed to boot fresh node: {e}"))?
    };

    let metrics = Arc::new(
        MetricsRegistry::new().map_err(|e| format!("failed to initialise metrics registry: {e}"))?,
    );

    if cfg.metrics.enabled {
        let metrics_clone = metrics.clone();
        let addr = cfg.metrics.listen_addr;
        tokio::spawn(async move {
            if let Err(e) = run_prometheus_http_server(metrics_clone, addr).await {
                tracing::warn!("metrics HTTP server error: {e}");
            }
        });
        tracing::info!("metrics exporter listening on http://{addr}/metrics");
    }

    tokio::spawn(miner::run_mining_loop(
        node.clone(),
        args.miners_address.clone(),
        metrics.clone(),
    ));
    tokio::spawn(peer::run_ping_loop(node.clone(), http_client.clone(), metrics.clone()));
    tokio::spawn(consensus::run_consensus_loop(
        node.clone(),
        http_client.clone(),
        metrics.clone(),
    ));

    let app_state = AppState {
        node: node.clone(),
        http: http_client,
        metrics,
    };
    let app = router(app_state);

    tracing::info!("node listening on http://{listen_addr}, miner={}", args.miners_address);

    let listener = tokio::net::TcpListener::bind(listen_addr)
        .await
        .map_err(|e| format!("failed to bind {listen_addr}: {e}"))?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| format!("HTTP server error: {e}"))?;

    Ok(())
}
