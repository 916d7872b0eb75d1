//! Axum router for the node's HTTP API (§6): the surface peers and the
//! wallet gateway call into.
//!
//! Grounded on `api-gateway/src/main.rs` for router/shutdown wiring and
//! `api-gateway/src/routes/health.rs` for handler shape: thin, typed
//! request/response structs, `tracing` at entry/error.

use std::collections::HashMap;
use std::sync::Arc;

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::config::BLOCKCHAIN_STATUS;
use crate::consensus::ChainSegment;
use crate::error::ApiError;
use crate::metrics::MetricsRegistry;
use crate::node::{NodeHandle, balance, non_rewarded_transactions};
use crate::types::Transaction;
use crate::{mempool, peer};

/// Shared state for the node's HTTP handlers.
#[derive(Clone)]
pub struct AppState {
    pub node: NodeHandle,
    pub http: reqwest::Client,
    pub metrics: Arc<MetricsRegistry>,
}

/// Builds the node's axum router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(get_state))
        .route("/balance", get(get_balance))
        .route("/get_all_non_rewarded_txns", get(get_non_rewarded_txns))
        .route("/send_txn", post(send_txn))
        .route("/send_peers_list", post(send_peers_list))
        .route("/check_status", get(check_status))
        .route("/fetch_last_n_blocks", get(fetch_last_n_blocks))
        .with_state(state)
}

async fn get_state(State(state): State<AppState>) -> Json<crate::node::NodeState> {
    Json(state.node.read().await.clone())
}

#[derive(Deserialize)]
struct BalanceQuery {
    address: String,
}

#[derive(Serialize)]
struct BalanceResponse {
    balance: u64,
}

/// Converts an [`ApiError`] into the `(StatusCode, String)` shape used
/// throughout this crate's handlers.
pub fn as_bad_request(err: ApiError) -> (StatusCode, String) {
    (StatusCode::BAD_REQUEST, err.to_string())
}

/// An address is the `0x`-prefixed, 40 hex character form produced by
/// [`crate::crypto::derive_address`].
fn validate_address(address: &str) -> Result<(), ApiError> {
    let digits = address.strip_prefix("0x").unwrap_or(address);
    if digits.len() != 40 || hex::decode(digits).is_err() {
        return Err(ApiError::BadRequest(format!("malformed address: {address}")));
    }
    Ok(())
}

async fn get_balance(
    State(state): State<AppState>,
    Query(q): Query<BalanceQuery>,
) -> Result<Json<BalanceResponse>, (StatusCode, String)> {
    validate_address(&q.address).map_err(as_bad_request)?;
    let node_state = state.node.read().await;
    Ok(Json(BalanceResponse {
        balance: balance(&node_state, &q.address),
    }))
}

async fn get_non_rewarded_txns(State(state): State<AppState>) -> Json<Vec<Transaction>> {
    let node_state = state.node.read().await;
    Json(non_rewarded_transactions(&node_state))
}

/// Admits `tx` asynchronously and returns immediately. A `200` response
/// does not guarantee the mutation is visible yet: admission and
/// broadcast happen on a spawned task, matching the fire-and-forget
/// admission semantics of the upstream protocol.
async fn send_txn(
    State(state): State<AppState>,
    Json(tx): Json<Transaction>,
) -> (StatusCode, Json<Transaction>) {
    let echoed = tx.clone();
    tokio::spawn(async move {
        match mempool::add_transaction(&state.node, tx).await {
            Ok(mempool::AdmitOutcome::Admitted(admitted)) => {
                let pool_size = state.node.read().await.transaction_pool.len() as f64;
                state.metrics.node.mempool_size.set(pool_size);
                peer::broadcast_transaction(&state.node, &state.http, &admitted).await;
            }
            Ok(mempool::AdmitOutcome::Duplicate) => {}
            Err(e) => {
                warn!("failed to persist admitted transaction: {e}");
                std::process::exit(1);
            }
        }
    });
    (StatusCode::OK, Json(echoed))
}

#[derive(Serialize)]
struct StatusResponse {
    status: &'static str,
}

/// Overwrites the local peer table asynchronously and returns immediately.
async fn send_peers_list(
    State(state): State<AppState>,
    Json(peers): Json<HashMap<String, bool>>,
) -> Json<StatusResponse> {
    tokio::spawn(async move {
        peer::receive_peers_list(&state.node, peers).await;
    });
    Json(StatusResponse { status: "success" })
}

async fn check_status() -> &'static str {
    BLOCKCHAIN_STATUS
}

#[derive(Deserialize)]
struct FetchBlocksQuery {
    n: Option<usize>,
}

async fn fetch_last_n_blocks(
    State(state): State<AppState>,
    Query(q): Query<FetchBlocksQuery>,
) -> Json<ChainSegment> {
    let node_state = state.node.read().await;
    let n = q.n.unwrap_or(node_state.blocks.len());
    let start = node_state.blocks.len().saturating_sub(n);
    Json(ChainSegment {
        blocks: node_state.blocks[start..].to_vec(),
    })
}

/// Waits for Ctrl-C, for use with `axum::serve(..).with_graceful_shutdown`.
pub async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    info!("shutdown signal received");
}
