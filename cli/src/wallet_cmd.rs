//! `node wallet`: a thin HTTP gateway that generates keys, checks
//! balances, and signs+submits transactions on behalf of a client that
//! holds no node state of its own.
//!
//! Grounded on `api-gateway/src/routes/health.rs`'s handler shape (typed
//! request/response structs, one handler per route) and on
//! `api-gateway/src/main.rs` for router/shutdown wiring.

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use ledger::http::as_bad_request;
use ledger::{ApiError, Transaction, crypto};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::WalletArgs;

#[derive(Clone)]
struct WalletState {
    node_address: String,
    http: reqwest::Client,
}

pub async fn run(args: WalletArgs) -> Result<(), String> {
    let state = WalletState {
        node_address: args.node_address.trim_end_matches('/').to_string(),
        http: ledger::peer::build_http_client(),
    };

    let app = Router::new()
        .route("/create_new_wallet", get(create_new_wallet))
        .route("/wallet_balance", get(wallet_balance))
        .route("/send_signed_txn", post(send_signed_txn))
        .with_state(state);

    let listen_addr = format!("0.0.0.0:{}", args.port);
    tracing::info!("wallet gateway listening on http://{listen_addr}, node={}", args.node_address);

    let listener = tokio::net::TcpListener::bind(&listen_addr)
        .await
        .map_err(|e| format!("failed to bind {listen_addr}: {e}"))?;

    axum::serve(listener, app)
        .with_graceful_shutdown(ledger::http::shutdown_signal())
        .await
        .map_err(|e| format!("HTTP server error: {e}"))?;

    Ok(())
}

#[derive(Serialize)]
struct NewWallet {
    private_key: String,
    public_key: String,
    address: String,
}

async fn create_new_wallet() -> Json<NewWallet> {
    let signing_key = crypto::generate_keypair();
    let verifying_key = p256::ecdsa::VerifyingKey::from(&signing_key);
    let public_key = crypto::public_key_hex(&verifying_key);
    let address = crypto::derive_address(&public_key);

    Json(NewWallet {
        private_key: crypto::private_key_hex(&signing_key),
        public_key,
        address,
    })
}

#[derive(Deserialize)]
struct BalanceQuery {
    address: String,
}

#[derive(Serialize)]
struct BalanceResponse {
    balance: u64,
}

async fn wallet_balance(
    State(state): State<WalletState>,
    Query(q): Query<BalanceQuery>,
) -> Result<Json<BalanceResponse>, (StatusCode, String)> {
    let resp = state
        .http
        .get(format!("{}/balance", state.node_address))
        .query(&[("address", &q.address)])
        .send()
        .await
        .map_err(|e| (StatusCode::BAD_GATEWAY, format!("node unreachable: {e}")))?;

    if !resp.status().is_success() {
        return Err((StatusCode::BAD_GATEWAY, "node returned an error".into()));
    }

    resp.json::<BalanceResponse>()
        .await
        .map(Json)
        .map_err(|e| (StatusCode::BAD_GATEWAY, format!("malformed node response: {e}")))
}

#[derive(Deserialize)]
struct SendTxnQuery {
    private_key: String,
}

#[derive(Deserialize)]
struct SendTxnBody {
    to: String,
    value: u64,
    #[serde(default)]
    data: Vec<u8>,
}

async fn send_signed_txn(
    State(state): State<WalletState>,
    Query(q): Query<SendTxnQuery>,
    Json(body): Json<SendTxnBody>,
) -> Result<Json<Transaction>, (StatusCode, String)> {
    let signing_key = crypto::signing_key_from_hex(&q.private_key)
        .map_err(|e| ApiError::BadRequest(format!("invalid private key: {e}")))
        .map_err(as_bad_request)?;
    let verifying_key = p256::ecdsa::VerifyingKey::from(&signing_key);
    let from = crypto::derive_address(&crypto::public_key_hex(&verifying_key));

    let mut tx = Transaction::new(from, body.to, body.value, body.data);
    tx.sign(&signing_key);

    let resp = state
        .http
        .post(format!("{}/send_txn", state.node_address))
        .json(&tx)
        .send()
        .await
        .map_err(|e| (StatusCode::BAD_GATEWAY, format!("node unreachable: {e}")))?;

    if !resp.status().is_success() {
        warn!("node rejected transaction submission: {}", resp.status());
        return Err((StatusCode::BAD_GATEWAY, "node rejected the transaction".into()));
    }

    Ok(Json(tx))
}
