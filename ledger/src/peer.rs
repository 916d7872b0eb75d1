//! Peer liveness table and transaction/peer-list gossip.
//!
//! Grounded on `examples/original_source/blockchain/peers.go`: a periodic
//! ping loop that marks peers live/dead, persists the table, then
//! broadcasts it; plus a one-hop transaction broadcast used by the
//! mempool after admission.

use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use crate::config::BLOCKCHAIN_STATUS;
use crate::metrics::MetricsRegistry;
use crate::node::NodeHandle;
use crate::types::Transaction;

/// Builds a `reqwest::Client` with a bounded timeout, so a dead peer
/// cannot stall the consensus or peer-ping loop.
pub fn build_http_client() -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(5))
        .build()
        .expect("building a reqwest client with only a timeout never fails")
}

/// Returns `true` iff `peer`'s `/check_status` responds with the fixed
/// liveness sentinel.
async fn check_status(http: &reqwest::Client, peer: &str) -> bool {
    match http.get(format!("{peer}/check_status")).send().await {
        Ok(resp) => match resp.text().await {
            Ok(body) => body.trim() == BLOCKCHAIN_STATUS,
            Err(_) => false,
        },
        Err(_) => false,
    }
}

/// One round of liveness pinging: pings every peer but self, persists the
/// updated table, then gossips it to every peer now marked live.
pub async fn ping_round(handle: &NodeHandle, http: &reqwest::Client, metrics: &MetricsRegistry) {
    let (self_address, peer_urls): (String, Vec<String>) = {
        let state = handle.read().await;
        (state.address.clone(), state.peers.keys().cloned().collect())
    };

    let mut updates = Vec::new();
    for peer in &peer_urls {
        if peer == &self_address {
            updates.push((peer.clone(), true));
            continue;
        }
        let live = check_status(http, peer).await;
        updates.push((peer.clone(), live));
    }

    {
        let mut state = handle.write().await;
        for (peer, live) in &updates {
            state.peers.insert(peer.clone(), *live);
        }
        if let Err(e) = handle.persist(&state) {
            tracing::error!("failed to persist peer table: {e}");
            std::process::exit(1);
        }
        let live_count = state.peers.values().filter(|live| **live).count();
        metrics.node.peers_live.set(live_count as f64);
    }

    broadcast_peers_list(handle, http).await;
}

/// Runs [`ping_round`] forever, sleeping `peer_ping_pause` between rounds.
pub async fn run_ping_loop(handle: NodeHandle, http: reqwest::Client, metrics: Arc<MetricsRegistry>) -> ! {
    let pause = handle.protocol.peer_ping_pause;
    loop {
        ping_round(&handle, &http, &metrics).await;
        tokio::time::sleep(pause).await;
    }
}

/// Sends the current peer table to every peer marked live (excluding
/// self), pausing briefly between sends.
pub async fn broadcast_peers_list(handle: &NodeHandle, http: &reqwest::Client) {
    let (self_address, peers, pause) = {
        let state = handle.read().await;
        (
            state.address.clone(),
            state.peers.clone(),
            handle.protocol.peer_broadcast_pause,
        )
    };

    for (peer, live) in &peers {
        if peer == &self_address || !*live {
            continue;
        }
        if let Err(e) = http
            .post(format!("{peer}/send_peers_list"))
            .json(&peers)
            .send()
            .await
        {
            warn!("failed to broadcast peers list to {peer}: {e}");
        }
        tokio::time::sleep(pause).await;
    }
}

/// Overwrites the local peer table with `incoming` (no union semantics:
/// a stale peer's view can propagate, matching the upstream protocol).
pub async fn receive_peers_list(
    handle: &NodeHandle,
    incoming: std::collections::HashMap<String, bool>,
) {
    let mut state = handle.write().await;
    state.peers = incoming;
    if let Err(e) = handle.persist(&state) {
        tracing::error!("failed to persist received peer table: {e}");
        std::process::exit(1);
    }
}

/// Broadcasts a freshly admitted transaction to every live peer but self.
pub async fn broadcast_transaction(handle: &NodeHandle, http: &reqwest::Client, tx: &Transaction) {
    let (self_address, peers, pause) = {
        let state = handle.read().await;
        (
            state.address.clone(),
            state.peers.clone(),
            handle.protocol.txn_broadcast_pause,
        )
    };

    for (peer, live) in &peers {
        if peer == &self_address || !*live {
            continue;
        }
        match http.post(format!("{peer}/send_txn")).json(tx).send().await {
            Ok(resp) if resp.status().is_success() => {
                info!("broadcast transaction {} to {}", tx.transaction_hash, peer);
            }
            Ok(resp) => warn!("peer {peer} rejected transaction broadcast: {}", resp.status()),
            Err(e) => warn!("failed to broadcast transaction to {peer}: {e}"),
        }
        tokio::time::sleep(pause).await;
    }
}
