//! Proof-of-work miner: continuously drains the mempool into candidate
//! blocks and searches for a nonce meeting the difficulty target.
//!
//! Grounded on `examples/original_source/blockchain/blockchain_struct.go`'s
//! `Mining`/`ProofOfWork` for the algorithm; the "build from pool, hand to
//! a commit step" shape mirrors `chain/src/consensus/proposer.rs`.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use tracing::{error, info};

use crate::metrics::MetricsRegistry;
use crate::node::NodeHandle;
use crate::types::{BLOCKCHAIN_ADDRESS, Block, TxStatus, now_nanos};

/// Runs the mining loop forever. Each iteration builds a candidate block
/// from the current mempool and chain tip, then searches for a nonce
/// meeting the configured difficulty, yielding to the cooperative
/// `mining_locked` flag so a consensus-loop chain replacement can proceed.
pub async fn run_mining_loop(handle: NodeHandle, miner_address: String, metrics: Arc<MetricsRegistry>) -> ! {
    loop {
        if handle.mining_locked() {
            tokio::time::sleep(Duration::from_millis(50)).await;
            continue;
        }

        let candidate = build_candidate(&handle, &miner_address).await;
        let difficulty = handle.protocol.mining_difficulty;
        let mining_locked = handle.mining_locked_flag();

        let started = Instant::now();
        let mined = tokio::task::spawn_blocking(move || search_nonce(candidate, difficulty, mining_locked))
            .await
            .expect("mining task panicked");

        match mined {
            Some(block) => {
                metrics.node.block_mine_seconds.observe(started.elapsed().as_secs_f64());
                let height = block.block_number;
                if let Err(e) = handle.add_block(block).await {
                    error!("failed to persist mined block: {e}");
                    std::process::exit(1);
                }
                metrics.node.blocks_mined.inc();
                let pool_size = handle.read().await.transaction_pool.len() as f64;
                metrics.node.mempool_size.set(pool_size);
                info!(height, "mined new block");
            }
            None => {
                // mining_locked was set mid-search; abandon and re-read
                // chain state on the next iteration.
            }
        }
    }
}

/// Builds a candidate block from the current chain tip and mempool,
/// appending a reward transaction for `miner_address`.
async fn build_candidate(handle: &NodeHandle, miner_address: &str) -> Block {
    let (tip, height, pool_txs) = {
        let state = handle.read().await;
        let tip = state
            .blocks
            .last()
            .expect("chain always has at least a genesis block")
            .hash();
        (tip, state.blocks.len() as u64, state.transaction_pool.clone())
    };

    let mut candidate = Block {
        block_number: height,
        prev_hash: tip,
        timestamp: now_nanos(),
        nonce: 0,
        transactions: Vec::new(),
    };

    for tx in pool_txs {
        candidate.add_transaction(tx);
    }

    let mut reward = crate::types::Transaction::new(
        BLOCKCHAIN_ADDRESS.to_string(),
        miner_address.to_string(),
        handle.protocol.mining_reward,
        Vec::new(),
    );
    reward.status = TxStatus::Success;
    candidate.transactions.push(reward);

    candidate
}

/// Increments `block.nonce` until its hash meets `difficulty`, or returns
/// `None` if `mining_locked` is set first.
fn search_nonce(mut block: Block, difficulty: usize, mining_locked: Arc<AtomicBool>) -> Option<Block> {
    loop {
        if mining_locked.load(Ordering::SeqCst) {
            return None;
        }
        if block.meets_difficulty(difficulty) {
            return Some(block);
        }
        block.nonce += 1;
    }
}
