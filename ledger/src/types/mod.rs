//! Core domain types: transactions, blocks, and their shared status enum.
//!
//! These are the records that flow through the mempool, miner, and
//! consensus loop. Hashing and signing both go through
//! [`crate::canonical`] so every node derives byte-identical digests.

pub mod block;
pub mod transaction;

pub use block::Block;
pub use transaction::{Transaction, TxStatus};

/// Reserved sender address used for mining-reward transactions.
pub const BLOCKCHAIN_ADDRESS: &str = "0x0000000000000000000000000000000000000a";

/// Sentinel `prev_hash` carried by the genesis block.
pub const GENESIS_PREV_HASH: &str = "0x0";

/// Returns the current wall-clock time in nanoseconds since the Unix epoch.
///
/// Falls back to 0 if the clock reports a time before the epoch.
pub fn now_nanos() -> u64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64)
        .unwrap_or(0)
}
