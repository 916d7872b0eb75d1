//! Top-level node configuration.
//!
//! Aggregates the cluster-wide protocol constants (§6) with the storage
//! and metrics sub-configs, following the same composition shape as the
//! rest of this codebase's config structs: one `Default` per piece, one
//! struct that aggregates them.

use std::net::SocketAddr;
use std::time::Duration;

use crate::storage::RocksDbConfig;

/// Fixed status string returned by `/check_status` for liveness checks.
pub const BLOCKCHAIN_STATUS: &str = "blockchain_server_up";

/// Configuration for the Prometheus metrics exporter.
#[derive(Clone, Debug)]
pub struct MetricsConfig {
    pub enabled: bool,
    pub listen_addr: SocketAddr,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        let addr: SocketAddr = "127.0.0.1:9898"
            .parse()
            .expect("hard-coded metrics listen address should parse");
        Self {
            enabled: true,
            listen_addr: addr,
        }
    }
}

/// Protocol-wide constants and tuning knobs for a node.
///
/// `mining_difficulty`, `mining_reward`, and `fetch_last_n_blocks` must be
/// agreed cluster-wide: changing them on a single node forks it away from
/// the rest of the cluster.
#[derive(Clone, Debug)]
pub struct ProtocolConfig {
    /// Number of leading hex-`0` digits a block hash must have.
    pub mining_difficulty: usize,
    /// Value minted to the miner in each block's reward transaction.
    pub mining_reward: u64,
    /// Number of trailing blocks returned by `/fetch_last_n_blocks`.
    pub fetch_last_n_blocks: usize,
    /// Pause between consecutive peer liveness pings.
    pub peer_ping_pause: Duration,
    /// Pause between consecutive peer-list broadcasts.
    pub peer_broadcast_pause: Duration,
    /// Pause between consecutive transaction broadcasts to peers.
    pub txn_broadcast_pause: Duration,
    /// Pause between consecutive consensus reconciliation rounds.
    pub consensus_pause: Duration,
}

impl Default for ProtocolConfig {
    fn default() -> Self {
        Self {
            mining_difficulty: 3,
            mining_reward: 1_000_000,
            fetch_last_n_blocks: 10,
            peer_ping_pause: Duration::from_secs(20),
            peer_broadcast_pause: Duration::from_millis(50),
            txn_broadcast_pause: Duration::from_millis(50),
            consensus_pause: Duration::from_secs(30),
        }
    }
}

/// Top-level configuration for a chain node: protocol constants, storage,
/// and metrics.
#[derive(Clone, Debug, Default)]
pub struct NodeConfig {
    pub protocol: ProtocolConfig,
    pub storage: RocksDbConfig,
    pub metrics: MetricsConfig,
}
