//! Ledger library crate.
//!
//! Provides the core building blocks for a minimal proof-of-work
//! blockchain node:
//!
//! - P-256 crypto and address derivation (`crypto`),
//! - deterministic canonical encoding (`canonical`),
//! - the transaction/block domain types (`types`),
//! - a single-key whole-state persistence layer (`storage`),
//! - shared node state and the cross-task handle (`node`),
//! - mempool admission (`mempool`),
//! - the proof-of-work miner (`miner`),
//! - peer liveness and gossip (`peer`),
//! - the longest-valid-chain consensus loop (`consensus`),
//! - the node's HTTP API (`http`),
//! - Prometheus metrics (`metrics`),
//! - and top-level node configuration (`config`).

pub mod canonical;
pub mod config;
pub mod consensus;
pub mod crypto;
pub mod error;
pub mod http;
pub mod mempool;
pub mod metrics;
pub mod miner;
pub mod node;
pub mod peer;
pub mod storage;
pub mod types;

pub use config::{NodeConfig, ProtocolConfig};
pub use error::{ApiError, ConsensusError, CryptoError, StorageError};
pub use metrics::{MetricsRegistry, NodeMetrics, run_prometheus_http_server};
pub use node::{NodeHandle, NodeState, balance, non_rewarded_transactions};
pub use storage::{RocksDbConfig, SingleKeyStore};
pub use types::{BLOCKCHAIN_ADDRESS, Block, Transaction, TxStatus};
