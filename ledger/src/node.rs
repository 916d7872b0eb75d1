//! Shared node state and the handle used to coordinate the four
//! concurrent loops (HTTP server, miner, peer pinger, consensus).
//!
//! Grounded on `api-gateway`'s `AppState`/`SharedState` shape: one struct
//! wrapped in an `Arc` and threaded through every task and HTTP handler.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use serde::{Deserialize, Serialize};
use tokio::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::config::ProtocolConfig;
use crate::error::StorageError;
use crate::storage::SingleKeyStore;
use crate::types::{Block, Transaction, TxStatus};

/// The entire persisted state of a node: its mempool, its chain, its
/// identity, and its view of peer liveness.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct NodeState {
    pub transaction_pool: Vec<Transaction>,
    pub blocks: Vec<Block>,
    pub address: String,
    pub peers: HashMap<String, bool>,
    pub mining_locked: bool,
}

impl NodeState {
    fn fresh(address: String) -> Self {
        let mut peers = HashMap::new();
        peers.insert(address.clone(), true);
        NodeState {
            transaction_pool: Vec::new(),
            blocks: vec![Block::genesis()],
            address,
            peers,
            mining_locked: false,
        }
    }
}

/// Computes `balance(addr)` by folding every `SUCCESS` transaction across
/// the whole chain. Mempool transactions do not count.
pub fn balance(state: &NodeState, address: &str) -> u64 {
    let mut total: i128 = 0;
    for block in &state.blocks {
        for tx in &block.transactions {
            if tx.status != TxStatus::Success {
                continue;
            }
            if tx.to == address {
                total += tx.value as i128;
            }
            if tx.from == address {
                total -= tx.value as i128;
            }
        }
    }
    total.max(0) as u64
}

/// Returns mempool transactions (newest first) followed by block
/// transactions (newest block first), excluding reward transactions from
/// the reserved blockchain address.
pub fn non_rewarded_transactions(state: &NodeState) -> Vec<Transaction> {
    let mut out: Vec<Transaction> = state.transaction_pool.iter().rev().cloned().collect();
    for block in state.blocks.iter().rev() {
        for tx in block
            .transactions
            .iter()
            .rev()
            .filter(|t| t.from != crate::types::BLOCKCHAIN_ADDRESS)
        {
            out.push(tx.clone());
        }
    }
    out
}

/// Shared handle to a node's state, storage, and cooperative mining-pause
/// flag. Cheaply `Clone`-able; every background task and HTTP handler
/// holds one.
#[derive(Clone)]
pub struct NodeHandle {
    state: Arc<RwLock<NodeState>>,
    store: Arc<SingleKeyStore>,
    mining_locked: Arc<AtomicBool>,
    pub protocol: ProtocolConfig,
}

impl NodeHandle {
    /// Boots a node: loads a persisted snapshot if present, otherwise
    /// starts fresh with a genesis block and `self_address` as the only
    /// peer.
    pub fn boot_fresh(
        self_address: String,
        store: SingleKeyStore,
        protocol: ProtocolConfig,
    ) -> Result<Self, StorageError> {
        let state = match store.get()? {
            Some(existing) => existing,
            None => {
                let fresh = NodeState::fresh(self_address);
                store.put(&fresh)?;
                fresh
            }
        };
        let mining_locked = state.mining_locked;
        Ok(Self {
            state: Arc::new(RwLock::new(state)),
            store: Arc::new(store),
            mining_locked: Arc::new(AtomicBool::new(mining_locked)),
            protocol,
        })
    }

    /// Boots a node by adopting a remote peer's full state, then
    /// overriding the `address` field with our own.
    pub fn boot_from_peer(
        mut remote_state: NodeState,
        self_address: String,
        store: SingleKeyStore,
        protocol: ProtocolConfig,
    ) -> Result<Self, StorageError> {
        remote_state.address = self_address.clone();
        remote_state.peers.entry(self_address).or_insert(true);
        store.put(&remote_state)?;
        let mining_locked = remote_state.mining_locked;
        Ok(Self {
            state: Arc::new(RwLock::new(remote_state)),
            store: Arc::new(store),
            mining_locked: Arc::new(AtomicBool::new(mining_locked)),
            protocol,
        })
    }

    pub async fn read(&self) -> RwLockReadGuard<'_, NodeState> {
        self.state.read().await
    }

    pub async fn write(&self) -> RwLockWriteGuard<'_, NodeState> {
        self.state.write().await
    }

    /// Persists `state` as the new snapshot. Storage failures are fatal
    /// (§7): the caller is expected to log and exit the process.
    pub fn persist(&self, state: &NodeState) -> Result<(), StorageError> {
        self.store.put(state)
    }

    /// Cooperative pause flag observed by the miner and set by the
    /// consensus loop around a chain-suffix replacement.
    pub fn mining_locked(&self) -> bool {
        self.mining_locked.load(Ordering::SeqCst)
    }

    pub fn set_mining_locked(&self, locked: bool) {
        self.mining_locked.store(locked, Ordering::SeqCst);
    }

    /// Returns a clone of the underlying flag, for handing to a
    /// `spawn_blocking` nonce search that needs to observe it without
    /// going through `&self`.
    pub fn mining_locked_flag(&self) -> Arc<AtomicBool> {
        self.mining_locked.clone()
    }

    /// Appends `block` to the chain, removes its transactions from the
    /// mempool, and persists the result.
    pub async fn add_block(&self, block: Block) -> Result<(), StorageError> {
        let included: std::collections::HashSet<String> = block
            .transactions
            .iter()
            .map(|t| t.transaction_hash.clone())
            .collect();

        let mut guard = self.write().await;
        guard.blocks.push(block);
        guard
            .transaction_pool
            .retain(|t| !included.contains(&t.transaction_hash));
        self.persist(&guard)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn test_store() -> (TempDir, SingleKeyStore) {
        let tmp = TempDir::new().expect("tempdir");
        let cfg = crate::storage::RocksDbConfig {
            path: tmp.path().to_string_lossy().to_string(),
            create_if_missing: true,
        };
        let store = SingleKeyStore::open(&cfg).expect("open store");
        (tmp, store)
    }

    #[tokio::test]
    async fn fresh_boot_creates_genesis_and_self_peer() {
        let (_tmp, store) = test_store();
        let handle =
            NodeHandle::boot_fresh("http://self:5000".into(), store, ProtocolConfig::default())
                .expect("boot");

        let state = handle.read().await;
        assert_eq!(state.blocks.len(), 1);
        assert_eq!(state.blocks[0].block_number, 0);
        assert_eq!(state.peers.get("http://self:5000"), Some(&true));
    }

    #[tokio::test]
    async fn add_block_removes_included_transactions_from_mempool() {
        let (_tmp, store) = test_store();
        let handle =
            NodeHandle::boot_fresh("http://self:5000".into(), store, ProtocolConfig::default())
                .expect("boot");

        let tx = Transaction::new("0xa".into(), "0xb".into(), 1, vec![]);
        {
            let mut guard = handle.write().await;
            guard.transaction_pool.push(tx.clone());
            handle.persist(&guard).unwrap();
        }

        let mut block = Block::genesis();
        block.block_number = 1;
        block.add_transaction(tx);

        handle.add_block(block).await.unwrap();

        let state = handle.read().await;
        assert!(state.transaction_pool.is_empty());
        assert_eq!(state.blocks.len(), 2);
    }

    #[test]
    fn balance_sums_only_successful_transactions() {
        let mut state = NodeState::fresh("self".into());
        let mut block = Block::genesis();
        block.block_number = 1;

        let mut ok = Transaction::new("0xa".into(), "0xb".into(), 10, vec![]);
        ok.status = TxStatus::Success;
        let mut failed = Transaction::new("0xa".into(), "0xb".into(), 5, vec![]);
        failed.status = TxStatus::Failed;

        block.transactions.push(ok);
        block.transactions.push(failed);
        state.blocks.push(block);

        assert_eq!(balance(&state, "0xb"), 10);
        assert_eq!(balance(&state, "0xa"), 0);
    }
}
