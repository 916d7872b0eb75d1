//! RocksDB-backed single-key snapshot store.
//!
//! Unlike a per-block-keyed store, the entire [`crate::node::NodeState`] is
//! serialized and written under one fixed key on every mutation. This
//! matches a whole-state snapshot protocol rather than a log-structured
//! one: crash-consistency relies on RocksDB's single-key `put` atomicity.

use std::path::Path;

use rocksdb::{ColumnFamilyDescriptor, DB, Options};

use crate::error::StorageError;
use crate::node::NodeState;

const CF_STATE: &str = "state";
const STATE_KEY: &[u8] = b"node_state";

/// Configuration for [`SingleKeyStore`].
#[derive(Clone, Debug)]
pub struct RocksDbConfig {
    /// Filesystem path to the RocksDB database directory.
    pub path: String,
    /// Whether to create the database and missing column families if they
    /// do not yet exist.
    pub create_if_missing: bool,
}

impl Default for RocksDbConfig {
    fn default() -> Self {
        Self {
            path: "data/node-db".to_string(),
            create_if_missing: true,
        }
    }
}

/// Single-key whole-state snapshot store.
pub struct SingleKeyStore {
    db: DB,
}

impl SingleKeyStore {
    /// Opens (or creates) a RocksDB-backed store at the given path.
    pub fn open(cfg: &RocksDbConfig) -> Result<Self, StorageError> {
        let path = Path::new(&cfg.path);

        let mut opts = Options::default();
        opts.create_if_missing(cfg.create_if_missing);
        opts.create_missing_column_families(cfg.create_if_missing);

        let cfs = vec![
            ColumnFamilyDescriptor::new("default", Options::default()),
            ColumnFamilyDescriptor::new(CF_STATE, Options::default()),
        ];

        let db = DB::open_cf_descriptors(&opts, path, cfs)?;
        Ok(Self { db })
    }

    fn cf(&self) -> Result<std::sync::Arc<rocksdb::BoundColumnFamily<'_>>, StorageError> {
        self.db
            .cf_handle(CF_STATE)
            .ok_or(StorageError::MissingColumnFamily(CF_STATE))
    }

    /// Returns `true` if a snapshot has already been persisted.
    pub fn key_exists(&self) -> Result<bool, StorageError> {
        let cf = self.cf()?;
        Ok(self.db.get_cf(&cf, STATE_KEY)?.is_some())
    }

    /// Loads the persisted snapshot, if any.
    pub fn get(&self) -> Result<Option<NodeState>, StorageError> {
        let cf = self.cf()?;
        match self.db.get_cf(&cf, STATE_KEY)? {
            None => Ok(None),
            Some(bytes) => {
                let state: NodeState = serde_json::from_slice(&bytes)
                    .map_err(|e| StorageError::CorruptedState(e.to_string()))?;
                Ok(Some(state))
            }
        }
    }

    /// Serializes and persists `state` as the whole-node snapshot.
    pub fn put(&self, state: &NodeState) -> Result<(), StorageError> {
        let cf = self.cf()?;
        let bytes = serde_json::to_vec(state)
            .map_err(|e| StorageError::CorruptedState(e.to_string()))?;
        self.db.put_cf(&cf, STATE_KEY, bytes)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::TempDir;

    fn sample_state() -> NodeState {
        NodeState {
            transaction_pool: Vec::new(),
            blocks: vec![crate::types::Block::genesis()],
            address: "http://127.0.0.1:5000".to_string(),
            peers: HashMap::from([("http://127.0.0.1:5000".to_string(), true)]),
            mining_locked: false,
        }
    }

    #[test]
    fn roundtrips_a_snapshot() {
        let tmp = TempDir::new().expect("create temp dir");
        let cfg = RocksDbConfig {
            path: tmp.path().to_string_lossy().to_string(),
            create_if_missing: true,
        };
        let store = SingleKeyStore::open(&cfg).expect("open rocksdb");

        assert!(!store.key_exists().unwrap());

        let state = sample_state();
        store.put(&state).expect("put");

        assert!(store.key_exists().unwrap());
        let loaded = store.get().expect("get").expect("state present");
        assert_eq!(loaded.address, state.address);
        assert_eq!(loaded.blocks.len(), 1);
    }
}
