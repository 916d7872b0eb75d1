//! Persistence: a single-key whole-state snapshot in RocksDB.

pub mod rocksdb;

pub use rocksdb::{RocksDbConfig, SingleKeyStore};
