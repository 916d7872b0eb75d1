//! Typed error enums for the ledger crate.
//!
//! Following the rest of this codebase, errors are hand-rolled enums with
//! manual `Display`/`Error` impls rather than `thiserror`/`anyhow`.

use std::fmt;

/// Errors from key generation, signing, and verification.
#[derive(Debug)]
pub enum CryptoError {
    /// A hex string did not decode to the expected byte length.
    MalformedHex(&'static str),
    /// The supplied bytes do not form a valid P-256 key or signature.
    InvalidKeyMaterial(&'static str),
}

impl fmt::Display for CryptoError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CryptoError::MalformedHex(what) => write!(f, "malformed hex: {what}"),
            CryptoError::InvalidKeyMaterial(what) => write!(f, "invalid key material: {what}"),
        }
    }
}

impl std::error::Error for CryptoError {}

/// Errors from storage operations.
#[derive(Debug)]
pub enum StorageError {
    /// Underlying RocksDB error.
    RocksDb(rocksdb::Error),
    /// Required column family was not found.
    MissingColumnFamily(&'static str),
    /// Stored bytes did not deserialize into a valid node state.
    CorruptedState(String),
}

impl From<rocksdb::Error> for StorageError {
    fn from(e: rocksdb::Error) -> Self {
        StorageError::RocksDb(e)
    }
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorageError::RocksDb(e) => write!(f, "rocksdb error: {e}"),
            StorageError::MissingColumnFamily(name) => {
                write!(f, "missing column family: {name}")
            }
            StorageError::CorruptedState(msg) => write!(f, "corrupted node state: {msg}"),
        }
    }
}

impl std::error::Error for StorageError {}

/// Errors from consensus chain verification.
#[derive(Debug)]
pub enum ConsensusError {
    /// A block's `prev_hash` did not match its predecessor's hash.
    BrokenLink { height: u64 },
    /// A block's hash did not meet the configured difficulty.
    InsufficientWork { height: u64 },
    /// The candidate segment was not longer than the incumbent chain.
    NotLonger,
    /// A peer request failed or timed out.
    PeerUnreachable(String),
}

impl fmt::Display for ConsensusError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConsensusError::BrokenLink { height } => {
                write!(f, "block {height} has a broken prev_hash link")
            }
            ConsensusError::InsufficientWork { height } => {
                write!(f, "block {height} does not meet the difficulty target")
            }
            ConsensusError::NotLonger => write!(f, "candidate chain is not longer than local"),
            ConsensusError::PeerUnreachable(url) => write!(f, "peer unreachable: {url}"),
        }
    }
}

impl std::error::Error for ConsensusError {}

/// Errors surfaced at the HTTP boundary: malformed input that axum's own
/// extractors don't already reject (e.g. a query parameter that parses as
/// a string but isn't well-formed hex).
#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApiError::BadRequest(msg) => write!(f, "bad request: {msg}"),
        }
    }
}

impl std::error::Error for ApiError {}
