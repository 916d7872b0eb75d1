//! Block type: an ordered bundle of transactions chained by hash.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::canonical::{ObjectWriter, render_array};
use crate::crypto;

use super::{GENESIS_PREV_HASH, Transaction, TxStatus};

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Block {
    pub block_number: u64,
    pub prev_hash: String,
    pub timestamp: u64,
    pub nonce: u64,
    pub transactions: Vec<Transaction>,
}

impl Block {
    /// Builds the genesis block: height 0, sentinel `prev_hash`, no
    /// transactions, nonce 0.
    pub fn genesis() -> Self {
        Block {
            block_number: 0,
            prev_hash: GENESIS_PREV_HASH.to_string(),
            timestamp: super::now_nanos(),
            nonce: 0,
            transactions: Vec::new(),
        }
    }

    /// Adds `tx` to this block, normalizing its status: a transaction that
    /// had passed mempool verification is promoted to `SUCCESS`; anything
    /// else is demoted to `FAILED`. The block may thus record failed
    /// transactions for audit without them affecting any balance.
    pub fn add_transaction(&mut self, mut tx: Transaction) {
        tx.status = if tx.status == TxStatus::TxnVerificationSuccess {
            TxStatus::Success
        } else {
            TxStatus::Failed
        };
        self.transactions.push(tx);
    }

    /// Canonical bytes: `block_number, prev_hash, timestamp, nonce,
    /// transactions` in that fixed order.
    pub fn canonical_bytes(&self) -> Vec<u8> {
        let tx_json: Vec<String> = self
            .transactions
            .iter()
            .map(|t| String::from_utf8(t.canonical_bytes()).expect("canonical JSON is valid utf8"))
            .collect();
        let tx_array = render_array(tx_json.iter().map(|s| s.as_str()));

        let mut w = ObjectWriter::new();
        w.field_u64("block_number", self.block_number)
            .field_str("prev_hash", &self.prev_hash)
            .field_u64("timestamp", self.timestamp)
            .field_u64("nonce", self.nonce)
            .field_raw("transactions", &tx_array);
        w.finish().into_bytes()
    }

    /// SHA-256 of the canonical encoding, `0x`-prefixed hex.
    pub fn hash(&self) -> String {
        crypto::to_hex(&Sha256::digest(self.canonical_bytes()))
    }

    /// True iff `hash()` has `difficulty` leading hex `0` digits right
    /// after the `0x` prefix.
    pub fn meets_difficulty(&self, difficulty: usize) -> bool {
        hash_meets_difficulty(&self.hash(), difficulty)
    }
}

/// Shared leading-zero check used for both freshly computed and
/// peer-supplied block hashes.
pub fn hash_meets_difficulty(hash: &str, difficulty: usize) -> bool {
    let body = hash.strip_prefix("0x").unwrap_or(hash);
    body.len() >= difficulty && body.as_bytes()[..difficulty].iter().all(|&b| b == b'0')
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Transaction;

    #[test]
    fn genesis_block_has_sentinel_prev_hash_and_zero_height() {
        let g = Block::genesis();
        assert_eq!(g.block_number, 0);
        assert_eq!(g.prev_hash, GENESIS_PREV_HASH);
        assert!(g.transactions.is_empty());
    }

    #[test]
    fn hash_is_deterministic_for_same_contents() {
        let g = Block::genesis();
        assert_eq!(g.hash(), g.hash());
    }

    #[test]
    fn add_transaction_promotes_verified_and_demotes_others() {
        let mut b = Block::genesis();
        let mut ok = Transaction::new("0xa".into(), "0xb".into(), 1, vec![]);
        ok.status = TxStatus::TxnVerificationSuccess;
        let mut bad = Transaction::new("0xa".into(), "0xb".into(), 1, vec![]);
        bad.status = TxStatus::TxnVerificationFailure;

        b.add_transaction(ok);
        b.add_transaction(bad);

        assert_eq!(b.transactions[0].status, TxStatus::Success);
        assert_eq!(b.transactions[1].status, TxStatus::Failed);
    }

    #[test]
    fn difficulty_check_counts_leading_zero_hex_digits() {
        assert!(hash_meets_difficulty("0x0000abc", 4));
        assert!(!hash_meets_difficulty("0x0001abc", 4));
    }
}
