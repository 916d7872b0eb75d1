//! Mempool admission: dedup, signature check, and simulated-balance check.
//!
//! Grounded on `examples/original_source/blockchain/blockchain_struct.go`'s
//! `CreateTransaction`/simulated-balance loop for semantics.

use crate::error::StorageError;
use crate::node::{NodeHandle, balance};
use crate::types::{Transaction, TxStatus};

/// Result of attempting to admit a transaction.
pub enum AdmitOutcome {
    /// A mempool entry with the same `transaction_hash` already exists;
    /// admission is a no-op.
    Duplicate,
    /// The transaction was appended to the mempool (its status reflects
    /// whether it passed verification).
    Admitted(Transaction),
}

/// Admits `tx` into the mempool under `handle`'s write lock, persisting
/// the result. Does not broadcast; callers broadcast a freshly admitted
/// transaction separately, after releasing the lock (see
/// [`crate::peer::broadcast_transaction`]).
pub async fn add_transaction(
    handle: &NodeHandle,
    mut tx: Transaction,
) -> Result<AdmitOutcome, StorageError> {
    let mut guard = handle.write().await;

    if guard
        .transaction_pool
        .iter()
        .any(|t| t.transaction_hash == tx.transaction_hash)
    {
        return Ok(AdmitOutcome::Duplicate);
    }

    let valid_sig = tx.has_valid_signature();
    let valid_balance = has_sufficient_simulated_balance(&guard, &tx, valid_sig);

    tx.status = if valid_sig && valid_balance {
        TxStatus::TxnVerificationSuccess
    } else {
        TxStatus::TxnVerificationFailure
    };
    tx.public_key = None;

    guard.transaction_pool.push(tx.clone());
    handle.persist(&guard)?;

    Ok(AdmitOutcome::Admitted(tx))
}

/// Simulates `tx.from`'s balance against the chain plus every pending
/// same-sender mempool entry, stopping at the first entry that would
/// overdraw. Only runs the simulation when `tx_valid_sig` (the incoming
/// transaction's own, already-computed signature validity) is true — an
/// unsigned or malformed transaction is rejected on that basis alone, same
/// as the original. Every pool entry's value is subtracted unconditionally:
/// pool entries have had `public_key` cleared on admission, so
/// `has_valid_signature()` would always report `false` for them and the
/// loop would never subtract anything. This is a best-effort approximation,
/// not a strict double-spend guard, kept as-is for protocol parity.
fn has_sufficient_simulated_balance(
    state: &crate::node::NodeState,
    tx: &Transaction,
    tx_valid_sig: bool,
) -> bool {
    if !tx_valid_sig {
        return false;
    }

    let mut simulated = balance(state, &tx.from) as i128;

    for existing in state
        .transaction_pool
        .iter()
        .filter(|t| t.from == tx.from)
    {
        if simulated < existing.value as i128 {
            break;
        }
        simulated -= existing.value as i128;
    }

    simulated >= tx.value as i128
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ProtocolConfig;
    use crate::crypto::{derive_address, generate_keypair, public_key_hex};
    use crate::storage::{RocksDbConfig, SingleKeyStore};
    use tempfile::TempDir;

    async fn fresh_handle() -> (TempDir, NodeHandle) {
        let tmp = TempDir::new().expect("tempdir");
        let cfg = RocksDbConfig {
            path: tmp.path().to_string_lossy().to_string(),
            create_if_missing: true,
        };
        let store = SingleKeyStore::open(&cfg).expect("open store");
        let handle =
            NodeHandle::boot_fresh("http://self:5000".into(), store, ProtocolConfig::default())
                .expect("boot");
        (tmp, handle)
    }

    #[tokio::test]
    async fn duplicate_submission_is_idempotent() {
        let (_tmp, handle) = fresh_handle().await;
        let sk = generate_keypair();
        let vk = p256::ecdsa::VerifyingKey::from(&sk);
        let from = derive_address(&public_key_hex(&vk));

        let mut tx = Transaction::new(from, "0xb".into(), 1, vec![]);
        tx.sign(&sk);

        add_transaction(&handle, tx.clone()).await.unwrap();
        let outcome = add_transaction(&handle, tx).await.unwrap();
        assert!(matches!(outcome, AdmitOutcome::Duplicate));

        let state = handle.read().await;
        assert_eq!(state.transaction_pool.len(), 1);
    }

    #[tokio::test]
    async fn bad_signature_is_admitted_as_verification_failure() {
        let (_tmp, handle) = fresh_handle().await;
        let sk = generate_keypair();
        let vk = p256::ecdsa::VerifyingKey::from(&sk);
        let from = derive_address(&public_key_hex(&vk));

        let mut tx = Transaction::new(from, "0xb".into(), 1, vec![]);
        tx.sign(&sk);
        let last = tx.signature.len() - 1;
        tx.signature[last] ^= 0xff;

        let outcome = add_transaction(&handle, tx).await.unwrap();
        match outcome {
            AdmitOutcome::Admitted(tx) => {
                assert_eq!(tx.status, TxStatus::TxnVerificationFailure);
                assert!(tx.public_key.is_none());
            }
            AdmitOutcome::Duplicate => panic!("expected a fresh admission"),
        }
    }

    #[tokio::test]
    async fn a_second_pending_transaction_cannot_overdraw_the_first() {
        let (_tmp, handle) = fresh_handle().await;
        let sk = generate_keypair();
        let vk = p256::ecdsa::VerifyingKey::from(&sk);
        let from = derive_address(&public_key_hex(&vk));

        // Give the sender a confirmed balance of 10 via a mined block.
        {
            let mut guard = handle.write().await;
            let mut reward = Transaction::new(
                crate::types::BLOCKCHAIN_ADDRESS.to_string(),
                from.clone(),
                10,
                vec![],
            );
            reward.status = TxStatus::Success;
            let mut block = crate::types::Block::genesis();
            block.block_number = 1;
            block.transactions.push(reward);
            guard.blocks.push(block);
            handle.persist(&guard).unwrap();
        }

        let mut first = Transaction::new(from.clone(), "0xb".into(), 8, vec![]);
        first.sign(&sk);
        let mut second = Transaction::new(from, "0xc".into(), 8, vec![]);
        second.sign(&sk);

        let outcome = add_transaction(&handle, first).await.unwrap();
        assert!(matches!(
            outcome,
            AdmitOutcome::Admitted(tx) if tx.status == TxStatus::TxnVerificationSuccess
        ));

        // The sender only has 10 total; a second pending spend of 8 would
        // overdraw once the first is accounted for.
        let outcome = add_transaction(&handle, second).await.unwrap();
        match outcome {
            AdmitOutcome::Admitted(tx) => {
                assert_eq!(tx.status, TxStatus::TxnVerificationFailure);
            }
            AdmitOutcome::Duplicate => panic!("expected a fresh admission"),
        }
    }

    #[tokio::test]
    async fn insufficient_balance_is_admitted_as_verification_failure() {
        let (_tmp, handle) = fresh_handle().await;
        let sk = generate_keypair();
        let vk = p256::ecdsa::VerifyingKey::from(&sk);
        let from = derive_address(&public_key_hex(&vk));

        // Sender has no prior reward transactions, so any positive value
        // exceeds its balance of zero.
        let mut tx = Transaction::new(from, "0xb".into(), 100, vec![]);
        tx.sign(&sk);

        let outcome = add_transaction(&handle, tx).await.unwrap();
        match outcome {
            AdmitOutcome::Admitted(tx) => {
                assert_eq!(tx.status, TxStatus::TxnVerificationFailure);
            }
            AdmitOutcome::Duplicate => panic!("expected a fresh admission"),
        }
    }
}
