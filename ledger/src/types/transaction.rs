//! Transaction type, canonical hashing, and the status lifecycle.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::canonical::ObjectWriter;
use crate::crypto;

use super::now_nanos;

/// Lifecycle status of a transaction, from creation through inclusion in a
/// mined block.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub enum TxStatus {
    Pending,
    TxnVerificationSuccess,
    TxnVerificationFailure,
    Success,
    Failed,
}

impl TxStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TxStatus::Pending => "PENDING",
            TxStatus::TxnVerificationSuccess => "TXN_VERIFICATION_SUCCESS",
            TxStatus::TxnVerificationFailure => "TXN_VERIFICATION_FAILURE",
            TxStatus::Success => "SUCCESS",
            TxStatus::Failed => "FAILED",
        }
    }
}

/// A value-transfer transaction.
///
/// `public_key` is present only while in flight between the wallet and the
/// node's mempool; it is cleared on admission (see
/// [`crate::mempool::Mempool::add_transaction`]).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Transaction {
    pub from: String,
    pub to: String,
    pub value: u64,
    pub data: Vec<u8>,
    pub status: TxStatus,
    pub timestamp: u64,
    pub transaction_hash: String,
    pub signature: Vec<u8>,
    pub public_key: Option<String>,
}

impl Transaction {
    /// Builds a new unsigned, pending transaction and computes its
    /// `transaction_hash` over the canonical encoding with
    /// `transaction_hash`, `signature`, and `public_key` all blank.
    pub fn new(from: String, to: String, value: u64, data: Vec<u8>) -> Self {
        let mut tx = Transaction {
            from,
            to,
            value,
            data,
            status: TxStatus::Pending,
            timestamp: now_nanos(),
            transaction_hash: String::new(),
            signature: Vec::new(),
            public_key: None,
        };
        let digest = Sha256::digest(tx.canonical_bytes_override("", &[], None));
        tx.transaction_hash = crypto::to_hex(&digest);
        tx
    }

    /// Renders this transaction's canonical bytes with overridden
    /// `transaction_hash`/`signature`/`public_key`, so the same field-order
    /// logic serves both the construction-time hash and the sign/verify
    /// digest.
    fn canonical_bytes_override(
        &self,
        transaction_hash: &str,
        signature: &[u8],
        public_key: Option<&str>,
    ) -> Vec<u8> {
        let mut w = ObjectWriter::new();
        w.field_str("from", &self.from)
            .field_str("to", &self.to)
            .field_u64("value", self.value)
            .field_str("data", &hex::encode(&self.data))
            .field_str("status", self.status.as_str())
            .field_u64("timestamp", self.timestamp)
            .field_str("transaction_hash", transaction_hash)
            .field_str("signature", &hex::encode(signature));
        if let Some(pk) = public_key {
            w.field_str("public_key", pk);
        }
        w.finish().into_bytes()
    }

    /// Canonical bytes using this transaction's current field values.
    pub fn canonical_bytes(&self) -> Vec<u8> {
        self.canonical_bytes_override(
            &self.transaction_hash,
            &self.signature,
            self.public_key.as_deref(),
        )
    }

    /// The digest that is signed and verified: canonical bytes with the
    /// real `transaction_hash` but `signature`/`public_key` blanked.
    pub fn signing_digest(&self) -> [u8; 32] {
        Sha256::digest(self.canonical_bytes_override(&self.transaction_hash, &[], None)).into()
    }

    /// Signs this transaction in place with `signing_key`, attaching both
    /// the signature and the signer's public key.
    pub fn sign(&mut self, signing_key: &p256::ecdsa::SigningKey) {
        let digest = self.signing_digest();
        self.signature = crypto::sign_prehash(signing_key, &digest);
        let verifying_key = p256::ecdsa::VerifyingKey::from(signing_key);
        self.public_key = Some(crypto::public_key_hex(&verifying_key));
    }

    /// Checks basic shape (`value > 0`, `from != to`) and signature
    /// validity. Returns `false` on any malformed hex rather than
    /// propagating a parse error: an invalid signature is just invalid.
    pub fn has_valid_signature(&self) -> bool {
        if self.value == 0 || self.from == self.to {
            return false;
        }
        let Some(public_key) = &self.public_key else {
            return false;
        };
        let Ok(verifying_key) = crypto::verifying_key_from_hex(public_key) else {
            return false;
        };
        let digest = self.signing_digest();
        crypto::verify_prehash(&verifying_key, &digest, &self.signature)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::generate_keypair;

    #[test]
    fn construction_hash_is_stable_and_independent_of_signature() {
        let tx = Transaction::new("0xaaa".into(), "0xbbb".into(), 10, vec![]);
        let hash1 = tx.transaction_hash.clone();

        let mut signed = tx.clone();
        let sk = generate_keypair();
        signed.sign(&sk);

        assert_eq!(hash1, signed.transaction_hash);
    }

    #[test]
    fn signed_transaction_verifies() {
        let sk = generate_keypair();
        let vk = p256::ecdsa::VerifyingKey::from(&sk);
        let from = crypto::derive_address(&crypto::public_key_hex(&vk));

        let mut tx = Transaction::new(from, "0xbbb".into(), 10, vec![]);
        tx.sign(&sk);

        assert!(tx.has_valid_signature());
    }

    #[test]
    fn tampered_value_breaks_signature() {
        let sk = generate_keypair();
        let vk = p256::ecdsa::VerifyingKey::from(&sk);
        let from = crypto::derive_address(&crypto::public_key_hex(&vk));

        let mut tx = Transaction::new(from, "0xbbb".into(), 10, vec![]);
        tx.sign(&sk);
        tx.value = 11;

        assert!(!tx.has_valid_signature());
    }

    #[test]
    fn zero_value_is_rejected_even_if_signed() {
        let sk = generate_keypair();
        let vk = p256::ecdsa::VerifyingKey::from(&sk);
        let from = crypto::derive_address(&crypto::public_key_hex(&vk));

        let mut tx = Transaction::new(from, "0xbbb".into(), 0, vec![]);
        tx.sign(&sk);

        assert!(!tx.has_valid_signature());
    }

    #[test]
    fn self_transfer_is_rejected() {
        let sk = generate_keypair();
        let vk = p256::ecdsa::VerifyingKey::from(&sk);
        let addr = crypto::derive_address(&crypto::public_key_hex(&vk));

        let mut tx = Transaction::new(addr.clone(), addr, 10, vec![]);
        tx.sign(&sk);

        assert!(!tx.has_valid_signature());
    }
}
