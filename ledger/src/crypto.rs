//! P-256 keypair generation, prehash signing/verification, and address
//! derivation.
//!
//! Signatures are ASN.1-DER over the SHA-256 digest of a transaction's
//! canonical bytes, computed via the prehash API since the digest is taken
//! before signing rather than re-hashed by the signer.

use ecdsa::signature::hazmat::{PrehashSigner, PrehashVerifier};
use p256::ecdsa::{Signature, SigningKey, VerifyingKey};
use p256::elliptic_curve::sec1::ToEncodedPoint;
use rand_core::OsRng;
use sha2::{Digest, Sha256};

use crate::error::CryptoError;

/// Hex-encodes bytes with a `0x` prefix.
pub fn to_hex(bytes: &[u8]) -> String {
    format!("0x{}", hex::encode(bytes))
}

/// Decodes a `0x`-prefixed (or bare) hex string into bytes.
pub fn from_hex(s: &str, what: &'static str) -> Result<Vec<u8>, CryptoError> {
    let trimmed = s.strip_prefix("0x").unwrap_or(s);
    hex::decode(trimmed).map_err(|_| CryptoError::MalformedHex(what))
}

/// Generates a fresh P-256 keypair.
pub fn generate_keypair() -> SigningKey {
    SigningKey::random(&mut OsRng)
}

/// Serializes a public key as `0x` + 64 hex chars of X + 64 hex chars of Y.
pub fn public_key_hex(verifying_key: &VerifyingKey) -> String {
    let point = verifying_key.to_encoded_point(false);
    // Uncompressed point is 0x04 || X(32) || Y(32); drop the leading tag byte.
    let bytes = point.as_bytes();
    to_hex(&bytes[1..])
}

/// Serializes a private key as `0x` + 64 hex chars.
pub fn private_key_hex(signing_key: &SigningKey) -> String {
    to_hex(&signing_key.to_bytes())
}

/// Parses a private key from its hex encoding.
pub fn signing_key_from_hex(s: &str) -> Result<SigningKey, CryptoError> {
    let bytes = from_hex(s, "private key")?;
    SigningKey::from_slice(&bytes).map_err(|_| CryptoError::InvalidKeyMaterial("private key"))
}

/// Parses a public key from its `X || Y` hex encoding.
pub fn verifying_key_from_hex(s: &str) -> Result<VerifyingKey, CryptoError> {
    let xy = from_hex(s, "public key")?;
    if xy.len() != 64 {
        return Err(CryptoError::InvalidKeyMaterial("public key length"));
    }
    let mut uncompressed = Vec::with_capacity(65);
    uncompressed.push(0x04);
    uncompressed.extend_from_slice(&xy);
    VerifyingKey::from_sec1_bytes(&uncompressed)
        .map_err(|_| CryptoError::InvalidKeyMaterial("public key point"))
}

/// Derives a `0x`-prefixed 40-hex-char address from a public key's hex
/// encoding: the last 40 hex chars of SHA-256(public-key-hex without `0x`).
pub fn derive_address(public_key_hex: &str) -> String {
    let stripped = public_key_hex.strip_prefix("0x").unwrap_or(public_key_hex);
    let digest = Sha256::digest(stripped.as_bytes());
    let full = hex::encode(digest);
    let tail = &full[full.len() - 40..];
    format!("0x{tail}")
}

/// Signs a SHA-256 digest, returning the ASN.1-DER-encoded signature bytes.
pub fn sign_prehash(signing_key: &SigningKey, digest: &[u8; 32]) -> Vec<u8> {
    let sig: Signature = signing_key
        .sign_prehash(digest)
        .expect("signing a 32-byte digest with a valid key never fails");
    sig.to_der().as_bytes().to_vec()
}

/// Verifies an ASN.1-DER signature over a SHA-256 digest. Never panics;
/// malformed signatures or points are treated as a failed verification.
pub fn verify_prehash(verifying_key: &VerifyingKey, digest: &[u8; 32], der_sig: &[u8]) -> bool {
    match Signature::from_der(der_sig) {
        Ok(sig) => verifying_key.verify_prehash(digest, &sig).is_ok(),
        Err(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sign_and_verify_roundtrip() {
        let sk = generate_keypair();
        let vk = VerifyingKey::from(&sk);
        let digest = Sha256::digest(b"hello ledger").into();

        let sig = sign_prehash(&sk, &digest);
        assert!(verify_prehash(&vk, &digest, &sig));
    }

    #[test]
    fn tampered_signature_fails_verification() {
        let sk = generate_keypair();
        let vk = VerifyingKey::from(&sk);
        let digest = Sha256::digest(b"hello ledger").into();

        let mut sig = sign_prehash(&sk, &digest);
        let last = sig.len() - 1;
        sig[last] ^= 0xff;

        assert!(!verify_prehash(&vk, &digest, &sig));
    }

    #[test]
    fn wrong_key_fails_verification() {
        let sk = generate_keypair();
        let other = generate_keypair();
        let vk = VerifyingKey::from(&other);
        let digest = Sha256::digest(b"hello ledger").into();

        let sig = sign_prehash(&sk, &digest);
        assert!(!verify_prehash(&vk, &digest, &sig));
    }

    #[test]
    fn public_key_hex_roundtrips_through_parsing() {
        let sk = generate_keypair();
        let vk = VerifyingKey::from(&sk);
        let pk_hex = public_key_hex(&vk);
        let parsed = verifying_key_from_hex(&pk_hex).expect("parse public key");
        assert_eq!(parsed, vk);
    }

    #[test]
    fn address_derivation_is_deterministic() {
        let sk = generate_keypair();
        let vk = VerifyingKey::from(&sk);
        let pk_hex = public_key_hex(&vk);

        let a1 = derive_address(&pk_hex);
        let a2 = derive_address(&pk_hex);
        assert_eq!(a1, a2);
        assert!(a1.starts_with("0x"));
        assert_eq!(a1.len(), 42);
    }
}
