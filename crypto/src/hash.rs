//! SHA-256 and RIPEMD-160 helpers for addresses and transaction hashes.

use ripemd::Ripemd160;
use sha2::{Digest, Sha256};

pub fn sha256(data: &[u8]) -> [u8; 32] {
    Sha256::digest(data).into()
}

/// First 20 bytes of SHA-256, used for ed25519 and bls addresses.
pub fn sha256_truncated(data: &[u8]) -> [u8; 20] {
    let full = sha256(data);
    let mut out = [0u8; 20];
    out.copy_from_slice(&full[..20]);
    out
}

/// `RIPEMD-160(SHA-256(data))`, the secp256k1 address hash.
pub fn hash160(data: &[u8]) -> [u8; 20] {
    Ripemd160::digest(sha256(data)).into()
}

/// Transaction hash: `SHA-256(tx_bytes)` as uppercase hex.
pub fn tx_hash(tx_bytes: &[u8]) -> String {
    hex::encode_upper(sha256(tx_bytes))
}
