//! secp256k1 ECDSA over SHA-256 with low-S enforcement.
//!
//! Signatures are 64-byte `R ‖ S`. Signing always emits the lower-half S;
//! verification rejects the upper half so a signature has one valid form.

use k256::ecdsa::signature::{Signer, Verifier};
use k256::ecdsa::{Signature, SigningKey, VerifyingKey};

use cosmtx_types::SdkError;

pub const PUBKEY_LEN: usize = 33;
pub const SIGNATURE_LEN: usize = 64;

/// Generate a fresh signing key from OS randomness.
pub fn generate() -> Result<SigningKey, SdkError> {
    loop {
        let mut secret = [0u8; 32];
        getrandom::getrandom(&mut secret).map_err(|e| SdkError::Other(e.to_string()))?;
        // Out-of-range scalars (zero or >= n) are astronomically rare; retry.
        if let Ok(key) = SigningKey::from_slice(&secret) {
            return Ok(key);
        }
    }
}

pub fn signing_key_from_bytes(bytes: &[u8]) -> Result<SigningKey, SdkError> {
    SigningKey::from_slice(bytes).map_err(|e| SdkError::Keyring(format!("invalid secp256k1 key: {e}")))
}

/// Compressed SEC1 public key.
pub fn public_key(key: &SigningKey) -> [u8; PUBKEY_LEN] {
    let point = key.verifying_key().to_encoded_point(true);
    let mut out = [0u8; PUBKEY_LEN];
    out.copy_from_slice(point.as_bytes());
    out
}

pub fn sign(key: &SigningKey, msg: &[u8]) -> [u8; SIGNATURE_LEN] {
    let sig: Signature = key.sign(msg);
    let sig = sig.normalize_s().unwrap_or(sig);
    sig.to_bytes().into()
}

/// Verify a 64-byte low-S signature against a compressed public key.
pub fn verify(pubkey: &[u8], msg: &[u8], sig: &[u8]) -> bool {
    if sig.len() != SIGNATURE_LEN {
        return false;
    }
    let Ok(sig) = Signature::from_slice(sig) else {
        return false;
    };
    if sig.normalize_s().is_some() {
        return false;
    }
    let Ok(vk) = VerifyingKey::from_sec1_bytes(pubkey) else {
        return false;
    };
    vk.verify(msg, &sig).is_ok()
}

/// Whether a raw `R ‖ S` signature has S in the upper half of the group order.
pub fn is_high_s(sig: &[u8]) -> bool {
    Signature::from_slice(sig)
        .map(|s| s.normalize_s().is_some())
        .unwrap_or(false)
}

/// Convert a DER signature to 64-byte `R ‖ S`, normalizing S to the lower half.
pub fn der_to_rs(der: &[u8]) -> Result<[u8; SIGNATURE_LEN], SdkError> {
    let sig = Signature::from_der(der)
        .map_err(|e| SdkError::InvalidSignature(format!("malformed DER signature: {e}")))?;
    let sig = sig.normalize_s().unwrap_or(sig);
    Ok(sig.to_bytes().into())
}

/// Check that bytes are a valid compressed point.
pub fn validate_pubkey(bytes: &[u8]) -> Result<(), SdkError> {
    if bytes.len() != PUBKEY_LEN {
        return Err(SdkError::InvalidPubKey(format!(
            "secp256k1 key must be {PUBKEY_LEN} bytes, got {}",
            bytes.len()
        )));
    }
    VerifyingKey::from_sec1_bytes(bytes)
        .map(|_| ())
        .map_err(|e| SdkError::InvalidPubKey(e.to_string()))
}
