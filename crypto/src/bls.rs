//! BLS12-381 signatures (public keys on G1, signatures on G2).
//!
//! Messages are limited to 32 bytes; callers hash anything longer first.

use blst::min_pk::{PublicKey, SecretKey, Signature};
use blst::BLST_ERROR;

use cosmtx_types::SdkError;

pub const PUBKEY_LEN: usize = 48;
pub const SIGNATURE_LEN: usize = 96;
pub const MAX_MSG_LEN: usize = 32;

/// Proof-of-possession ciphersuite for G2 signatures.
const DST: &[u8] = b"BLS_SIG_BLS12381G2_XMD:SHA-256_SSWU_RO_POP_";

pub fn generate() -> Result<SecretKey, SdkError> {
    let mut ikm = [0u8; 32];
    getrandom::getrandom(&mut ikm).map_err(|e| SdkError::Other(e.to_string()))?;
    secret_key_from_ikm(&ikm)
}

/// Derive a key from at least 32 bytes of input keying material.
pub fn secret_key_from_ikm(ikm: &[u8]) -> Result<SecretKey, SdkError> {
    SecretKey::key_gen(ikm, &[]).map_err(|e| SdkError::Keyring(format!("bls key_gen: {e:?}")))
}

pub fn secret_key_from_bytes(bytes: &[u8]) -> Result<SecretKey, SdkError> {
    SecretKey::from_bytes(bytes).map_err(|e| SdkError::Keyring(format!("invalid bls key: {e:?}")))
}

pub fn public_key(key: &SecretKey) -> [u8; PUBKEY_LEN] {
    key.sk_to_pk().compress()
}

pub fn sign(key: &SecretKey, msg: &[u8]) -> Result<[u8; SIGNATURE_LEN], SdkError> {
    if msg.len() > MAX_MSG_LEN {
        return Err(SdkError::InvalidRequest(format!(
            "bls message is {} bytes, limit is {MAX_MSG_LEN}",
            msg.len()
        )));
    }
    Ok(key.sign(msg, DST, &[]).compress())
}

pub fn verify(pubkey: &[u8], msg: &[u8], sig: &[u8]) -> bool {
    if msg.len() > MAX_MSG_LEN {
        return false;
    }
    let Ok(pk) = PublicKey::from_bytes(pubkey) else {
        return false;
    };
    let Ok(sig) = Signature::from_bytes(sig) else {
        return false;
    };
    sig.verify(true, msg, DST, &[], &pk, true) == BLST_ERROR::BLST_SUCCESS
}

pub fn validate_pubkey(bytes: &[u8]) -> Result<(), SdkError> {
    if bytes.len() != PUBKEY_LEN {
        return Err(SdkError::InvalidPubKey(format!(
            "bls12-381 key must be {PUBKEY_LEN} bytes, got {}",
            bytes.len()
        )));
    }
    PublicKey::key_validate(bytes)
        .map(|_| ())
        .map_err(|e| SdkError::InvalidPubKey(format!("{e:?}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sign_and_verify() {
        let key = secret_key_from_ikm(&[7u8; 32]).unwrap();
        let pk = public_key(&key);
        let sig = sign(&key, b"thirty-two bytes or fewer").unwrap();
        assert_eq!(sig.len(), SIGNATURE_LEN);
        assert!(verify(&pk, b"thirty-two bytes or fewer", &sig));
        assert!(!verify(&pk, b"different", &sig));
    }

    #[test]
    fn oversize_message_rejected() {
        let key = secret_key_from_ikm(&[7u8; 32]).unwrap();
        assert!(sign(&key, &[0u8; 33]).is_err());
        assert!(sign(&key, &[0u8; 32]).is_ok());
    }

    #[test]
    fn key_bytes_roundtrip() {
        let key = secret_key_from_ikm(&[3u8; 32]).unwrap();
        let back = secret_key_from_bytes(&key.to_bytes()).unwrap();
        assert_eq!(public_key(&key), public_key(&back));
        assert!(validate_pubkey(&public_key(&key)).is_ok());
        assert!(validate_pubkey(&[0u8; 47]).is_err());
    }
}
