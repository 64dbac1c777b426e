//! Ed25519 (RFC 8032) signing and verification.

use ed25519_dalek::{Signer, SigningKey, Verifier, VerifyingKey};

use cosmtx_types::SdkError;

pub const PUBKEY_LEN: usize = 32;
pub const SIGNATURE_LEN: usize = 64;

/// Generate a fresh key from OS randomness.
pub fn generate() -> Result<SigningKey, SdkError> {
    let mut seed = [0u8; 32];
    getrandom::getrandom(&mut seed).map_err(|e| SdkError::Other(e.to_string()))?;
    Ok(SigningKey::from_bytes(&seed))
}

pub fn signing_key_from_bytes(bytes: &[u8]) -> Result<SigningKey, SdkError> {
    let seed: [u8; 32] = bytes
        .try_into()
        .map_err(|_| SdkError::Keyring(format!("ed25519 key must be 32 bytes, got {}", bytes.len())))?;
    Ok(SigningKey::from_bytes(&seed))
}

pub fn sign(key: &SigningKey, msg: &[u8]) -> [u8; SIGNATURE_LEN] {
    key.sign(msg).to_bytes()
}

/// Verify with strict checks: non-canonical signatures are rejected.
pub fn verify(pubkey: &[u8], msg: &[u8], sig: &[u8]) -> bool {
    let Ok(pk) = <[u8; PUBKEY_LEN]>::try_from(pubkey) else {
        return false;
    };
    let Ok(sig) = <[u8; SIGNATURE_LEN]>::try_from(sig) else {
        return false;
    };
    let Ok(vk) = VerifyingKey::from_bytes(&pk) else {
        return false;
    };
    vk.verify(msg, &ed25519_dalek::Signature::from_bytes(&sig)).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sign_and_verify() {
        let key = generate().unwrap();
        let pk = key.verifying_key().to_bytes();
        let sig = sign(&key, b"msg");
        assert!(verify(&pk, b"msg", &sig));
        assert!(!verify(&pk, b"other", &sig));
    }

    #[test]
    fn deterministic_from_seed() {
        let a = signing_key_from_bytes(&[9u8; 32]).unwrap();
        let b = signing_key_from_bytes(&[9u8; 32]).unwrap();
        assert_eq!(sign(&a, b"x"), sign(&b, b"x"));
    }

    #[test]
    fn bad_lengths_fail() {
        assert!(signing_key_from_bytes(&[1u8; 31]).is_err());
        assert!(!verify(&[0u8; 31], b"x", &[0u8; 64]));
        let key = generate().unwrap();
        assert!(!verify(&key.verifying_key().to_bytes(), b"x", &[0u8; 63]));
    }
}
