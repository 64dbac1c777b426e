//! Argon2id + AES-256-GCM sealing for keyring records.
//!
//! 1. Argon2id derives a 32-byte key from the password and a random salt
//! 2. AES-256-GCM encrypts the record under a random nonce
//! 3. Parameters, salt, nonce and ciphertext are stored together as JSON

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Nonce};
use argon2::{Algorithm, Argon2, Params, Version};
use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

use crate::error::KeyringError;

const SALT_LEN: usize = 32;
const NONCE_LEN: usize = 12;
const KEY_LEN: usize = 32;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SealedRecord {
    pub version: u32,
    pub cipher: String,
    pub kdf: String,
    pub kdf_params: KdfParams,
    /// Hex-encoded.
    pub salt: String,
    /// Hex-encoded.
    pub nonce: String,
    /// Hex-encoded.
    pub ciphertext: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct KdfParams {
    pub memory: u32,
    pub iterations: u32,
    pub parallelism: u32,
}

impl Default for KdfParams {
    /// 64 MiB, 3 passes, one lane.
    fn default() -> Self {
        Self {
            memory: 65536,
            iterations: 3,
            parallelism: 1,
        }
    }
}

pub fn seal(
    plaintext: &[u8],
    password: &str,
    params: KdfParams,
) -> Result<SealedRecord, KeyringError> {
    let mut salt = [0u8; SALT_LEN];
    let mut nonce_bytes = [0u8; NONCE_LEN];
    getrandom::getrandom(&mut salt).map_err(|e| KeyringError::Keystore(e.to_string()))?;
    getrandom::getrandom(&mut nonce_bytes).map_err(|e| KeyringError::Keystore(e.to_string()))?;

    let key = derive_key(password, &salt, params)?;
    let cipher = Aes256Gcm::new_from_slice(&key[..])
        .map_err(|e| KeyringError::Keystore(format!("AES key init failed: {e}")))?;
    let ciphertext = cipher
        .encrypt(Nonce::from_slice(&nonce_bytes), plaintext)
        .map_err(|e| KeyringError::Keystore(format!("encryption failed: {e}")))?;

    Ok(SealedRecord {
        version: 1,
        cipher: "aes-256-gcm".to_string(),
        kdf: "argon2id".to_string(),
        kdf_params: params,
        salt: hex::encode(salt),
        nonce: hex::encode(nonce_bytes),
        ciphertext: hex::encode(ciphertext),
    })
}

pub fn open(sealed: &SealedRecord, password: &str) -> Result<Zeroizing<Vec<u8>>, KeyringError> {
    if sealed.version != 1 {
        return Err(KeyringError::Keystore(format!(
            "unsupported keystore version: {}",
            sealed.version
        )));
    }
    let decode = |field: &str, text: &str| {
        hex::decode(text).map_err(|e| KeyringError::Keystore(format!("invalid {field} hex: {e}")))
    };
    let salt = decode("salt", &sealed.salt)?;
    let nonce_bytes = decode("nonce", &sealed.nonce)?;
    let ciphertext = decode("ciphertext", &sealed.ciphertext)?;
    if nonce_bytes.len() != NONCE_LEN {
        return Err(KeyringError::Keystore(format!(
            "invalid nonce length: expected {NONCE_LEN}, got {}",
            nonce_bytes.len()
        )));
    }

    let key = derive_key(password, &salt, sealed.kdf_params)?;
    let cipher = Aes256Gcm::new_from_slice(&key[..])
        .map_err(|e| KeyringError::Keystore(format!("AES key init failed: {e}")))?;
    let plaintext = cipher
        .decrypt(Nonce::from_slice(&nonce_bytes), ciphertext.as_ref())
        .map_err(|_| {
            KeyringError::Keystore("decryption failed: wrong password or corrupted data".into())
        })?;
    Ok(Zeroizing::new(plaintext))
}

fn derive_key(
    password: &str,
    salt: &[u8],
    params: KdfParams,
) -> Result<Zeroizing<[u8; KEY_LEN]>, KeyringError> {
    let params = Params::new(params.memory, params.iterations, params.parallelism, Some(KEY_LEN))
        .map_err(|e| KeyringError::Keystore(format!("Argon2 params error: {e}")))?;
    let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, params);
    let mut out = Zeroizing::new([0u8; KEY_LEN]);
    argon2
        .hash_password_into(password.as_bytes(), salt, &mut out[..])
        .map_err(|e| KeyringError::Keystore(format!("Argon2 hashing failed: {e}")))?;
    Ok(out)
}
