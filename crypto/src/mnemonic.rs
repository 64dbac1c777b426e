//! BIP-39 mnemonics and BIP-32 secp256k1 derivation.
//!
//! Accounts derive along `m/44'/118'/account'/0/index`.

use bip39::{Language, Mnemonic};
use hmac::{Hmac, Mac};
use k256::elliptic_curve::PrimeField;
use k256::{FieldBytes, Scalar};
use sha2::Sha512;
use zeroize::Zeroizing;

use cosmtx_types::SdkError;

use crate::secp256k1;

type HmacSha512 = Hmac<Sha512>;

/// SLIP-44 coin type used by Cosmos chains.
pub const COIN_TYPE: u32 = 118;

const HARDENED: u32 = 0x8000_0000;

/// Generate a fresh 24-word mnemonic.
pub fn generate_mnemonic() -> Result<String, SdkError> {
    let mut entropy = Zeroizing::new([0u8; 32]);
    getrandom::getrandom(&mut entropy[..]).map_err(|e| SdkError::Other(e.to_string()))?;
    let mnemonic = Mnemonic::from_entropy_in(Language::English, &entropy[..])
        .map_err(|e| SdkError::Keyring(e.to_string()))?;
    Ok(mnemonic.to_string())
}

/// Whether `phrase` is a checksum-valid English mnemonic.
pub fn is_valid_mnemonic(phrase: &str) -> bool {
    Mnemonic::parse_in_normalized(Language::English, phrase.trim()).is_ok()
}

/// A parsed derivation path, e.g. `m/44'/118'/0'/0/0`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HdPath(Vec<u32>);

impl HdPath {
    pub fn cosmos(account: u32, index: u32) -> Self {
        Self(vec![
            44 | HARDENED,
            COIN_TYPE | HARDENED,
            account | HARDENED,
            0,
            index,
        ])
    }

    pub fn parse(text: &str) -> Result<Self, SdkError> {
        let mut parts = text.split('/');
        if parts.next() != Some("m") {
            return Err(SdkError::Keyring(format!("derivation path must start with m/: {text}")));
        }
        let mut out = Vec::new();
        for part in parts {
            let (digits, hardened) = match part.strip_suffix('\'') {
                Some(d) => (d, true),
                None => (part, false),
            };
            let n: u32 = digits
                .parse()
                .map_err(|_| SdkError::Keyring(format!("bad path component {part:?}")))?;
            if n >= HARDENED {
                return Err(SdkError::Keyring(format!("path component {n} out of range")));
            }
            out.push(if hardened { n | HARDENED } else { n });
        }
        Ok(Self(out))
    }

    pub fn components(&self) -> &[u32] {
        &self.0
    }
}

impl std::fmt::Display for HdPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "m")?;
        for c in &self.0 {
            if c & HARDENED != 0 {
                write!(f, "/{}'", c & !HARDENED)?;
            } else {
                write!(f, "/{c}")?;
            }
        }
        Ok(())
    }
}

impl Default for HdPath {
    fn default() -> Self {
        Self::cosmos(0, 0)
    }
}

/// Derive a secp256k1 secret key from a mnemonic, passphrase and path.
pub fn derive_secp256k1(
    phrase: &str,
    passphrase: &str,
    path: &HdPath,
) -> Result<Zeroizing<[u8; 32]>, SdkError> {
    let mnemonic = Mnemonic::parse_in_normalized(Language::English, phrase.trim())
        .map_err(|e| SdkError::Keyring(format!("invalid mnemonic: {e}")))?;
    let seed = Zeroizing::new(mnemonic.to_seed(passphrase));

    let (mut key, mut chain) = hmac_split(b"Bitcoin seed", &seed[..])?;
    scalar(&key)?;
    for &index in path.components() {
        let mut data = Vec::with_capacity(37);
        if index & HARDENED != 0 {
            data.push(0);
            data.extend_from_slice(&key[..]);
        } else {
            let sk = secp256k1::signing_key_from_bytes(&key[..])?;
            data.extend_from_slice(&secp256k1::public_key(&sk));
        }
        data.extend_from_slice(&index.to_be_bytes());

        let (tweak, next_chain) = hmac_split(&chain[..], &data)?;
        let child = scalar(&tweak)? + scalar(&key)?;
        if child == Scalar::ZERO {
            return Err(SdkError::Keyring(format!("derived zero key at index {index}")));
        }
        key = Zeroizing::new(child.to_bytes().into());
        chain = next_chain;
    }
    Ok(key)
}

fn hmac_split(
    key: &[u8],
    data: &[u8],
) -> Result<(Zeroizing<[u8; 32]>, Zeroizing<[u8; 32]>), SdkError> {
    let mut mac = HmacSha512::new_from_slice(key).map_err(|e| SdkError::Keyring(e.to_string()))?;
    mac.update(data);
    let out = mac.finalize().into_bytes();
    let mut left = Zeroizing::new([0u8; 32]);
    let mut right = Zeroizing::new([0u8; 32]);
    left.copy_from_slice(&out[..32]);
    right.copy_from_slice(&out[32..]);
    Ok((left, right))
}

fn scalar(bytes: &[u8; 32]) -> Result<Scalar, SdkError> {
    Option::<Scalar>::from(Scalar::from_repr(*FieldBytes::from_slice(bytes)))
        .ok_or_else(|| SdkError::Keyring("derived key out of range".into()))
}
