//! Key records and their on-disk form.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use cosmtx_crypto::{HdPath, PrivateKey, PublicKey};
use cosmtx_types::AccAddress;

use crate::error::KeyringError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeyKind {
    /// Secret held by the keyring.
    Local,
    /// Secret held by a hardware device.
    Ledger,
    /// Public key only.
    Offline,
    /// Multisig public key.
    Multi,
}

/// Public view of a stored key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyInfo {
    pub name: String,
    pub kind: KeyKind,
    pub pubkey: PublicKey,
}

impl KeyInfo {
    pub fn address(&self) -> AccAddress {
        self.pubkey.address()
    }

    /// Shape printed by `keys show` / `keys list`.
    pub fn to_json(&self) -> Value {
        json!({
            "name": self.name,
            "type": self.kind,
            "address": self.address().to_string(),
            "pubkey": self.pubkey.to_json().to_string(),
        })
    }
}

#[derive(Clone)]
pub struct Record {
    pub info: KeyInfo,
    pub secret: Option<PrivateKey>,
    pub path: Option<HdPath>,
}

impl std::fmt::Debug for Record {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Record")
            .field("info", &self.info)
            .field("has_secret", &self.secret.is_some())
            .field("path", &self.path)
            .finish()
    }
}

#[derive(Serialize, Deserialize)]
struct StoredRecord {
    name: String,
    kind: KeyKind,
    pubkey: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    privkey: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    path: Option<String>,
}

impl Record {
    pub fn to_json_bytes(&self) -> Result<zeroize::Zeroizing<Vec<u8>>, KeyringError> {
        let stored = StoredRecord {
            name: self.info.name.clone(),
            kind: self.info.kind,
            pubkey: self.info.pubkey.to_json(),
            privkey: self.secret.as_ref().map(|sk| hex::encode(&sk.to_bytes()[..])),
            path: self.path.as_ref().map(ToString::to_string),
        };
        Ok(zeroize::Zeroizing::new(serde_json::to_vec_pretty(&stored)?))
    }

    pub fn from_json_bytes(bytes: &[u8]) -> Result<Self, KeyringError> {
        let stored: StoredRecord = serde_json::from_slice(bytes)?;
        let pubkey = PublicKey::from_json(&stored.pubkey)?;
        let secret = match stored.privkey {
            Some(text) => {
                let raw = zeroize::Zeroizing::new(
                    hex::decode(text).map_err(|e| KeyringError::Keystore(e.to_string()))?,
                );
                let sk = PrivateKey::from_bytes(&raw)?;
                if sk.public_key() != pubkey {
                    return Err(KeyringError::Keystore(format!(
                        "record {} has a mismatched public key",
                        stored.name
                    )));
                }
                Some(sk)
            }
            None => None,
        };
        let path = stored.path.as_deref().map(HdPath::parse).transpose()?;
        Ok(Self {
            info: KeyInfo {
                name: stored.name,
                kind: stored.kind,
                pubkey,
            },
            secret,
            path,
        })
    }
}

/// Key names map to file names, so keep them to a safe alphabet.
pub fn validate_name(name: &str) -> Result<(), KeyringError> {
    let ok = !name.is_empty()
        && name.len() <= 64
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
        && !name.starts_with('.');
    if ok {
        Ok(())
    } else {
        Err(KeyringError::Keystore(format!("invalid key name {name:?}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cosmtx_crypto::KeyAlgo;

    #[test]
    fn local_record_roundtrip() {
        let sk = PrivateKey::generate(KeyAlgo::Secp256k1).unwrap();
        let record = Record {
            info: KeyInfo {
                name: "alice".into(),
                kind: KeyKind::Local,
                pubkey: sk.public_key(),
            },
            secret: Some(sk),
            path: Some(HdPath::default()),
        };
        let back = Record::from_json_bytes(&record.to_json_bytes().unwrap()).unwrap();
        assert_eq!(back.info, record.info);
        assert_eq!(back.path, record.path);
        assert!(back.secret.is_some());
    }

    #[test]
    fn offline_record_has_no_secret() {
        let pk = PrivateKey::generate(KeyAlgo::Ed25519).unwrap().public_key();
        let record = Record {
            info: KeyInfo {
                name: "watch".into(),
                kind: KeyKind::Offline,
                pubkey: pk,
            },
            secret: None,
            path: None,
        };
        let bytes = record.to_json_bytes().unwrap();
        assert!(!String::from_utf8_lossy(&bytes).contains("privkey"));
    }

    #[test]
    fn names_are_restricted() {
        assert!(validate_name("alice-1").is_ok());
        assert!(validate_name("../etc").is_err());
        assert!(validate_name("").is_err());
        assert!(validate_name(".hidden").is_err());
    }

    #[test]
    fn info_json_shape() {
        let pk = PrivateKey::generate(KeyAlgo::Secp256k1).unwrap().public_key();
        let info = KeyInfo {
            name: "bob".into(),
            kind: KeyKind::Local,
            pubkey: pk.clone(),
        };
        let json = info.to_json();
        assert_eq!(json["type"], "local");
        assert_eq!(json["address"], pk.address().to_string());
    }
}
