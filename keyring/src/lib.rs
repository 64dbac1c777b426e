//! Named key storage.
//!
//! A [`Keyring`] resolves key names and addresses to public keys and signs on
//! behalf of a named key. [`LocalKeyring`] works over any [`RecordStore`];
//! [`open`] picks the store for a configured backend.

pub mod backend;
pub mod error;
pub mod keystore;
pub mod record;

use std::path::Path;
use std::sync::Arc;

use tracing::info;

use cosmtx_crypto::{
    derive_secp256k1, HardwareKey, HdPath, KeyAlgo, LedgerDevice, LegacyAminoMultisig, PrivateKey,
    PublicKey,
};
use cosmtx_types::{AccAddress, SdkError};

pub use backend::{Backend, DirStore, MemoryStore, RecordStore};
pub use error::KeyringError;
pub use keystore::KdfParams;
pub use record::{KeyInfo, KeyKind, Record};

/// Key lookup and signing by name.
pub trait Keyring: Send + Sync {
    fn key(&self, name: &str) -> Result<KeyInfo, KeyringError>;

    fn key_by_address(&self, address: &AccAddress) -> Result<KeyInfo, KeyringError>;

    /// Sign `msg` with the named key. Returns the signature and the public key
    /// that produced it.
    fn sign(&self, name: &str, msg: &[u8]) -> Result<(Vec<u8>, PublicKey), KeyringError>;

    fn list(&self) -> Result<Vec<KeyInfo>, KeyringError>;

    /// Derive a secp256k1 key from a mnemonic and store it under `name`.
    fn new_account(
        &self,
        name: &str,
        mnemonic: &str,
        passphrase: &str,
        path: &HdPath,
    ) -> Result<KeyInfo, KeyringError>;

    fn delete(&self, name: &str) -> Result<(), KeyringError>;

    fn sign_by_address(
        &self,
        address: &AccAddress,
        msg: &[u8],
    ) -> Result<(Vec<u8>, PublicKey), KeyringError> {
        let info = self.key_by_address(address)?;
        self.sign(&info.name, msg)
    }
}

/// Opens a connection to the hardware signer when a ledger key signs.
pub type DeviceOpener = Arc<dyn Fn() -> Result<Box<dyn LedgerDevice>, SdkError> + Send + Sync>;

pub struct LocalKeyring {
    store: Box<dyn RecordStore>,
    device: Option<DeviceOpener>,
}

impl LocalKeyring {
    pub fn new(store: Box<dyn RecordStore>) -> Self {
        Self {
            store,
            device: None,
        }
    }

    pub fn in_memory() -> Self {
        Self::new(Box::new(MemoryStore::default()))
    }

    pub fn with_device(mut self, opener: DeviceOpener) -> Self {
        self.device = Some(opener);
        self
    }

    fn record(&self, name: &str) -> Result<Record, KeyringError> {
        self.store
            .get(name)?
            .ok_or_else(|| KeyringError::NotFound(name.to_string()))
    }

    fn insert(&self, record: Record) -> Result<KeyInfo, KeyringError> {
        record::validate_name(&record.info.name)?;
        if self.store.get(&record.info.name)?.is_some() {
            return Err(KeyringError::AlreadyExists(record.info.name));
        }
        self.store.put(&record)?;
        info!(
            name = %record.info.name,
            kind = ?record.info.kind,
            address = %record.info.address(),
            "key stored"
        );
        Ok(record.info)
    }

    /// Store an existing private key.
    pub fn import_private_key(&self, name: &str, key: PrivateKey) -> Result<KeyInfo, KeyringError> {
        self.insert(Record {
            info: KeyInfo {
                name: name.to_string(),
                kind: KeyKind::Local,
                pubkey: key.public_key(),
            },
            secret: Some(key),
            path: None,
        })
    }

    /// Generate and store a fresh key of `algo`.
    pub fn generate(&self, name: &str, algo: KeyAlgo) -> Result<KeyInfo, KeyringError> {
        self.import_private_key(name, PrivateKey::generate(algo)?)
    }

    /// Store a public key without its secret.
    pub fn save_offline(&self, name: &str, pubkey: PublicKey) -> Result<KeyInfo, KeyringError> {
        self.insert(Record {
            info: KeyInfo {
                name: name.to_string(),
                kind: KeyKind::Offline,
                pubkey,
            },
            secret: None,
            path: None,
        })
    }

    pub fn save_multisig(
        &self,
        name: &str,
        key: LegacyAminoMultisig,
    ) -> Result<KeyInfo, KeyringError> {
        self.insert(Record {
            info: KeyInfo {
                name: name.to_string(),
                kind: KeyKind::Multi,
                pubkey: PublicKey::Multisig(key),
            },
            secret: None,
            path: None,
        })
    }

    /// Read the device key at `path` and store a reference to it.
    pub fn save_ledger(&self, name: &str, path: HdPath) -> Result<KeyInfo, KeyringError> {
        let hw = self.open_device(name, &path)?;
        let pubkey = hw.public_key();
        hw.close()?;
        self.insert(Record {
            info: KeyInfo {
                name: name.to_string(),
                kind: KeyKind::Ledger,
                pubkey,
            },
            secret: None,
            path: Some(path),
        })
    }

    fn open_device(&self, name: &str, path: &HdPath) -> Result<HardwareKey, KeyringError> {
        let opener = self.device.as_ref().ok_or_else(|| {
            KeyringError::CannotSign(name.to_string(), "no hardware device configured".into())
        })?;
        Ok(HardwareKey::open(opener()?, path.clone())?)
    }
}

impl Keyring for LocalKeyring {
    fn key(&self, name: &str) -> Result<KeyInfo, KeyringError> {
        Ok(self.record(name)?.info)
    }

    fn key_by_address(&self, address: &AccAddress) -> Result<KeyInfo, KeyringError> {
        self.list()?
            .into_iter()
            .find(|info| &info.address() == address)
            .ok_or_else(|| KeyringError::NotFound(address.to_string()))
    }

    fn sign(&self, name: &str, msg: &[u8]) -> Result<(Vec<u8>, PublicKey), KeyringError> {
        let record = self.record(name)?;
        match record.info.kind {
            KeyKind::Local => {
                let sk = record.secret.as_ref().ok_or_else(|| {
                    KeyringError::CannotSign(name.to_string(), "record has no secret".into())
                })?;
                Ok((sk.sign(msg)?, record.info.pubkey))
            }
            KeyKind::Ledger => {
                let path = record.path.clone().unwrap_or_default();
                let hw = self.open_device(name, &path)?;
                if hw.public_key() != record.info.pubkey {
                    return Err(KeyringError::CannotSign(
                        name.to_string(),
                        "device holds a different key".into(),
                    ));
                }
                let sig = hw.sign(msg)?;
                hw.close()?;
                Ok((sig, record.info.pubkey))
            }
            KeyKind::Offline | KeyKind::Multi => Err(KeyringError::CannotSign(
                name.to_string(),
                format!("{:?} keys hold no secret", record.info.kind).to_lowercase(),
            )),
        }
    }

    fn list(&self) -> Result<Vec<KeyInfo>, KeyringError> {
        self.store
            .names()?
            .iter()
            .map(|name| self.record(name).map(|r| r.info))
            .collect()
    }

    fn new_account(
        &self,
        name: &str,
        mnemonic: &str,
        passphrase: &str,
        path: &HdPath,
    ) -> Result<KeyInfo, KeyringError> {
        let secret = derive_secp256k1(mnemonic, passphrase, path)?;
        let key = PrivateKey::from_raw(KeyAlgo::Secp256k1, &secret[..])?;
        self.insert(Record {
            info: KeyInfo {
                name: name.to_string(),
                kind: KeyKind::Local,
                pubkey: key.public_key(),
            },
            secret: Some(key),
            path: Some(path.clone()),
        })
    }

    fn delete(&self, name: &str) -> Result<(), KeyringError> {
        if self.store.remove(name)? {
            info!(name, "key deleted");
            Ok(())
        } else {
            Err(KeyringError::NotFound(name.to_string()))
        }
    }
}

/// Open the keyring for `backend` under `home`. The `file` backend needs a
/// password; `os` is not available.
pub fn open(
    backend: Backend,
    home: &Path,
    password: Option<&str>,
) -> Result<LocalKeyring, KeyringError> {
    let store: Box<dyn RecordStore> = match backend {
        Backend::Memory => Box::new(MemoryStore::default()),
        Backend::Test => Box::new(DirStore::plain(home.join("keyring-test"))?),
        Backend::File => {
            let password = password.ok_or_else(|| {
                KeyringError::Keystore("the file keyring requires a password".into())
            })?;
            Box::new(DirStore::encrypted(
                home.join("keyring-file"),
                password,
                KdfParams::default(),
            )?)
        }
        Backend::Os => return Err(KeyringError::Unsupported(backend.to_string())),
    };
    Ok(LocalKeyring::new(store))
}

#[cfg(test)]
mod tests {
    use super::*;

    const ABANDON: &str = "abandon abandon abandon abandon abandon abandon \
                           abandon abandon abandon abandon abandon about";

    #[test]
    fn new_account_from_mnemonic() {
        let kr = LocalKeyring::in_memory();
        let info = kr.new_account("alice", ABANDON, "", &HdPath::default()).unwrap();
        assert_eq!(
            info.address().to_bech32("cosmos"),
            "cosmos19rl4cm2hmr8afy4kldpxz3fka4jguq0auqdal4"
        );
        assert_eq!(kr.key_by_address(&info.address()).unwrap().name, "alice");
    }

    #[test]
    fn duplicate_names_rejected() {
        let kr = LocalKeyring::in_memory();
        kr.generate("a", KeyAlgo::Secp256k1).unwrap();
        assert!(matches!(
            kr.generate("a", KeyAlgo::Ed25519),
            Err(KeyringError::AlreadyExists(_))
        ));
    }

    #[test]
    fn sign_verifies_against_returned_key() {
        let kr = LocalKeyring::in_memory();
        kr.generate("a", KeyAlgo::Secp256k1).unwrap();
        let (sig, pk) = kr.sign("a", b"doc").unwrap();
        assert!(pk.verify(b"doc", &sig));
    }

    #[test]
    fn offline_keys_cannot_sign() {
        let kr = LocalKeyring::in_memory();
        let pk = PrivateKey::generate(KeyAlgo::Secp256k1).unwrap().public_key();
        kr.save_offline("watch", pk).unwrap();
        assert!(matches!(kr.sign("watch", b"x"), Err(KeyringError::CannotSign(..))));
    }

    #[test]
    fn ledger_without_device_cannot_sign() {
        let kr = LocalKeyring::in_memory();
        assert!(kr.save_ledger("hw", HdPath::default()).is_err());
    }

    #[test]
    fn delete_and_missing() {
        let kr = LocalKeyring::in_memory();
        kr.generate("a", KeyAlgo::Ed25519).unwrap();
        kr.delete("a").unwrap();
        assert!(matches!(kr.key("a"), Err(KeyringError::NotFound(_))));
        assert!(matches!(kr.delete("a"), Err(KeyringError::NotFound(_))));
        let sdk: SdkError = KeyringError::NotFound("a".into()).into();
        assert_eq!(sdk, SdkError::KeyNotFound("a".into()));
    }

    #[test]
    fn test_backend_persists_across_opens() {
        let home = tempfile::tempdir().unwrap();
        let info = open(Backend::Test, home.path(), None)
            .unwrap()
            .generate("k", KeyAlgo::Secp256k1)
            .unwrap();
        let reopened = open(Backend::Test, home.path(), None).unwrap();
        assert_eq!(reopened.key("k").unwrap(), info);
        assert!(home.path().join("keyring-test/k.info").exists());
    }

    #[test]
    fn os_backend_unsupported() {
        let home = tempfile::tempdir().unwrap();
        assert!(matches!(
            open(Backend::Os, home.path(), None),
            Err(KeyringError::Unsupported(_))
        ));
        assert!(open(Backend::File, home.path(), None).is_err());
    }
}
