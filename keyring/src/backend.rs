//! Record storage backends.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Mutex;

use zeroize::Zeroizing;

use crate::error::KeyringError;
use crate::keystore::{self, KdfParams, SealedRecord};
use crate::record::Record;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backend {
    Memory,
    Test,
    File,
    Os,
}

impl Backend {
    pub fn as_str(&self) -> &'static str {
        match self {
            Backend::Memory => "memory",
            Backend::Test => "test",
            Backend::File => "file",
            Backend::Os => "os",
        }
    }
}

impl FromStr for Backend {
    type Err = KeyringError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "memory" => Ok(Backend::Memory),
            "test" => Ok(Backend::Test),
            "file" => Ok(Backend::File),
            "os" => Ok(Backend::Os),
            other => Err(KeyringError::Unsupported(other.to_string())),
        }
    }
}

impl std::fmt::Display for Backend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where records live. Implementations own their locking.
pub trait RecordStore: Send + Sync {
    fn get(&self, name: &str) -> Result<Option<Record>, KeyringError>;
    fn put(&self, record: &Record) -> Result<(), KeyringError>;
    /// Returns whether a record was removed.
    fn remove(&self, name: &str) -> Result<bool, KeyringError>;
    /// Record names in ascending order.
    fn names(&self) -> Result<Vec<String>, KeyringError>;
}

#[derive(Default)]
pub struct MemoryStore {
    records: Mutex<BTreeMap<String, Record>>,
}

impl MemoryStore {
    fn lock(&self) -> Result<std::sync::MutexGuard<'_, BTreeMap<String, Record>>, KeyringError> {
        self.records
            .lock()
            .map_err(|_| KeyringError::Keystore("memory keyring lock poisoned".into()))
    }
}

impl RecordStore for MemoryStore {
    fn get(&self, name: &str) -> Result<Option<Record>, KeyringError> {
        Ok(self.lock()?.get(name).cloned())
    }

    fn put(&self, record: &Record) -> Result<(), KeyringError> {
        self.lock()?.insert(record.info.name.clone(), record.clone());
        Ok(())
    }

    fn remove(&self, name: &str) -> Result<bool, KeyringError> {
        Ok(self.lock()?.remove(name).is_some())
    }

    fn names(&self) -> Result<Vec<String>, KeyringError> {
        Ok(self.lock()?.keys().cloned().collect())
    }
}

/// One `<name>.info` file per key. Plain JSON for the `test` backend,
/// Argon2id + AES-256-GCM sealed JSON for `file`.
pub struct DirStore {
    dir: PathBuf,
    seal: Option<(Zeroizing<String>, KdfParams)>,
}

const RECORD_EXT: &str = "info";

impl DirStore {
    pub fn plain(dir: impl Into<PathBuf>) -> Result<Self, KeyringError> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir, seal: None })
    }

    pub fn encrypted(
        dir: impl Into<PathBuf>,
        password: &str,
        params: KdfParams,
    ) -> Result<Self, KeyringError> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self {
            dir,
            seal: Some((Zeroizing::new(password.to_string()), params)),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{name}.{RECORD_EXT}"))
    }
}

impl RecordStore for DirStore {
    fn get(&self, name: &str) -> Result<Option<Record>, KeyringError> {
        let path = self.path_for(name);
        if !path.exists() {
            return Ok(None);
        }
        let bytes = fs::read(&path)?;
        let record = match &self.seal {
            None => Record::from_json_bytes(&bytes)?,
            Some((password, _)) => {
                let sealed: SealedRecord = serde_json::from_slice(&bytes)?;
                let plain = keystore::open(&sealed, password)?;
                Record::from_json_bytes(&plain)?
            }
        };
        Ok(Some(record))
    }

    fn put(&self, record: &Record) -> Result<(), KeyringError> {
        let plain = record.to_json_bytes()?;
        let bytes = match &self.seal {
            None => plain.to_vec(),
            Some((password, params)) => {
                serde_json::to_vec_pretty(&keystore::seal(&plain, password, *params)?)?
            }
        };
        let path = self.path_for(&record.info.name);
        let tmp = path.with_extension("tmp");
        fs::write(&tmp, bytes)?;
        fs::rename(&tmp, &path)?;
        Ok(())
    }

    fn remove(&self, name: &str) -> Result<bool, KeyringError> {
        let path = self.path_for(name);
        if !path.exists() {
            return Ok(false);
        }
        fs::remove_file(path)?;
        Ok(true)
    }

    fn names(&self) -> Result<Vec<String>, KeyringError> {
        let mut names = Vec::new();
        for entry in fs::read_dir(&self.dir)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some(RECORD_EXT) {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                names.push(stem.to_string());
            }
        }
        names.sort();
        Ok(names)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{KeyInfo, KeyKind};
    use cosmtx_crypto::{KeyAlgo, PrivateKey};

    fn record(name: &str) -> Record {
        let sk = PrivateKey::generate(KeyAlgo::Secp256k1).unwrap();
        Record {
            info: KeyInfo {
                name: name.into(),
                kind: KeyKind::Local,
                pubkey: sk.public_key(),
            },
            secret: Some(sk),
            path: None,
        }
    }

    fn exercise(store: &dyn RecordStore) {
        store.put(&record("b")).unwrap();
        store.put(&record("a")).unwrap();
        assert_eq!(store.names().unwrap(), vec!["a", "b"]);
        assert!(store.get("a").unwrap().unwrap().secret.is_some());
        assert!(store.get("zz").unwrap().is_none());
        assert!(store.remove("a").unwrap());
        assert!(!store.remove("a").unwrap());
        assert_eq!(store.names().unwrap(), vec!["b"]);
    }

    #[test]
    fn memory_store() {
        exercise(&MemoryStore::default());
    }

    #[test]
    fn plain_dir_store() {
        let dir = tempfile::tempdir().unwrap();
        exercise(&DirStore::plain(dir.path()).unwrap());
    }

    #[test]
    fn encrypted_dir_store() {
        let dir = tempfile::tempdir().unwrap();
        let params = KdfParams {
            memory: 1024,
            iterations: 1,
            parallelism: 1,
        };
        let store = DirStore::encrypted(dir.path(), "pw", params).unwrap();
        exercise(&store);

        let raw = fs::read_to_string(dir.path().join("b.info")).unwrap();
        assert!(raw.contains("argon2id"));
        assert!(!raw.contains("privkey"));

        let wrong = DirStore::encrypted(dir.path(), "other", params).unwrap();
        assert!(wrong.get("b").is_err());
    }

    #[test]
    fn backend_names() {
        assert_eq!("test".parse::<Backend>().unwrap(), Backend::Test);
        assert!("kwallet".parse::<Backend>().is_err());
    }
}
