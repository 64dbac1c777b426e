//! Nullable store: thread-safe in-memory KV storage for testing.

use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use cosmtx_store::{KvStore, StoreError};

type Map = BTreeMap<Vec<u8>, Vec<u8>>;

#[derive(Default)]
pub struct NullKvStore {
    entries: Mutex<Map>,
}

impl NullKvStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn entries(&self) -> MutexGuard<'_, Map> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn len(&self) -> usize {
        self.entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries().is_empty()
    }

    /// Every key currently stored, ascending.
    pub fn keys(&self) -> Vec<Vec<u8>> {
        self.entries().keys().cloned().collect()
    }
}

impl KvStore for NullKvStore {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, StoreError> {
        Ok(self.entries().get(key).cloned())
    }

    fn set(&self, key: &[u8], value: &[u8]) -> Result<(), StoreError> {
        self.entries().insert(key.to_vec(), value.to_vec());
        Ok(())
    }

    fn delete(&self, key: &[u8]) -> Result<(), StoreError> {
        self.entries().remove(key);
        Ok(())
    }

    fn iter_prefix(&self, prefix: &[u8]) -> Result<Vec<(Vec<u8>, Vec<u8>)>, StoreError> {
        Ok(self
            .entries()
            .range(prefix.to_vec()..)
            .take_while(|(k, _)| k.starts_with(prefix))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn get_set_delete() {
        let store = NullKvStore::new();
        store.set(b"k", b"v").unwrap();
        assert_eq!(store.get(b"k").unwrap(), Some(b"v".to_vec()));
        assert!(store.has(b"k").unwrap());
        store.delete(b"k").unwrap();
        store.delete(b"k").unwrap();
        assert!(store.is_empty());
    }

    #[test]
    fn prefix_iteration_is_ordered_and_bounded() {
        let store = NullKvStore::new();
        for key in [&[1u8, 3][..], &[1, 1], &[2, 0], &[0, 9], &[1]] {
            store.set(key, b"").unwrap();
        }
        let keys: Vec<_> = store.iter_prefix(&[1]).unwrap().into_iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec![vec![1], vec![1, 1], vec![1, 3]]);
        assert_eq!(store.iter_prefix(&[]).unwrap().len(), 5);
    }
}
