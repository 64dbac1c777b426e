//! Ordered key-value storage for state modules.
//!
//! Modules (the fee-grant keeper, for one) depend only on [`KvStore`]. The
//! host state machine supplies the implementation and its transaction
//! boundaries; tests use the in-memory double from `cosmtx-nullables`.
//! [`FeeBank`] is the matching capability over account balances.

pub mod bank;
pub mod error;
pub mod keys;

use std::sync::Arc;

pub use bank::FeeBank;
pub use error::StoreError;
pub use keys::{length_prefixed, prefix_end};

/// A byte-keyed store with ordered prefix iteration.
pub trait KvStore: Send + Sync {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, StoreError>;

    fn set(&self, key: &[u8], value: &[u8]) -> Result<(), StoreError>;

    /// Deleting an absent key is not an error.
    fn delete(&self, key: &[u8]) -> Result<(), StoreError>;

    /// All entries whose key starts with `prefix`, ascending by key.
    fn iter_prefix(&self, prefix: &[u8]) -> Result<Vec<(Vec<u8>, Vec<u8>)>, StoreError>;

    fn has(&self, key: &[u8]) -> Result<bool, StoreError> {
        Ok(self.get(key)?.is_some())
    }
}

impl<T: KvStore + ?Sized> KvStore for Arc<T> {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, StoreError> {
        (**self).get(key)
    }

    fn set(&self, key: &[u8], value: &[u8]) -> Result<(), StoreError> {
        (**self).set(key, value)
    }

    fn delete(&self, key: &[u8]) -> Result<(), StoreError> {
        (**self).delete(key)
    }

    fn iter_prefix(&self, prefix: &[u8]) -> Result<Vec<(Vec<u8>, Vec<u8>)>, StoreError> {
        (**self).iter_prefix(prefix)
    }
}
