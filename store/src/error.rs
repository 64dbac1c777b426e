use thiserror::Error;

use cosmtx_types::SdkError;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("key not found: {0}")]
    NotFound(String),

    #[error("storage backend error: {0}")]
    Backend(String),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("store is corrupted: {0}")]
    Corruption(String),
}

impl From<StoreError> for SdkError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::Serialization(msg) => SdkError::Serialization(msg),
            other => SdkError::Logic(other.to_string()),
        }
    }
}

impl From<prost::DecodeError> for StoreError {
    fn from(e: prost::DecodeError) -> Self {
        StoreError::Serialization(e.to_string())
    }
}
