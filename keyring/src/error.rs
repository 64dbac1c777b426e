use thiserror::Error;

use cosmtx_types::SdkError;

#[derive(Debug, Error)]
pub enum KeyringError {
    #[error("key {0} not found")]
    NotFound(String),

    #[error("key {0} already exists")]
    AlreadyExists(String),

    #[error("keyring backend {0} is not supported on this platform")]
    Unsupported(String),

    #[error("key {0} cannot sign: {1}")]
    CannotSign(String, String),

    #[error("keystore error: {0}")]
    Keystore(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error(transparent)]
    Sdk(#[from] SdkError),
}

impl From<KeyringError> for SdkError {
    fn from(e: KeyringError) -> Self {
        match e {
            KeyringError::NotFound(name) => SdkError::KeyNotFound(name),
            KeyringError::Sdk(inner) => inner,
            other => SdkError::Keyring(other.to_string()),
        }
    }
}
