//! Top-level error type shared across crates.

use thiserror::Error;

/// Common error type for the transaction pipeline.
///
/// Every variant is a discrete kind callers can match on. Infrastructure
/// crates (store, rpc, keyring) keep their own narrow enums and convert
/// into this one at the crate boundary.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SdkError {
    #[error("invalid address: {0}")]
    InvalidAddress(String),

    #[error("account {0} not found")]
    AccountNotFound(String),

    #[error("invalid signer: {0}")]
    InvalidSigner(String),

    #[error("invalid public key: {0}")]
    InvalidPubKey(String),

    #[error("invalid sign mode: {0}")]
    InvalidSignMode(String),

    #[error("txs signed with DIRECT mode can have at most one DIRECT signer")]
    DirectSignMultipleSigners,

    #[error("gas estimation failed: {0}")]
    GasEstimationFailed(String),

    #[error("insufficient fee: {0}")]
    InsufficientFee(String),

    #[error("fee-grant not found for granter {granter} and grantee {grantee}")]
    GrantNotFound { granter: String, grantee: String },

    #[error("fee allowance expired")]
    GrantExpired,

    #[error("message type {0} is not allowed by the fee allowance")]
    AllowedMsgDisallowed(String),

    #[error("tx {hash} was not included after {blocks} blocks")]
    BroadcastTimeout { hash: String, blocks: u64 },

    #[error("rpc unavailable: {0}")]
    RpcUnavailable(String),

    #[error("invalid coins: {0}")]
    InvalidCoins(String),

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("invalid chain-id: {0}")]
    InvalidChainId(String),

    #[error("memo too large: {len} > {max}")]
    MemoTooLarge { len: usize, max: usize },

    #[error("empty public key")]
    EmptyPubKey,

    #[error("logic error: {0}")]
    Logic(String),

    #[error("unknown message type: {0}")]
    UnknownMessage(String),

    #[error("invalid signature: {0}")]
    InvalidSignature(String),

    #[error("await cancelled for tx {0}")]
    AwaitCancelled(String),

    #[error("no rpc endpoints configured")]
    MissingEndpoints,

    #[error("key {0} not found")]
    KeyNotFound(String),

    #[error("keyring error: {0}")]
    Keyring(String),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("rpc error: {0}")]
    Rpc(String),

    #[error("{0}")]
    Other(String),
}

impl From<prost::DecodeError> for SdkError {
    fn from(e: prost::DecodeError) -> Self {
        SdkError::Serialization(e.to_string())
    }
}

impl From<serde_json::Error> for SdkError {
    fn from(e: serde_json::Error) -> Self {
        SdkError::Serialization(e.to_string())
    }
}
