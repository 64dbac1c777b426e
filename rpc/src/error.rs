//! RPC client errors.

use thiserror::Error;

use cosmtx_types::SdkError;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RpcError {
    #[error("http error: {0}")]
    Http(String),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("invalid response: {0}")]
    Decode(String),

    #[error("node error {code}: {log}")]
    Node { code: i64, log: String },

    #[error("node unavailable: {0}")]
    Unavailable(String),

    #[error("no RPC endpoints configured")]
    MissingEndpoints,
}

impl From<RpcError> for SdkError {
    fn from(e: RpcError) -> Self {
        match e {
            RpcError::MissingEndpoints => SdkError::MissingEndpoints,
            RpcError::Http(msg) | RpcError::Transport(msg) | RpcError::Unavailable(msg) => {
                SdkError::RpcUnavailable(msg)
            }
            RpcError::Decode(msg) => SdkError::Serialization(msg),
            node @ RpcError::Node { .. } => SdkError::Rpc(node.to_string()),
        }
    }
}
