//! CometBFT node access for cosmtx.
//!
//! - [`CometClient`]: the async capability the pipeline depends on
//! - [`HttpClient`]: JSON-RPC 2.0 over HTTP to one endpoint
//! - [`ClientPool`]: round-robin over several endpoints

pub mod client;
pub mod error;
pub mod http;
pub mod pagination;
pub mod pool;
pub mod types;

pub use client::{
    CometClient, ACCOUNT_KEY_PREFIX, ACCOUNT_STORE_PATH, DENOM_METADATA_PATH, SIMULATE_PATH,
};
pub use error::RpcError;
pub use http::{normalize_endpoint, HttpClient};
pub use pagination::{events_to_query, PageRequest};
pub use pool::ClientPool;
pub use types::{
    AbciQuery, BroadcastTxResult, Event, EventAttribute, ExecTxResult, Status, TxResponse,
    TxResult, TxSearchResult,
};
