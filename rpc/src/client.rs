//! The node client capability.

use async_trait::async_trait;

use crate::error::RpcError;
use crate::types::{AbciQuery, BroadcastTxResult, Status, TxResult, TxSearchResult};

/// Raw store query into the auth module's account subspace.
pub const ACCOUNT_STORE_PATH: &str = "/store/acc/key";
/// Key prefix of accounts inside the auth store.
pub const ACCOUNT_KEY_PREFIX: u8 = 0x01;
pub const SIMULATE_PATH: &str = "/cosmos.tx.v1beta1.Service/Simulate";
pub const DENOM_METADATA_PATH: &str = "/cosmos.bank.v1beta1.Query/DenomMetadata";

/// Operations the transaction pipeline needs from a CometBFT node.
#[async_trait]
pub trait CometClient: Send + Sync {
    /// Query application state. `height` of `None` means latest.
    async fn abci_query(
        &self,
        path: &str,
        data: &[u8],
        height: Option<u64>,
    ) -> Result<AbciQuery, RpcError>;

    /// Submit and wait for CheckTx.
    async fn broadcast_tx_sync(&self, tx: &[u8]) -> Result<BroadcastTxResult, RpcError>;

    /// Submit without waiting for CheckTx.
    async fn broadcast_tx_async(&self, tx: &[u8]) -> Result<BroadcastTxResult, RpcError>;

    /// Look up a committed transaction by uppercase hex hash. `Ok(None)` when
    /// the node does not (yet) know it.
    async fn tx(&self, hash: &str) -> Result<Option<TxResult>, RpcError>;

    async fn tx_search(
        &self,
        query: &str,
        page: u32,
        per_page: u32,
    ) -> Result<TxSearchResult, RpcError>;

    /// Raw block JSON at `height`, or the latest block.
    async fn block(&self, height: Option<u64>) -> Result<serde_json::Value, RpcError>;

    async fn status(&self) -> Result<Status, RpcError>;
}

/// Render an `abci_query` parameter object. CometBFT takes `data` as hex.
pub fn abci_query_params(path: &str, data: &[u8], height: Option<u64>) -> serde_json::Value {
    serde_json::json!({
        "path": path,
        "data": hex::encode(data),
        "height": height.unwrap_or(0).to_string(),
        "prove": false,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn query_params_shape() {
        let p = abci_query_params("/store/acc/key", &[1, 0xab], None);
        assert_eq!(p["data"], "01ab");
        assert_eq!(p["height"], "0");
        assert_eq!(p["prove"], false);
    }
}
