//! JSON-RPC 2.0 over HTTP.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as B64;
use base64::Engine;
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use tracing::debug;

use crate::client::{abci_query_params, CometClient};
use crate::error::RpcError;
use crate::types::{AbciQuery, BroadcastTxResult, Status, TxResult, TxSearchResult};

/// Rewrite a `tcp://` node address to `http://`; other schemes pass through
/// and a bare `host:port` gets `http://`.
pub fn normalize_endpoint(uri: &str) -> String {
    let uri = uri.trim();
    if let Some(rest) = uri.strip_prefix("tcp://") {
        format!("http://{rest}")
    } else if uri.contains("://") {
        uri.to_string()
    } else {
        format!("http://{uri}")
    }
}

/// HTTP client for one CometBFT endpoint.
#[derive(Debug)]
pub struct HttpClient {
    http: reqwest::Client,
    url: String,
    next_id: AtomicU64,
}

impl HttpClient {
    pub fn new(uri: &str) -> Result<Self, RpcError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .connect_timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| RpcError::Http(format!("failed to create HTTP client: {e}")))?;
        Ok(Self {
            http,
            url: normalize_endpoint(uri),
            next_id: AtomicU64::new(1),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    async fn call<T: DeserializeOwned>(&self, method: &str, params: Value) -> Result<T, RpcError> {
        let result = self.call_raw(method, params).await?;
        serde_json::from_value(result)
            .map_err(|e| RpcError::Decode(format!("{method}: {e}")))
    }

    async fn call_raw(&self, method: &str, params: Value) -> Result<Value, RpcError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        debug!(url = %self.url, method, id, "rpc call");
        let response = self
            .http
            .post(&self.url)
            .json(&json!({"jsonrpc": "2.0", "id": id, "method": method, "params": params}))
            .send()
            .await
            .map_err(|e| RpcError::Transport(format!("{method} request failed: {e}")))?;

        if !response.status().is_success() && !response.status().is_server_error() {
            return Err(RpcError::Http(format!("node returned HTTP {}", response.status())));
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| RpcError::Decode(format!("invalid JSON response: {e}")))?;
        parse_envelope(body)
    }
}

/// Split a JSON-RPC envelope into its `result`, or an error.
pub fn parse_envelope(mut body: Value) -> Result<Value, RpcError> {
    if let Some(err) = body.get("error").filter(|e| !e.is_null()) {
        let code = err.get("code").and_then(Value::as_i64).unwrap_or(-1);
        let message = err.get("message").and_then(Value::as_str).unwrap_or_default();
        let data = err.get("data").and_then(Value::as_str).unwrap_or_default();
        let log = if data.is_empty() {
            message.to_string()
        } else {
            format!("{message}: {data}")
        };
        return Err(RpcError::Node { code, log });
    }
    body.get_mut("result")
        .map(Value::take)
        .ok_or_else(|| RpcError::Decode("response has neither result nor error".into()))
}

fn is_not_found(err: &RpcError) -> bool {
    matches!(err, RpcError::Node { log, .. } if log.contains("not found"))
}

#[async_trait]
impl CometClient for HttpClient {
    async fn abci_query(
        &self,
        path: &str,
        data: &[u8],
        height: Option<u64>,
    ) -> Result<AbciQuery, RpcError> {
        #[derive(serde::Deserialize)]
        struct Wrapper {
            response: AbciQuery,
        }
        let wrapper: Wrapper = self
            .call("abci_query", abci_query_params(path, data, height))
            .await?;
        let res = wrapper.response;
        if res.code != 0 {
            return Err(RpcError::Node {
                code: i64::from(res.code),
                log: res.log,
            });
        }
        Ok(res)
    }

    async fn broadcast_tx_sync(&self, tx: &[u8]) -> Result<BroadcastTxResult, RpcError> {
        self.call("broadcast_tx_sync", json!({"tx": B64.encode(tx)})).await
    }

    async fn broadcast_tx_async(&self, tx: &[u8]) -> Result<BroadcastTxResult, RpcError> {
        self.call("broadcast_tx_async", json!({"tx": B64.encode(tx)})).await
    }

    async fn tx(&self, hash: &str) -> Result<Option<TxResult>, RpcError> {
        let raw = hex::decode(hash).map_err(|e| RpcError::Decode(format!("tx hash: {e}")))?;
        match self
            .call("tx", json!({"hash": B64.encode(raw), "prove": false}))
            .await
        {
            Ok(res) => Ok(Some(res)),
            Err(e) if is_not_found(&e) => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn tx_search(
        &self,
        query: &str,
        page: u32,
        per_page: u32,
    ) -> Result<TxSearchResult, RpcError> {
        self.call(
            "tx_search",
            json!({
                "query": query,
                "prove": false,
                "page": page.to_string(),
                "per_page": per_page.to_string(),
                "order_by": "asc",
            }),
        )
        .await
    }

    async fn block(&self, height: Option<u64>) -> Result<Value, RpcError> {
        let params = match height {
            Some(h) => json!({"height": h.to_string()}),
            None => json!({}),
        };
        self.call_raw("block", params).await
    }

    async fn status(&self) -> Result<Status, RpcError> {
        self.call("status", json!({})).await
    }
}
