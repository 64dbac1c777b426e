//! Round-robin pool of node clients.

use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

use crate::client::CometClient;
use crate::error::RpcError;
use crate::http::HttpClient;
use crate::types::{AbciQuery, BroadcastTxResult, Status, TxResult, TxSearchResult};

/// Hands out clients in rotation. The index is the only shared mutable state
/// and is advanced under a mutex, so concurrent callers observe distinct,
/// sequential positions. No health checks: a failed call is the caller's to
/// retry.
#[derive(Debug)]
pub struct ClientPool<C> {
    clients: Vec<C>,
    index: Mutex<usize>,
}

impl<C> ClientPool<C> {
    pub fn new(clients: Vec<C>) -> Result<Self, RpcError> {
        if clients.is_empty() {
            return Err(RpcError::MissingEndpoints);
        }
        Ok(Self {
            clients,
            index: Mutex::new(0),
        })
    }

    /// Position of the next client, advancing the rotation.
    pub fn next_index(&self) -> usize {
        let mut index = self.index.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        let current = *index;
        *index = (current + 1) % self.clients.len();
        current
    }

    pub fn get_client(&self) -> &C {
        &self.clients[self.next_index()]
    }

    pub fn len(&self) -> usize {
        self.clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }
}

impl ClientPool<HttpClient> {
    /// Build from a comma-separated endpoint list, e.g.
    /// `tcp://a:26657,tcp://b:26657`. Blank entries are ignored.
    pub fn from_endpoints(list: &str) -> Result<Self, RpcError> {
        let clients = list
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(HttpClient::new)
            .collect::<Result<Vec<_>, _>>()?;
        debug!(endpoints = clients.len(), "rpc pool created");
        Self::new(clients)
    }
}

#[async_trait]
impl<C: CometClient> CometClient for ClientPool<C> {
    async fn abci_query(
        &self,
        path: &str,
        data: &[u8],
        height: Option<u64>,
    ) -> Result<AbciQuery, RpcError> {
        self.get_client().abci_query(path, data, height).await
    }

    async fn broadcast_tx_sync(&self, tx: &[u8]) -> Result<BroadcastTxResult, RpcError> {
        self.get_client().broadcast_tx_sync(tx).await
    }

    async fn broadcast_tx_async(&self, tx: &[u8]) -> Result<BroadcastTxResult, RpcError> {
        self.get_client().broadcast_tx_async(tx).await
    }

    async fn tx(&self, hash: &str) -> Result<Option<TxResult>, RpcError> {
        self.get_client().tx(hash).await
    }

    async fn tx_search(
        &self,
        query: &str,
        page: u32,
        per_page: u32,
    ) -> Result<TxSearchResult, RpcError> {
        self.get_client().tx_search(query, page, per_page).await
    }

    async fn block(&self, height: Option<u64>) -> Result<Value, RpcError> {
        self.get_client().block(height).await
    }

    async fn status(&self) -> Result<Status, RpcError> {
        self.get_client().status().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::Arc;

    #[test]
    fn rotation_wraps() {
        let pool = ClientPool::new(vec!["a", "b", "c"]).unwrap();
        let seen: Vec<usize> = (0..4).map(|_| pool.next_index()).collect();
        assert_eq!(seen, vec![0, 1, 2, 0]);
        assert_eq!(*pool.get_client(), "b");
    }

    #[test]
    fn empty_pool_rejected() {
        assert_eq!(
            ClientPool::<&str>::new(vec![]).unwrap_err(),
            RpcError::MissingEndpoints
        );
        assert_eq!(
            ClientPool::from_endpoints(" , ").unwrap_err(),
            RpcError::MissingEndpoints
        );
    }

    #[test]
    fn endpoints_parsed_from_list() {
        let pool = ClientPool::from_endpoints("tcp://a:1, tcp://b:2").unwrap();
        assert_eq!(pool.len(), 2);
        assert_eq!(pool.get_client().url(), "http://a:1");
        assert_eq!(pool.get_client().url(), "http://b:2");
    }

    #[test]
    fn concurrent_callers_get_sequential_indices() {
        let pool = Arc::new(ClientPool::new((0..4).collect::<Vec<u32>>()).unwrap());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let pool = pool.clone();
                std::thread::spawn(move || (0..100).map(|_| pool.next_index()).collect::<Vec<_>>())
            })
            .collect();
        let mut counts = [0usize; 4];
        for h in handles {
            for i in h.join().unwrap() {
                counts[i] += 1;
            }
        }
        // 800 draws over 4 slots in strict rotation: each slot exactly 200 times.
        assert_eq!(counts, [200; 4]);
        let distinct: HashSet<_> = counts.iter().collect();
        assert_eq!(distinct.len(), 1);
    }
}
