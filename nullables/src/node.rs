//! Nullable node: a programmable CometBFT endpoint.
//!
//! Answers the queries the pipeline makes (account lookup, simulation,
//! denom metadata) from canned state, records every broadcast, and commits
//! accepted transactions a configurable number of blocks later. The block
//! height advances by one on every `status` call so that pollers make
//! progress without wall-clock time.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use prost::Message;
use serde_json::{json, Value};

use cosmtx_crypto::tx_hash;
use cosmtx_rpc::{
    AbciQuery, BroadcastTxResult, CometClient, ExecTxResult, RpcError, Status, TxResult,
    TxSearchResult, ACCOUNT_KEY_PREFIX, ACCOUNT_STORE_PATH, DENOM_METADATA_PATH, SIMULATE_PATH,
};
use cosmtx_rpc::types::{NodeInfo, SyncInfo};
use cosmtx_types::proto::{self, TYPE_URL_BASE_ACCOUNT};
use cosmtx_types::{AccAddress, Any};

struct Pending {
    hash: String,
    tx: Vec<u8>,
    commit_at: u64,
}

struct NodeState {
    chain_id: String,
    height: u64,
    unavailable: bool,
    accounts: HashMap<Vec<u8>, Vec<u8>>,
    simulate: Result<u64, String>,
    simulate_requests: Vec<Vec<u8>>,
    metadata: HashMap<String, proto::Metadata>,
    check_code: u32,
    check_log: String,
    deliver_code: u32,
    commit_delay: Option<u64>,
    broadcasts: Vec<Vec<u8>>,
    pending: Vec<Pending>,
    committed: Vec<TxResult>,
    queries: Vec<String>,
}

/// In-memory stand-in for a full node.
pub struct NullNode {
    state: Mutex<NodeState>,
}

impl NullNode {
    pub fn new(chain_id: &str) -> Self {
        Self {
            state: Mutex::new(NodeState {
                chain_id: chain_id.to_string(),
                height: 1,
                unavailable: false,
                accounts: HashMap::new(),
                simulate: Ok(100_000),
                simulate_requests: Vec::new(),
                metadata: HashMap::new(),
                check_code: 0,
                check_log: String::new(),
                deliver_code: 0,
                commit_delay: Some(1),
                broadcasts: Vec::new(),
                pending: Vec::new(),
                committed: Vec::new(),
                queries: Vec::new(),
            }),
        }
    }

    fn state(&self) -> MutexGuard<'_, NodeState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Store a `BaseAccount` in the auth subspace.
    pub fn set_account(
        &self,
        address: &AccAddress,
        account_number: u64,
        sequence: u64,
        pub_key: Option<Any>,
    ) {
        let account = proto::BaseAccount {
            address: address.to_string(),
            pub_key,
            account_number,
            sequence,
        };
        self.set_account_bytes(address, Any::pack(TYPE_URL_BASE_ACCOUNT, &account).encode_to_vec());
    }

    /// Store raw bytes under an address, for decode-failure cases.
    pub fn set_account_bytes(&self, address: &AccAddress, bytes: Vec<u8>) {
        self.state().accounts.insert(address.as_bytes().to_vec(), bytes);
    }

    /// Gas reported by the next simulations, or the error they fail with.
    pub fn set_simulate_result(&self, result: Result<u64, String>) {
        self.state().simulate = result;
    }

    pub fn set_denom_metadata(&self, metadata: proto::Metadata) {
        self.state().metadata.insert(metadata.base.clone(), metadata);
    }

    /// CheckTx outcome for subsequent broadcasts. Non-zero codes are never
    /// committed.
    pub fn set_check_result(&self, code: u32, log: &str) {
        let mut state = self.state();
        state.check_code = code;
        state.check_log = log.to_string();
    }

    /// Execution code recorded for committed transactions.
    pub fn set_deliver_code(&self, code: u32) {
        self.state().deliver_code = code;
    }

    /// Blocks between submission and commit; `None` never commits.
    pub fn set_commit_delay(&self, blocks: Option<u64>) {
        self.state().commit_delay = blocks;
    }

    /// Make every call fail as if the node were unreachable.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.state().unavailable = unavailable;
    }

    pub fn height(&self) -> u64 {
        self.state().height
    }

    pub fn advance_blocks(&self, n: u64) {
        self.state().height += n;
    }

    /// Every transaction submitted so far, in order.
    pub fn broadcasts(&self) -> Vec<Vec<u8>> {
        self.state().broadcasts.clone()
    }

    /// Transaction bytes of every simulate request.
    pub fn simulate_requests(&self) -> Vec<Vec<u8>> {
        self.state().simulate_requests.clone()
    }

    /// ABCI query paths seen so far.
    pub fn queries(&self) -> Vec<String> {
        self.state().queries.clone()
    }

    fn check_available(&self) -> Result<MutexGuard<'_, NodeState>, RpcError> {
        let state = self.state();
        if state.unavailable {
            return Err(RpcError::Unavailable("null node is offline".into()));
        }
        Ok(state)
    }

    fn submit(&self, tx: &[u8]) -> Result<BroadcastTxResult, RpcError> {
        let mut state = self.check_available()?;
        let hash = tx_hash(tx);
        state.broadcasts.push(tx.to_vec());
        if state.check_code == 0 {
            if let Some(delay) = state.commit_delay {
                let commit_at = state.height + delay;
                state.pending.push(Pending {
                    hash: hash.clone(),
                    tx: tx.to_vec(),
                    commit_at,
                });
            }
        }
        Ok(BroadcastTxResult {
            code: state.check_code,
            data: Vec::new(),
            log: state.check_log.clone(),
            codespace: if state.check_code == 0 { String::new() } else { "sdk".into() },
            hash,
        })
    }
}

impl NodeState {
    /// Move pending transactions whose commit height has been reached.
    fn commit_due(&mut self) {
        let height = self.height;
        let deliver_code = self.deliver_code;
        let (due, waiting): (Vec<_>, Vec<_>) =
            self.pending.drain(..).partition(|p| p.commit_at <= height);
        self.pending = waiting;
        for p in due {
            let index = self.committed.iter().filter(|c| c.height == p.commit_at).count() as u32;
            self.committed.push(TxResult {
                hash: p.hash,
                height: p.commit_at,
                index,
                tx_result: ExecTxResult {
                    code: deliver_code,
                    gas_wanted: 200_000,
                    gas_used: 100_000,
                    ..Default::default()
                },
                tx: p.tx,
            });
        }
    }

    fn simulate(&mut self, data: &[u8]) -> Result<Vec<u8>, RpcError> {
        let request = proto::SimulateRequest::decode(data)
            .map_err(|e| RpcError::Node { code: 2, log: format!("tx parse error: {e}") })?;
        self.simulate_requests.push(request.tx_bytes);
        match &self.simulate {
            Ok(gas_used) => Ok(proto::SimulateResponse {
                gas_info: Some(proto::GasInfo {
                    gas_wanted: 0,
                    gas_used: *gas_used,
                }),
                result: Some(proto::AbciResult::default()),
            }
            .encode_to_vec()),
            Err(log) => Err(RpcError::Node {
                code: 11,
                log: log.clone(),
            }),
        }
    }

    fn denom_metadata(&self, data: &[u8]) -> Result<Vec<u8>, RpcError> {
        let request = proto::QueryDenomMetadataRequest::decode(data)
            .map_err(|e| RpcError::Node { code: 2, log: e.to_string() })?;
        match self.metadata.get(&request.denom) {
            Some(metadata) => Ok(proto::QueryDenomMetadataResponse {
                metadata: Some(metadata.clone()),
            }
            .encode_to_vec()),
            None => Err(RpcError::Node {
                code: 5,
                log: format!("client metadata for denom {}: not found", request.denom),
            }),
        }
    }
}

#[async_trait]
impl CometClient for NullNode {
    async fn abci_query(
        &self,
        path: &str,
        data: &[u8],
        _height: Option<u64>,
    ) -> Result<AbciQuery, RpcError> {
        let mut state = self.check_available()?;
        state.queries.push(path.to_string());
        let value = match path {
            ACCOUNT_STORE_PATH => match data.split_first() {
                Some((&ACCOUNT_KEY_PREFIX, address)) => {
                    state.accounts.get(address).cloned().unwrap_or_default()
                }
                _ => Vec::new(),
            },
            SIMULATE_PATH => state.simulate(data)?,
            DENOM_METADATA_PATH => state.denom_metadata(data)?,
            other => {
                return Err(RpcError::Node {
                    code: 6,
                    log: format!("unknown query path {other}"),
                })
            }
        };
        Ok(AbciQuery {
            value,
            height: state.height,
            ..Default::default()
        })
    }

    async fn broadcast_tx_sync(&self, tx: &[u8]) -> Result<BroadcastTxResult, RpcError> {
        self.submit(tx)
    }

    async fn broadcast_tx_async(&self, tx: &[u8]) -> Result<BroadcastTxResult, RpcError> {
        let mut res = self.submit(tx)?;
        res.code = 0;
        res.log.clear();
        res.codespace.clear();
        Ok(res)
    }

    async fn tx(&self, hash: &str) -> Result<Option<TxResult>, RpcError> {
        let mut state = self.check_available()?;
        state.commit_due();
        Ok(state
            .committed
            .iter()
            .find(|c| c.hash.eq_ignore_ascii_case(hash))
            .cloned())
    }

    async fn tx_search(
        &self,
        _query: &str,
        page: u32,
        per_page: u32,
    ) -> Result<TxSearchResult, RpcError> {
        let mut state = self.check_available()?;
        state.commit_due();
        let skip = (page.max(1) as usize - 1) * per_page as usize;
        Ok(TxSearchResult {
            txs: state
                .committed
                .iter()
                .skip(skip)
                .take(per_page as usize)
                .cloned()
                .collect(),
            total_count: state.committed.len() as u64,
        })
    }

    async fn block(&self, height: Option<u64>) -> Result<Value, RpcError> {
        let mut state = self.check_available()?;
        state.commit_due();
        let height = height.unwrap_or(state.height);
        if height > state.height {
            return Err(RpcError::Node {
                code: -32603,
                log: format!("height {height} must be less than or equal to the current blockchain height {}", state.height),
            });
        }
        let txs: Vec<String> = state
            .committed
            .iter()
            .filter(|c| c.height == height)
            .map(|c| base64_tx(&c.tx))
            .collect();
        Ok(json!({
            "block_id": {"hash": format!("{:064X}", height)},
            "block": {
                "header": {"chain_id": state.chain_id, "height": height.to_string()},
                "data": {"txs": txs},
            }
        }))
    }

    async fn status(&self) -> Result<Status, RpcError> {
        let mut state = self.check_available()?;
        state.height += 1;
        state.commit_due();
        Ok(Status {
            node_info: NodeInfo {
                network: state.chain_id.clone(),
                moniker: "null".into(),
            },
            sync_info: SyncInfo {
                latest_block_height: state.height,
                ..Default::default()
            },
        })
    }
}

fn base64_tx(tx: &[u8]) -> String {
    use base64::Engine;
    base64::engine::general_purpose::STANDARD.encode(tx)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(b: u8) -> AccAddress {
        AccAddress::from([b; 20])
    }

    #[tokio::test]
    async fn account_query_returns_packed_base_account() {
        let node = NullNode::new("test-1");
        node.set_account(&addr(1), 7, 3, None);
        let mut key = vec![ACCOUNT_KEY_PREFIX];
        key.extend_from_slice(addr(1).as_bytes());
        let res = node.abci_query(ACCOUNT_STORE_PATH, &key, None).await.unwrap();
        let any = Any::decode(res.value.as_slice()).unwrap();
        let account: proto::BaseAccount = any.unpack(TYPE_URL_BASE_ACCOUNT).unwrap();
        assert_eq!((account.account_number, account.sequence), (7, 3));

        key[1] = 9;
        let missing = node.abci_query(ACCOUNT_STORE_PATH, &key, None).await.unwrap();
        assert!(missing.value.is_empty());
    }

    #[tokio::test]
    async fn commits_after_delay() {
        let node = NullNode::new("test-1");
        node.set_commit_delay(Some(2));
        let res = node.broadcast_tx_sync(b"tx-bytes").await.unwrap();
        assert_eq!(res.code, 0);
        assert!(node.tx(&res.hash).await.unwrap().is_none());
        node.status().await.unwrap();
        node.status().await.unwrap();
        let committed = node.tx(&res.hash).await.unwrap().unwrap();
        assert_eq!(committed.tx, b"tx-bytes");
        assert_eq!(node.tx_search("", 1, 10).await.unwrap().total_count, 1);
    }

    #[tokio::test]
    async fn check_failure_never_commits() {
        let node = NullNode::new("test-1");
        node.set_check_result(13, "insufficient fee");
        let res = node.broadcast_tx_sync(b"tx").await.unwrap();
        assert_eq!(res.code, 13);
        node.advance_blocks(10);
        assert!(node.tx(&res.hash).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn simulate_answers_with_configured_gas() {
        let node = NullNode::new("test-1");
        node.set_simulate_result(Ok(10));
        let req = proto::SimulateRequest { tx_bytes: vec![1, 2] }.encode_to_vec();
        let res = node.abci_query(SIMULATE_PATH, &req, None).await.unwrap();
        let sim = proto::SimulateResponse::decode(res.value.as_slice()).unwrap();
        assert_eq!(sim.gas_info.unwrap().gas_used, 10);
        assert_eq!(node.simulate_requests(), vec![vec![1, 2]]);

        node.set_simulate_result(Err("out of gas".into()));
        assert!(node.abci_query(SIMULATE_PATH, &req, None).await.is_err());
    }

    #[tokio::test]
    async fn unavailable_fails_everything() {
        let node = NullNode::new("test-1");
        node.set_unavailable(true);
        assert!(matches!(node.status().await, Err(RpcError::Unavailable(_))));
        assert!(node.broadcast_tx_sync(b"x").await.is_err());
    }
}
