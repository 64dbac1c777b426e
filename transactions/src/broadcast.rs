//! Submitting signed transactions.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use cosmtx_crypto::tx_hash;
use cosmtx_rpc::{CometClient, TxResponse};
use cosmtx_types::{BroadcastMode, SdkError};

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);
/// Blocks to wait for inclusion in block mode.
pub const DEFAULT_TIMEOUT_BLOCKS: u64 = 3;

pub struct Broadcaster {
    client: Arc<dyn CometClient>,
    poll_interval: Duration,
    timeout_blocks: u64,
}

impl Broadcaster {
    pub fn new(client: Arc<dyn CometClient>) -> Self {
        Self {
            client,
            poll_interval: DEFAULT_POLL_INTERVAL,
            timeout_blocks: DEFAULT_TIMEOUT_BLOCKS,
        }
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn with_timeout_blocks(mut self, blocks: u64) -> Self {
        self.timeout_blocks = blocks;
        self
    }

    /// Submit `tx_bytes`. A non-zero CheckTx code comes back as a normal
    /// response; only transport failures, timeouts and cancellation are
    /// errors.
    pub async fn broadcast(
        &self,
        tx_bytes: &[u8],
        mode: BroadcastMode,
        cancel: &CancellationToken,
    ) -> Result<TxResponse, SdkError> {
        match mode {
            BroadcastMode::Sync => {
                let res = self.client.broadcast_tx_sync(tx_bytes).await?;
                info!(hash = %res.hash, code = res.code, "broadcast tx (sync)");
                Ok(TxResponse::from_broadcast(&res))
            }
            BroadcastMode::Async => {
                let res = self.client.broadcast_tx_async(tx_bytes).await?;
                info!(hash = %res.hash, "broadcast tx (async)");
                Ok(TxResponse::hash_only(res.hash))
            }
            BroadcastMode::Block => self.broadcast_and_wait(tx_bytes, cancel).await,
            BroadcastMode::Unspecified => Err(SdkError::InvalidRequest(
                "unsupported broadcast mode BROADCAST_MODE_UNSPECIFIED".into(),
            )),
        }
    }

    async fn broadcast_and_wait(
        &self,
        tx_bytes: &[u8],
        cancel: &CancellationToken,
    ) -> Result<TxResponse, SdkError> {
        let res = self.client.broadcast_tx_sync(tx_bytes).await?;
        let hash = if res.hash.is_empty() { tx_hash(tx_bytes) } else { res.hash.clone() };
        if res.code != 0 {
            info!(hash = %hash, code = res.code, log = %res.log, "tx rejected by CheckTx");
            return Ok(TxResponse::from_broadcast(&res));
        }

        let start = self.client.status().await?.sync_info.latest_block_height;
        info!(hash = %hash, height = start, "broadcast tx, awaiting commit");

        let mut attempt = 0u32;
        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    info!(hash = %hash, "stopped waiting for tx commit");
                    return Err(SdkError::AwaitCancelled(hash));
                }
                _ = tokio::time::sleep(self.poll_interval) => {}
            }
            attempt += 1;

            if let Some(committed) = self.client.tx(&hash).await? {
                info!(
                    hash = %hash,
                    height = committed.height,
                    code = committed.tx_result.code,
                    "tx committed"
                );
                return Ok(TxResponse::from_tx_result(&committed));
            }

            let height = self.client.status().await?.sync_info.latest_block_height;
            debug!(hash = %hash, attempt, height, "tx not yet committed");
            if height >= start.saturating_add(self.timeout_blocks) {
                warn!(
                    hash = %hash,
                    blocks = self.timeout_blocks,
                    "tx not committed in time"
                );
                return Err(SdkError::BroadcastTimeout {
                    hash,
                    blocks: self.timeout_blocks,
                });
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cosmtx_nullables::NullNode;

    fn broadcaster(node: &Arc<NullNode>) -> Broadcaster {
        Broadcaster::new(node.clone()).with_poll_interval(Duration::from_millis(5))
    }

    #[tokio::test]
    async fn sync_returns_check_result() {
        let node = Arc::new(NullNode::new("test-1"));
        node.set_check_result(13, "insufficient fee");
        let res = broadcaster(&node)
            .broadcast(b"tx", BroadcastMode::Sync, &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(res.code, 13);
        assert_eq!(res.raw_log, "insufficient fee");
        assert_eq!(res.txhash, tx_hash(b"tx"));
    }

    #[tokio::test]
    async fn async_returns_hash_only() {
        let node = Arc::new(NullNode::new("test-1"));
        let res = broadcaster(&node)
            .broadcast(b"tx", BroadcastMode::Async, &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(res, TxResponse::hash_only(tx_hash(b"tx")));
    }

    #[tokio::test]
    async fn block_mode_waits_for_commit() {
        let node = Arc::new(NullNode::new("test-1"));
        node.set_commit_delay(Some(2));
        let res = broadcaster(&node)
            .broadcast(b"tx", BroadcastMode::Block, &CancellationToken::new())
            .await
            .unwrap();
        assert!(res.is_ok());
        assert!(res.height > 0);
        assert_eq!(res.txhash, tx_hash(b"tx"));
    }

    #[tokio::test]
    async fn block_mode_returns_failed_deliver() {
        let node = Arc::new(NullNode::new("test-1"));
        node.set_deliver_code(5);
        let res = broadcaster(&node)
            .broadcast(b"tx", BroadcastMode::Block, &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(res.code, 5);
    }

    #[tokio::test]
    async fn block_mode_check_failure_is_immediate() {
        let node = Arc::new(NullNode::new("test-1"));
        node.set_check_result(4, "unauthorized");
        let res = broadcaster(&node)
            .broadcast(b"tx", BroadcastMode::Block, &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(res.code, 4);
        assert_eq!(res.height, 0);
    }

    #[tokio::test]
    async fn block_mode_times_out() {
        let node = Arc::new(NullNode::new("test-1"));
        node.set_commit_delay(None);
        let err = broadcaster(&node)
            .broadcast(b"tx", BroadcastMode::Block, &CancellationToken::new())
            .await
            .unwrap_err();
        assert_eq!(
            err,
            SdkError::BroadcastTimeout { hash: tx_hash(b"tx"), blocks: DEFAULT_TIMEOUT_BLOCKS }
        );
    }

    #[tokio::test]
    async fn block_mode_cancellation() {
        let node = Arc::new(NullNode::new("test-1"));
        node.set_commit_delay(None);
        let cancel = CancellationToken::new();
        cancel.cancel();
        let err = Broadcaster::new(node.clone())
            .broadcast(b"tx", BroadcastMode::Block, &cancel)
            .await
            .unwrap_err();
        assert_eq!(err, SdkError::AwaitCancelled(tx_hash(b"tx")));
    }

    #[tokio::test]
    async fn unavailable_node() {
        let node = Arc::new(NullNode::new("test-1"));
        node.set_unavailable(true);
        assert!(matches!(
            broadcaster(&node)
                .broadcast(b"tx", BroadcastMode::Sync, &CancellationToken::new())
                .await,
            Err(SdkError::RpcUnavailable(_))
        ));
    }
}
