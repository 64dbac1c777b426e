//! `query` subcommands.

use anyhow::{anyhow, Context as _};
use serde_json::{json, Value};

use cosmtx_rpc::{events_to_query, PageRequest, TxResponse};
use cosmtx_tx::{AccountRetriever, NodeAccountRetriever};
use cosmtx_types::SdkError;

use crate::cmd::QueryCommand;
use crate::context::ClientContext;

pub async fn run(ctx: &ClientContext, cmd: QueryCommand) -> anyhow::Result<Value> {
    match cmd {
        QueryCommand::Tx { hash } => {
            let hash = hash.trim().to_uppercase();
            let res = ctx
                .client
                .tx(&hash)
                .await?
                .ok_or_else(|| anyhow!("tx {hash} not found"))?;
            Ok(serde_json::to_value(TxResponse::from_tx_result(&res))?)
        }
        QueryCommand::Txs { events, page, limit } => {
            let query = events_to_query(&events).map_err(|e| anyhow!(e))?;
            let req = PageRequest::new(page, limit);
            let res = ctx
                .client
                .tx_search(&query, req.page, req.limit)
                .await
                .with_context(|| format!("searching {query}"))?;
            let txs: Vec<TxResponse> = res.txs.iter().map(TxResponse::from_tx_result).collect();
            Ok(json!({
                "total_count": res.total_count,
                "count": txs.len(),
                "page_number": req.page,
                "page_total": res.total_count.div_ceil(u64::from(req.limit)),
                "limit": req.limit,
                "has_next": req.has_next(res.total_count),
                "txs": txs,
            }))
        }
        QueryCommand::Account { address } => {
            let (address, _) = ctx.resolve_account(&address)?;
            let account = NodeAccountRetriever::new(ctx.client.clone())
                .get_account(&address)
                .await
                .map_err(|e| match e {
                    SdkError::AccountNotFound(addr) => anyhow!(
                        "account {addr} not found; an account exists only after it has received tokens"
                    ),
                    other => other.into(),
                })?;
            Ok(json!({
                "address": account.address.to_string(),
                "pub_key": account.pub_key.as_ref().map(|pk| pk.to_json()),
                "account_number": account.number.to_string(),
                "sequence": account.sequence.to_string(),
            }))
        }
        QueryCommand::Block { height } => Ok(ctx.client.block(height).await?),
    }
}
