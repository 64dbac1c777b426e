//! Typed CometBFT JSON-RPC responses and the SDK-level `TxResponse`.
//!
//! CometBFT renders 64-bit integers as JSON strings; the `de` helpers accept
//! either form.

use serde::{Deserialize, Deserializer, Serialize};

use base64::engine::general_purpose::STANDARD as B64;
use base64::Engine;

pub(crate) mod de {
    use super::*;

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum StrOrNum {
        Str(String),
        Num(u64),
    }

    pub fn u64_any<'de, D: Deserializer<'de>>(d: D) -> Result<u64, D::Error> {
        match StrOrNum::deserialize(d)? {
            StrOrNum::Num(n) => Ok(n),
            StrOrNum::Str(s) if s.is_empty() => Ok(0),
            StrOrNum::Str(s) => s.parse().map_err(serde::de::Error::custom),
        }
    }

    /// Base64 bytes; `null` or absent decodes as empty.
    pub fn b64_bytes<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<u8>, D::Error> {
        match Option::<String>::deserialize(d)? {
            None => Ok(Vec::new()),
            Some(s) => B64.decode(s).map_err(serde::de::Error::custom),
        }
    }

    pub fn string_or_null<'de, D: Deserializer<'de>>(d: D) -> Result<String, D::Error> {
        Ok(Option::<String>::deserialize(d)?.unwrap_or_default())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventAttribute {
    #[serde(default, deserialize_with = "de::string_or_null")]
    pub key: String,
    #[serde(default, deserialize_with = "de::string_or_null")]
    pub value: String,
    #[serde(default)]
    pub index: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub attributes: Vec<EventAttribute>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct AbciQuery {
    #[serde(default)]
    pub code: u32,
    #[serde(default, deserialize_with = "de::string_or_null")]
    pub log: String,
    #[serde(default, deserialize_with = "de::b64_bytes")]
    pub value: Vec<u8>,
    #[serde(default, deserialize_with = "de::u64_any")]
    pub height: u64,
    #[serde(default, deserialize_with = "de::string_or_null")]
    pub codespace: String,
}

/// Result of `broadcast_tx_sync` / `broadcast_tx_async`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct BroadcastTxResult {
    #[serde(default)]
    pub code: u32,
    #[serde(default, deserialize_with = "de::b64_bytes")]
    pub data: Vec<u8>,
    #[serde(default, deserialize_with = "de::string_or_null")]
    pub log: String,
    #[serde(default, deserialize_with = "de::string_or_null")]
    pub codespace: String,
    pub hash: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ExecTxResult {
    #[serde(default)]
    pub code: u32,
    #[serde(default, deserialize_with = "de::b64_bytes")]
    pub data: Vec<u8>,
    #[serde(default, deserialize_with = "de::string_or_null")]
    pub log: String,
    #[serde(default, deserialize_with = "de::string_or_null")]
    pub info: String,
    #[serde(default, deserialize_with = "de::u64_any")]
    pub gas_wanted: u64,
    #[serde(default, deserialize_with = "de::u64_any")]
    pub gas_used: u64,
    #[serde(default)]
    pub events: Vec<Event>,
    #[serde(default, deserialize_with = "de::string_or_null")]
    pub codespace: String,
}

/// A committed transaction as returned by `tx` and `tx_search`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct TxResult {
    pub hash: String,
    #[serde(deserialize_with = "de::u64_any")]
    pub height: u64,
    #[serde(default)]
    pub index: u32,
    pub tx_result: ExecTxResult,
    #[serde(default, deserialize_with = "de::b64_bytes")]
    pub tx: Vec<u8>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct TxSearchResult {
    #[serde(default)]
    pub txs: Vec<TxResult>,
    #[serde(default, deserialize_with = "de::u64_any")]
    pub total_count: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct NodeInfo {
    #[serde(default)]
    pub network: String,
    #[serde(default)]
    pub moniker: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct SyncInfo {
    #[serde(deserialize_with = "de::u64_any")]
    pub latest_block_height: u64,
    #[serde(default)]
    pub latest_block_time: String,
    #[serde(default)]
    pub catching_up: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct Status {
    #[serde(default)]
    pub node_info: NodeInfo,
    pub sync_info: SyncInfo,
}

/// SDK-level transaction response printed by the CLI. `code` is always
/// present; zero means success.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TxResponse {
    pub height: u64,
    pub txhash: String,
    pub codespace: String,
    pub code: u32,
    pub data: String,
    pub raw_log: String,
    pub info: String,
    pub gas_wanted: u64,
    pub gas_used: u64,
    pub events: Vec<Event>,
    pub timestamp: String,
}

impl TxResponse {
    pub fn from_broadcast(res: &BroadcastTxResult) -> Self {
        Self {
            txhash: res.hash.clone(),
            codespace: res.codespace.clone(),
            code: res.code,
            data: hex::encode_upper(&res.data),
            raw_log: res.log.clone(),
            ..Default::default()
        }
    }

    /// Async broadcasts return nothing but the hash.
    pub fn hash_only(hash: impl Into<String>) -> Self {
        Self {
            txhash: hash.into(),
            ..Default::default()
        }
    }

    pub fn from_tx_result(res: &TxResult) -> Self {
        Self {
            height: res.height,
            txhash: res.hash.clone(),
            codespace: res.tx_result.codespace.clone(),
            code: res.tx_result.code,
            data: hex::encode_upper(&res.tx_result.data),
            raw_log: res.tx_result.log.clone(),
            info: res.tx_result.info.clone(),
            gas_wanted: res.tx_result.gas_wanted,
            gas_used: res.tx_result.gas_used,
            events: res.tx_result.events.clone(),
            timestamp: String::new(),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.code == 0
    }
}
