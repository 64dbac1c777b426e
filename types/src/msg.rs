//! Transaction messages and the type-URL registry used to decode them.

use prost::Message;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::address::AccAddress;
use crate::any::Any;
use crate::coin::Coins;
use crate::error::SdkError;
use crate::proto;

/// A domain command carried in a transaction body.
pub trait Msg: fmt::Debug + Send + Sync {
    fn type_url(&self) -> &str;

    /// Addresses whose signatures authorize this message, in order.
    fn signers(&self) -> Vec<AccAddress>;

    fn to_any(&self) -> Any;

    /// Legacy amino form `{"type": name, "value": {...}}`, if the message has one.
    fn amino_json(&self) -> Option<Value>;

    /// Proto-JSON form with an `@type` field.
    fn to_json(&self) -> Value;
}

pub type MsgRef = Arc<dyn Msg>;

/// Signers of all messages, de-duplicated on first occurrence.
pub fn unique_signers(msgs: &[MsgRef]) -> Vec<AccAddress> {
    let mut out: Vec<AccAddress> = Vec::new();
    for signer in msgs.iter().flat_map(|m| m.signers()) {
        if !out.contains(&signer) {
            out.push(signer);
        }
    }
    out
}

type ProtoDecoder = fn(&[u8]) -> Result<MsgRef, SdkError>;
type JsonDecoder = fn(&Value) -> Result<MsgRef, SdkError>;

/// Maps type URLs to decoders. Populated once at start-up.
#[derive(Clone, Default)]
pub struct MsgRegistry {
    entries: HashMap<String, (ProtoDecoder, JsonDecoder)>,
}

impl MsgRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry with the built-in bank message.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(proto::TYPE_URL_MSG_SEND, MsgSend::decode_proto, MsgSend::decode_json);
        registry
    }

    pub fn register(&mut self, type_url: &str, proto: ProtoDecoder, json: JsonDecoder) {
        self.entries.insert(type_url.to_string(), (proto, json));
    }

    pub fn contains(&self, type_url: &str) -> bool {
        self.entries.contains_key(type_url)
    }

    pub fn decode_any(&self, any: &Any) -> Result<MsgRef, SdkError> {
        let (decode, _) = self
            .entries
            .get(&any.type_url)
            .ok_or_else(|| SdkError::UnknownMessage(any.type_url.clone()))?;
        decode(&any.value)
    }

    pub fn decode_json(&self, value: &Value) -> Result<MsgRef, SdkError> {
        let type_url = value
            .get("@type")
            .and_then(Value::as_str)
            .ok_or_else(|| SdkError::Serialization("message without @type".into()))?;
        let (_, decode) = self
            .entries
            .get(type_url)
            .ok_or_else(|| SdkError::UnknownMessage(type_url.to_string()))?;
        decode(value)
    }
}

impl fmt::Debug for MsgRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut urls: Vec<&String> = self.entries.keys().collect();
        urls.sort();
        f.debug_struct("MsgRegistry").field("type_urls", &urls).finish()
    }
}

/// Read a string field from a JSON object.
pub fn json_str<'a>(value: &'a Value, field: &str) -> Result<&'a str, SdkError> {
    value
        .get(field)
        .and_then(Value::as_str)
        .ok_or_else(|| SdkError::Serialization(format!("missing string field {field}")))
}

// ── MsgSend ────────────────────────────────────────────────────────────

/// Bank transfer from one account to another.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MsgSend {
    pub from_address: AccAddress,
    pub to_address: AccAddress,
    pub amount: Coins,
}

impl MsgSend {
    pub fn decode_proto(bytes: &[u8]) -> Result<MsgRef, SdkError> {
        let raw = proto::MsgSend::decode(bytes)?;
        Ok(Arc::new(MsgSend {
            from_address: AccAddress::from_account_bech32(&raw.from_address)?,
            to_address: AccAddress::from_account_bech32(&raw.to_address)?,
            amount: Coins::from_proto(&raw.amount)?,
        }))
    }

    pub fn decode_json(value: &Value) -> Result<MsgRef, SdkError> {
        let amount: Coins = serde_json::from_value(
            value.get("amount").cloned().unwrap_or(Value::Array(Vec::new())),
        )?;
        Ok(Arc::new(MsgSend {
            from_address: AccAddress::from_account_bech32(json_str(value, "from_address")?)?,
            to_address: AccAddress::from_account_bech32(json_str(value, "to_address")?)?,
            amount,
        }))
    }

    fn fields_json(&self) -> Value {
        json!({
            "from_address": self.from_address.to_string(),
            "to_address": self.to_address.to_string(),
            "amount": self.amount,
        })
    }
}

impl Msg for MsgSend {
    fn type_url(&self) -> &str {
        proto::TYPE_URL_MSG_SEND
    }

    fn signers(&self) -> Vec<AccAddress> {
        vec![self.from_address.clone()]
    }

    fn to_any(&self) -> Any {
        Any::pack(
            proto::TYPE_URL_MSG_SEND,
            &proto::MsgSend {
                from_address: self.from_address.to_string(),
                to_address: self.to_address.to_string(),
                amount: self.amount.to_proto(),
            },
        )
    }

    fn amino_json(&self) -> Option<Value> {
        Some(json!({ "type": "cosmos-sdk/MsgSend", "value": self.fields_json() }))
    }

    fn to_json(&self) -> Value {
        let mut v = self.fields_json();
        v["@type"] = json!(proto::TYPE_URL_MSG_SEND);
        v
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(b: u8) -> AccAddress {
        AccAddress::new(vec![b; 20]).unwrap()
    }

    fn send(from: u8, to: u8) -> MsgRef {
        Arc::new(MsgSend {
            from_address: addr(from),
            to_address: addr(to),
            amount: Coins::parse("10atom").unwrap(),
        })
    }

    #[test]
    fn unique_signers_keeps_first_occurrence_order() {
        let msgs = vec![send(2, 9), send(1, 9), send(2, 8)];
        assert_eq!(unique_signers(&msgs), vec![addr(2), addr(1)]);
    }

    #[test]
    fn registry_decodes_any() {
        let registry = MsgRegistry::with_defaults();
        let msg = send(1, 2);
        let back = registry.decode_any(&msg.to_any()).unwrap();
        assert_eq!(back.signers(), vec![addr(1)]);
        assert_eq!(back.to_any(), msg.to_any());
    }

    #[test]
    fn registry_decodes_json() {
        let registry = MsgRegistry::with_defaults();
        let msg = send(3, 4);
        let back = registry.decode_json(&msg.to_json()).unwrap();
        assert_eq!(back.to_any(), msg.to_any());
    }

    #[test]
    fn unknown_type_url_rejected() {
        let registry = MsgRegistry::with_defaults();
        let any = Any {
            type_url: "/foo.Bar".into(),
            value: vec![],
        };
        assert!(matches!(
            registry.decode_any(&any),
            Err(SdkError::UnknownMessage(_))
        ));
    }

    #[test]
    fn amino_json_shape() {
        let v = send(1, 2).amino_json().unwrap();
        assert_eq!(v["type"], "cosmos-sdk/MsgSend");
        assert_eq!(v["value"]["amount"][0]["amount"], "10");
    }
}
