//! Mutable transaction under construction, and its encodings.
//!
//! A [`TxBuilder`] holds typed messages, body fields, fee and signatures.
//! Body and auth-info bytes are derived on demand, so whatever the sign
//! bytes commit to is exactly what [`TxBuilder::encode`] writes.

use base64::engine::general_purpose::STANDARD as B64;
use base64::Engine;
use prost::Message;
use serde_json::{json, Value};

use cosmtx_crypto::{tx_hash, PublicKey};
use cosmtx_types::proto::{self, mode_info, ModeInfo};
use cosmtx_types::{unique_signers, AccAddress, Any, Coins, MsgRef, MsgRegistry, SdkError, SignMode};

use crate::signing::{SignatureData, SignatureV2};

/// Fee section of `AuthInfo`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Fee {
    pub amount: Coins,
    pub gas_limit: u64,
    pub payer: Option<AccAddress>,
    pub granter: Option<AccAddress>,
}

impl Fee {
    pub fn to_proto(&self) -> proto::Fee {
        proto::Fee {
            amount: self.amount.to_proto(),
            gas_limit: self.gas_limit,
            payer: self.payer.as_ref().map(ToString::to_string).unwrap_or_default(),
            granter: self.granter.as_ref().map(ToString::to_string).unwrap_or_default(),
        }
    }

    pub fn from_proto(fee: &proto::Fee) -> Result<Self, SdkError> {
        Ok(Self {
            amount: Coins::from_proto(&fee.amount)?,
            gas_limit: fee.gas_limit,
            payer: optional_address(&fee.payer)?,
            granter: optional_address(&fee.granter)?,
        })
    }
}

fn optional_address(text: &str) -> Result<Option<AccAddress>, SdkError> {
    if text.is_empty() {
        Ok(None)
    } else {
        AccAddress::from_account_bech32(text).map(Some)
    }
}

#[derive(Debug, Clone, Default)]
pub struct TxBuilder {
    msgs: Vec<MsgRef>,
    memo: String,
    timeout_height: u64,
    extension_options: Vec<Any>,
    non_critical_extension_options: Vec<Any>,
    fee: Fee,
    signatures: Vec<SignatureV2>,
}

impl TxBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_msgs(&mut self, msgs: Vec<MsgRef>) {
        self.msgs = msgs;
    }

    pub fn set_memo(&mut self, memo: impl Into<String>) {
        self.memo = memo.into();
    }

    pub fn set_timeout_height(&mut self, height: u64) {
        self.timeout_height = height;
    }

    pub fn set_extension_options(&mut self, options: Vec<Any>) {
        self.extension_options = options;
    }

    pub fn set_non_critical_extension_options(&mut self, options: Vec<Any>) {
        self.non_critical_extension_options = options;
    }

    pub fn set_fee_amount(&mut self, amount: Coins) {
        self.fee.amount = amount;
    }

    pub fn set_gas_limit(&mut self, gas: u64) {
        self.fee.gas_limit = gas;
    }

    pub fn set_fee_payer(&mut self, payer: Option<AccAddress>) {
        self.fee.payer = payer;
    }

    pub fn set_fee_granter(&mut self, granter: Option<AccAddress>) {
        self.fee.granter = granter;
    }

    /// Replace all signer slots.
    pub fn set_signatures(&mut self, signatures: Vec<SignatureV2>) {
        self.signatures = signatures;
    }

    pub fn msgs(&self) -> &[MsgRef] {
        &self.msgs
    }

    pub fn memo(&self) -> &str {
        &self.memo
    }

    pub fn timeout_height(&self) -> u64 {
        self.timeout_height
    }

    pub fn fee(&self) -> &Fee {
        &self.fee
    }

    pub fn signatures(&self) -> &[SignatureV2] {
        &self.signatures
    }

    /// Addresses that must sign: message signers in first-occurrence order,
    /// then an explicit fee payer who signs no message.
    pub fn signers(&self) -> Vec<AccAddress> {
        let mut signers = unique_signers(&self.msgs);
        if let Some(payer) = &self.fee.payer {
            if !signers.contains(payer) {
                signers.push(payer.clone());
            }
        }
        signers
    }

    /// The address paying the fee: the explicit payer, else the first signer.
    pub fn fee_payer(&self) -> Option<AccAddress> {
        self.fee
            .payer
            .clone()
            .or_else(|| unique_signers(&self.msgs).into_iter().next())
    }

    pub fn body(&self) -> proto::TxBody {
        proto::TxBody {
            messages: self.msgs.iter().map(|m| m.to_any()).collect(),
            memo: self.memo.clone(),
            timeout_height: self.timeout_height,
            extension_options: self.extension_options.clone(),
            non_critical_extension_options: self.non_critical_extension_options.clone(),
        }
    }

    pub fn auth_info(&self) -> proto::AuthInfo {
        proto::AuthInfo {
            signer_infos: self.signatures.iter().map(SignatureV2::signer_info).collect(),
            fee: Some(self.fee.to_proto()),
        }
    }

    pub fn body_bytes(&self) -> Vec<u8> {
        self.body().encode_to_vec()
    }

    pub fn auth_info_bytes(&self) -> Vec<u8> {
        self.auth_info().encode_to_vec()
    }

    pub fn to_raw(&self) -> proto::TxRaw {
        proto::TxRaw {
            body_bytes: self.body_bytes(),
            auth_info_bytes: self.auth_info_bytes(),
            signatures: self.signatures.iter().map(|s| s.data.to_bytes()).collect(),
        }
    }

    /// Wire bytes as broadcast.
    pub fn encode(&self) -> Vec<u8> {
        self.to_raw().encode_to_vec()
    }

    pub fn hash(&self) -> String {
        tx_hash(&self.encode())
    }

    /// Decode wire bytes. Messages are resolved through `registry`.
    pub fn decode(bytes: &[u8], registry: &MsgRegistry) -> Result<Self, SdkError> {
        let raw = proto::TxRaw::decode(bytes)?;
        let body = proto::TxBody::decode(raw.body_bytes.as_slice())?;
        let auth_info = proto::AuthInfo::decode(raw.auth_info_bytes.as_slice())?;
        Self::from_parts(body, auth_info, raw.signatures, registry)
    }

    fn from_parts(
        body: proto::TxBody,
        auth_info: proto::AuthInfo,
        signatures: Vec<Vec<u8>>,
        registry: &MsgRegistry,
    ) -> Result<Self, SdkError> {
        if signatures.len() != auth_info.signer_infos.len() {
            return Err(SdkError::InvalidSignature(format!(
                "{} signatures for {} signer infos",
                signatures.len(),
                auth_info.signer_infos.len()
            )));
        }
        let msgs = body
            .messages
            .iter()
            .map(|any| registry.decode_any(any))
            .collect::<Result<Vec<_>, _>>()?;
        let signatures = auth_info
            .signer_infos
            .iter()
            .zip(&signatures)
            .map(|(info, sig)| SignatureV2::from_signer_info(info, sig))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            msgs,
            memo: body.memo,
            timeout_height: body.timeout_height,
            extension_options: body.extension_options,
            non_critical_extension_options: body.non_critical_extension_options,
            fee: Fee::from_proto(&auth_info.fee.unwrap_or_default())?,
            signatures,
        })
    }

    pub fn to_base64(&self) -> String {
        B64.encode(self.encode())
    }

    pub fn from_base64(text: &str, registry: &MsgRegistry) -> Result<Self, SdkError> {
        let bytes = B64
            .decode(text.trim())
            .map_err(|e| SdkError::Serialization(format!("tx is not base64: {e}")))?;
        Self::decode(&bytes, registry)
    }

    /// Proto-JSON rendering `{"body", "auth_info", "signatures"}`.
    pub fn to_json(&self) -> Value {
        let fee = &self.fee;
        json!({
            "body": {
                "messages": self.msgs.iter().map(|m| m.to_json()).collect::<Vec<_>>(),
                "memo": self.memo,
                "timeout_height": self.timeout_height.to_string(),
                "extension_options": self.extension_options.iter().map(any_to_json).collect::<Vec<_>>(),
                "non_critical_extension_options": self
                    .non_critical_extension_options
                    .iter()
                    .map(any_to_json)
                    .collect::<Vec<_>>(),
            },
            "auth_info": {
                "signer_infos": self.signatures.iter().map(|s| json!({
                    "public_key": s.pubkey.to_json(),
                    "mode_info": mode_info_to_json(&s.data.mode_info()),
                    "sequence": s.sequence.to_string(),
                })).collect::<Vec<_>>(),
                "fee": {
                    "amount": fee.amount,
                    "gas_limit": fee.gas_limit.to_string(),
                    "payer": fee.payer.as_ref().map(ToString::to_string).unwrap_or_default(),
                    "granter": fee.granter.as_ref().map(ToString::to_string).unwrap_or_default(),
                },
            },
            "signatures": self.signatures.iter().map(|s| B64.encode(s.data.to_bytes())).collect::<Vec<_>>(),
        })
    }

    pub fn from_json(value: &Value, registry: &MsgRegistry) -> Result<Self, SdkError> {
        let body = value
            .get("body")
            .ok_or_else(|| SdkError::Serialization("tx JSON has no body".into()))?;
        let msgs = array(body, "messages")?
            .iter()
            .map(|m| registry.decode_json(m))
            .collect::<Result<Vec<_>, _>>()?;
        let auth_info = value.get("auth_info").cloned().unwrap_or(Value::Null);
        let fee_json = auth_info.get("fee").cloned().unwrap_or(Value::Null);
        let fee = Fee {
            amount: match fee_json.get("amount") {
                Some(v) if !v.is_null() => serde_json::from_value(v.clone())?,
                _ => Coins::empty(),
            },
            gas_limit: u64_field(&fee_json, "gas_limit")?,
            payer: optional_address(str_field(&fee_json, "payer"))?,
            granter: optional_address(str_field(&fee_json, "granter"))?,
        };
        let sig_bytes = array(value, "signatures")?
            .iter()
            .map(|s| {
                let text = s
                    .as_str()
                    .ok_or_else(|| SdkError::Serialization("signature is not a string".into()))?;
                B64.decode(text)
                    .map_err(|e| SdkError::Serialization(format!("signature is not base64: {e}")))
            })
            .collect::<Result<Vec<_>, _>>()?;
        let infos = array(&auth_info, "signer_infos")?;
        if infos.len() != sig_bytes.len() {
            return Err(SdkError::InvalidSignature(format!(
                "{} signatures for {} signer infos",
                sig_bytes.len(),
                infos.len()
            )));
        }
        let signatures = infos
            .iter()
            .zip(&sig_bytes)
            .map(|(info, bytes)| {
                let pk = info.get("public_key").filter(|v| !v.is_null()).ok_or(SdkError::EmptyPubKey)?;
                let mode_info = mode_info_from_json(info.get("mode_info").unwrap_or(&Value::Null))?;
                Ok(SignatureV2 {
                    pubkey: PublicKey::from_json(pk)?,
                    data: SignatureData::from_parts(&mode_info, bytes)?,
                    sequence: u64_field(info, "sequence")?,
                })
            })
            .collect::<Result<Vec<_>, SdkError>>()?;
        Ok(Self {
            msgs,
            memo: str_field(body, "memo").to_string(),
            timeout_height: u64_field(body, "timeout_height")?,
            extension_options: array(body, "extension_options")?
                .iter()
                .map(any_from_json)
                .collect::<Result<_, _>>()?,
            non_critical_extension_options: array(body, "non_critical_extension_options")?
                .iter()
                .map(any_from_json)
                .collect::<Result<_, _>>()?,
            fee,
            signatures,
        })
    }
}

// ── JSON helpers ──────────────────────────────────────────────────────────

fn array<'a>(value: &'a Value, field: &str) -> Result<&'a [Value], SdkError> {
    match value.get(field) {
        None | Some(Value::Null) => Ok(&[]),
        Some(Value::Array(items)) => Ok(items),
        Some(_) => Err(SdkError::Serialization(format!("{field} is not an array"))),
    }
}

fn str_field<'a>(value: &'a Value, field: &str) -> &'a str {
    value.get(field).and_then(Value::as_str).unwrap_or_default()
}

/// Proto-JSON renders 64-bit integers as strings; accept numbers too.
fn u64_field(value: &Value, field: &str) -> Result<u64, SdkError> {
    match value.get(field) {
        None | Some(Value::Null) => Ok(0),
        Some(Value::String(s)) if s.is_empty() => Ok(0),
        Some(Value::String(s)) => s
            .parse()
            .map_err(|e| SdkError::Serialization(format!("{field}: {e}"))),
        Some(v) => v
            .as_u64()
            .ok_or_else(|| SdkError::Serialization(format!("{field} is not an integer"))),
    }
}

fn any_to_json(any: &Any) -> Value {
    json!({"@type": any.type_url, "value": B64.encode(&any.value)})
}

fn any_from_json(value: &Value) -> Result<Any, SdkError> {
    let type_url = str_field(value, "@type");
    if type_url.is_empty() {
        return Err(SdkError::Serialization("extension option without @type".into()));
    }
    Ok(Any {
        type_url: type_url.to_string(),
        value: B64
            .decode(str_field(value, "value"))
            .map_err(|e| SdkError::Serialization(format!("extension option value: {e}")))?,
    })
}

fn mode_info_to_json(info: &ModeInfo) -> Value {
    match &info.sum {
        Some(mode_info::Sum::Single(single)) => json!({
            "single": {
                "mode": SignMode::from_i32(single.mode)
                    .map(|m| m.as_proto_name().to_string())
                    .unwrap_or_else(|_| single.mode.to_string()),
            }
        }),
        Some(mode_info::Sum::Multi(multi)) => {
            let bits = multi.bitarray.clone().unwrap_or_default();
            json!({
                "multi": {
                    "bitarray": {
                        "extra_bits_stored": bits.extra_bits_stored,
                        "elems": B64.encode(&bits.elems),
                    },
                    "mode_infos": multi.mode_infos.iter().map(mode_info_to_json).collect::<Vec<_>>(),
                }
            })
        }
        None => Value::Null,
    }
}

fn mode_info_from_json(value: &Value) -> Result<ModeInfo, SdkError> {
    if let Some(single) = value.get("single") {
        let mode = match single.get("mode") {
            Some(Value::String(name)) => SignMode::from_proto_name(name)?,
            Some(Value::Number(n)) => SignMode::from_i32(
                n.as_i64()
                    .and_then(|v| i32::try_from(v).ok())
                    .ok_or_else(|| SdkError::InvalidSignMode(n.to_string()))?,
            )?,
            _ => return Err(SdkError::InvalidSignMode("single mode info without mode".into())),
        };
        return Ok(ModeInfo {
            sum: Some(mode_info::Sum::Single(mode_info::Single { mode: mode.as_i32() })),
        });
    }
    if let Some(multi) = value.get("multi") {
        let bits = multi.get("bitarray").cloned().unwrap_or(Value::Null);
        let bitarray = proto::CompactBitArray {
            extra_bits_stored: u32::try_from(u64_field(&bits, "extra_bits_stored")?)
                .map_err(|_| SdkError::Serialization("extra_bits_stored out of range".into()))?,
            elems: B64
                .decode(str_field(&bits, "elems"))
                .map_err(|e| SdkError::Serialization(format!("bitarray elems: {e}")))?,
        };
        let mode_infos = array(multi, "mode_infos")?
            .iter()
            .map(mode_info_from_json)
            .collect::<Result<Vec<_>, _>>()?;
        return Ok(ModeInfo {
            sum: Some(mode_info::Sum::Multi(mode_info::Multi {
                bitarray: Some(bitarray),
                mode_infos,
            })),
        });
    }
    Err(SdkError::InvalidSignMode("mode_info is neither single nor multi".into()))
}
