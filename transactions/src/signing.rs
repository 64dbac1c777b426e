//! Signature values as they sit in a transaction, independent of encoding.

use base64::engine::general_purpose::STANDARD as B64;
use base64::Engine;
use prost::Message;
use serde_json::{json, Value};

use cosmtx_crypto::PublicKey;
use cosmtx_types::proto::{self, mode_info, CompactBitArray, ModeInfo, MultiSignature};
use cosmtx_types::{AccAddress, SdkError, SignMode};

/// The signature part of one signer slot.
#[derive(Debug, Clone, PartialEq)]
pub enum SignatureData {
    Single {
        mode: SignMode,
        signature: Vec<u8>,
    },
    /// Threshold multisig: members that signed are set in `bitarray`, their
    /// signatures follow in bit order.
    Multi {
        bitarray: CompactBitArray,
        signatures: Vec<SignatureData>,
    },
}

impl SignatureData {
    /// Every sign mode used in this signature, depth-first.
    pub fn modes(&self) -> Vec<SignMode> {
        match self {
            SignatureData::Single { mode, .. } => vec![*mode],
            SignatureData::Multi { signatures, .. } => {
                signatures.iter().flat_map(SignatureData::modes).collect()
            }
        }
    }

    pub fn mode_info(&self) -> ModeInfo {
        let sum = match self {
            SignatureData::Single { mode, .. } => {
                mode_info::Sum::Single(mode_info::Single { mode: mode.as_i32() })
            }
            SignatureData::Multi { bitarray, signatures } => {
                mode_info::Sum::Multi(mode_info::Multi {
                    bitarray: Some(bitarray.clone()),
                    mode_infos: signatures.iter().map(SignatureData::mode_info).collect(),
                })
            }
        };
        ModeInfo { sum: Some(sum) }
    }

    /// Bytes stored in `Tx.signatures`. Multisig signatures are the encoded
    /// `MultiSignature`.
    pub fn to_bytes(&self) -> Vec<u8> {
        match self {
            SignatureData::Single { signature, .. } => signature.clone(),
            SignatureData::Multi { signatures, .. } => MultiSignature {
                signatures: signatures.iter().map(SignatureData::to_bytes).collect(),
            }
            .encode_to_vec(),
        }
    }

    /// Rebuild from a mode info and the raw signature bytes.
    pub fn from_parts(mode_info: &ModeInfo, bytes: &[u8]) -> Result<Self, SdkError> {
        match &mode_info.sum {
            Some(mode_info::Sum::Single(single)) => Ok(SignatureData::Single {
                mode: SignMode::from_i32(single.mode)?,
                signature: bytes.to_vec(),
            }),
            Some(mode_info::Sum::Multi(multi)) => {
                let sig = MultiSignature::decode(bytes)?;
                if sig.signatures.len() != multi.mode_infos.len() {
                    return Err(SdkError::InvalidSignature(format!(
                        "multisig has {} signatures but {} mode infos",
                        sig.signatures.len(),
                        multi.mode_infos.len()
                    )));
                }
                let signatures = multi
                    .mode_infos
                    .iter()
                    .zip(&sig.signatures)
                    .map(|(mi, s)| SignatureData::from_parts(mi, s))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(SignatureData::Multi {
                    bitarray: multi.bitarray.clone().unwrap_or_default(),
                    signatures,
                })
            }
            None => Err(SdkError::InvalidSignMode("signer info without mode info".into())),
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            SignatureData::Single { signature, .. } => signature.is_empty(),
            SignatureData::Multi { signatures, .. } => signatures.is_empty(),
        }
    }

    pub fn to_json(&self) -> Value {
        match self {
            SignatureData::Single { mode, signature } => json!({
                "single": { "mode": mode.as_proto_name(), "signature": B64.encode(signature) }
            }),
            SignatureData::Multi { bitarray, signatures } => json!({
                "multi": {
                    "bitarray": {
                        "extra_bits_stored": bitarray.extra_bits_stored,
                        "elems": B64.encode(&bitarray.elems),
                    },
                    "signatures": signatures.iter().map(SignatureData::to_json).collect::<Vec<_>>(),
                }
            }),
        }
    }

    pub fn from_json(value: &Value) -> Result<Self, SdkError> {
        let b64 = |v: &Value, field: &str| -> Result<Vec<u8>, SdkError> {
            let text = v.get(field).and_then(Value::as_str).unwrap_or_default();
            B64.decode(text)
                .map_err(|e| SdkError::Serialization(format!("invalid base64 in {field}: {e}")))
        };
        if let Some(single) = value.get("single") {
            let mode = single.get("mode").and_then(Value::as_str).unwrap_or_default();
            return Ok(SignatureData::Single {
                mode: SignMode::from_proto_name(mode)?,
                signature: b64(single, "signature")?,
            });
        }
        let multi = value
            .get("multi")
            .ok_or_else(|| SdkError::Serialization("signature data is neither single nor multi".into()))?;
        let bits = multi.get("bitarray").unwrap_or(&Value::Null);
        let extra = bits.get("extra_bits_stored").and_then(Value::as_u64).unwrap_or(0);
        let signatures = multi
            .get("signatures")
            .and_then(Value::as_array)
            .map(|sigs| sigs.iter().map(SignatureData::from_json).collect::<Result<Vec<_>, _>>())
            .transpose()?
            .unwrap_or_default();
        Ok(SignatureData::Multi {
            bitarray: CompactBitArray {
                extra_bits_stored: u32::try_from(extra)
                    .map_err(|_| SdkError::Serialization("bit array too large".into()))?,
                elems: b64(bits, "elems")?,
            },
            signatures,
        })
    }
}

/// One signer slot: who signed, how, and at which sequence.
#[derive(Debug, Clone, PartialEq)]
pub struct SignatureV2 {
    pub pubkey: PublicKey,
    pub data: SignatureData,
    pub sequence: u64,
}

impl SignatureV2 {
    pub fn address(&self) -> AccAddress {
        self.pubkey.address()
    }

    pub fn signer_info(&self) -> proto::SignerInfo {
        proto::SignerInfo {
            public_key: Some(self.pubkey.to_any()),
            mode_info: Some(self.data.mode_info()),
            sequence: self.sequence,
        }
    }

    /// `SignatureDescriptor` JSON, as written by `tx sign --signature-only`.
    pub fn to_json(&self) -> Value {
        json!({
            "public_key": self.pubkey.to_json(),
            "data": self.data.to_json(),
            "sequence": self.sequence.to_string(),
        })
    }

    pub fn from_json(value: &Value) -> Result<Self, SdkError> {
        let pubkey = value.get("public_key").ok_or(SdkError::EmptyPubKey)?;
        let data = value
            .get("data")
            .ok_or_else(|| SdkError::Serialization("signature without data".into()))?;
        let sequence = match value.get("sequence") {
            Some(Value::String(s)) => s
                .parse()
                .map_err(|_| SdkError::Serialization(format!("invalid sequence {s}")))?,
            Some(v) => v.as_u64().unwrap_or(0),
            None => 0,
        };
        Ok(Self {
            pubkey: PublicKey::from_json(pubkey)?,
            data: SignatureData::from_json(data)?,
            sequence,
        })
    }

    pub fn from_signer_info(info: &proto::SignerInfo, bytes: &[u8]) -> Result<Self, SdkError> {
        let any = info.public_key.as_ref().ok_or(SdkError::EmptyPubKey)?;
        let mode_info = info
            .mode_info
            .as_ref()
            .ok_or_else(|| SdkError::InvalidSignMode("signer info without mode info".into()))?;
        Ok(Self {
            pubkey: PublicKey::from_any(any)?,
            data: SignatureData::from_parts(mode_info, bytes)?,
            sequence: info.sequence,
        })
    }
}

/// Per-signer values that go into sign bytes besides the transaction itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignerData {
    pub address: AccAddress,
    pub chain_id: String,
    pub account_number: u64,
    pub sequence: u64,
    pub pubkey: PublicKey,
}
