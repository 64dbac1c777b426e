//! Sign-bytes derivation for each sign mode.

use prost::Message;
use serde_json::{json, Map, Value};

use cosmtx_types::proto::{SignDoc, SignDocDirectAux};
use cosmtx_types::{MsgRef, SdkError, SignMode};

use crate::builder::{Fee, TxBuilder};
use crate::signing::SignerData;
use crate::textual::{self, CoinMetadataQuerier, StaticMetadata};

/// Bytes `signer` must sign over `builder` in `mode`.
///
/// `metadata` is only consulted in textual mode; without it amounts render
/// in base denominations.
pub async fn sign_bytes(
    mode: SignMode,
    signer: &SignerData,
    builder: &TxBuilder,
    metadata: Option<&dyn CoinMetadataQuerier>,
) -> Result<Vec<u8>, SdkError> {
    match mode {
        SignMode::Direct => Ok(direct_sign_bytes(
            builder.body_bytes(),
            builder.auth_info_bytes(),
            &signer.chain_id,
            signer.account_number,
        )),
        SignMode::DirectAux => {
            if builder.fee_payer().as_ref() == Some(&signer.address) {
                return Err(SdkError::InvalidSignMode(
                    "the fee payer cannot sign with SIGN_MODE_DIRECT_AUX".into(),
                ));
            }
            Ok(direct_aux_sign_bytes(builder.body_bytes(), signer))
        }
        SignMode::LegacyAminoJson => {
            let doc = amino_sign_doc(
                signer,
                builder.fee(),
                builder.memo(),
                builder.msgs(),
                builder.timeout_height(),
            )?;
            Ok(canonical_json(&doc))
        }
        SignMode::Textual => match metadata {
            Some(q) => textual::sign_bytes(signer, builder, q).await,
            None => textual::sign_bytes(signer, builder, &StaticMetadata::default()).await,
        },
        SignMode::Unspecified => Err(SdkError::InvalidSignMode(
            "SIGN_MODE_UNSPECIFIED cannot produce sign bytes".into(),
        )),
    }
}

pub fn direct_sign_bytes(
    body_bytes: Vec<u8>,
    auth_info_bytes: Vec<u8>,
    chain_id: &str,
    account_number: u64,
) -> Vec<u8> {
    SignDoc {
        body_bytes,
        auth_info_bytes,
        chain_id: chain_id.to_string(),
        account_number,
    }
    .encode_to_vec()
}

pub fn direct_aux_sign_doc(body_bytes: Vec<u8>, signer: &SignerData) -> SignDocDirectAux {
    SignDocDirectAux {
        body_bytes,
        public_key: Some(signer.pubkey.to_any()),
        chain_id: signer.chain_id.clone(),
        account_number: signer.account_number,
        sequence: signer.sequence,
    }
}

pub fn direct_aux_sign_bytes(body_bytes: Vec<u8>, signer: &SignerData) -> Vec<u8> {
    direct_aux_sign_doc(body_bytes, signer).encode_to_vec()
}

/// The legacy `StdSignDoc`. Integers are decimal strings; a zero timeout and
/// an empty payer or granter are left out.
pub fn amino_sign_doc(
    signer: &SignerData,
    fee: &Fee,
    memo: &str,
    msgs: &[MsgRef],
    timeout_height: u64,
) -> Result<Value, SdkError> {
    let msgs = msgs
        .iter()
        .map(|m| {
            m.amino_json().ok_or_else(|| {
                SdkError::InvalidSignMode(format!(
                    "{} has no amino JSON form",
                    m.type_url()
                ))
            })
        })
        .collect::<Result<Vec<_>, _>>()?;

    let mut fee_json = Map::new();
    fee_json.insert("amount".into(), serde_json::to_value(&fee.amount)?);
    fee_json.insert("gas".into(), json!(fee.gas_limit.to_string()));
    if let Some(payer) = &fee.payer {
        fee_json.insert("payer".into(), json!(payer.to_string()));
    }
    if let Some(granter) = &fee.granter {
        fee_json.insert("granter".into(), json!(granter.to_string()));
    }

    let mut doc = Map::new();
    doc.insert("account_number".into(), json!(signer.account_number.to_string()));
    doc.insert("chain_id".into(), json!(signer.chain_id));
    doc.insert("fee".into(), Value::Object(fee_json));
    doc.insert("memo".into(), json!(memo));
    doc.insert("msgs".into(), Value::Array(msgs));
    doc.insert("sequence".into(), json!(signer.sequence.to_string()));
    if timeout_height != 0 {
        doc.insert("timeout_height".into(), json!(timeout_height.to_string()));
    }
    Ok(Value::Object(doc))
}

/// Serialize with object keys sorted at every level, `null` members
/// dropped, and `&`, `<`, `>` escaped as `\u0026`, `\u003c`, `\u003e`.
pub fn canonical_json(value: &Value) -> Vec<u8> {
    let mut out = String::new();
    write_sorted(value, &mut out);
    // These characters only occur inside string literals.
    out.replace('&', "\\u0026")
        .replace('<', "\\u003c")
        .replace('>', "\\u003e")
        .into_bytes()
}

fn write_sorted(value: &Value, out: &mut String) {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<(&String, &Value)> =
                map.iter().filter(|(_, v)| !v.is_null()).collect();
            entries.sort_by(|a, b| a.0.cmp(b.0));
            out.push('{');
            for (i, (key, v)) in entries.into_iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                out.push_str(&Value::String(key.clone()).to_string());
                out.push(':');
                write_sorted(v, out);
            }
            out.push('}');
        }
        Value::Array(items) => {
            out.push('[');
            for (i, v) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_sorted(v, out);
            }
            out.push(']');
        }
        other => out.push_str(&other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cosmtx_crypto::{KeyAlgo, PrivateKey};
    use cosmtx_types::{AccAddress, Coins, MsgSend};
    use std::sync::Arc;

    fn signer_data(sk: &PrivateKey) -> SignerData {
        SignerData {
            address: sk.public_key().address(),
            chain_id: "test-1".into(),
            account_number: 12,
            sequence: 3,
            pubkey: sk.public_key(),
        }
    }

    fn builder_for(from: AccAddress) -> TxBuilder {
        let mut b = TxBuilder::new();
        b.set_msgs(vec![Arc::new(MsgSend {
            from_address: from,
            to_address: AccAddress::from([2; 20]),
            amount: Coins::parse("10atom").unwrap(),
        })]);
        b.set_fee_amount(Coins::parse("5atom").unwrap());
        b.set_gas_limit(100_000);
        b.set_memo("a<b>&c");
        b
    }

    #[test]
    fn canonical_json_sorts_and_escapes() {
        let v = json!({"b": 1, "a": {"d": "x<y", "c": null}, "e": [{"z": 1, "y": 2}]});
        assert_eq!(
            String::from_utf8(canonical_json(&v)).unwrap(),
            r#"{"a":{"d":"x\u003cy"},"b":1,"e":[{"y":2,"z":1}]}"#
        );
    }

    #[test]
    fn amino_doc_shape() {
        let sk = PrivateKey::generate(KeyAlgo::Secp256k1).unwrap();
        let b = builder_for(sk.public_key().address());
        let doc = amino_sign_doc(&signer_data(&sk), b.fee(), b.memo(), b.msgs(), 0).unwrap();
        assert_eq!(doc["account_number"], "12");
        assert_eq!(doc["sequence"], "3");
        assert_eq!(doc["fee"]["gas"], "100000");
        assert!(doc.get("timeout_height").is_none());
        assert!(doc["fee"].get("granter").is_none());
        assert_eq!(doc["msgs"][0]["type"], "cosmos-sdk/MsgSend");
    }

    #[tokio::test]
    async fn amino_bytes_stable_across_reserialization() {
        let sk = PrivateKey::generate(KeyAlgo::Secp256k1).unwrap();
        let b = builder_for(sk.public_key().address());
        let first = sign_bytes(SignMode::LegacyAminoJson, &signer_data(&sk), &b, None)
            .await
            .unwrap();
        let decoded =
            TxBuilder::decode(&b.encode(), &cosmtx_types::MsgRegistry::with_defaults()).unwrap();
        let second = sign_bytes(SignMode::LegacyAminoJson, &signer_data(&sk), &decoded, None)
            .await
            .unwrap();
        assert_eq!(first, second);
        let text = String::from_utf8(first).unwrap();
        assert!(text.starts_with(r#"{"account_number":"12","chain_id":"test-1","fee":"#));
        assert!(text.contains(r#""memo":"a\u003cb\u003e\u0026c""#));
    }

    #[tokio::test]
    async fn direct_bytes_decode_to_sign_doc() {
        let sk = PrivateKey::generate(KeyAlgo::Secp256k1).unwrap();
        let b = builder_for(sk.public_key().address());
        let bytes = sign_bytes(SignMode::Direct, &signer_data(&sk), &b, None).await.unwrap();
        let doc = SignDoc::decode(bytes.as_slice()).unwrap();
        assert_eq!(doc.body_bytes, b.body_bytes());
        assert_eq!(doc.auth_info_bytes, b.auth_info_bytes());
        assert_eq!(doc.account_number, 12);
    }

    #[tokio::test]
    async fn direct_aux_rejected_for_fee_payer() {
        let sk = PrivateKey::generate(KeyAlgo::Secp256k1).unwrap();
        let mut b = builder_for(sk.public_key().address());
        let err = sign_bytes(SignMode::DirectAux, &signer_data(&sk), &b, None)
            .await
            .unwrap_err();
        assert!(matches!(err, SdkError::InvalidSignMode(_)));

        b.set_fee_payer(Some(AccAddress::from([8; 20])));
        let bytes = sign_bytes(SignMode::DirectAux, &signer_data(&sk), &b, None)
            .await
            .unwrap();
        let doc = SignDocDirectAux::decode(bytes.as_slice()).unwrap();
        assert_eq!(doc.sequence, 3);
        assert_eq!(doc.public_key, Some(sk.public_key().to_any()));
    }

    #[tokio::test]
    async fn unspecified_mode_rejected() {
        let sk = PrivateKey::generate(KeyAlgo::Secp256k1).unwrap();
        let b = builder_for(sk.public_key().address());
        assert!(matches!(
            sign_bytes(SignMode::Unspecified, &signer_data(&sk), &b, None).await,
            Err(SdkError::InvalidSignMode(_))
        ));
    }
}
