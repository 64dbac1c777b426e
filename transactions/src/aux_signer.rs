//! Signing by parties who do not pay the fee.
//!
//! An aux signer signs only the body (plus its own account data) with
//! [`AuxBuilder`] and hands the resulting [`AuxSignerData`] to the fee payer.
//! [`AuxTxAssembler`] merges those into one transaction, which the fee payer
//! then signs with DIRECT last.

use base64::engine::general_purpose::STANDARD as B64;
use base64::Engine;
use prost::Message;
use serde_json::{json, Value};
use tracing::debug;

use cosmtx_crypto::PublicKey;
use cosmtx_types::proto::{self, SignDocDirectAux};
use cosmtx_types::{AccAddress, Any, MsgRef, MsgRegistry, SdkError, SignMode};

use crate::builder::{Fee, TxBuilder};
use crate::factory::Factory;
use crate::sign_mode::{amino_sign_doc, canonical_json, direct_aux_sign_doc};
use crate::signer::sign_with_exemptions;
use crate::signing::{SignatureData, SignatureV2, SignerData};

/// One aux signer's contribution.
#[derive(Debug, Clone, PartialEq)]
pub struct AuxSignerData {
    pub address: AccAddress,
    pub sign_doc: SignDocDirectAux,
    pub mode: SignMode,
    pub sig: Vec<u8>,
}

impl AuxSignerData {
    pub fn to_proto(&self) -> proto::AuxSignerData {
        proto::AuxSignerData {
            address: self.address.to_string(),
            sign_doc: Some(self.sign_doc.clone()),
            mode: self.mode.as_i32(),
            sig: self.sig.clone(),
        }
    }

    pub fn from_proto(data: &proto::AuxSignerData) -> Result<Self, SdkError> {
        Ok(Self {
            address: AccAddress::from_account_bech32(&data.address)?,
            sign_doc: data
                .sign_doc
                .clone()
                .ok_or_else(|| SdkError::Serialization("aux signer data without sign doc".into()))?,
            mode: SignMode::from_i32(data.mode)?,
            sig: data.sig.clone(),
        })
    }

    pub fn public_key(&self) -> Result<PublicKey, SdkError> {
        let any = self.sign_doc.public_key.as_ref().ok_or(SdkError::EmptyPubKey)?;
        PublicKey::from_any(any)
    }

    pub fn to_json(&self) -> Result<Value, SdkError> {
        let doc = &self.sign_doc;
        Ok(json!({
            "address": self.address.to_string(),
            "sign_doc": {
                "body_bytes": B64.encode(&doc.body_bytes),
                "public_key": self.public_key()?.to_json(),
                "chain_id": doc.chain_id,
                "account_number": doc.account_number.to_string(),
                "sequence": doc.sequence.to_string(),
            },
            "mode": self.mode.as_proto_name(),
            "sig": B64.encode(&self.sig),
        }))
    }

    pub fn from_json(value: &Value) -> Result<Self, SdkError> {
        let text = |v: &Value, field: &str| -> Result<String, SdkError> {
            v.get(field)
                .and_then(Value::as_str)
                .map(str::to_string)
                .ok_or_else(|| SdkError::Serialization(format!("aux signer data: missing {field}")))
        };
        let bytes = |v: &Value, field: &str| -> Result<Vec<u8>, SdkError> {
            B64.decode(text(v, field)?)
                .map_err(|e| SdkError::Serialization(format!("aux signer data: {field}: {e}")))
        };
        let number = |v: &Value, field: &str| -> Result<u64, SdkError> {
            text(v, field)?
                .parse()
                .map_err(|e| SdkError::Serialization(format!("aux signer data: {field}: {e}")))
        };

        let doc = value
            .get("sign_doc")
            .ok_or_else(|| SdkError::Serialization("aux signer data: missing sign_doc".into()))?;
        let public_key = match doc.get("public_key") {
            Some(pk) if !pk.is_null() => Some(PublicKey::from_json(pk)?.to_any()),
            _ => None,
        };
        Ok(Self {
            address: AccAddress::from_account_bech32(&text(value, "address")?)?,
            sign_doc: SignDocDirectAux {
                body_bytes: bytes(doc, "body_bytes")?,
                public_key,
                chain_id: text(doc, "chain_id")?,
                account_number: number(doc, "account_number")?,
                sequence: number(doc, "sequence")?,
            },
            mode: SignMode::from_proto_name(&text(value, "mode")?)?,
            sig: bytes(value, "sig")?,
        })
    }
}

/// Accumulates an aux signer's view of a transaction.
#[derive(Debug, Clone, Default)]
pub struct AuxBuilder {
    msgs: Vec<MsgRef>,
    memo: String,
    timeout_height: u64,
    extension_options: Vec<Any>,
    non_critical_extension_options: Vec<Any>,
    account_number: u64,
    sequence: u64,
    chain_id: String,
    pubkey: Option<PublicKey>,
    address: Option<AccAddress>,
    mode: SignMode,
    sig: Vec<u8>,
}

impl AuxBuilder {
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

    pub fn set_account_number(&mut self, n: u64) {
        self.account_number = n;
    }

    pub fn set_sequence(&mut self, seq: u64) {
        self.sequence = seq;
    }

    pub fn set_chain_id(&mut self, chain_id: impl Into<String>) {
        self.chain_id = chain_id.into();
    }

    pub fn set_pub_key(&mut self, pubkey: PublicKey) {
        self.pubkey = Some(pubkey);
    }

    pub fn set_address(&mut self, address: AccAddress) {
        self.address = Some(address);
    }

    pub fn set_sign_mode(&mut self, mode: SignMode) {
        self.mode = mode;
    }

    pub fn set_signature(&mut self, sig: Vec<u8>) {
        self.sig = sig;
    }

    fn body(&self) -> proto::TxBody {
        proto::TxBody {
            messages: self.msgs.iter().map(|m| m.to_any()).collect(),
            memo: self.memo.clone(),
            timeout_height: self.timeout_height,
            extension_options: self.extension_options.clone(),
            non_critical_extension_options: self.non_critical_extension_options.clone(),
        }
    }

    fn signer_data(&self) -> Result<SignerData, SdkError> {
        let pubkey = self.pubkey.clone().ok_or(SdkError::EmptyPubKey)?;
        if self.msgs.is_empty() || self.chain_id.is_empty() {
            return Err(SdkError::Logic(
                "aux tx is incomplete, call setters on AuxBuilder first".into(),
            ));
        }
        Ok(SignerData {
            address: self.address.clone().unwrap_or_else(|| pubkey.address()),
            chain_id: self.chain_id.clone(),
            account_number: self.account_number,
            sequence: self.sequence,
            pubkey,
        })
    }

    fn sign_doc(&self) -> Result<SignDocDirectAux, SdkError> {
        let signer = self.signer_data()?;
        Ok(direct_aux_sign_doc(self.body().encode_to_vec(), &signer))
    }

    /// Bytes the aux signer signs. Only DIRECT_AUX and LEGACY_AMINO_JSON are
    /// valid here.
    pub fn get_sign_bytes(&self) -> Result<Vec<u8>, SdkError> {
        let signer = self.signer_data()?;
        match self.mode {
            SignMode::DirectAux => Ok(direct_aux_sign_doc(self.body().encode_to_vec(), &signer).encode_to_vec()),
            SignMode::LegacyAminoJson => {
                let doc = amino_sign_doc(
                    &signer,
                    &Fee::default(),
                    &self.memo,
                    &self.msgs,
                    self.timeout_height,
                )?;
                Ok(canonical_json(&doc))
            }
            other => Err(SdkError::InvalidSignMode(format!(
                "{} cannot be used by an aux signer",
                other.as_proto_name()
            ))),
        }
    }

    pub fn get_aux_signer_data(&self) -> Result<AuxSignerData, SdkError> {
        let address = self
            .address
            .clone()
            .ok_or_else(|| SdkError::Logic("address cannot be empty: call set_address".into()))?;
        if self.sig.is_empty() {
            return Err(SdkError::Logic("signature cannot be empty: call set_signature".into()));
        }
        Ok(AuxSignerData {
            address,
            sign_doc: self.sign_doc()?,
            mode: self.mode,
            sig: self.sig.clone(),
        })
    }
}

/// Composes aux signatures and fee information into one transaction.
pub struct AuxTxAssembler<'a> {
    registry: &'a MsgRegistry,
}

impl<'a> AuxTxAssembler<'a> {
    pub fn new(registry: &'a MsgRegistry) -> Self {
        Self { registry }
    }

    /// Build the unsigned-by-payer transaction. Every aux signer must have
    /// signed the same body for the factory's chain.
    pub fn assemble(&self, factory: &Factory, aux: &[AuxSignerData]) -> Result<TxBuilder, SdkError> {
        let first = aux
            .first()
            .ok_or_else(|| SdkError::InvalidRequest("no aux signer data to assemble".into()))?;
        let body_bytes = &first.sign_doc.body_bytes;
        for data in aux {
            if &data.sign_doc.body_bytes != body_bytes {
                return Err(SdkError::InvalidRequest(format!(
                    "aux signer {} signed a different body",
                    data.address
                )));
            }
            if data.sign_doc.chain_id != factory.chain_id() {
                return Err(SdkError::InvalidChainId(format!(
                    "aux signer {} signed for chain {}",
                    data.address, data.sign_doc.chain_id
                )));
            }
        }

        let body = proto::TxBody::decode(body_bytes.as_slice())?;
        let msgs = body
            .messages
            .iter()
            .map(|any| self.registry.decode_any(any))
            .collect::<Result<Vec<_>, _>>()?;
        let mut builder = factory
            .clone()
            .with_memo(body.memo)
            .with_timeout_height(body.timeout_height)
            .with_extension_options(body.extension_options)
            .with_non_critical_extension_options(body.non_critical_extension_options)
            .build_unsigned(msgs)?;

        let signers = builder.signers();
        let mut signatures = aux
            .iter()
            .map(|data| {
                let pubkey = data.public_key()?;
                if pubkey.address() != data.address {
                    return Err(SdkError::InvalidPubKey(format!(
                        "public key does not match aux signer {}",
                        data.address
                    )));
                }
                if !signers.contains(&data.address) {
                    return Err(SdkError::InvalidSigner(format!(
                        "{} is not a signer of this transaction",
                        data.address
                    )));
                }
                Ok(SignatureV2 {
                    pubkey,
                    data: SignatureData::Single { mode: data.mode, signature: data.sig.clone() },
                    sequence: data.sign_doc.sequence,
                })
            })
            .collect::<Result<Vec<_>, SdkError>>()?;
        signatures.sort_by_key(|s| {
            let addr = s.address();
            signers.iter().position(|a| *a == addr).unwrap_or(usize::MAX)
        });
        builder.set_signatures(signatures);
        debug!(aux_signers = aux.len(), "assembled aux transaction");
        Ok(builder)
    }

    /// Add the fee payer's DIRECT signature. Aux signatures do not count as
    /// other DIRECT signers.
    pub async fn sign_fee_payer(
        &self,
        factory: &Factory,
        key_name: &str,
        builder: &mut TxBuilder,
        aux: &[AuxSignerData],
    ) -> Result<(), SdkError> {
        let exempt: Vec<AccAddress> = aux.iter().map(|d| d.address.clone()).collect();
        let payer = factory.clone().with_sign_mode(SignMode::Direct);
        sign_with_exemptions(&payer, key_name, builder, false, &exempt).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use cosmtx_crypto::{KeyAlgo, PrivateKey};
    use cosmtx_keyring::{Keyring, LocalKeyring};
    use cosmtx_types::{Coins, MsgSend};

    fn send(from: &AccAddress) -> MsgRef {
        Arc::new(MsgSend {
            from_address: from.clone(),
            to_address: AccAddress::from([9; 20]),
            amount: Coins::parse("3atom").unwrap(),
        })
    }

    fn aux_builder(sk: &PrivateKey, mode: SignMode) -> AuxBuilder {
        let pk = sk.public_key();
        let mut b = AuxBuilder::new();
        b.set_msgs(vec![send(&pk.address())]);
        b.set_memo("aux");
        b.set_chain_id("test-1");
        b.set_account_number(4);
        b.set_sequence(2);
        b.set_address(pk.address());
        b.set_pub_key(pk);
        b.set_sign_mode(mode);
        b
    }

    #[test]
    fn sign_bytes_preconditions() {
        let mut empty = AuxBuilder::new();
        empty.set_sign_mode(SignMode::DirectAux);
        assert_eq!(empty.get_sign_bytes().unwrap_err(), SdkError::EmptyPubKey);

        let sk = PrivateKey::generate(KeyAlgo::Secp256k1).unwrap();
        let mut no_msgs = AuxBuilder::new();
        no_msgs.set_pub_key(sk.public_key());
        no_msgs.set_sign_mode(SignMode::DirectAux);
        assert!(matches!(no_msgs.get_sign_bytes(), Err(SdkError::Logic(_))));

        let direct = aux_builder(&sk, SignMode::Direct);
        assert!(matches!(direct.get_sign_bytes(), Err(SdkError::InvalidSignMode(_))));
    }

    #[test]
    fn direct_aux_sign_bytes_decode() {
        let sk = PrivateKey::generate(KeyAlgo::Secp256k1).unwrap();
        let b = aux_builder(&sk, SignMode::DirectAux);
        let doc = SignDocDirectAux::decode(b.get_sign_bytes().unwrap().as_slice()).unwrap();
        assert_eq!(doc.chain_id, "test-1");
        assert_eq!((doc.account_number, doc.sequence), (4, 2));
        assert_eq!(doc.public_key, Some(sk.public_key().to_any()));
    }

    #[test]
    fn amino_sign_bytes_have_empty_fee() {
        let sk = PrivateKey::generate(KeyAlgo::Secp256k1).unwrap();
        let b = aux_builder(&sk, SignMode::LegacyAminoJson);
        let text = String::from_utf8(b.get_sign_bytes().unwrap()).unwrap();
        assert!(text.contains(r#""fee":{"amount":[],"gas":"0"}"#));
    }

    #[test]
    fn signer_data_requires_signature() {
        let sk = PrivateKey::generate(KeyAlgo::Secp256k1).unwrap();
        let mut b = aux_builder(&sk, SignMode::DirectAux);
        assert_eq!(
            b.get_aux_signer_data(),
            Err(SdkError::Logic("signature cannot be empty: call set_signature".into()))
        );

        let sig = sk.sign(&b.get_sign_bytes().unwrap()).unwrap();
        b.set_signature(sig.clone());
        let data = b.get_aux_signer_data().unwrap();
        assert_eq!(data.sig, sig);
        assert_eq!(AuxSignerData::from_proto(&data.to_proto()).unwrap(), data);
        assert_eq!(AuxSignerData::from_json(&data.to_json().unwrap()).unwrap(), data);
    }

    #[tokio::test]
    async fn assemble_and_pay() {
        let tipper = PrivateKey::generate(KeyAlgo::Secp256k1).unwrap();
        let mut b = aux_builder(&tipper, SignMode::DirectAux);
        b.set_signature(tipper.sign(&b.get_sign_bytes().unwrap()).unwrap());
        let aux = vec![b.get_aux_signer_data().unwrap()];

        let keyring = Arc::new(LocalKeyring::in_memory());
        let payer = keyring.generate("payer", KeyAlgo::Secp256k1).unwrap().address();
        let factory = Factory::new("test-1")
            .with_keyring(keyring.clone())
            .with_fee_payer(Some(payer.clone()))
            .with_account_number(11);
        let registry = MsgRegistry::with_defaults();
        let assembler = AuxTxAssembler::new(&registry);

        let mut tx = assembler.assemble(&factory, &aux).unwrap();
        assert_eq!(tx.memo(), "aux");
        assert_eq!(tx.body_bytes(), aux[0].sign_doc.body_bytes);

        assembler.sign_fee_payer(&factory, "payer", &mut tx, &aux).await.unwrap();
        let addrs: Vec<_> = tx.signatures().iter().map(SignatureV2::address).collect();
        assert_eq!(addrs, vec![tipper.public_key().address(), payer]);
        assert_eq!(tx.signatures()[1].data.modes(), vec![SignMode::Direct]);
        assert!(keyring.key("payer").is_ok());
    }

    #[test]
    fn assemble_rejects_mismatched_bodies() {
        let a = PrivateKey::generate(KeyAlgo::Secp256k1).unwrap();
        let b = PrivateKey::generate(KeyAlgo::Secp256k1).unwrap();
        let mut ba = aux_builder(&a, SignMode::DirectAux);
        ba.set_signature(vec![1; 64]);
        let mut bb = aux_builder(&b, SignMode::DirectAux);
        bb.set_signature(vec![1; 64]);
        let aux = vec![ba.get_aux_signer_data().unwrap(), bb.get_aux_signer_data().unwrap()];

        let registry = MsgRegistry::with_defaults();
        let err = AuxTxAssembler::new(&registry)
            .assemble(&Factory::new("test-1"), &aux)
            .unwrap_err();
        assert!(matches!(err, SdkError::InvalidRequest(_)));
    }
}
