//! Public and private key variants.
//!
//! Public keys travel as `Any` envelopes whose type URL names the algorithm.
//! Private keys serialise as `len ‖ type_url ‖ len ‖ key` so the keyring can
//! store any algorithm in one format.

use std::fmt;
use std::str::FromStr;

use base64::engine::general_purpose::STANDARD as B64;
use base64::Engine;
use prost::Message;
use serde_json::{json, Value};

use cosmtx_types::proto::{self, KeyBytes};
use cosmtx_types::{address_hash, encode_address, AccAddress, Any, Bech32Config, SdkError};

use crate::multisig::LegacyAminoMultisig;
use crate::{bls, ed25519, hash, secp256k1};

/// Signing algorithm of a single key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyAlgo {
    Secp256k1,
    Ed25519,
    Bls12_381,
}

impl KeyAlgo {
    pub fn as_str(&self) -> &'static str {
        match self {
            KeyAlgo::Secp256k1 => "secp256k1",
            KeyAlgo::Ed25519 => "ed25519",
            KeyAlgo::Bls12_381 => "bls12_381",
        }
    }
}

impl fmt::Display for KeyAlgo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for KeyAlgo {
    type Err = SdkError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "secp256k1" => Ok(KeyAlgo::Secp256k1),
            "ed25519" => Ok(KeyAlgo::Ed25519),
            "bls12_381" | "bls12-381" => Ok(KeyAlgo::Bls12_381),
            other => Err(SdkError::Keyring(format!("unsupported key algorithm {other:?}"))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PublicKey {
    Ed25519([u8; ed25519::PUBKEY_LEN]),
    Secp256k1([u8; secp256k1::PUBKEY_LEN]),
    Bls12_381([u8; bls::PUBKEY_LEN]),
    Multisig(LegacyAminoMultisig),
}

impl PublicKey {
    pub fn secp256k1(bytes: &[u8]) -> Result<Self, SdkError> {
        secp256k1::validate_pubkey(bytes)?;
        let mut key = [0u8; secp256k1::PUBKEY_LEN];
        key.copy_from_slice(bytes);
        Ok(PublicKey::Secp256k1(key))
    }

    pub fn ed25519(bytes: &[u8]) -> Result<Self, SdkError> {
        let key: [u8; ed25519::PUBKEY_LEN] = bytes.try_into().map_err(|_| {
            SdkError::InvalidPubKey(format!(
                "ed25519 key must be {} bytes, got {}",
                ed25519::PUBKEY_LEN,
                bytes.len()
            ))
        })?;
        Ok(PublicKey::Ed25519(key))
    }

    pub fn bls12_381(bytes: &[u8]) -> Result<Self, SdkError> {
        bls::validate_pubkey(bytes)?;
        let mut key = [0u8; bls::PUBKEY_LEN];
        key.copy_from_slice(bytes);
        Ok(PublicKey::Bls12_381(key))
    }

    pub fn type_url(&self) -> &'static str {
        match self {
            PublicKey::Ed25519(_) => proto::TYPE_URL_ED25519_PUBKEY,
            PublicKey::Secp256k1(_) => proto::TYPE_URL_SECP256K1_PUBKEY,
            PublicKey::Bls12_381(_) => proto::TYPE_URL_BLS12_381_PUBKEY,
            PublicKey::Multisig(_) => proto::TYPE_URL_MULTISIG_PUBKEY,
        }
    }

    /// Raw key bytes. For a multisig key, the protobuf encoding of the
    /// `LegacyAminoPubKey`.
    pub fn bytes(&self) -> Vec<u8> {
        match self {
            PublicKey::Ed25519(k) => k.to_vec(),
            PublicKey::Secp256k1(k) => k.to_vec(),
            PublicKey::Bls12_381(k) => k.to_vec(),
            PublicKey::Multisig(m) => m.to_proto().encode_to_vec(),
        }
    }

    pub fn to_any(&self) -> Any {
        match self {
            PublicKey::Multisig(m) => Any::pack(self.type_url(), &m.to_proto()),
            _ => Any::pack(self.type_url(), &KeyBytes { key: self.bytes() }),
        }
    }

    pub fn from_any(any: &Any) -> Result<Self, SdkError> {
        let single = |url: &str| -> Result<Vec<u8>, SdkError> {
            any.unpack::<KeyBytes>(url)
                .map(|k| k.key)
                .map_err(|e| SdkError::InvalidPubKey(e.to_string()))
        };
        match any.type_url.as_str() {
            proto::TYPE_URL_ED25519_PUBKEY => Self::ed25519(&single(proto::TYPE_URL_ED25519_PUBKEY)?),
            proto::TYPE_URL_SECP256K1_PUBKEY => {
                Self::secp256k1(&single(proto::TYPE_URL_SECP256K1_PUBKEY)?)
            }
            proto::TYPE_URL_BLS12_381_PUBKEY => {
                Self::bls12_381(&single(proto::TYPE_URL_BLS12_381_PUBKEY)?)
            }
            proto::TYPE_URL_MULTISIG_PUBKEY => {
                let msg: proto::LegacyAminoPubKey = any
                    .unpack(proto::TYPE_URL_MULTISIG_PUBKEY)
                    .map_err(|e| SdkError::InvalidPubKey(e.to_string()))?;
                Ok(PublicKey::Multisig(LegacyAminoMultisig::from_proto(&msg)?))
            }
            other => Err(SdkError::InvalidPubKey(format!("unknown public key type {other}"))),
        }
    }

    /// Proto-JSON rendering: `{"@type": url, "key": base64}`.
    pub fn to_json(&self) -> Value {
        match self {
            PublicKey::Multisig(m) => json!({
                "@type": self.type_url(),
                "threshold": m.threshold,
                "public_keys": m.pubkeys.iter().map(PublicKey::to_json).collect::<Vec<_>>(),
            }),
            _ => json!({
                "@type": self.type_url(),
                "key": B64.encode(self.bytes()),
            }),
        }
    }

    pub fn from_json(value: &Value) -> Result<Self, SdkError> {
        let url = value
            .get("@type")
            .and_then(Value::as_str)
            .ok_or_else(|| SdkError::InvalidPubKey("missing @type".into()))?;
        if url == proto::TYPE_URL_MULTISIG_PUBKEY {
            let threshold = value
                .get("threshold")
                .and_then(|t| t.as_u64().or_else(|| t.as_str().and_then(|s| s.parse().ok())))
                .ok_or_else(|| SdkError::InvalidPubKey("missing threshold".into()))?;
            let members = value
                .get("public_keys")
                .and_then(Value::as_array)
                .ok_or_else(|| SdkError::InvalidPubKey("missing public_keys".into()))?
                .iter()
                .map(PublicKey::from_json)
                .collect::<Result<Vec<_>, _>>()?;
            let threshold = u32::try_from(threshold)
                .map_err(|_| SdkError::InvalidPubKey("threshold out of range".into()))?;
            return Ok(PublicKey::Multisig(LegacyAminoMultisig::new(threshold, members)?));
        }
        let key = value
            .get("key")
            .and_then(Value::as_str)
            .ok_or_else(|| SdkError::InvalidPubKey("missing key".into()))?;
        let key = B64
            .decode(key)
            .map_err(|e| SdkError::InvalidPubKey(format!("key is not base64: {e}")))?;
        match url {
            proto::TYPE_URL_ED25519_PUBKEY => Self::ed25519(&key),
            proto::TYPE_URL_SECP256K1_PUBKEY => Self::secp256k1(&key),
            proto::TYPE_URL_BLS12_381_PUBKEY => Self::bls12_381(&key),
            other => Err(SdkError::InvalidPubKey(format!("unknown public key type {other}"))),
        }
    }

    /// Account address derived from the key.
    pub fn address(&self) -> AccAddress {
        let bytes = match self {
            PublicKey::Ed25519(k) => hash::sha256_truncated(k),
            PublicKey::Bls12_381(k) => hash::sha256_truncated(k),
            PublicKey::Secp256k1(k) => hash::hash160(k),
            PublicKey::Multisig(_) => address_hash(self.type_url(), &self.bytes()),
        };
        AccAddress::from(bytes)
    }

    /// Type-tagged address: `SHA-256(SHA-256(type_url) ‖ key)[:20]`.
    pub fn address_basic(&self) -> AccAddress {
        AccAddress::from(address_hash(self.type_url(), &self.bytes()))
    }

    /// Bech32 rendering with the account-pub prefix.
    pub fn to_bech32(&self) -> Result<String, SdkError> {
        encode_address(&Bech32Config::global().account_pub, &self.bytes())
    }

    /// Verify a single-key signature. Multisig keys always return false here;
    /// use [`LegacyAminoMultisig::verify`] with the signer bitmap.
    pub fn verify(&self, msg: &[u8], sig: &[u8]) -> bool {
        match self {
            PublicKey::Ed25519(k) => ed25519::verify(k, msg, sig),
            PublicKey::Secp256k1(k) => secp256k1::verify(k, msg, sig),
            PublicKey::Bls12_381(k) => bls::verify(k, msg, sig),
            PublicKey::Multisig(_) => false,
        }
    }

    /// Length of a signature produced by this key, used for simulation.
    pub fn signature_len(&self) -> usize {
        match self {
            PublicKey::Ed25519(_) => ed25519::SIGNATURE_LEN,
            PublicKey::Secp256k1(_) => secp256k1::SIGNATURE_LEN,
            PublicKey::Bls12_381(_) => bls::SIGNATURE_LEN,
            PublicKey::Multisig(m) => m.sim_signature_bytes().len(),
        }
    }
}

#[derive(Clone)]
pub enum PrivateKey {
    Ed25519(ed25519_dalek::SigningKey),
    Secp256k1(k256::ecdsa::SigningKey),
    Bls12_381(blst::min_pk::SecretKey),
}

impl PrivateKey {
    pub fn generate(algo: KeyAlgo) -> Result<Self, SdkError> {
        Ok(match algo {
            KeyAlgo::Secp256k1 => PrivateKey::Secp256k1(secp256k1::generate()?),
            KeyAlgo::Ed25519 => PrivateKey::Ed25519(ed25519::generate()?),
            KeyAlgo::Bls12_381 => PrivateKey::Bls12_381(bls::generate()?),
        })
    }

    pub fn from_raw(algo: KeyAlgo, bytes: &[u8]) -> Result<Self, SdkError> {
        Ok(match algo {
            KeyAlgo::Secp256k1 => PrivateKey::Secp256k1(secp256k1::signing_key_from_bytes(bytes)?),
            KeyAlgo::Ed25519 => PrivateKey::Ed25519(ed25519::signing_key_from_bytes(bytes)?),
            KeyAlgo::Bls12_381 => PrivateKey::Bls12_381(bls::secret_key_from_bytes(bytes)?),
        })
    }

    pub fn algo(&self) -> KeyAlgo {
        match self {
            PrivateKey::Ed25519(_) => KeyAlgo::Ed25519,
            PrivateKey::Secp256k1(_) => KeyAlgo::Secp256k1,
            PrivateKey::Bls12_381(_) => KeyAlgo::Bls12_381,
        }
    }

    pub fn type_url(&self) -> &'static str {
        match self {
            PrivateKey::Ed25519(_) => proto::TYPE_URL_ED25519_PRIVKEY,
            PrivateKey::Secp256k1(_) => proto::TYPE_URL_SECP256K1_PRIVKEY,
            PrivateKey::Bls12_381(_) => proto::TYPE_URL_BLS12_381_PRIVKEY,
        }
    }

    pub fn public_key(&self) -> PublicKey {
        match self {
            PrivateKey::Ed25519(k) => PublicKey::Ed25519(k.verifying_key().to_bytes()),
            PrivateKey::Secp256k1(k) => PublicKey::Secp256k1(secp256k1::public_key(k)),
            PrivateKey::Bls12_381(k) => PublicKey::Bls12_381(bls::public_key(k)),
        }
    }

    pub fn sign(&self, msg: &[u8]) -> Result<Vec<u8>, SdkError> {
        Ok(match self {
            PrivateKey::Ed25519(k) => ed25519::sign(k, msg).to_vec(),
            PrivateKey::Secp256k1(k) => secp256k1::sign(k, msg).to_vec(),
            PrivateKey::Bls12_381(k) => bls::sign(k, msg)?.to_vec(),
        })
    }

    fn raw_bytes(&self) -> zeroize::Zeroizing<Vec<u8>> {
        zeroize::Zeroizing::new(match self {
            PrivateKey::Ed25519(k) => k.to_bytes().to_vec(),
            PrivateKey::Secp256k1(k) => k.to_bytes().to_vec(),
            PrivateKey::Bls12_381(k) => k.to_bytes().to_vec(),
        })
    }

    /// `len(type_url) ‖ type_url ‖ len(key) ‖ key`, lengths as single bytes.
    pub fn to_bytes(&self) -> zeroize::Zeroizing<Vec<u8>> {
        let url = self.type_url().as_bytes();
        let raw = self.raw_bytes();
        let mut out = Vec::with_capacity(2 + url.len() + raw.len());
        out.push(url.len() as u8);
        out.extend_from_slice(url);
        out.push(raw.len() as u8);
        out.extend_from_slice(&raw);
        zeroize::Zeroizing::new(out)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, SdkError> {
        let malformed = || SdkError::Keyring("malformed private key encoding".into());
        let (&url_len, rest) = bytes.split_first().ok_or_else(malformed)?;
        let url_len = url_len as usize;
        if rest.len() < url_len + 1 {
            return Err(malformed());
        }
        let url = std::str::from_utf8(&rest[..url_len]).map_err(|_| malformed())?;
        let key_len = rest[url_len] as usize;
        let key = &rest[url_len + 1..];
        if key.len() != key_len {
            return Err(malformed());
        }
        let algo = match url {
            proto::TYPE_URL_SECP256K1_PRIVKEY => KeyAlgo::Secp256k1,
            proto::TYPE_URL_ED25519_PRIVKEY => KeyAlgo::Ed25519,
            proto::TYPE_URL_BLS12_381_PRIVKEY => KeyAlgo::Bls12_381,
            other => return Err(SdkError::Keyring(format!("unknown private key type {other}"))),
        };
        Self::from_raw(algo, key)
    }
}

impl fmt::Debug for PrivateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PrivateKey")
            .field("algo", &self.algo())
            .field("key", &"<redacted>")
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const GENERATOR: &str = "0279be667ef9dcbbac55a06295ce870b07029bfcdb2dce28d959f2815b16f81798";

    fn generator_key() -> PublicKey {
        PublicKey::secp256k1(&hex::decode(GENERATOR).unwrap()).unwrap()
    }

    #[test]
    fn secp256k1_address_is_hash160() {
        assert_eq!(
            hex::encode(generator_key().address().as_bytes()),
            "751e76e8199196d454941c45d1b3a323f1433bd6"
        );
    }

    #[test]
    fn address_basic_is_type_tagged() {
        let pk = generator_key();
        assert_eq!(
            hex::encode(pk.address_basic().as_bytes()),
            "b1d982f3cd12543130cfa203ad39276a192cfdd7"
        );
        assert_ne!(pk.address_basic(), pk.address());
    }

    #[test]
    fn ed25519_address_is_truncated_sha256() {
        let pk = PublicKey::Ed25519([1u8; 32]);
        assert_eq!(pk.address().as_bytes(), &hash::sha256(&[1u8; 32])[..20]);
    }

    #[test]
    fn any_roundtrip_all_variants() {
        let keys = [
            PrivateKey::generate(KeyAlgo::Secp256k1).unwrap().public_key(),
            PrivateKey::generate(KeyAlgo::Ed25519).unwrap().public_key(),
            PrivateKey::generate(KeyAlgo::Bls12_381).unwrap().public_key(),
        ];
        for pk in &keys {
            assert_eq!(&PublicKey::from_any(&pk.to_any()).unwrap(), pk);
            assert_eq!(&PublicKey::from_json(&pk.to_json()).unwrap(), pk);
        }
        let multi = PublicKey::Multisig(LegacyAminoMultisig::new(2, keys.to_vec()).unwrap());
        assert_eq!(PublicKey::from_any(&multi.to_any()).unwrap(), multi);
        assert_eq!(PublicKey::from_json(&multi.to_json()).unwrap(), multi);
    }

    #[test]
    fn unknown_type_url_rejected() {
        let any = Any::pack("/cosmos.crypto.sr25519.PubKey", &KeyBytes { key: vec![1; 32] });
        assert!(matches!(PublicKey::from_any(&any), Err(SdkError::InvalidPubKey(_))));
    }

    #[test]
    fn wrong_length_rejected() {
        let any = Any::pack(proto::TYPE_URL_SECP256K1_PUBKEY, &KeyBytes { key: vec![2; 32] });
        assert!(matches!(PublicKey::from_any(&any), Err(SdkError::InvalidPubKey(_))));
        assert!(PublicKey::ed25519(&[0; 33]).is_err());
    }

    #[test]
    fn json_shape() {
        let json = generator_key().to_json();
        assert_eq!(json["@type"], proto::TYPE_URL_SECP256K1_PUBKEY);
        assert_eq!(json["key"], "Anm+Zn753LusVaBilc6HCwcCm/zbLc4o2VnygVsW+BeY");
    }

    #[test]
    fn private_key_bytes_roundtrip() {
        for algo in [KeyAlgo::Secp256k1, KeyAlgo::Ed25519, KeyAlgo::Bls12_381] {
            let sk = PrivateKey::generate(algo).unwrap();
            let encoded = sk.to_bytes();
            assert_eq!(encoded[0] as usize, sk.type_url().len());
            let back = PrivateKey::from_bytes(&encoded).unwrap();
            assert_eq!(back.public_key(), sk.public_key());
        }
        assert!(PrivateKey::from_bytes(&[3, b'a']).is_err());
    }

    #[test]
    fn sign_verify_each_algo() {
        for algo in [KeyAlgo::Secp256k1, KeyAlgo::Ed25519, KeyAlgo::Bls12_381] {
            let sk = PrivateKey::generate(algo).unwrap();
            let sig = sk.sign(b"payload").unwrap();
            assert_eq!(sig.len(), sk.public_key().signature_len());
            assert!(sk.public_key().verify(b"payload", &sig));
        }
    }

    #[test]
    fn debug_redacts_secret() {
        let sk = PrivateKey::generate(KeyAlgo::Ed25519).unwrap();
        let shown = format!("{sk:?}");
        assert!(shown.contains("redacted"));
    }
}
