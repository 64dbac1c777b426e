//! Account addresses and their bech32 rendering.
//!
//! An address is an opaque byte string (20 bytes for key-derived accounts,
//! 32 for module or composite accounts). Externally it is always bech32
//! with a chain-specific human-readable prefix.

use bech32::{FromBase32, ToBase32, Variant};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest, Sha256};
use std::fmt;
use std::sync::OnceLock;

use crate::error::SdkError;

/// Longest address accepted, matching the store key length prefix (one byte).
pub const MAX_ADDR_LEN: usize = 255;

/// Human-readable prefixes for one chain. Frozen once installed.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bech32Config {
    pub account_addr: String,
    pub account_pub: String,
    pub validator_addr: String,
    pub validator_pub: String,
    pub consensus_addr: String,
    pub consensus_pub: String,
}

impl Bech32Config {
    /// Derive the six prefixes from a main prefix, e.g. `cosmos`.
    pub fn from_main_prefix(main: &str) -> Self {
        Self {
            account_addr: main.to_string(),
            account_pub: format!("{main}pub"),
            validator_addr: format!("{main}valoper"),
            validator_pub: format!("{main}valoperpub"),
            consensus_addr: format!("{main}valcons"),
            consensus_pub: format!("{main}valconspub"),
        }
    }

    /// Install the process-wide prefixes. A second install with different
    /// prefixes is rejected.
    pub fn install(self) -> Result<(), SdkError> {
        let installed = GLOBAL.get_or_init(|| self.clone());
        if *installed == self {
            Ok(())
        } else {
            Err(SdkError::Logic(format!(
                "bech32 prefixes already frozen as {}",
                installed.account_addr
            )))
        }
    }

    /// The installed prefixes, or the `cosmos` defaults.
    pub fn global() -> &'static Bech32Config {
        GLOBAL.get_or_init(Bech32Config::default)
    }
}

impl Default for Bech32Config {
    fn default() -> Self {
        Self::from_main_prefix("cosmos")
    }
}

static GLOBAL: OnceLock<Bech32Config> = OnceLock::new();

/// Bech32-encode `bytes` under `prefix`.
pub fn encode_address(prefix: &str, bytes: &[u8]) -> Result<String, SdkError> {
    bech32::encode(prefix, bytes.to_base32(), Variant::Bech32)
        .map_err(|e| SdkError::InvalidAddress(e.to_string()))
}

/// Decode bech32 text into its prefix and payload bytes.
pub fn decode_address(text: &str) -> Result<(String, Vec<u8>), SdkError> {
    let (hrp, data, variant) =
        bech32::decode(text).map_err(|e| SdkError::InvalidAddress(format!("{text}: {e}")))?;
    if variant != Variant::Bech32 {
        return Err(SdkError::InvalidAddress(format!("{text}: not bech32")));
    }
    let bytes =
        Vec::<u8>::from_base32(&data).map_err(|e| SdkError::InvalidAddress(e.to_string()))?;
    Ok((hrp, bytes))
}

/// `SHA-256(SHA-256(type_name) ‖ key)[..20]`, the type-tagged address hash.
pub fn address_hash(type_name: &str, key: &[u8]) -> [u8; 20] {
    let type_hash = Sha256::digest(type_name.as_bytes());
    let mut hasher = Sha256::new();
    hasher.update(type_hash);
    hasher.update(key);
    let full = hasher.finalize();
    let mut out = [0u8; 20];
    out.copy_from_slice(&full[..20]);
    out
}

/// Address of a module account: `SHA-256("module" ‖ name)` truncated to 20 bytes.
pub fn module_address(name: &str) -> AccAddress {
    AccAddress(address_hash("module", name.as_bytes()).to_vec())
}

/// An account address.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AccAddress(Vec<u8>);

impl AccAddress {
    pub fn new(bytes: impl Into<Vec<u8>>) -> Result<Self, SdkError> {
        let bytes = bytes.into();
        if bytes.is_empty() || bytes.len() > MAX_ADDR_LEN {
            return Err(SdkError::InvalidAddress(format!(
                "address length {} out of range",
                bytes.len()
            )));
        }
        Ok(Self(bytes))
    }

    /// Decode and check the prefix against `expected_prefix`.
    pub fn from_bech32(text: &str, expected_prefix: &str) -> Result<Self, SdkError> {
        let (hrp, bytes) = decode_address(text)?;
        if hrp != expected_prefix {
            return Err(SdkError::InvalidAddress(format!(
                "invalid bech32 prefix; expected {expected_prefix}, got {hrp}"
            )));
        }
        Self::new(bytes)
    }

    /// Decode with the installed account prefix.
    pub fn from_account_bech32(text: &str) -> Result<Self, SdkError> {
        Self::from_bech32(text, &Bech32Config::global().account_addr)
    }

    pub fn to_bech32(&self, prefix: &str) -> String {
        // Payload length is bounded by MAX_ADDR_LEN and prefixes are validated
        // on install, so only an invalid caller prefix can fail here.
        encode_address(prefix, &self.0).unwrap_or_default()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<[u8; 20]> for AccAddress {
    fn from(bytes: [u8; 20]) -> Self {
        Self(bytes.to_vec())
    }
}

impl fmt::Display for AccAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_bech32(&Bech32Config::global().account_addr))
    }
}

impl fmt::Debug for AccAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AccAddress({self})")
    }
}

impl Serialize for AccAddress {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for AccAddress {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        AccAddress::from_account_bech32(&s).map_err(serde::de::Error::custom)
    }
}

impl std::str::FromStr for AccAddress {
    type Err = SdkError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        AccAddress::from_account_bech32(s)
    }
}
