//! Signing and broadcast mode discriminants with their wire values.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::SdkError;

/// How sign bytes are derived. Recorded in each `SignerInfo`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SignMode {
    #[default]
    Unspecified,
    Direct,
    Textual,
    DirectAux,
    LegacyAminoJson,
}

impl SignMode {
    pub fn as_i32(&self) -> i32 {
        match self {
            SignMode::Unspecified => 0,
            SignMode::Direct => 1,
            SignMode::Textual => 2,
            SignMode::DirectAux => 3,
            SignMode::LegacyAminoJson => 127,
        }
    }

    pub fn from_i32(v: i32) -> Result<Self, SdkError> {
        match v {
            0 => Ok(SignMode::Unspecified),
            1 => Ok(SignMode::Direct),
            2 => Ok(SignMode::Textual),
            3 => Ok(SignMode::DirectAux),
            127 => Ok(SignMode::LegacyAminoJson),
            other => Err(SdkError::InvalidSignMode(format!("unknown sign mode {other}"))),
        }
    }

    /// Name used in proto-JSON (`SIGN_MODE_DIRECT`).
    pub fn as_proto_name(&self) -> &'static str {
        match self {
            SignMode::Unspecified => "SIGN_MODE_UNSPECIFIED",
            SignMode::Direct => "SIGN_MODE_DIRECT",
            SignMode::Textual => "SIGN_MODE_TEXTUAL",
            SignMode::DirectAux => "SIGN_MODE_DIRECT_AUX",
            SignMode::LegacyAminoJson => "SIGN_MODE_LEGACY_AMINO_JSON",
        }
    }

    pub fn from_proto_name(name: &str) -> Result<Self, SdkError> {
        match name {
            "SIGN_MODE_UNSPECIFIED" => Ok(SignMode::Unspecified),
            "SIGN_MODE_DIRECT" => Ok(SignMode::Direct),
            "SIGN_MODE_TEXTUAL" => Ok(SignMode::Textual),
            "SIGN_MODE_DIRECT_AUX" => Ok(SignMode::DirectAux),
            "SIGN_MODE_LEGACY_AMINO_JSON" => Ok(SignMode::LegacyAminoJson),
            other => Err(SdkError::InvalidSignMode(other.to_string())),
        }
    }
}

impl FromStr for SignMode {
    type Err = SdkError;

    /// Parse the command-line spelling (`direct`, `amino-json`, ...).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "" => Ok(SignMode::Unspecified),
            "direct" => Ok(SignMode::Direct),
            "direct-aux" => Ok(SignMode::DirectAux),
            "amino-json" => Ok(SignMode::LegacyAminoJson),
            "textual" => Ok(SignMode::Textual),
            other => Err(SdkError::InvalidSignMode(other.to_string())),
        }
    }
}

impl fmt::Display for SignMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_proto_name())
    }
}

/// How the broadcaster waits after submission.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BroadcastMode {
    Unspecified,
    /// Await commit.
    Block,
    #[default]
    Sync,
    Async,
}

impl BroadcastMode {
    pub fn as_i32(&self) -> i32 {
        match self {
            BroadcastMode::Unspecified => 0,
            BroadcastMode::Block => 1,
            BroadcastMode::Sync => 2,
            BroadcastMode::Async => 3,
        }
    }

    pub fn from_i32(v: i32) -> Result<Self, SdkError> {
        match v {
            0 => Ok(BroadcastMode::Unspecified),
            1 => Ok(BroadcastMode::Block),
            2 => Ok(BroadcastMode::Sync),
            3 => Ok(BroadcastMode::Async),
            other => Err(SdkError::InvalidRequest(format!(
                "unknown broadcast mode {other}"
            ))),
        }
    }
}

impl FromStr for BroadcastMode {
    type Err = SdkError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "sync" => Ok(BroadcastMode::Sync),
            "async" => Ok(BroadcastMode::Async),
            "block" => Ok(BroadcastMode::Block),
            other => Err(SdkError::InvalidRequest(format!(
                "unknown broadcast mode {other}"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sign_mode_wire_values() {
        assert_eq!(SignMode::Unspecified.as_i32(), 0);
        assert_eq!(SignMode::Direct.as_i32(), 1);
        assert_eq!(SignMode::Textual.as_i32(), 2);
        assert_eq!(SignMode::DirectAux.as_i32(), 3);
        assert_eq!(SignMode::LegacyAminoJson.as_i32(), 127);
        assert!(SignMode::from_i32(4).is_err());
    }

    #[test]
    fn broadcast_mode_wire_values() {
        assert_eq!(BroadcastMode::Block.as_i32(), 1);
        assert_eq!(BroadcastMode::Sync.as_i32(), 2);
        assert_eq!(BroadcastMode::Async.as_i32(), 3);
    }

    #[test]
    fn cli_spellings() {
        assert_eq!("amino-json".parse::<SignMode>().unwrap(), SignMode::LegacyAminoJson);
        assert_eq!("block".parse::<BroadcastMode>().unwrap(), BroadcastMode::Block);
        assert!("bogus".parse::<SignMode>().is_err());
    }
}
