//! `MsgGrantAllowance` and `MsgRevokeAllowance`.

use std::sync::Arc;

use prost::Message;
use serde_json::{json, Value};

use cosmtx_types::{json_str, AccAddress, Any, Msg, MsgRef, MsgRegistry, SdkError};

use crate::allowance::Allowance;
use crate::proto;

/// Register both fee-grant messages with `registry`.
pub fn register(registry: &mut MsgRegistry) {
    registry.register(
        proto::TYPE_URL_MSG_GRANT_ALLOWANCE,
        MsgGrantAllowance::decode_proto,
        MsgGrantAllowance::decode_json,
    );
    registry.register(
        proto::TYPE_URL_MSG_REVOKE_ALLOWANCE,
        MsgRevokeAllowance::decode_proto,
        MsgRevokeAllowance::decode_json,
    );
}

/// Grants `grantee` the right to spend `granter`'s balance on fees.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MsgGrantAllowance {
    pub granter: AccAddress,
    pub grantee: AccAddress,
    pub allowance: Allowance,
}

impl MsgGrantAllowance {
    pub fn decode_proto(bytes: &[u8]) -> Result<MsgRef, SdkError> {
        let raw = proto::MsgGrantAllowance::decode(bytes)?;
        let allowance = raw
            .allowance
            .ok_or_else(|| SdkError::Serialization("grant without allowance".into()))?;
        Ok(Arc::new(MsgGrantAllowance {
            granter: AccAddress::from_account_bech32(&raw.granter)?,
            grantee: AccAddress::from_account_bech32(&raw.grantee)?,
            allowance: Allowance::from_any(&allowance)?,
        }))
    }

    pub fn decode_json(value: &Value) -> Result<MsgRef, SdkError> {
        let allowance = value
            .get("allowance")
            .ok_or_else(|| SdkError::Serialization("grant without allowance".into()))?;
        Ok(Arc::new(MsgGrantAllowance {
            granter: AccAddress::from_account_bech32(json_str(value, "granter")?)?,
            grantee: AccAddress::from_account_bech32(json_str(value, "grantee")?)?,
            allowance: Allowance::from_json(allowance)?,
        }))
    }
}

impl Msg for MsgGrantAllowance {
    fn type_url(&self) -> &str {
        proto::TYPE_URL_MSG_GRANT_ALLOWANCE
    }

    fn signers(&self) -> Vec<AccAddress> {
        vec![self.granter.clone()]
    }

    fn to_any(&self) -> Any {
        Any::pack(
            proto::TYPE_URL_MSG_GRANT_ALLOWANCE,
            &proto::MsgGrantAllowance {
                granter: self.granter.to_string(),
                grantee: self.grantee.to_string(),
                allowance: Some(self.allowance.to_any()),
            },
        )
    }

    fn amino_json(&self) -> Option<Value> {
        Some(json!({
            "type": "cosmos-sdk/MsgGrantAllowance",
            "value": {
                "allowance": self.allowance.amino_json(),
                "grantee": self.grantee.to_string(),
                "granter": self.granter.to_string(),
            },
        }))
    }

    fn to_json(&self) -> Value {
        json!({
            "@type": proto::TYPE_URL_MSG_GRANT_ALLOWANCE,
            "granter": self.granter.to_string(),
            "grantee": self.grantee.to_string(),
            "allowance": self.allowance.to_json(),
        })
    }
}

/// Removes an existing grant.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MsgRevokeAllowance {
    pub granter: AccAddress,
    pub grantee: AccAddress,
}

impl MsgRevokeAllowance {
    pub fn decode_proto(bytes: &[u8]) -> Result<MsgRef, SdkError> {
        let raw = proto::MsgRevokeAllowance::decode(bytes)?;
        Ok(Arc::new(MsgRevokeAllowance {
            granter: AccAddress::from_account_bech32(&raw.granter)?,
            grantee: AccAddress::from_account_bech32(&raw.grantee)?,
        }))
    }

    pub fn decode_json(value: &Value) -> Result<MsgRef, SdkError> {
        Ok(Arc::new(MsgRevokeAllowance {
            granter: AccAddress::from_account_bech32(json_str(value, "granter")?)?,
            grantee: AccAddress::from_account_bech32(json_str(value, "grantee")?)?,
        }))
    }

    fn fields_json(&self) -> Value {
        json!({
            "granter": self.granter.to_string(),
            "grantee": self.grantee.to_string(),
        })
    }
}

impl Msg for MsgRevokeAllowance {
    fn type_url(&self) -> &str {
        proto::TYPE_URL_MSG_REVOKE_ALLOWANCE
    }

    fn signers(&self) -> Vec<AccAddress> {
        vec![self.granter.clone()]
    }

    fn to_any(&self) -> Any {
        Any::pack(
            proto::TYPE_URL_MSG_REVOKE_ALLOWANCE,
            &proto::MsgRevokeAllowance {
                granter: self.granter.to_string(),
                grantee: self.grantee.to_string(),
            },
        )
    }

    fn amino_json(&self) -> Option<Value> {
        Some(json!({ "type": "cosmos-sdk/MsgRevokeAllowance", "value": self.fields_json() }))
    }

    fn to_json(&self) -> Value {
        let mut v = self.fields_json();
        v["@type"] = json!(proto::TYPE_URL_MSG_REVOKE_ALLOWANCE);
        v
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::allowance::BasicAllowance;
    use cosmtx_types::{Coins, Timestamp};

    fn registry() -> MsgRegistry {
        let mut registry = MsgRegistry::with_defaults();
        register(&mut registry);
        registry
    }

    fn grant() -> MsgGrantAllowance {
        MsgGrantAllowance {
            granter: AccAddress::from([1; 20]),
            grantee: AccAddress::from([2; 20]),
            allowance: Allowance::Basic(BasicAllowance {
                spend_limit: Coins::parse("100atom").unwrap(),
                expiration: Some(Timestamp::new(1_700_000_000)),
            }),
        }
    }

    #[test]
    fn grant_decodes_through_registry() {
        let msg = grant();
        let registry = registry();
        let from_any = registry.decode_any(&msg.to_any()).unwrap();
        assert_eq!(from_any.to_any(), msg.to_any());
        let from_json = registry.decode_json(&msg.to_json()).unwrap();
        assert_eq!(from_json.to_any(), msg.to_any());
        assert_eq!(from_json.signers(), vec![msg.granter.clone()]);
    }

    #[test]
    fn revoke_decodes_through_registry() {
        let msg = MsgRevokeAllowance {
            granter: AccAddress::from([1; 20]),
            grantee: AccAddress::from([2; 20]),
        };
        let back = registry().decode_json(&msg.to_json()).unwrap();
        assert_eq!(back.to_any(), msg.to_any());
    }

    #[test]
    fn revoke_json_needs_both_addresses() {
        let mut json = MsgRevokeAllowance {
            granter: AccAddress::from([1; 20]),
            grantee: AccAddress::from([2; 20]),
        }
        .to_json();
        json.as_object_mut().unwrap().remove("grantee");
        assert_eq!(
            registry().decode_json(&json).err(),
            Some(SdkError::Serialization("missing string field grantee".into()))
        );
    }

    #[test]
    fn amino_names() {
        let v = grant().amino_json().unwrap();
        assert_eq!(v["type"], "cosmos-sdk/MsgGrantAllowance");
        assert_eq!(v["value"]["allowance"]["type"], "cosmos-sdk/BasicAllowance");
        assert_eq!(v["value"]["allowance"]["value"]["spend_limit"][0]["amount"], "100");
    }
}
