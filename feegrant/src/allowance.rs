//! Allowance variants and the rules for spending against them.
//!
//! An allowance is evaluated against a fee at a given block time and yields
//! an [`Outcome`]: keep the grant as is, replace it with the decremented
//! allowance, or delete it because it is used up.

use serde_json::{json, Value};

use cosmtx_types::{parse_duration, Any, Coins, SdkError, Timestamp};

use crate::proto;

/// A spend limit with an optional expiration. An empty limit is unlimited.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BasicAllowance {
    pub spend_limit: Coins,
    pub expiration: Option<Timestamp>,
}

/// A basic allowance plus a per-period cap that refills every `period` seconds.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PeriodicAllowance {
    pub basic: BasicAllowance,
    pub period: u64,
    pub period_spend_limit: Coins,
    pub period_can_spend: Coins,
    pub period_reset: Timestamp,
}

/// Restricts the inner allowance to transactions whose messages are all listed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AllowedMsgAllowance {
    pub allowance: Box<Allowance>,
    pub allowed_messages: Vec<String>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Allowance {
    Basic(BasicAllowance),
    Periodic(PeriodicAllowance),
    Allowed(AllowedMsgAllowance),
}

/// Result of an accepted fee.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Outcome {
    /// Nothing to write back.
    Unchanged,
    /// Store this allowance in place of the old one.
    Updated(Allowance),
    /// The allowance is spent; delete the grant.
    Exhausted,
}

fn limit_exceeded(what: &str, fee: &Coins, limit: &Coins) -> SdkError {
    SdkError::InsufficientFee(format!("fee {fee} exceeds {what} {limit}"))
}

impl BasicAllowance {
    pub fn is_expired(&self, now: Timestamp) -> bool {
        self.expiration.is_some_and(|exp| now > exp)
    }

    pub fn accept(&self, fee: &Coins, now: Timestamp) -> Result<Outcome, SdkError> {
        if self.is_expired(now) {
            return Err(SdkError::GrantExpired);
        }
        if self.spend_limit.is_empty() {
            return Ok(Outcome::Unchanged);
        }
        let remaining = self
            .spend_limit
            .safe_sub(fee)
            .map_err(|_| limit_exceeded("basic allowance", fee, &self.spend_limit))?;
        if remaining.is_zero() {
            return Ok(Outcome::Exhausted);
        }
        Ok(Outcome::Updated(Allowance::Basic(BasicAllowance {
            spend_limit: remaining,
            expiration: self.expiration,
        })))
    }
}

impl PeriodicAllowance {
    /// Refill the period budget once the reset time has passed.
    pub fn try_reset_period(&mut self, now: Timestamp) {
        if self.period_reset <= now {
            self.period_can_spend = self.period_spend_limit.clone();
            self.period_reset = now.plus_secs(self.period);
        }
    }

    pub fn accept(&self, fee: &Coins, now: Timestamp) -> Result<Outcome, SdkError> {
        if self.basic.is_expired(now) {
            return Err(SdkError::GrantExpired);
        }
        let mut next = self.clone();
        next.try_reset_period(now);

        next.period_can_spend = next
            .period_can_spend
            .safe_sub(fee)
            .map_err(|_| limit_exceeded("period limit", fee, &next.period_can_spend))?;

        if !next.basic.spend_limit.is_empty() {
            next.basic.spend_limit = next
                .basic
                .spend_limit
                .safe_sub(fee)
                .map_err(|_| limit_exceeded("absolute limit", fee, &self.basic.spend_limit))?;
            if next.basic.spend_limit.is_zero() {
                return Ok(Outcome::Exhausted);
            }
        }
        Ok(Outcome::Updated(Allowance::Periodic(next)))
    }
}

impl AllowedMsgAllowance {
    pub fn accept(&self, fee: &Coins, msg_types: &[&str], now: Timestamp) -> Result<Outcome, SdkError> {
        if let Some(denied) = msg_types
            .iter()
            .find(|url| !self.allowed_messages.iter().any(|a| a == *url))
        {
            return Err(SdkError::AllowedMsgDisallowed(denied.to_string()));
        }
        Ok(match self.allowance.accept(fee, msg_types, now)? {
            Outcome::Updated(inner) => Outcome::Updated(Allowance::Allowed(AllowedMsgAllowance {
                allowance: Box::new(inner),
                allowed_messages: self.allowed_messages.clone(),
            })),
            other => other,
        })
    }
}

impl Allowance {
    /// Evaluate `fee` for a transaction carrying messages of `msg_types`.
    pub fn accept(&self, fee: &Coins, msg_types: &[&str], now: Timestamp) -> Result<Outcome, SdkError> {
        match self {
            Allowance::Basic(a) => a.accept(fee, now),
            Allowance::Periodic(a) => a.accept(fee, now),
            Allowance::Allowed(a) => a.accept(fee, msg_types, now),
        }
    }

    pub fn expiration(&self) -> Option<Timestamp> {
        match self {
            Allowance::Basic(a) => a.expiration,
            Allowance::Periodic(a) => a.basic.expiration,
            Allowance::Allowed(a) => a.allowance.expiration(),
        }
    }

    /// Stateless checks on the allowance itself.
    pub fn validate_basic(&self) -> Result<(), SdkError> {
        match self {
            Allowance::Basic(_) => Ok(()),
            Allowance::Periodic(p) => {
                if p.period == 0 {
                    return Err(SdkError::InvalidRequest("period duration must be positive".into()));
                }
                if p.period_spend_limit.is_empty() {
                    return Err(SdkError::InvalidRequest("period spend limit must be positive".into()));
                }
                let total = &p.basic.spend_limit;
                if !total.is_empty() {
                    if !p.period_spend_limit.denoms_subset_of(total) {
                        return Err(SdkError::InvalidRequest(
                            "period spend limit has different currency than basic spend limit".into(),
                        ));
                    }
                    if !total.is_all_gte(&p.period_spend_limit) {
                        return Err(SdkError::InvalidRequest(
                            "period spend limit exceeds total spend limit".into(),
                        ));
                    }
                }
                if !p.period_spend_limit.is_all_gte(&p.period_can_spend) {
                    return Err(SdkError::InvalidRequest(
                        "period can spend exceeds period spend limit".into(),
                    ));
                }
                Ok(())
            }
            Allowance::Allowed(a) => {
                if a.allowed_messages.is_empty() {
                    return Err(SdkError::InvalidRequest("allowed messages shouldn't be empty".into()));
                }
                a.allowance.validate_basic()
            }
        }
    }

    /// Checks that depend on the block time of the grant.
    pub fn validate_at(&self, now: Timestamp) -> Result<(), SdkError> {
        if let Some(exp) = self.expiration() {
            if exp < now {
                return Err(SdkError::InvalidRequest(format!(
                    "expiration {exp} is before current block time {now}"
                )));
            }
        }
        match self {
            Allowance::Periodic(p) => match p.basic.expiration {
                Some(exp) if p.period > exp.as_secs() - now.as_secs() => Err(SdkError::InvalidRequest(
                    format!("period of {}s is longer than the time until expiration", p.period),
                )),
                _ => Ok(()),
            },
            Allowance::Allowed(a) => a.allowance.validate_at(now),
            Allowance::Basic(_) => Ok(()),
        }
    }

    /// Fill in the period bookkeeping of a freshly granted periodic allowance.
    pub fn init_period(&mut self, now: Timestamp) {
        match self {
            Allowance::Periodic(p) => {
                if p.period_reset == Timestamp::EPOCH {
                    p.period_reset = now.plus_secs(p.period);
                }
                if p.period_can_spend.is_empty() {
                    p.period_can_spend = p.period_spend_limit.clone();
                }
            }
            Allowance::Allowed(a) => a.allowance.init_period(now),
            Allowance::Basic(_) => {}
        }
    }

    pub fn type_url(&self) -> &'static str {
        match self {
            Allowance::Basic(_) => proto::TYPE_URL_BASIC_ALLOWANCE,
            Allowance::Periodic(_) => proto::TYPE_URL_PERIODIC_ALLOWANCE,
            Allowance::Allowed(_) => proto::TYPE_URL_ALLOWED_MSG_ALLOWANCE,
        }
    }

    // ── Protobuf ───────────────────────────────────────────────────────

    pub fn to_any(&self) -> Any {
        match self {
            Allowance::Basic(a) => Any::pack(self.type_url(), &basic_to_proto(a)),
            Allowance::Periodic(p) => Any::pack(
                self.type_url(),
                &proto::PeriodicAllowance {
                    basic: Some(basic_to_proto(&p.basic)),
                    period: Some(cosmtx_types::proto::Duration {
                        seconds: i64::try_from(p.period).unwrap_or(i64::MAX),
                        nanos: 0,
                    }),
                    period_spend_limit: p.period_spend_limit.to_proto(),
                    period_can_spend: p.period_can_spend.to_proto(),
                    period_reset: Some(p.period_reset.into()),
                },
            ),
            Allowance::Allowed(a) => Any::pack(
                self.type_url(),
                &proto::AllowedMsgAllowance {
                    allowance: Some(a.allowance.to_any()),
                    allowed_messages: a.allowed_messages.clone(),
                },
            ),
        }
    }

    pub fn from_any(any: &Any) -> Result<Self, SdkError> {
        match any.type_url.as_str() {
            proto::TYPE_URL_BASIC_ALLOWANCE => {
                let raw: proto::BasicAllowance = any.unpack(proto::TYPE_URL_BASIC_ALLOWANCE)?;
                Ok(Allowance::Basic(basic_from_proto(&raw)?))
            }
            proto::TYPE_URL_PERIODIC_ALLOWANCE => {
                let raw: proto::PeriodicAllowance = any.unpack(proto::TYPE_URL_PERIODIC_ALLOWANCE)?;
                let period = raw.period.map(|d| d.seconds).unwrap_or(0);
                Ok(Allowance::Periodic(PeriodicAllowance {
                    basic: basic_from_proto(&raw.basic.unwrap_or_default())?,
                    period: u64::try_from(period).map_err(|_| {
                        SdkError::Serialization(format!("negative period {period}"))
                    })?,
                    period_spend_limit: Coins::from_proto(&raw.period_spend_limit)?,
                    period_can_spend: Coins::from_proto(&raw.period_can_spend)?,
                    period_reset: raw.period_reset.map(Timestamp::from).unwrap_or(Timestamp::EPOCH),
                }))
            }
            proto::TYPE_URL_ALLOWED_MSG_ALLOWANCE => {
                let raw: proto::AllowedMsgAllowance =
                    any.unpack(proto::TYPE_URL_ALLOWED_MSG_ALLOWANCE)?;
                let inner = raw.allowance.ok_or_else(|| {
                    SdkError::Serialization("allowed-msg allowance without inner allowance".into())
                })?;
                Ok(Allowance::Allowed(AllowedMsgAllowance {
                    allowance: Box::new(Allowance::from_any(&inner)?),
                    allowed_messages: raw.allowed_messages,
                }))
            }
            other => Err(SdkError::Serialization(format!("unknown allowance type {other}"))),
        }
    }

    // ── JSON ───────────────────────────────────────────────────────────

    /// Proto-JSON form with an `@type` field.
    pub fn to_json(&self) -> Value {
        let mut v = match self {
            Allowance::Basic(a) => basic_json(a),
            Allowance::Periodic(p) => json!({
                "basic": basic_json(&p.basic),
                "period": format!("{}s", p.period),
                "period_spend_limit": p.period_spend_limit,
                "period_can_spend": p.period_can_spend,
                "period_reset": p.period_reset.to_rfc3339(),
            }),
            Allowance::Allowed(a) => json!({
                "allowance": a.allowance.to_json(),
                "allowed_messages": a.allowed_messages,
            }),
        };
        v["@type"] = json!(self.type_url());
        v
    }

    pub fn from_json(value: &Value) -> Result<Self, SdkError> {
        let type_url = value
            .get("@type")
            .and_then(Value::as_str)
            .ok_or_else(|| SdkError::Serialization("allowance without @type".into()))?;
        match type_url {
            proto::TYPE_URL_BASIC_ALLOWANCE => Ok(Allowance::Basic(basic_from_json(value)?)),
            proto::TYPE_URL_PERIODIC_ALLOWANCE => Ok(Allowance::Periodic(PeriodicAllowance {
                basic: basic_from_json(value.get("basic").unwrap_or(&Value::Null))?,
                period: parse_duration(
                    value.get("period").and_then(Value::as_str).unwrap_or("0s"),
                )?,
                period_spend_limit: coins_field(value, "period_spend_limit")?,
                period_can_spend: coins_field(value, "period_can_spend")?,
                period_reset: time_field(value, "period_reset")?.unwrap_or(Timestamp::EPOCH),
            })),
            proto::TYPE_URL_ALLOWED_MSG_ALLOWANCE => {
                let inner = value.get("allowance").ok_or_else(|| {
                    SdkError::Serialization("allowed-msg allowance without inner allowance".into())
                })?;
                let allowed_messages = serde_json::from_value(
                    value.get("allowed_messages").cloned().unwrap_or(Value::Array(Vec::new())),
                )?;
                Ok(Allowance::Allowed(AllowedMsgAllowance {
                    allowance: Box::new(Allowance::from_json(inner)?),
                    allowed_messages,
                }))
            }
            other => Err(SdkError::Serialization(format!("unknown allowance type {other}"))),
        }
    }

    /// Legacy amino form `{"type", "value"}`. Durations are nanosecond strings.
    pub fn amino_json(&self) -> Value {
        match self {
            Allowance::Basic(a) => json!({
                "type": "cosmos-sdk/BasicAllowance",
                "value": basic_amino(a),
            }),
            Allowance::Periodic(p) => json!({
                "type": "cosmos-sdk/PeriodicAllowance",
                "value": {
                    "basic": basic_amino(&p.basic),
                    "period": (u128::from(p.period) * 1_000_000_000).to_string(),
                    "period_spend_limit": p.period_spend_limit,
                    "period_can_spend": p.period_can_spend,
                    "period_reset": p.period_reset.to_rfc3339(),
                },
            }),
            Allowance::Allowed(a) => json!({
                "type": "cosmos-sdk/AllowedMsgAllowance",
                "value": {
                    "allowance": a.allowance.amino_json(),
                    "allowed_messages": a.allowed_messages,
                },
            }),
        }
    }
}

fn basic_to_proto(a: &BasicAllowance) -> proto::BasicAllowance {
    proto::BasicAllowance {
        spend_limit: a.spend_limit.to_proto(),
        expiration: a.expiration.map(Into::into),
    }
}

fn basic_from_proto(raw: &proto::BasicAllowance) -> Result<BasicAllowance, SdkError> {
    Ok(BasicAllowance {
        spend_limit: Coins::from_proto(&raw.spend_limit)?,
        expiration: raw.expiration.clone().map(Timestamp::from),
    })
}

fn basic_json(a: &BasicAllowance) -> Value {
    json!({
        "spend_limit": a.spend_limit,
        "expiration": a.expiration.map(|t| t.to_rfc3339()),
    })
}

fn basic_amino(a: &BasicAllowance) -> Value {
    let mut v = json!({ "spend_limit": a.spend_limit });
    if let Some(exp) = a.expiration {
        v["expiration"] = json!(exp.to_rfc3339());
    }
    v
}

fn basic_from_json(value: &Value) -> Result<BasicAllowance, SdkError> {
    Ok(BasicAllowance {
        spend_limit: coins_field(value, "spend_limit")?,
        expiration: time_field(value, "expiration")?,
    })
}

fn coins_field(value: &Value, field: &str) -> Result<Coins, SdkError> {
    match value.get(field) {
        None | Some(Value::Null) => Ok(Coins::empty()),
        Some(v) => Ok(serde_json::from_value(v.clone())?),
    }
}

fn time_field(value: &Value, field: &str) -> Result<Option<Timestamp>, SdkError> {
    match value.get(field) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Timestamp::parse_rfc3339(s)
            .map(Some)
            .ok_or_else(|| SdkError::Serialization(format!("invalid timestamp {s} in {field}"))),
        Some(other) => Err(SdkError::Serialization(format!("invalid {field}: {other}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SEND: &str = "/cosmos.bank.v1beta1.MsgSend";

    fn coins(s: &str) -> Coins {
        Coins::parse(s).unwrap()
    }

    fn t(secs: u64) -> Timestamp {
        Timestamp::new(secs)
    }

    fn basic(limit: &str) -> BasicAllowance {
        BasicAllowance {
            spend_limit: coins(limit),
            expiration: None,
        }
    }

    fn periodic(total: &str, period: u64, limit: &str, reset: u64) -> PeriodicAllowance {
        PeriodicAllowance {
            basic: basic(total),
            period,
            period_spend_limit: coins(limit),
            period_can_spend: coins(limit),
            period_reset: t(reset),
        }
    }

    #[test]
    fn basic_decrements_then_exhausts() {
        let a = basic("100atom");
        let Outcome::Updated(Allowance::Basic(left)) = a.accept(&coins("60atom"), t(0)).unwrap() else {
            panic!("expected update");
        };
        assert_eq!(left.spend_limit, coins("40atom"));
        assert_eq!(left.accept(&coins("40atom"), t(0)).unwrap(), Outcome::Exhausted);
    }

    #[test]
    fn basic_rejects_overspend_and_foreign_denoms() {
        let a = basic("10atom");
        assert!(matches!(a.accept(&coins("11atom"), t(0)), Err(SdkError::InsufficientFee(_))));
        assert!(matches!(a.accept(&coins("1stake"), t(0)), Err(SdkError::InsufficientFee(_))));
    }

    #[test]
    fn unlimited_basic_is_unchanged() {
        let a = BasicAllowance::default();
        assert_eq!(a.accept(&coins("1000000atom"), t(5)).unwrap(), Outcome::Unchanged);
    }

    #[test]
    fn expiration_is_inclusive() {
        let a = BasicAllowance {
            spend_limit: Coins::empty(),
            expiration: Some(t(100)),
        };
        assert_eq!(a.accept(&coins("1atom"), t(100)).unwrap(), Outcome::Unchanged);
        assert_eq!(a.accept(&coins("1atom"), t(101)), Err(SdkError::GrantExpired));
    }

    #[test]
    fn periodic_resets_from_current_time() {
        let p = periodic("", 60, "10atom", 1060);
        let Outcome::Updated(Allowance::Periodic(after)) = p.accept(&coins("7atom"), t(1030)).unwrap()
        else {
            panic!("expected update");
        };
        assert_eq!(after.period_can_spend, coins("3atom"));
        assert_eq!(after.period_reset, t(1060));
        assert!(after.accept(&coins("5atom"), t(1040)).is_err());

        let Outcome::Updated(Allowance::Periodic(reset)) = after.accept(&coins("5atom"), t(1065)).unwrap()
        else {
            panic!("expected update");
        };
        assert_eq!(reset.period_can_spend, coins("5atom"));
        assert_eq!(reset.period_reset, t(1125));
    }

    #[test]
    fn periodic_exhausts_on_total_limit() {
        let p = periodic("10atom", 60, "10atom", 100);
        assert_eq!(p.accept(&coins("10atom"), t(50)).unwrap(), Outcome::Exhausted);
        let Outcome::Updated(Allowance::Periodic(after)) = p.accept(&coins("4atom"), t(50)).unwrap() else {
            panic!("expected update");
        };
        assert_eq!(after.basic.spend_limit, coins("6atom"));
    }

    #[test]
    fn allowed_msgs_filter() {
        let a = Allowance::Allowed(AllowedMsgAllowance {
            allowance: Box::new(Allowance::Basic(basic("10atom"))),
            allowed_messages: vec![SEND.into()],
        });
        assert_eq!(
            a.accept(&coins("1atom"), &[SEND, "/cosmos.gov.v1beta1.MsgVote"], t(0)),
            Err(SdkError::AllowedMsgDisallowed("/cosmos.gov.v1beta1.MsgVote".into()))
        );
        let Outcome::Updated(Allowance::Allowed(inner)) = a.accept(&coins("1atom"), &[SEND], t(0)).unwrap()
        else {
            panic!("expected update");
        };
        assert_eq!(*inner.allowance, Allowance::Basic(basic("9atom")));
    }

    #[test]
    fn periodic_validation() {
        let mut p = periodic("5atom", 60, "10atom", 0);
        assert!(Allowance::Periodic(p.clone()).validate_basic().is_err());
        p.basic = basic("20stake");
        assert!(Allowance::Periodic(p.clone()).validate_basic().is_err());
        p.basic = basic("20atom");
        assert!(Allowance::Periodic(p.clone()).validate_basic().is_ok());
        p.period = 0;
        assert!(Allowance::Periodic(p).validate_basic().is_err());
    }

    #[test]
    fn period_longer_than_expiry_rejected() {
        let mut p = periodic("", 3600, "10atom", 0);
        p.basic.expiration = Some(t(1_000 + 600));
        assert!(Allowance::Periodic(p).validate_at(t(1_000)).is_err());
    }

    #[test]
    fn init_period_fills_unset_fields() {
        let mut a = Allowance::Periodic(PeriodicAllowance {
            period_can_spend: Coins::empty(),
            ..periodic("", 60, "10atom", 0)
        });
        a.init_period(t(500));
        let Allowance::Periodic(p) = a else { unreachable!() };
        assert_eq!(p.period_reset, t(560));
        assert_eq!(p.period_can_spend, coins("10atom"));
    }

    #[test]
    fn any_and_json_forms_agree() {
        let a = Allowance::Allowed(AllowedMsgAllowance {
            allowance: Box::new(Allowance::Periodic(PeriodicAllowance {
                basic: BasicAllowance {
                    spend_limit: coins("100atom"),
                    expiration: Some(t(1_700_000_000)),
                },
                ..periodic("100atom", 3600, "10atom", 1_600_000_000)
            })),
            allowed_messages: vec![SEND.into()],
        });
        assert_eq!(Allowance::from_any(&a.to_any()).unwrap(), a);
        assert_eq!(Allowance::from_json(&a.to_json()).unwrap(), a);

        let json = a.to_json();
        assert_eq!(json["allowance"]["period"], "3600s");
        let amino = a.amino_json();
        assert_eq!(amino["value"]["allowance"]["type"], "cosmos-sdk/PeriodicAllowance");
        assert_eq!(amino["value"]["allowance"]["value"]["period"], "3600000000000");
    }
}
