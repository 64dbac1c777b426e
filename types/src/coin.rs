//! Coin amounts and sorted coin sets.
//!
//! Amounts are unsigned integers (u128). A `Coins` set is kept sorted by
//! denom with each denom at most once and no zero entries, so two equal sets
//! always encode to identical bytes.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use crate::error::SdkError;
use crate::proto;

/// Validate a denomination: a letter followed by 2..=127 of `[a-zA-Z0-9/:._-]`.
pub fn validate_denom(denom: &str) -> Result<(), SdkError> {
    let bytes = denom.as_bytes();
    let valid = (3..=128).contains(&bytes.len())
        && bytes[0].is_ascii_alphabetic()
        && bytes[1..]
            .iter()
            .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'/' | b':' | b'.' | b'_' | b'-'));
    if valid {
        Ok(())
    } else {
        Err(SdkError::InvalidCoins(format!("invalid denom: {denom}")))
    }
}

/// A single denomination and amount.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Coin {
    pub denom: String,
    pub amount: u128,
}

impl Coin {
    pub fn new(amount: u128, denom: impl Into<String>) -> Result<Self, SdkError> {
        let denom = denom.into();
        validate_denom(&denom)?;
        Ok(Self { denom, amount })
    }

    pub fn is_zero(&self) -> bool {
        self.amount == 0
    }
}

impl fmt::Display for Coin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.amount, self.denom)
    }
}

impl FromStr for Coin {
    type Err = SdkError;

    /// Parse `"100uatom"`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let split = s
            .find(|c: char| !c.is_ascii_digit())
            .ok_or_else(|| SdkError::InvalidCoins(format!("missing denom: {s}")))?;
        let (amount, denom) = s.split_at(split);
        if amount.is_empty() {
            return Err(SdkError::InvalidCoins(format!("missing amount: {s}")));
        }
        let amount = amount
            .parse::<u128>()
            .map_err(|e| SdkError::InvalidCoins(format!("{s}: {e}")))?;
        Coin::new(amount, denom.trim())
    }
}

impl Serialize for Coin {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        CoinJson {
            denom: self.denom.clone(),
            amount: self.amount.to_string(),
        }
        .serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Coin {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = CoinJson::deserialize(deserializer)?;
        let amount = raw.amount.parse::<u128>().map_err(serde::de::Error::custom)?;
        Ok(Coin {
            denom: raw.denom,
            amount,
        })
    }
}

#[derive(Serialize, Deserialize)]
struct CoinJson {
    denom: String,
    amount: String,
}

impl From<&Coin> for proto::Coin {
    fn from(c: &Coin) -> Self {
        proto::Coin {
            denom: c.denom.clone(),
            amount: c.amount.to_string(),
        }
    }
}

impl TryFrom<&proto::Coin> for Coin {
    type Error = SdkError;

    fn try_from(c: &proto::Coin) -> Result<Self, Self::Error> {
        let amount = c
            .amount
            .parse::<u128>()
            .map_err(|e| SdkError::InvalidCoins(format!("{}: {e}", c.amount)))?;
        Coin::new(amount, c.denom.clone())
    }
}

/// A sorted, de-duplicated, zero-free set of coins.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct Coins(Vec<Coin>);

impl Coins {
    pub fn empty() -> Self {
        Self(Vec::new())
    }

    /// Build a set from coins in any order. Zeros are dropped; a denom that
    /// appears twice is an error.
    pub fn new(coins: impl IntoIterator<Item = Coin>) -> Result<Self, SdkError> {
        let mut coins: Vec<Coin> = coins.into_iter().collect();
        for coin in &coins {
            validate_denom(&coin.denom)?;
        }
        coins.sort_by(|a, b| a.denom.cmp(&b.denom));
        if let Some(w) = coins.windows(2).find(|w| w[0].denom == w[1].denom) {
            return Err(SdkError::InvalidCoins(format!("duplicate denomination {}", w[0].denom)));
        }
        coins.retain(|c| !c.is_zero());
        Ok(Self(coins))
    }

    /// Parse a comma-separated list such as `"10uatom,5stake"`. Empty input is the empty set.
    pub fn parse(s: &str) -> Result<Self, SdkError> {
        let s = s.trim();
        if s.is_empty() {
            return Ok(Coins::empty());
        }
        let coins = s
            .split(',')
            .map(Coin::from_str)
            .collect::<Result<Vec<_>, _>>()?;
        Coins::new(coins)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Coin> {
        self.0.iter()
    }

    pub fn as_slice(&self) -> &[Coin] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// True when every component is zero, which for a normalized set means empty.
    pub fn is_zero(&self) -> bool {
        self.0.iter().all(Coin::is_zero)
    }

    pub fn amount_of(&self, denom: &str) -> u128 {
        self.find(denom).map(|c| c.amount).unwrap_or(0)
    }

    pub fn denoms(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(|c| c.denom.as_str())
    }

    fn find(&self, denom: &str) -> Option<&Coin> {
        self.0
            .binary_search_by(|c| c.denom.as_str().cmp(denom))
            .ok()
            .map(|i| &self.0[i])
    }

    fn checked_add_coin(mut self, coin: &Coin) -> Result<Self, SdkError> {
        if coin.is_zero() {
            return Ok(self);
        }
        match self
            .0
            .binary_search_by(|c| c.denom.as_str().cmp(coin.denom.as_str()))
        {
            Ok(i) => {
                self.0[i].amount = self.0[i]
                    .amount
                    .checked_add(coin.amount)
                    .ok_or_else(|| SdkError::InvalidCoins(format!("overflow adding {coin}")))?;
            }
            Err(i) => self.0.insert(i, coin.clone()),
        }
        Ok(self)
    }

    pub fn checked_add(&self, other: &Coins) -> Result<Coins, SdkError> {
        other
            .iter()
            .try_fold(self.clone(), |acc, c| acc.checked_add_coin(c))
    }

    /// Subtract `other`; fails if any denom would go negative.
    pub fn safe_sub(&self, other: &Coins) -> Result<Coins, SdkError> {
        let mut out = self.clone();
        for coin in other.iter() {
            let have = out.amount_of(&coin.denom);
            let left = have.checked_sub(coin.amount).ok_or_else(|| {
                SdkError::InsufficientFee(format!("{have}{} is smaller than {coin}", coin.denom))
            })?;
            out.set_amount(&coin.denom, left);
        }
        Ok(out)
    }

    fn set_amount(&mut self, denom: &str, amount: u128) {
        if let Ok(i) = self.0.binary_search_by(|c| c.denom.as_str().cmp(denom)) {
            if amount == 0 {
                self.0.remove(i);
            } else {
                self.0[i].amount = amount;
            }
        }
    }

    /// True when `self` holds at least as much as `other` in every denom of `other`.
    pub fn is_all_gte(&self, other: &Coins) -> bool {
        other.iter().all(|c| self.amount_of(&c.denom) >= c.amount)
    }

    /// True when every denom of `self` is present in `other`.
    pub fn denoms_subset_of(&self, other: &Coins) -> bool {
        self.iter().all(|c| other.find(&c.denom).is_some())
    }

    pub fn to_proto(&self) -> Vec<proto::Coin> {
        self.0.iter().map(proto::Coin::from).collect()
    }

    pub fn from_proto(coins: &[proto::Coin]) -> Result<Self, SdkError> {
        Coins::new(
            coins
                .iter()
                .map(Coin::try_from)
                .collect::<Result<Vec<_>, _>>()?,
        )
    }
}

impl PartialOrd for Coins {
    /// Partial order: `a <= b` iff `b` is all-greater-or-equal to `a`.
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        match (other.is_all_gte(self), self.is_all_gte(other)) {
            (true, true) => Some(Ordering::Equal),
            (true, false) => Some(Ordering::Less),
            (false, true) => Some(Ordering::Greater),
            (false, false) => None,
        }
    }
}

impl<'de> Deserialize<'de> for Coins {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = Vec::<Coin>::deserialize(deserializer)?;
        Coins::new(raw).map_err(serde::de::Error::custom)
    }
}

impl fmt::Display for Coins {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.0.iter().map(Coin::to_string).collect();
        write!(f, "{}", parts.join(","))
    }
}

impl From<Coin> for Coins {
    fn from(coin: Coin) -> Self {
        if coin.is_zero() {
            Coins::empty()
        } else {
            Coins(vec![coin])
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn coins(s: &str) -> Coins {
        Coins::parse(s).unwrap()
    }

    #[test]
    fn parse_sorts() {
        let c = coins("5stake,10atom");
        assert_eq!(c.to_string(), "10atom,5stake");
    }

    #[test]
    fn duplicate_denoms_rejected() {
        assert!(matches!(Coins::parse("10atom,5atom"), Err(SdkError::InvalidCoins(_))));
        assert!(Coins::parse("0atom,5atom").is_err());
        let raw = vec![
            proto::Coin { denom: "atom".into(), amount: "1".into() },
            proto::Coin { denom: "atom".into(), amount: "2".into() },
        ];
        assert!(Coins::from_proto(&raw).is_err());
        assert!(serde_json::from_str::<Coins>(
            r#"[{"denom":"atom","amount":"1"},{"denom":"atom","amount":"2"}]"#
        )
        .is_err());
    }

    #[test]
    fn zero_entries_are_dropped() {
        let c = coins("0atom,1stake");
        assert_eq!(c.len(), 1);
        assert_eq!(c.amount_of("atom"), 0);
    }

    #[test]
    fn invalid_denom_rejected() {
        assert!(Coins::parse("10A").is_err());
        assert!(Coins::parse("10").is_err());
        assert!(Coins::parse("atom").is_err());
        assert!(Coin::new(1, "1abc").is_err());
    }

    #[test]
    fn safe_sub_to_zero_empties_set() {
        let left = coins("100atom").safe_sub(&coins("100atom")).unwrap();
        assert!(left.is_zero());
        assert!(left.is_empty());
    }

    #[test]
    fn safe_sub_underflow_fails() {
        let err = coins("10atom").safe_sub(&coins("11atom")).unwrap_err();
        assert!(matches!(err, SdkError::InsufficientFee(_)));
        assert!(coins("10atom").safe_sub(&coins("1stake")).is_err());
    }

    #[test]
    fn is_all_gte_partial_order() {
        let a = coins("10atom,5stake");
        let b = coins("3atom");
        assert!(a.is_all_gte(&b));
        assert!(!b.is_all_gte(&a));
        assert!(b < a);
        assert_eq!(coins("1atom").partial_cmp(&coins("1stake")), None);
    }

    #[test]
    fn json_renders_amounts_as_strings() {
        let json = serde_json::to_string(&coins("7atom")).unwrap();
        assert_eq!(json, r#"[{"denom":"atom","amount":"7"}]"#);
        let back: Coins = serde_json::from_str(&json).unwrap();
        assert_eq!(back, coins("7atom"));
    }

    #[test]
    fn proto_conversion() {
        let c = coins("12uatom");
        let p = c.to_proto();
        assert_eq!(p[0].amount, "12");
        assert_eq!(Coins::from_proto(&p).unwrap(), c);
    }
}
