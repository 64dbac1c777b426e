//! Fixed-point decimals with 18 fractional digits, used for gas prices.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

use crate::coin::validate_denom;
use crate::error::SdkError;

const PRECISION: u32 = 18;
const ONE: u128 = 10u128.pow(PRECISION);

/// Non-negative decimal stored as atto-units.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Dec(u128);

impl Dec {
    pub const ZERO: Self = Self(0);

    pub fn from_atto(atto: u128) -> Self {
        Self(atto)
    }

    pub fn from_int(n: u64) -> Self {
        Self(n as u128 * ONE)
    }

    pub fn atto(&self) -> u128 {
        self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// `ceil(self * n)` as an integer.
    pub fn mul_u64_ceil(&self, n: u64) -> Result<u128, SdkError> {
        let product = self
            .0
            .checked_mul(n as u128)
            .ok_or_else(|| SdkError::InvalidCoins(format!("overflow: {self} * {n}")))?;
        Ok(product.div_ceil(ONE))
    }
}

impl FromStr for Dec {
    type Err = SdkError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bad = || SdkError::InvalidCoins(format!("invalid decimal: {s}"));
        let (int, frac) = match s.split_once('.') {
            Some((i, f)) => (i, f),
            None => (s, ""),
        };
        if int.is_empty() && frac.is_empty() {
            return Err(bad());
        }
        if frac.len() > PRECISION as usize
            || !int.bytes().all(|b| b.is_ascii_digit())
            || !frac.bytes().all(|b| b.is_ascii_digit())
        {
            return Err(bad());
        }
        let int_part: u128 = if int.is_empty() {
            0
        } else {
            int.parse().map_err(|_| bad())?
        };
        let frac_part: u128 = if frac.is_empty() {
            0
        } else {
            frac.parse::<u128>().map_err(|_| bad())? * 10u128.pow(PRECISION - frac.len() as u32)
        };
        int_part
            .checked_mul(ONE)
            .and_then(|v| v.checked_add(frac_part))
            .map(Dec)
            .ok_or_else(bad)
    }
}

impl fmt::Display for Dec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:018}", self.0 / ONE, self.0 % ONE)
    }
}

impl Serialize for Dec {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Dec {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// A decimal amount of one denom, e.g. a gas price `0.025uatom`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecCoin {
    pub denom: String,
    pub amount: Dec,
}

impl FromStr for DecCoin {
    type Err = SdkError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let split = s
            .find(|c: char| !(c.is_ascii_digit() || c == '.'))
            .ok_or_else(|| SdkError::InvalidCoins(format!("missing denom: {s}")))?;
        let (amount, denom) = s.split_at(split);
        validate_denom(denom)?;
        Ok(DecCoin {
            denom: denom.to_string(),
            amount: amount.parse()?,
        })
    }
}

impl fmt::Display for DecCoin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.amount, self.denom)
    }
}

/// A list of decimal coins sorted by denom, zero entries dropped.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DecCoins(Vec<DecCoin>);

impl DecCoins {
    pub fn parse(s: &str) -> Result<Self, SdkError> {
        let s = s.trim();
        if s.is_empty() {
            return Ok(Self::default());
        }
        let mut coins = s
            .split(',')
            .map(DecCoin::from_str)
            .collect::<Result<Vec<_>, _>>()?;
        coins.retain(|c| !c.amount.is_zero());
        coins.sort_by(|a, b| a.denom.cmp(&b.denom));
        if coins.windows(2).any(|w| w[0].denom == w[1].denom) {
            return Err(SdkError::InvalidCoins(format!("duplicate denom in {s}")));
        }
        Ok(Self(coins))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &DecCoin> {
        self.0.iter()
    }
}

impl fmt::Display for DecCoins {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.0.iter().map(DecCoin::to_string).collect();
        write!(f, "{}", parts.join(","))
    }
}
