//! Gas settings and simulation-based estimation.

use std::fmt;
use std::str::FromStr;

use num_bigint::BigInt;
use num_rational::BigRational;
use num_traits::ToPrimitive;

use cosmtx_types::SdkError;

/// Default gas limit when neither `--gas` nor simulation provides one.
pub const DEFAULT_GAS_LIMIT: u64 = 200_000;
pub const DEFAULT_GAS_ADJUSTMENT: f64 = 1.0;

/// The `--gas` flag: a fixed limit, or simulate first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GasSetting {
    Auto,
    Fixed(u64),
}

impl Default for GasSetting {
    fn default() -> Self {
        GasSetting::Fixed(DEFAULT_GAS_LIMIT)
    }
}

impl GasSetting {
    pub fn simulate(&self) -> bool {
        matches!(self, GasSetting::Auto)
    }

    /// The fixed limit, or the default while waiting for a simulation.
    pub fn limit(&self) -> u64 {
        match self {
            GasSetting::Auto => DEFAULT_GAS_LIMIT,
            GasSetting::Fixed(g) => *g,
        }
    }
}

impl FromStr for GasSetting {
    type Err = SdkError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "" => Ok(GasSetting::default()),
            "auto" => Ok(GasSetting::Auto),
            n => n
                .parse()
                .map(GasSetting::Fixed)
                .map_err(|_| SdkError::InvalidRequest(format!("gas must be \"auto\" or an integer, got {n}"))),
        }
    }
}

impl fmt::Display for GasSetting {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GasSetting::Auto => f.write_str("auto"),
            GasSetting::Fixed(g) => write!(f, "{g}"),
        }
    }
}

/// The adjustment as the decimal it was written as: the shortest digits that
/// round-trip to `f`, so 1.3 is 13/10 and not the binary value just above it.
fn decimal_ratio(f: f64) -> Option<BigRational> {
    if !f.is_finite() {
        return None;
    }
    let text = f.abs().to_string();
    let (int, frac) = text.split_once('.').unwrap_or((&text, ""));
    let digits: BigInt = format!("{int}{frac}").parse().ok()?;
    let scale = BigInt::from(10u32).pow(frac.len() as u32);
    let ratio = BigRational::new(digits, scale);
    Some(if f < 0.0 { -ratio } else { ratio })
}

/// Multiply `a` by `f` and round up.
pub fn mul_ceil(a: u64, f: f64) -> Result<BigInt, SdkError> {
    let ratio = decimal_ratio(f)
        .ok_or_else(|| SdkError::InvalidRequest(format!("gas adjustment {f} is not finite")))?;
    Ok((ratio * BigInt::from(a)).ceil().to_integer())
}

/// `ceil(gas_used × adjustment)`, saturating at `u64::MAX`.
pub fn adjust_gas(gas_used: u64, adjustment: f64) -> Result<u64, SdkError> {
    if adjustment < 0.0 {
        return Err(SdkError::InvalidRequest(format!(
            "gas adjustment must be non-negative, got {adjustment}"
        )));
    }
    Ok(mul_ceil(gas_used, adjustment)?.to_u64().unwrap_or(u64::MAX))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_settings() {
        assert_eq!("auto".parse::<GasSetting>().unwrap(), GasSetting::Auto);
        assert_eq!("150000".parse::<GasSetting>().unwrap(), GasSetting::Fixed(150_000));
        assert_eq!("".parse::<GasSetting>().unwrap(), GasSetting::Fixed(DEFAULT_GAS_LIMIT));
        assert!("lots".parse::<GasSetting>().is_err());
        assert_eq!(GasSetting::Auto.to_string(), "auto");
    }

    #[test]
    fn adjustment_rounds_up() {
        assert_eq!(adjust_gas(10, 1.2).unwrap(), 12);
        assert_eq!(adjust_gas(3, 1.5).unwrap(), 5);
        assert_eq!(adjust_gas(10, 1.1).unwrap(), 11);
        assert_eq!(adjust_gas(10, 1.3).unwrap(), 13);
        assert_eq!(adjust_gas(100, 1.15).unwrap(), 115);
        assert_eq!(adjust_gas(7, 1.3).unwrap(), 10);
        assert_eq!(adjust_gas(80_000, 1.3).unwrap(), 104_000);
        assert_eq!(adjust_gas(100_000, 1.0).unwrap(), 100_000);
        assert_eq!(adjust_gas(u64::MAX, 2.0).unwrap(), u64::MAX);
    }

    #[test]
    fn bad_adjustments() {
        assert!(adjust_gas(10, f64::NAN).is_err());
        assert!(adjust_gas(10, f64::INFINITY).is_err());
        assert!(adjust_gas(10, -1.0).is_err());
    }
}
