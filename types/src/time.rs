//! Timestamp type used by fee allowances and block times.
//!
//! Timestamps are Unix epoch seconds (UTC). Sub-second precision is not
//! needed by any allowance rule.

use std::fmt;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use crate::error::SdkError;
use crate::proto;

/// A Unix timestamp in seconds since epoch (UTC).
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Timestamp(u64);

impl Timestamp {
    /// The epoch (time zero).
    pub const EPOCH: Self = Self(0);

    pub fn new(secs: u64) -> Self {
        Self(secs)
    }

    /// Current system time. A clock set before 1970 reads as the epoch.
    pub fn now() -> Self {
        let secs = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);
        Self(secs)
    }

    pub fn as_secs(&self) -> u64 {
        self.0
    }

    pub fn plus_secs(&self, secs: u64) -> Self {
        Self(self.0.saturating_add(secs))
    }

    /// Big-endian bytes, used in ordered store keys.
    pub fn to_be_bytes(&self) -> [u8; 8] {
        self.0.to_be_bytes()
    }

    /// Parse an RFC 3339 timestamp. Any offset is accepted and normalized to
    /// UTC; fractional seconds are dropped and times before 1970 are rejected.
    pub fn parse_rfc3339(s: &str) -> Option<Self> {
        let parsed = DateTime::parse_from_rfc3339(s.trim()).ok()?;
        u64::try_from(parsed.timestamp()).ok().map(Self)
    }

    pub fn to_datetime(&self) -> DateTime<Utc> {
        i64::try_from(self.0)
            .ok()
            .and_then(|secs| DateTime::from_timestamp(secs, 0))
            .unwrap_or(DateTime::<Utc>::MAX_UTC)
    }

    /// Render as RFC 3339 UTC (`1970-01-01T00:00:00Z`).
    pub fn to_rfc3339(&self) -> String {
        self.to_datetime().to_rfc3339_opts(SecondsFormat::Secs, true)
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_rfc3339())
    }
}

impl From<Timestamp> for proto::Timestamp {
    fn from(t: Timestamp) -> Self {
        proto::Timestamp {
            seconds: t.0 as i64,
            nanos: 0,
        }
    }
}

impl From<proto::Timestamp> for Timestamp {
    fn from(t: proto::Timestamp) -> Self {
        Timestamp(t.seconds.max(0) as u64)
    }
}

/// Parse a duration into whole seconds. Accepts bare seconds (`90`),
/// humantime forms (`15m`, `2h 30m`, `7days`) and protobuf JSON durations
/// (`3600s`, `1.5s`; the fraction is dropped).
pub fn parse_duration(text: &str) -> Result<u64, SdkError> {
    let text = text.trim();
    if let Ok(secs) = text.parse::<u64>() {
        return Ok(secs);
    }
    if let Some((whole, frac)) = text.strip_suffix('s').and_then(|t| t.split_once('.')) {
        if !frac.is_empty() && frac.bytes().all(|b| b.is_ascii_digit()) {
            if let Ok(secs) = whole.parse::<u64>() {
                return Ok(secs);
            }
        }
    }
    humantime::parse_duration(text)
        .map(|d| d.as_secs())
        .map_err(|e| SdkError::InvalidRequest(format!("invalid duration {text:?}: {e}")))
}

/// Human-readable rendering of a number of seconds, e.g. `1h 1m`.
pub fn format_duration(secs: u64) -> String {
    humantime::format_duration(Duration::from_secs(secs)).to_string()
}
