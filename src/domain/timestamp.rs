//! Second-precision sync timestamps
//!
//! Watermarks, window bounds and query parameters all share one text form,
//! `YYYY-MM-DDTHH:MM:SS`, with no zone designator. Values are captured in UTC.

use chrono::{DateTime, Duration, NaiveDateTime, Timelike, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

use super::errors::SyncError;

/// Text layout used in the state file, query parameters and file names
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// A zone-less timestamp truncated to whole seconds
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SyncTimestamp(NaiveDateTime);

impl SyncTimestamp {
    /// Creates a timestamp, dropping any sub-second component
    pub fn from_naive(value: NaiveDateTime) -> Self {
        Self(value.with_nanosecond(0).unwrap_or(value))
    }

    /// Creates a timestamp from a UTC instant
    pub fn from_utc(value: DateTime<Utc>) -> Self {
        Self::from_naive(value.naive_utc())
    }

    /// Captures the current UTC time
    pub fn now() -> Self {
        Self::from_utc(Utc::now())
    }

    /// Parses `YYYY-MM-DDTHH:MM:SS`
    ///
    /// # Errors
    ///
    /// Returns `SyncError::Validation` if the text does not match the layout.
    pub fn parse(value: &str) -> Result<Self, SyncError> {
        NaiveDateTime::parse_from_str(value.trim(), TIMESTAMP_FORMAT)
            .map(Self::from_naive)
            .map_err(|e| SyncError::Validation(format!("invalid timestamp '{value}': {e}")))
    }

    /// Returns the underlying naive date-time
    pub fn as_naive(&self) -> NaiveDateTime {
        self.0
    }

    /// Returns the same instant interpreted as UTC
    pub fn as_utc(&self) -> DateTime<Utc> {
        self.0.and_utc()
    }

    /// Steps back a whole number of days
    pub fn minus_days(&self, days: u32) -> Self {
        let shifted = self
            .0
            .checked_sub_signed(Duration::days(i64::from(days)))
            .unwrap_or(NaiveDateTime::MIN);
        Self(shifted)
    }

    /// Text form safe for file names (`:` replaced with `-`)
    pub fn file_token(&self) -> String {
        self.to_string().replace(':', "-")
    }
}

impl fmt::Display for SyncTimestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format(TIMESTAMP_FORMAT))
    }
}

impl FromStr for SyncTimestamp {
    type Err = SyncError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Serialize for SyncTimestamp {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for SyncTimestamp {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::parse(&raw).map_err(serde::de::Error::custom)
    }
}
