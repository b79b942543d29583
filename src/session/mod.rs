//! Session expiry normalization for provider-issued sessions.
//!
//! The identity provider reports session expiry in more than one shape
//! depending on version and grant path: an RFC 3339 timestamp, epoch seconds,
//! or nothing at all. Clients get exactly one shape: epoch seconds. Every
//! handler that returns a session goes through [`SessionExpiry::normalize`].

use chrono::{DateTime, Utc};
use serde::Deserialize;

/// Expiry of a provider session as found on the wire.
///
/// Deserialized from the provider response before normalization; the order of
/// variants matters for `untagged` resolution (numbers before strings, absent
/// last).
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum SessionExpiry {
    /// Epoch seconds, the shape newer providers emit.
    Epoch(i64),
    /// A timestamp string, typically RFC 3339.
    Timestamp(String),
    /// Field missing or null.
    Absent,
}

impl Default for SessionExpiry {
    fn default() -> Self {
        Self::Absent
    }
}

impl SessionExpiry {
    /// Normalize to epoch seconds.
    ///
    /// Epoch values pass through unchanged. Timestamp strings containing the
    /// `T` date-time separator are parsed as RFC 3339 and floored to whole
    /// seconds; plain numeric strings are accepted as epoch seconds. Anything
    /// else, including absent values and unparseable strings, falls back to
    /// now plus `fallback_ttl_seconds`.
    #[must_use]
    pub fn normalize(&self, fallback_ttl_seconds: i64) -> i64 {
        match self {
            Self::Epoch(seconds) => *seconds,
            Self::Timestamp(value) => normalize_timestamp(value)
                .unwrap_or_else(|| fallback_expiry(fallback_ttl_seconds)),
            Self::Absent => fallback_expiry(fallback_ttl_seconds),
        }
    }
}

fn normalize_timestamp(value: &str) -> Option<i64> {
    let trimmed = value.trim();
    if trimmed.contains('T') {
        return DateTime::parse_from_rfc3339(trimmed)
            .ok()
            .map(|parsed| parsed.timestamp());
    }
    // Some provider versions stringify the epoch; accept it as-is.
    trimmed.parse::<i64>().ok()
}

fn fallback_expiry(ttl_seconds: i64) -> i64 {
    Utc::now().timestamp() + ttl_seconds
}
