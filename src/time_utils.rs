// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Shared helpers for date/time formatting and parsing.

use chrono::{DateTime, NaiveDateTime, SecondsFormat, Utc};
use serde::{Deserialize, Deserializer};

/// Wire format for position timestamps (microsecond precision, no offset).
const POSITION_TIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.6f";

/// Format a UTC timestamp as RFC3339 using a `Z` suffix.
pub fn format_utc_rfc3339(date: DateTime<Utc>) -> String {
    date.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Format a position timestamp, e.g. `2024-10-12T14:30:15.000000`.
pub fn format_position_time(date: DateTime<Utc>) -> String {
    date.format(POSITION_TIME_FORMAT).to_string()
}

/// Parse a client timestamp.
///
/// Accepts RFC3339 with an offset, or a naive `YYYY-MM-DDTHH:MM:SS[.ffffff]`
/// which is taken to be UTC.
pub fn parse_client_time(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|naive| naive.and_utc())
}

/// Serde helper for optional client timestamps.
pub fn deserialize_optional_client_time<'de, D>(
    deserializer: D,
) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    raw.map(|s| {
        parse_client_time(&s)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid date_time: {}", s)))
    })
    .transpose()
}
