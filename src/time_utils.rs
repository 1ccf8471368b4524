// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Shared helpers for date/time formatting.

use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};

/// Format a UTC timestamp as RFC3339 using a `Z` suffix.
pub fn format_utc_rfc3339(date: DateTime<Utc>) -> String {
    date.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Format Unix seconds as RFC3339 (UTC), or the raw number if out of range.
pub fn format_unix_rfc3339(timestamp: i64) -> String {
    DateTime::from_timestamp(timestamp, 0)
        .map(format_utc_rfc3339)
        .unwrap_or_else(|| timestamp.to_string())
}

/// Calendar date of a Unix timestamp in UTC.
///
/// Streak counting always uses UTC so results are reproducible across
/// machines and runs.
pub fn utc_date(timestamp: i64) -> Option<NaiveDate> {
    DateTime::from_timestamp(timestamp, 0).map(|dt| dt.date_naive())
}

/// Current time as Unix seconds.
pub fn now_unix() -> i64 {
    Utc::now().timestamp()
}
