//! Parsing of GitHub timestamps.

use chrono::{DateTime, Utc};

/// Parse an RFC3339 timestamp. Empty or malformed input yields `None`.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw.trim())
        .ok()
        .map(|t| t.with_timezone(&Utc))
}

/// Parse a workflow run's created/updated pair, substituting the current
/// time for any value that does not parse.
pub fn normalize_run_timestamps(created: &str, updated: &str) -> (DateTime<Utc>, DateTime<Utc>) {
    normalize_run_timestamps_at(created, updated, Utc::now())
}

pub fn normalize_run_timestamps_at(
    created: &str,
    updated: &str,
    now: DateTime<Utc>,
) -> (DateTime<Utc>, DateTime<Utc>) {
    (
        parse_timestamp(created).unwrap_or(now),
        parse_timestamp(updated).unwrap_or(now),
    )
}
