//! Utility helpers shared by the feed and the collector.
//!
//! This module contains:
//! - Consensus timestamp parsing / formatting (`seconds.nanos`)
//! - ISO-8601 rendering used for record enrichment
//!
//! IMPORTANT:
//! - No feed-specific or HTTP-specific logic should live here.
//! - This module must remain lightweight and deterministic.

use chrono::{DateTime, SecondsFormat, Utc};

/// Parse a mirror-node consensus timestamp into a UTC instant.
///
/// Input format:
///     <seconds>.<nanoseconds>
///
/// Examples:
/// - "1700000000.000000001" -> 2023-11-14T22:13:20.000000001Z
/// - "1700000000"           -> 2023-11-14T22:13:20Z
///
/// The fractional part is right-padded, so "5.1" means 5.100000000.
/// Returns `None` for anything that is not a valid instant.
pub fn parse_consensus_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let (secs, frac) = match raw.split_once('.') {
        Some((s, f)) => (s, f),
        None => (raw, ""),
    };

    if secs.is_empty() || frac.len() > 9 || !frac.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }

    let secs: i64 = secs.parse().ok()?;
    let nanos: u32 = if frac.is_empty() {
        0
    } else {
        format!("{:0<9}", frac).parse().ok()?
    };

    DateTime::from_timestamp(secs, nanos)
}

/// Render an instant in the `seconds.nanos` form used by mirror-node
/// query filters (e.g. `timestamp=gte:0.000000000`).
pub fn format_consensus_timestamp(ts: &DateTime<Utc>) -> String {
    format!("{}.{:09}", ts.timestamp(), ts.timestamp_subsec_nanos())
}

/// ISO-8601 string used for the `timestamp` enrichment field.
///
/// Millisecond precision, UTC, `Z` suffix:
///     2023-11-14T22:13:20.000Z
pub fn iso_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}
