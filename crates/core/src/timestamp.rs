//! Timestamp formatting for the versioning vocabulary.
//!
//! The store compares `valid_from` / `valid_until` annotations as typed
//! `xsd:dateTime` literals, so every instant sent over the wire uses one
//! canonical shape: millisecond precision and an explicit `+HH:MM` offset,
//! e.g. `2024-03-01T12:00:00.000+01:00`.

use chrono::{DateTime, FixedOffset, Local};

/// Date and time part of the "open / currently valid" `valid_until` value.
///
/// The offset is appended from the instant the fact was written with, so the
/// sentinel always sorts after any real timestamp of the same dataset.
pub const SENTINEL_DATETIME: &str = "9999-12-31T00:00:00.000";

/// Format an instant in the store's wire format.
pub fn versioning_timestamp_format(at: &DateTime<FixedOffset>) -> String {
    at.format("%Y-%m-%dT%H:%M:%S%.3f%:z").to_string()
}

/// The current system time carrying the local UTC offset.
pub fn now_with_local_offset() -> DateTime<FixedOffset> {
    Local::now().fixed_offset()
}

/// Resolve an optional caller-supplied instant, falling back to now.
pub fn resolve(at: Option<DateTime<FixedOffset>>) -> DateTime<FixedOffset> {
    at.unwrap_or_else(now_with_local_offset)
}

/// The sentinel `valid_until` value sharing the offset of `at`.
pub fn sentinel_for(at: &DateTime<FixedOffset>) -> String {
    format!("{SENTINEL_DATETIME}{}", at.format("%:z"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dt(s: &str) -> DateTime<FixedOffset> {
        DateTime::parse_from_rfc3339(s).unwrap()
    }

    #[test]
    fn formats_with_millis_and_colon_offset() {
        let at = dt("2022-10-01T12:34:56.789123+02:00");
        assert_eq!(
            versioning_timestamp_format(&at),
            "2022-10-01T12:34:56.789+02:00"
        );
    }

    #[test]
    fn whole_seconds_still_get_three_fraction_digits() {
        let at = dt("2021-01-01T00:00:00-05:30");
        assert_eq!(
            versioning_timestamp_format(&at),
            "2021-01-01T00:00:00.000-05:30"
        );
    }

    #[test]
    fn utc_offset_is_spelled_out() {
        let at = dt("2021-01-01T00:00:00Z");
        assert!(versioning_timestamp_format(&at).ends_with("+00:00"));
    }

    #[test]
    fn sentinel_keeps_offset_of_context() {
        let at = dt("2023-06-01T08:00:00.000+02:00");
        assert_eq!(sentinel_for(&at), "9999-12-31T00:00:00.000+02:00");
    }

    #[test]
    fn resolve_prefers_explicit_instant() {
        let at = dt("2020-02-02T02:02:02.000+01:00");
        assert_eq!(resolve(Some(at)), at);
    }

    #[test]
    fn resolve_without_instant_is_now() {
        let before = Local::now().fixed_offset();
        let resolved = resolve(None);
        let after = Local::now().fixed_offset();
        assert!(before <= resolved && resolved <= after);
    }
}
