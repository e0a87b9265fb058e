//! Timestamps written by the store itself.

use chrono::{DateTime, FixedOffset, Offset, SecondsFormat, Utc};

/// `at` shifted to `offset_hours` east of UTC. Offsets chrono rejects fall
/// back to UTC.
#[must_use]
pub fn local(at: DateTime<Utc>, offset_hours: i32) -> DateTime<FixedOffset> {
    let offset = offset_hours
        .checked_mul(3600)
        .and_then(FixedOffset::east_opt)
        .unwrap_or_else(|| Utc.fix());
    at.with_timezone(&offset)
}

/// `at`, shifted to `offset_hours` east of UTC, as ISO-8601 with seconds
/// precision (e.g. `2026-10-19T15:04:05+04:00`).
#[must_use]
pub fn iso_at(at: DateTime<Utc>, offset_hours: i32) -> String {
    local(at, offset_hours).to_rfc3339_opts(SecondsFormat::Secs, false)
}

/// Current time as [`iso_at`] formats it.
#[must_use]
pub fn now_iso(offset_hours: i32) -> String {
    iso_at(Utc::now(), offset_hours)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_offset_applied() {
        let at = Utc.with_ymd_and_hms(2026, 10, 19, 11, 0, 0).unwrap();
        assert_eq!(iso_at(at, 4), "2026-10-19T15:00:00+04:00");
        assert_eq!(iso_at(at, 0), "2026-10-19T11:00:00+00:00");
    }

    #[test]
    fn test_out_of_range_offset_falls_back_to_utc() {
        let at = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        assert_eq!(iso_at(at, 48), "2026-01-01T00:00:00+00:00");
        assert_eq!(iso_at(at, i32::MAX), "2026-01-01T00:00:00+00:00");
        assert_eq!(iso_at(at, i32::MIN), "2026-01-01T00:00:00+00:00");
    }
}
