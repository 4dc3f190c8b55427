//! ISO 8601 date/time helpers shared by statement binds, typed value
//! extraction and the SPARQL date/time helper functions.

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, TimeZone, Utc};

use crate::errors::{Result, StoreError};

/// Parse an ISO 8601 string into a fixed-offset date/time.
///
/// Accepts full timestamps with `Z`, `±HH:MM` or `±HHMM` suffixes, offsetless
/// timestamps (interpreted as UTC) and plain dates (midnight UTC).
pub fn parse_iso8601(value: &str) -> Result<DateTime<FixedOffset>> {
    let trimmed = value.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
        return Ok(dt);
    }

    // ±HHMM offsets are valid ISO 8601 but not RFC 3339
    if let Ok(dt) = DateTime::parse_from_str(trimmed, "%Y-%m-%dT%H:%M:%S%.f%z") {
        return Ok(dt);
    }

    if let Ok(naive) = NaiveDateTime::parse_from_str(trimmed, "%Y-%m-%dT%H:%M:%S%.f") {
        return Ok(naive.and_utc().fixed_offset());
    }

    if let Ok(date) = NaiveDate::parse_from_str(trimmed, "%Y-%m-%d") {
        let midnight = date.and_hms_opt(0, 0, 0).expect("midnight is always valid");
        return Ok(midnight.and_utc().fixed_offset());
    }

    Err(StoreError::Time(format!(
        "'{}' is not a valid ISO 8601 date/time",
        value
    )))
}

/// Render Unix epoch seconds as an ISO 8601 UTC timestamp.
pub fn format_epoch_iso8601(epoch_seconds: i64) -> Result<String> {
    let datetime = Utc
        .timestamp_opt(epoch_seconds, 0)
        .single()
        .ok_or_else(|| {
            StoreError::Time(format!("epoch {} is out of range", epoch_seconds))
        })?;

    Ok(datetime.format("%Y-%m-%dT%H:%M:%SZ").to_string())
}

/// Render a date/time as ISO 8601, preserving its offset.
pub fn format_iso8601(datetime: &DateTime<FixedOffset>) -> String {
    if datetime.offset().local_minus_utc() == 0 {
        datetime.format("%Y-%m-%dT%H:%M:%SZ").to_string()
    } else {
        datetime.format("%Y-%m-%dT%H:%M:%S%:z").to_string()
    }
}

/// Epoch seconds including the offset correction applied by the SPARQL
/// `timestamp` helper.
pub fn epoch_with_offset(datetime: &DateTime<FixedOffset>) -> i64 {
    datetime.timestamp() + i64::from(datetime.offset().local_minus_utc())
}

/// UTC offset in seconds.
pub fn utc_offset_seconds(datetime: &DateTime<FixedOffset>) -> i64 {
    i64::from(datetime.offset().local_minus_utc())
}

/// Microsecond-resolution sort key: epoch microseconds plus the sub-second
/// microsecond component.
pub fn sort_key(datetime: &DateTime<FixedOffset>) -> i64 {
    datetime.timestamp() * 1_000_000 + i64::from(datetime.timestamp_subsec_micros())
}

/// Extract the timezone suffix of an ISO 8601 string without parsing it:
/// `Z`, `[+-]HH:MM`, `[+-]HHMM`, or empty when no suffix is present.
pub fn timezone_suffix(value: &str) -> &str {
    let bytes = value.as_bytes();
    let len = bytes.len();

    if value.ends_with('Z') {
        return "Z";
    }

    // Offset suffixes only occur in ASCII timestamps
    if !value.is_ascii() {
        return "";
    }

    // Shortest timestamp carrying an offset: 0000-00-00T00:00:00+00
    if len > "0000-00-00T00:00:00Z".len() {
        // [+-]HHMM
        if bytes[len - 5] == b'+' || bytes[len - 5] == b'-' {
            return &value[len - 5..];
        }
        // [+-]HH:MM
        if bytes[len - 6] == b'+' || bytes[len - 6] == b'-' {
            return &value[len - 6..];
        }
    }

    ""
}

/// Render a UTC offset as an xsd:dayTimeDuration.
///
/// A zero offset renders as `PT0S`, matching the integer-timestamp branch of
/// the SPARQL `timezone` helper.
pub fn offset_to_duration(offset_seconds: i64) -> String {
    if offset_seconds == 0 {
        return "PT0S".to_string();
    }

    let mut out = String::new();
    out.push_str(if offset_seconds > 0 { "+PT" } else { "-PT" });

    let offset = offset_seconds.abs();
    let hours = offset / 3600;
    let minutes = offset % 3600 / 60;
    let seconds = offset % 60;

    if hours > 0 {
        out.push_str(&format!("{}H", hours));
    }
    if minutes > 0 {
        out.push_str(&format!("{}M", minutes));
    }
    if seconds > 0 {
        out.push_str(&format!("{}S", seconds));
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_utc_timestamp() {
        let dt = parse_iso8601("2024-05-17T10:30:00Z").unwrap();
        assert_eq!(dt.timestamp(), 1715941800);
        assert_eq!(utc_offset_seconds(&dt), 0);
    }

    #[test]
    fn test_parse_offset_colon_and_compact_forms() {
        let colon = parse_iso8601("2024-05-17T10:30:00+02:00").unwrap();
        let compact = parse_iso8601("2024-05-17T10:30:00+0200").unwrap();
        assert_eq!(colon.timestamp(), compact.timestamp());
        assert_eq!(utc_offset_seconds(&colon), 7200);
    }

    #[test]
    fn test_parse_date_only_is_midnight_utc() {
        let dt = parse_iso8601("2004-02-01").unwrap();
        assert_eq!(format_iso8601(&dt), "2004-02-01T00:00:00Z");
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(parse_iso8601("not a date").is_err());
        assert!(parse_iso8601("2024-13-40T99:00:00Z").is_err());
    }

    /// Test: format_time(timestamp(T)) round-trips UTC timestamps
    #[test]
    fn test_epoch_round_trip() {
        let text = "2019-07-01T12:15:30Z";
        let dt = parse_iso8601(text).unwrap();
        let formatted = format_epoch_iso8601(epoch_with_offset(&dt)).unwrap();
        assert_eq!(formatted, text);
    }

    #[test]
    fn test_timezone_suffix_variants() {
        assert_eq!(timezone_suffix("2024-05-17T10:30:00Z"), "Z");
        assert_eq!(timezone_suffix("2024-05-17T10:30:00+02:00"), "+02:00");
        assert_eq!(timezone_suffix("2024-05-17T10:30:00-0930"), "-0930");
        assert_eq!(timezone_suffix("2024-05-17T10:30:00"), "");
        assert_eq!(timezone_suffix("2024-05-17"), "");
    }

    #[test]
    fn test_offset_to_duration_components() {
        assert_eq!(offset_to_duration(0), "PT0S");
        assert_eq!(offset_to_duration(7200), "+PT2H");
        assert_eq!(offset_to_duration(-34200), "-PT9H30M");
        assert_eq!(offset_to_duration(3661), "+PT1H1M1S");
    }

    #[test]
    fn test_sort_key_includes_microseconds() {
        let dt = parse_iso8601("1970-01-01T00:00:01.5Z").unwrap();
        assert_eq!(sort_key(&dt), 1_500_000);
    }
}
