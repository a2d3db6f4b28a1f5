//! Timestamp and display formatting utilities
//!
//! The brewing-log service reports instants as milliseconds since the Unix
//! epoch. Everything shown to the operator (and stored for display) uses the
//! fixed day-first formats below.

use chrono::{DateTime, Local, NaiveDate, TimeZone};

/// Calendar date display format (`19/10/2026`)
pub const DISPLAY_DATE_FORMAT: &str = "%d/%m/%Y";

/// Date and time display format (`19/10/2026 14:05:09`)
pub const DISPLAY_DATETIME_FORMAT: &str = "%d/%m/%Y %H:%M:%S";

/// Print timestamp format used on labels (`19/10/2026 14:05`)
pub const PRINT_TIMESTAMP_FORMAT: &str = "%d/%m/%Y %H:%M";

/// Get current local timestamp
pub fn now() -> DateTime<Local> {
    Local::now()
}

/// Convert an epoch-millisecond instant to local time
///
/// Returns `None` for instants chrono cannot represent.
pub fn local_from_millis(millis: i64) -> Option<DateTime<Local>> {
    Local.timestamp_millis_opt(millis).single()
}

/// Format an epoch-millisecond instant as a local calendar date
pub fn format_display_date(millis: i64) -> Option<String> {
    local_from_millis(millis).map(|dt| dt.format(DISPLAY_DATE_FORMAT).to_string())
}

/// Format an epoch-millisecond instant as local date and time
pub fn format_display_datetime(millis: i64) -> Option<String> {
    local_from_millis(millis).map(|dt| dt.format(DISPLAY_DATETIME_FORMAT).to_string())
}

/// Parse a `dd/mm/YYYY` display date
///
/// Blank or malformed input yields `None`, never an error.
pub fn parse_display_date(value: &str) -> Option<NaiveDate> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return None;
    }
    NaiveDate::parse_from_str(trimmed, DISPLAY_DATE_FORMAT).ok()
}

/// Significant digits SQLite keeps when casting REAL to TEXT
const SQLITE_REAL_DIGITS: usize = 15;

/// Render a numeric measurement the way SQLite renders REAL values as text
///
/// The value is rounded to 15 significant digits (`0.1 + 0.2` prints `0.3`).
/// Whole numbers keep one decimal place (`5.0`).
pub fn format_measurement(value: f64) -> String {
    if !value.is_finite() {
        return value.to_string();
    }

    let rounded: f64 = format!("{:.*e}", SQLITE_REAL_DIGITS - 1, value)
        .parse()
        .unwrap_or(value);
    if rounded.fract() == 0.0 {
        format!("{:.1}", rounded)
    } else {
        rounded.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Datelike;

    #[test]
    fn test_format_display_date_matches_local_calendar() {
        let millis = 1_700_000_000_000;
        let expected = Local
            .timestamp_millis_opt(millis)
            .unwrap()
            .format("%d/%m/%Y")
            .to_string();
        assert_eq!(format_display_date(millis), Some(expected));
    }

    #[test]
    fn test_format_display_datetime_has_seconds() {
        let formatted = format_display_datetime(1_700_000_000_000).unwrap();
        // dd/mm/YYYY HH:MM:SS
        assert_eq!(formatted.len(), 19);
        assert_eq!(&formatted[2..3], "/");
        assert_eq!(&formatted[13..14], ":");
    }

    #[test]
    fn test_out_of_range_millis_is_none() {
        assert!(format_display_date(i64::MAX).is_none());
        assert!(format_display_datetime(i64::MIN).is_none());
    }

    #[test]
    fn test_parse_display_date() {
        let date = parse_display_date("05/03/2024").unwrap();
        assert_eq!((date.day(), date.month(), date.year()), (5, 3, 2024));
        assert_eq!(parse_display_date(" 05/03/2024 "), Some(date));
    }

    #[test]
    fn test_parse_display_date_rejects_garbage() {
        assert!(parse_display_date("").is_none());
        assert!(parse_display_date("2024-03-05").is_none());
        assert!(parse_display_date("31/02/2024").is_none());
    }

    #[test]
    fn test_format_measurement() {
        assert_eq!(format_measurement(5.0), "5.0");
        assert_eq!(format_measurement(5.2), "5.2");
        assert_eq!(format_measurement(35.0), "35.0");
        assert_eq!(format_measurement(12.75), "12.75");
    }

    #[test]
    fn test_format_measurement_rounds_like_sqlite() {
        assert_eq!(format_measurement(0.1 + 0.2), "0.3");
        assert_eq!(format_measurement(5.1 * 3.0), "15.3");
        assert_eq!(format_measurement(4.999_999_999_999_999), "5.0");
        assert_eq!(format_measurement(-1.25), "-1.25");
    }
}
