//! Locale-independent date formatting helpers for certificate field sets.
//!
//! All formatting uses a fixed three-letter month table rather than the host
//! locale, so rendered certificates are byte-stable across deployments.

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime};

const MONTH_NAMES: [&str; 12] = [
    "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec",
];

/// Parse a timestamp as it appears in credential documents.
///
/// Accepts RFC 3339 (`2023-01-05T00:00:00Z`), a naive datetime without
/// offset, or a bare date. Offset timestamps are normalized to UTC before
/// formatting.
pub fn parse_timestamp(value: &str) -> Option<NaiveDateTime> {
    if let Ok(parsed) = DateTime::parse_from_rfc3339(value) {
        return Some(parsed.naive_utc());
    }
    if let Ok(parsed) = NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S") {
        return Some(parsed);
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .map(|date| date.and_time(NaiveTime::MIN))
}

/// Day of month without padding: `2023-01-05…` → `"5"`.
pub fn day(value: &str) -> Option<String> {
    use chrono::Datelike;
    parse_timestamp(value).map(|ts| ts.day().to_string())
}

/// Three-letter month name: `2023-01-05…` → `"Jan"`.
pub fn month(value: &str) -> Option<String> {
    use chrono::Datelike;
    parse_timestamp(value).map(|ts| MONTH_NAMES[ts.month0() as usize].to_string())
}

/// Four-digit year: `2023-01-05…` → `"2023"`.
pub fn year(value: &str) -> Option<String> {
    use chrono::Datelike;
    parse_timestamp(value).map(|ts| ts.year().to_string())
}

/// `DD-Mon-YYYY` with a zero-padded day: `2023-01-05…` → `"05-Jan-2023"`.
pub fn format_date(value: &str) -> Option<String> {
    use chrono::Datelike;
    parse_timestamp(value).map(|ts| {
        format!(
            "{}-{}-{}",
            pad_digit(ts.day()),
            MONTH_NAMES[ts.month0() as usize],
            ts.year()
        )
    })
}

/// `DD-Mon-YYYY HH:MM` with zero-padded day, hour and minute.
pub fn format_date_time(value: &str) -> Option<String> {
    use chrono::{Datelike, Timelike};
    parse_timestamp(value).map(|ts| {
        format!(
            "{}-{}-{} {}:{}",
            pad_digit(ts.day()),
            MONTH_NAMES[ts.month0() as usize],
            ts.year(),
            pad_digit(ts.hour()),
            pad_digit(ts.minute())
        )
    })
}

/// Ordinal-suffixed day number: `21` → `"21st"`, `11` → `"11th"`.
pub fn ordinal(n: u32) -> String {
    let suffix = match n % 100 {
        11..=13 => "th",
        _ => match n % 10 {
            1 => "st",
            2 => "nd",
            3 => "rd",
            _ => "th",
        },
    };
    format!("{n}{suffix}")
}

/// Zero-pad a number to two digits.
pub fn pad_digit(digit: u32) -> String {
    format!("{digit:02}")
}
