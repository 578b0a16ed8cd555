// Calendar helpers - months, half-open month windows, and timestamp parsing
//
// Every metric is scoped to a calendar month. The window is half-open:
//   [first day of month 00:00, first day of next month 00:00)
//
// Lifecycle queries additionally clamp the window end to HORIZON.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Datelike, Months, NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Deserializer};

use crate::error::{MetricsError, Result};

// ============================================================================
// HORIZON
// ============================================================================

/// Fixed data-horizon cutoff (2023-06-11 00:00). Lifecycle windows never end
/// after this instant, including windows of months at or past it.
pub fn horizon() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2023, 6, 11)
        .expect("horizon cutoff is a valid calendar date")
        .and_time(NaiveTime::MIN)
}

// ============================================================================
// MONTH
// ============================================================================

/// A calendar month, written `MM-YYYY` at the boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Month {
    first: NaiveDate,
}

impl Month {
    pub fn new(year: i32, month: u32) -> Result<Self> {
        NaiveDate::from_ymd_opt(year, month, 1)
            .map(|first| Month { first })
            .ok_or_else(|| MetricsError::MalformedMonth(format!("{:02}-{:04}", month, year)))
    }

    /// Parse `MM-YYYY` (a single-digit month such as `3-2023` is accepted).
    pub fn parse(input: &str) -> Result<Self> {
        let malformed = || MetricsError::MalformedMonth(input.to_string());

        let (month, year) = input.trim().split_once('-').ok_or_else(malformed)?;

        let all_digits = |s: &str| !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit());
        if !all_digits(month) || month.len() > 2 || !all_digits(year) || year.len() != 4 {
            return Err(malformed());
        }

        let month: u32 = month.parse().map_err(|_| malformed())?;
        let year: i32 = year.parse().map_err(|_| malformed())?;

        if !(1..=12).contains(&month) {
            return Err(malformed());
        }

        Month::new(year, month).map_err(|_| malformed())
    }

    pub fn year(&self) -> i32 {
        self.first.year()
    }

    pub fn month(&self) -> u32 {
        self.first.month()
    }

    pub fn first_day(&self) -> NaiveDate {
        self.first
    }

    pub fn next(&self) -> Month {
        Month {
            first: self.first + Months::new(1),
        }
    }

    /// Previous calendar month; January rolls back to December of the prior year.
    pub fn previous(&self) -> Month {
        Month {
            first: self.first - Months::new(1),
        }
    }

    /// Full calendar-month window, used by payment queries.
    pub fn window(&self) -> MonthWindow {
        MonthWindow {
            start: self.first.and_time(NaiveTime::MIN),
            end: self.next().first.and_time(NaiveTime::MIN),
        }
    }

    /// Calendar-month window with its end capped at the horizon, used by
    /// lifecycle queries.
    pub fn clamped_window(&self) -> MonthWindow {
        let window = self.window();
        MonthWindow {
            start: window.start,
            end: window.end.min(horizon()),
        }
    }
}

impl fmt::Display for Month {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}-{:04}", self.month(), self.year())
    }
}

impl FromStr for Month {
    type Err = MetricsError;

    fn from_str(s: &str) -> Result<Self> {
        Month::parse(s)
    }
}

// ============================================================================
// MONTH WINDOW
// ============================================================================

/// Half-open interval `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MonthWindow {
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
}

impl MonthWindow {
    pub fn contains(&self, ts: NaiveDateTime) -> bool {
        self.start <= ts && ts < self.end
    }
}

// ============================================================================
// TIMESTAMPS
// ============================================================================

/// Parse a stored timestamp.
///
/// Accepts RFC 3339 (converted to UTC), naive `YYYY-MM-DDTHH:MM:SS[.f]`
/// (with `T` or a space), and bare `YYYY-MM-DD` dates (midnight).
pub fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.naive_utc());
    }

    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(dt);
        }
    }

    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .map(|date| date.and_time(NaiveTime::MIN))
}

/// Canonical string form used when timestamps are written into filters.
pub fn format_timestamp(ts: NaiveDateTime) -> String {
    ts.format("%Y-%m-%dT%H:%M:%S").to_string()
}

pub(crate) fn deserialize_timestamp<'de, D>(deserializer: D) -> std::result::Result<NaiveDateTime, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    parse_timestamp(&raw)
        .ok_or_else(|| serde::de::Error::custom(format!("unrecognized timestamp '{}'", raw)))
}

pub(crate) fn deserialize_optional_timestamp<'de, D>(
    deserializer: D,
) -> std::result::Result<Option<NaiveDateTime>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<String>::deserialize(deserializer)? {
        None => Ok(None),
        Some(raw) if raw.trim().is_empty() => Ok(None),
        Some(raw) => parse_timestamp(&raw)
            .map(Some)
            .ok_or_else(|| serde::de::Error::custom(format!("unrecognized timestamp '{}'", raw))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(y: i32, m: u32, d: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d).unwrap().and_time(NaiveTime::MIN)
    }

    #[test]
    fn test_parse_month() {
        let month = Month::parse("03-2023").unwrap();
        assert_eq!(month.year(), 2023);
        assert_eq!(month.month(), 3);
        assert_eq!(month.to_string(), "03-2023");

        assert_eq!(Month::parse("3-2023").unwrap(), month);
        assert_eq!("12-1999".parse::<Month>().unwrap().month(), 12);
    }

    #[test]
    fn test_parse_month_rejects_malformed_input() {
        for bad in ["", "2023-03", "13-2023", "00-2023", "03/2023", "03-23", "ab-2023", "003-2023", "03-2023-1"] {
            let err = Month::parse(bad).unwrap_err();
            assert!(
                matches!(err, MetricsError::MalformedMonth(_)),
                "'{}' should be rejected as malformed",
                bad
            );
        }
    }

    #[test]
    fn test_previous_month_rolls_over_year() {
        let january = Month::parse("01-2024").unwrap();
        assert_eq!(january.previous().to_string(), "12-2023");
        assert_eq!(Month::parse("12-2023").unwrap().next(), january);
        assert_eq!(Month::parse("03-2023").unwrap().previous().to_string(), "02-2023");
    }

    #[test]
    fn test_window_is_half_open() {
        let window = Month::parse("02-2024").unwrap().window();
        assert_eq!(window.start, at(2024, 2, 1));
        assert_eq!(window.end, at(2024, 3, 1));
        assert!(window.contains(at(2024, 2, 1)));
        assert!(window.contains(at(2024, 2, 29)));
        assert!(!window.contains(at(2024, 3, 1)));
    }

    #[test]
    fn test_clamped_window_caps_at_horizon() {
        let june = Month::parse("06-2023").unwrap();
        assert_eq!(june.window().end, at(2023, 7, 1));
        assert_eq!(june.clamped_window().end, at(2023, 6, 11));

        // Months before the horizon are untouched
        let may = Month::parse("05-2023").unwrap();
        assert_eq!(may.clamped_window(), may.window());

        // Months past the horizon still end at the horizon
        let later = Month::parse("09-2023").unwrap();
        assert_eq!(later.clamped_window().end, horizon());
    }

    #[test]
    fn test_parse_timestamp_formats() {
        let expected = at(2023, 3, 5);
        assert_eq!(parse_timestamp("2023-03-05T00:00:00Z"), Some(expected));
        assert_eq!(parse_timestamp("2023-03-05T02:00:00+02:00"), Some(expected));
        assert_eq!(parse_timestamp("2023-03-05T00:00:00"), Some(expected));
        assert_eq!(parse_timestamp("2023-03-05 00:00:00.000"), Some(expected));
        assert_eq!(parse_timestamp("2023-03-05"), Some(expected));
        assert_eq!(parse_timestamp("March 5th"), None);
    }
}
