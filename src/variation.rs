// Variation Calculator - month-over-month percentage change
//
// Compatibility convention: a previous value of zero (or below) yields 0,
// the same figure as "no change". Callers cannot tell "no prior data" apart
// from a flat month; reports have always published it this way.

use serde::Serialize;

use crate::calendar::Month;
use crate::error::Result;

/// `(current - previous) / previous * 100`, or 0 when `previous <= 0`.
pub fn percent_change(current: f64, previous: f64) -> f64 {
    if previous > 0.0 {
        (current - previous) / previous * 100.0
    } else {
        0.0
    }
}

/// A metric value that can feed `percent_change`.
pub trait Measure: Copy {
    fn as_f64(self) -> f64;
}

impl Measure for u64 {
    fn as_f64(self) -> f64 {
        self as f64
    }
}

impl Measure for i64 {
    fn as_f64(self) -> f64 {
        self as f64
    }
}

impl Measure for f64 {
    fn as_f64(self) -> f64 {
        self
    }
}

/// A metric for a month alongside the same metric for the month before.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Trend<T> {
    pub current: T,
    pub previous: T,
    pub percent_change: f64,
}

impl<T: Measure> Trend<T> {
    pub fn new(current: T, previous: T) -> Self {
        Trend {
            current,
            previous,
            percent_change: percent_change(current.as_f64(), previous.as_f64()),
        }
    }
}

/// Measure `month` and the month before it, then compare.
pub fn month_over_month<T, F>(month: Month, mut measure: F) -> Result<Trend<T>>
where
    T: Measure,
    F: FnMut(Month) -> Result<T>,
{
    let current = measure(month)?;
    let previous = measure(month.previous())?;
    Ok(Trend::new(current, previous))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::MetricsError;

    #[test]
    fn test_percent_change() {
        assert_eq!(percent_change(750.0, 500.0), 50.0);
        assert_eq!(percent_change(250.0, 500.0), -50.0);
        assert_eq!(percent_change(500.0, 500.0), 0.0);
        assert_eq!(percent_change(0.0, 4.0), -100.0);
    }

    #[test]
    fn test_zero_previous_is_zero() {
        for current in [0.0, 1.0, 3000.0, 1e12] {
            assert_eq!(percent_change(current, 0.0), 0.0);
        }
        assert_eq!(percent_change(10.0, -5.0), 0.0);
    }

    #[test]
    fn test_month_over_month_measures_previous_month() {
        let mut seen = Vec::new();
        let trend = month_over_month(Month::parse("01-2024").unwrap(), |m| {
            seen.push(m.to_string());
            Ok(if m.month() == 1 { 750_i64 } else { 500 })
        })
        .unwrap();

        assert_eq!(seen, vec!["01-2024", "12-2023"]);
        assert_eq!(trend.current, 750);
        assert_eq!(trend.previous, 500);
        assert_eq!(trend.percent_change, 50.0);
    }

    #[test]
    fn test_month_over_month_propagates_errors() {
        let result: Result<Trend<u64>> = month_over_month(Month::parse("03-2023").unwrap(), |m| {
            Err(MetricsError::MerchantNotFound(m.to_string()))
        });
        assert!(result.is_err());
    }
}
