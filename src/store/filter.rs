// Structured query predicates over JSON documents
//
// Mirrors the subset of document-store query operators the metrics need:
// equality, set membership, half-open ranges, array element matching,
// negation, and boolean composition.

use std::cmp::Ordering;

use chrono::NaiveDateTime;
use serde_json::Value;

use crate::calendar::{format_timestamp, parse_timestamp, MonthWindow};

#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    /// Matches every document
    All,

    /// Field equals value
    Eq(String, Value),

    /// Field equals one of the values
    In(String, Vec<Value>),

    /// `gte <= field < lt`, either bound optional
    Range {
        path: String,
        gte: Option<Value>,
        lt: Option<Value>,
    },

    /// Field is an array with at least one element matching the inner filter
    ElemMatch(String, Box<Filter>),

    Not(Box<Filter>),
    And(Vec<Filter>),
    Or(Vec<Filter>),
}

impl Filter {
    pub fn eq(path: &str, value: impl Into<Value>) -> Self {
        Filter::Eq(path.to_string(), value.into())
    }

    pub fn in_values<I, V>(path: &str, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        Filter::In(path.to_string(), values.into_iter().map(Into::into).collect())
    }

    /// Timestamp field strictly before `ts`.
    pub fn before(path: &str, ts: NaiveDateTime) -> Self {
        Filter::Range {
            path: path.to_string(),
            gte: None,
            lt: Some(Value::String(format_timestamp(ts))),
        }
    }

    /// Timestamp field inside the half-open window.
    pub fn within(path: &str, window: &MonthWindow) -> Self {
        Filter::Range {
            path: path.to_string(),
            gte: Some(Value::String(format_timestamp(window.start))),
            lt: Some(Value::String(format_timestamp(window.end))),
        }
    }

    pub fn elem_match(path: &str, inner: Filter) -> Self {
        Filter::ElemMatch(path.to_string(), Box::new(inner))
    }

    pub fn not(inner: Filter) -> Self {
        Filter::Not(Box::new(inner))
    }

    pub fn and(filters: Vec<Filter>) -> Self {
        Filter::And(filters)
    }

    pub fn or(filters: Vec<Filter>) -> Self {
        Filter::Or(filters)
    }

    /// Evaluate this predicate against a document.
    ///
    /// A missing or null field never satisfies `Eq`, `In`, or `Range`.
    pub fn matches(&self, doc: &Value) -> bool {
        match self {
            Filter::All => true,
            Filter::Eq(path, expected) => {
                present(doc, path).map_or(false, |actual| values_equal(actual, expected))
            }
            Filter::In(path, candidates) => present(doc, path).map_or(false, |actual| {
                candidates.iter().any(|candidate| values_equal(actual, candidate))
            }),
            Filter::Range { path, gte, lt } => present(doc, path).map_or(false, |actual| {
                let lower_ok = gte.as_ref().map_or(true, |bound| {
                    matches!(
                        compare_values(actual, bound),
                        Some(Ordering::Greater) | Some(Ordering::Equal)
                    )
                });
                let upper_ok = lt
                    .as_ref()
                    .map_or(true, |bound| compare_values(actual, bound) == Some(Ordering::Less));
                lower_ok && upper_ok
            }),
            Filter::ElemMatch(path, inner) => match lookup(doc, path) {
                Some(Value::Array(items)) => items.iter().any(|item| inner.matches(item)),
                _ => false,
            },
            Filter::Not(inner) => !inner.matches(doc),
            Filter::And(filters) => filters.iter().all(|f| f.matches(doc)),
            Filter::Or(filters) => filters.iter().any(|f| f.matches(doc)),
        }
    }
}

/// Resolve a dotted path through nested objects.
pub fn lookup<'a>(doc: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('.').try_fold(doc, |current, key| current.as_object()?.get(key))
}

fn present<'a>(doc: &'a Value, path: &str) -> Option<&'a Value> {
    lookup(doc, path).filter(|value| !value.is_null())
}

fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64() == y.as_f64(),
        _ => a == b,
    }
}

/// Timestamps compare chronologically, numbers numerically, other strings
/// lexicographically. Mixed types are incomparable.
fn compare_values(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64()?.partial_cmp(&y.as_f64()?),
        (Value::String(x), Value::String(y)) => match (parse_timestamp(x), parse_timestamp(y)) {
            (Some(tx), Some(ty)) => Some(tx.cmp(&ty)),
            _ => Some(x.cmp(y)),
        },
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calendar::Month;
    use serde_json::json;

    fn member() -> Value {
        json!({
            "_id": "m1",
            "profile": { "city": "Rosario", "age": 31 },
            "history": [
                { "event": "alta", "date_created": "2023-03-05T10:00:00", "plan": "p1" },
                { "event": "baja", "date_created": "2023-04-02T08:30:00Z", "plan": "p1" }
            ]
        })
    }

    #[test]
    fn test_eq_and_in_on_nested_paths() {
        let doc = member();
        assert!(Filter::eq("profile.city", "Rosario").matches(&doc));
        assert!(Filter::eq("profile.age", 31.0).matches(&doc));
        assert!(!Filter::eq("profile.city", "Cordoba").matches(&doc));
        assert!(Filter::in_values("_id", ["m0", "m1"]).matches(&doc));
        assert!(!Filter::in_values("_id", Vec::<String>::new()).matches(&doc));
    }

    #[test]
    fn test_missing_field_never_matches() {
        let doc = json!({ "_id": "x", "plan_id": null });
        assert!(!Filter::eq("plan_id", Value::Null).matches(&doc));
        assert!(!Filter::in_values("status", ["approved"]).matches(&doc));
        assert!(!Filter::before("date_created", parse_timestamp("2030-01-01").unwrap()).matches(&doc));
        assert!(Filter::not(Filter::eq("status", "approved")).matches(&doc));
    }

    #[test]
    fn test_range_is_half_open() {
        let window = Month::parse("03-2023").unwrap().window();
        let at = |ts: &str| json!({ "date_created": ts });

        assert!(Filter::within("date_created", &window).matches(&at("2023-03-01T00:00:00")));
        assert!(Filter::within("date_created", &window).matches(&at("2023-03-31T23:59:59")));
        assert!(!Filter::within("date_created", &window).matches(&at("2023-04-01T00:00:00")));
        assert!(!Filter::within("date_created", &window).matches(&at("2023-02-28T23:59:59")));
    }

    #[test]
    fn test_range_compares_timestamps_chronologically() {
        // Offset timestamp is 2023-03-31T23:00:00 in UTC, inside March
        let doc = json!({ "date_created": "2023-04-01T01:00:00+02:00" });
        let window = Month::parse("03-2023").unwrap().window();
        assert!(Filter::within("date_created", &window).matches(&doc));
    }

    #[test]
    fn test_elem_match_requires_single_element() {
        let doc = member();

        // One element is "alta", another is in April; no single element is both
        let both = Filter::elem_match(
            "history",
            Filter::and(vec![
                Filter::eq("event", "alta"),
                Filter::within("date_created", &Month::parse("04-2023").unwrap().window()),
            ]),
        );
        assert!(!both.matches(&doc));

        let signup_in_march = Filter::elem_match(
            "history",
            Filter::and(vec![
                Filter::eq("event", "alta"),
                Filter::within("date_created", &Month::parse("03-2023").unwrap().window()),
            ]),
        );
        assert!(signup_in_march.matches(&doc));
        assert!(!Filter::elem_match("profile", Filter::All).matches(&doc));
    }

    #[test]
    fn test_boolean_composition() {
        let doc = member();
        assert!(Filter::and(vec![]).matches(&doc));
        assert!(!Filter::or(vec![]).matches(&doc));
        assert!(Filter::or(vec![Filter::eq("_id", "zz"), Filter::eq("_id", "m1")]).matches(&doc));
        assert!(Filter::All.matches(&doc));
    }
}
