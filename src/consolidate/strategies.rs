//! Per-type field merge rules.
//!
//! Each function takes the values of one field across the members of a
//! group, in member order, and produces the merged value. Absent members
//! are passed as `None` and contribute nothing.

use crate::types::{value_items, value_text, value_truthy};
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde_json::Value;

/// Separator for joined free text.
pub const TEXT_SEPARATOR: &str = ". ";

/// Separator for joined identifiers.
pub const IDENTIFIER_SEPARATOR: &str = ", ";

/// How a field is merged across the members of a group.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeStrategy {
    /// True if any member is true.
    AnyTrue,
    /// Unique non-empty text in first-seen order, joined with ". ".
    UniqueText,
    /// Union of array elements in first-seen order.
    ArrayUnion,
    /// Most recent parseable date.
    MostRecentDate,
    /// Every member's value, joined with ", " (not deduplicated).
    JoinIdentifiers,
}

/// Logical OR across members.
pub fn merge_any_true<'a>(values: impl IntoIterator<Item = Option<&'a Value>>) -> bool {
    values.into_iter().flatten().any(value_truthy)
}

/// Text fragments carried by one value. Arrays (e.g. a PPE list) contribute
/// one fragment per element.
fn text_fragments(value: &Value) -> Vec<String> {
    match value {
        Value::Array(_) => value_items(Some(value)).into_iter().filter_map(value_text).collect(),
        other => value_text(other).into_iter().collect(),
    }
}

/// Join of the unique, trimmed, non-empty text fragments in first-seen order.
pub fn merge_unique_text<'a>(values: impl IntoIterator<Item = Option<&'a Value>>) -> Option<String> {
    let mut seen: Vec<String> = Vec::new();
    for value in values.into_iter().flatten() {
        for fragment in text_fragments(value) {
            if !seen.contains(&fragment) {
                seen.push(fragment);
            }
        }
    }
    if seen.is_empty() { None } else { Some(seen.join(TEXT_SEPARATOR)) }
}

/// Union of array elements, duplicates removed, first-seen order.
pub fn merge_array_union<'a>(values: impl IntoIterator<Item = Option<&'a Value>>) -> Vec<Value> {
    let mut union: Vec<Value> = Vec::new();
    for value in values {
        for item in value_items(value) {
            if !union.contains(item) {
                union.push(item.clone());
            }
        }
    }
    union
}

/// Every member's identifier joined with ", ". Members without a value are skipped.
pub fn merge_identifiers<'a>(values: impl IntoIterator<Item = Option<&'a Value>>) -> Option<String> {
    let ids: Vec<String> = values.into_iter().flatten().filter_map(value_text).collect();
    if ids.is_empty() { None } else { Some(ids.join(IDENTIFIER_SEPARATOR)) }
}

/// The most recent date among members, returned as the member's original value.
///
/// Ties keep the earliest member. Values that do not parse as dates are
/// ignored unless no member has a parseable date, in which case the first
/// non-empty value is kept.
pub fn merge_most_recent_date<'a>(values: impl IntoIterator<Item = Option<&'a Value>>) -> Option<Value> {
    let mut best: Option<(NaiveDateTime, &Value)> = None;
    let mut first_text: Option<&Value> = None;

    for value in values.into_iter().flatten() {
        let Some(text) = value_text(value) else {
            continue;
        };
        if first_text.is_none() {
            first_text = Some(value);
        }
        if let Some(parsed) = parse_date(&text) {
            match best {
                Some((current, _)) if parsed <= current => {}
                _ => best = Some((parsed, value)),
            }
        }
    }

    best.map(|(_, v)| v.clone()).or_else(|| first_text.cloned())
}

/// Parse the date formats seen in work-order payloads.
///
/// Supports RFC 3339 timestamps, naive ISO timestamps with or without
/// fractional seconds, `YYYY-MM-DD`, and US-style `MM/DD/YYYY`.
pub fn parse_date(text: &str) -> Option<NaiveDateTime> {
    let text = text.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt.naive_utc());
    }

    for fmt in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(text, fmt) {
            return Some(dt);
        }
    }

    for fmt in ["%Y-%m-%d", "%m/%d/%Y"] {
        if let Ok(d) = NaiveDate::parse_from_str(text, fmt) {
            return d.and_hms_opt(0, 0, 0);
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_any_true_single_true_wins() {
        let a = json!(false);
        let b = json!(true);
        assert!(merge_any_true([Some(&a), Some(&b)]));
        assert!(!merge_any_true([Some(&a), None]));
        assert!(!merge_any_true([None, None]));
    }

    #[test]
    fn test_unique_text_deduplicates() {
        let a = json!("Check valve");
        let b = json!("Check valve");
        assert_eq!(merge_unique_text([Some(&a), Some(&b)]), Some("Check valve".to_string()));
    }

    #[test]
    fn test_unique_text_joins_distinct() {
        let a = json!("Check valve");
        let b = json!(" Inspect seal ");
        let empty = json!("");
        assert_eq!(
            merge_unique_text([Some(&a), Some(&empty), None, Some(&b)]),
            Some("Check valve. Inspect seal".to_string())
        );
    }

    #[test]
    fn test_unique_text_flattens_arrays() {
        let a = json!(["Gloves", "Harness"]);
        let b = json!("Harness");
        assert_eq!(merge_unique_text([Some(&a), Some(&b)]), Some("Gloves. Harness".to_string()));
    }

    #[test]
    fn test_unique_text_all_empty_is_none() {
        let a = json!("  ");
        assert_eq!(merge_unique_text([Some(&a), None]), None);
    }

    #[test]
    fn test_array_union_ordering() {
        let a = json!(["a", "b"]);
        let b = json!(["b", "c"]);
        assert_eq!(merge_array_union([Some(&a), Some(&b)]), vec![json!("a"), json!("b"), json!("c")]);
    }

    #[test]
    fn test_identifiers_not_deduplicated() {
        let a = json!("WO-1");
        let b = json!("WO-1");
        let c = json!(17);
        assert_eq!(merge_identifiers([Some(&a), None, Some(&b), Some(&c)]), Some("WO-1, WO-1, 17".to_string()));
    }

    #[test]
    fn test_most_recent_date() {
        let a = json!("2024-01-10");
        let b = json!("2024-03-01");
        assert_eq!(merge_most_recent_date([Some(&a), Some(&b)]), Some(json!("2024-03-01")));
        assert_eq!(merge_most_recent_date([Some(&b), Some(&a)]), Some(json!("2024-03-01")));
    }

    #[test]
    fn test_most_recent_date_mixed_formats() {
        let a = json!("2024-05-02T10:00:00Z");
        let b = json!("05/01/2024");
        let junk = json!("not a date");
        assert_eq!(merge_most_recent_date([Some(&junk), Some(&b), Some(&a)]), Some(json!("2024-05-02T10:00:00Z")));
    }

    #[test]
    fn test_most_recent_date_falls_back_to_first_text() {
        let junk = json!("sometime");
        assert_eq!(merge_most_recent_date([None, Some(&junk)]), Some(json!("sometime")));
        assert_eq!(merge_most_recent_date([None, None]), None);
    }

    #[test]
    fn test_parse_date_formats() {
        assert!(parse_date("2024-01-10").is_some());
        assert!(parse_date("2024-01-10T08:30:00.123").is_some());
        assert!(parse_date("2024-01-10T08:30:00+02:00").is_some());
        assert!(parse_date("01/10/2024").is_some());
        assert!(parse_date("yesterday").is_none());
    }
}
